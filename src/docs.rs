use crate::api::attendance::{CloseSession, DayOutcomeRequest};
use crate::api::attendance_admin::AttendanceListResponse;
use crate::ledger::admin::{ManualEntry, RecordPatch};
use crate::ledger::{DayState, DayStatusView};
use crate::model::attendance::{AttendanceView, DayOutcome, PunchStatus, RecordSource};
use crate::store::{SortDir, SortField};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Attendance API",
        version = "1.0.0",
        description = r#"
## Attendance Ledger

Attendance tracking for the **Human Resource Management (HRM)** system.

### 🔹 Key Features
- **Punch sessions**
  - Clock in and clock out, at most one open session per employee
- **Daily declarations**
  - Register a whole day in one step, or declare it present / absent
- **Reconciled day view**
  - One answer per day regardless of how it was recorded
- **Administration**
  - Review, correct, create and delete records (HR / Admin)
- **Monthly spreadsheet**
  - Every change re-renders the month's `.xlsx` snapshot in the background

### 🔐 Security
All endpoints require a **JWT Bearer** access token.
Administrative endpoints are limited to **Admin** and **HR** roles.

### 📦 Response Format
- JSON responses; errors as `{"message": "..."}`
- Pagination on the admin list endpoint

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::open_session,
        crate::api::attendance::close_session,
        crate::api::attendance::submit_declaration,
        crate::api::attendance::set_day_outcome,
        crate::api::attendance::today,
        crate::api::attendance::history,
        crate::api::attendance::month,

        crate::api::attendance_admin::list_records,
        crate::api::attendance_admin::create_record,
        crate::api::attendance_admin::update_record,
        crate::api::attendance_admin::delete_record
    ),
    components(
        schemas(
            AttendanceView,
            DayStatusView,
            DayState,
            PunchStatus,
            DayOutcome,
            RecordSource,
            CloseSession,
            DayOutcomeRequest,
            ManualEntry,
            RecordPatch,
            AttendanceListResponse,
            SortField,
            SortDir
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Employee attendance APIs"),
        (name = "Attendance Admin", description = "Attendance review and correction APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
