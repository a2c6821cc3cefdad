use crate::auth::auth::AuthUser;
use crate::clock::{Clock, client_origin};
use crate::directory::EmployeeDirectory;
use crate::error::LedgerError;
use crate::ledger::{AttendanceLedger, DayStatusView};
use crate::model::attendance::{AttendanceView, DayOutcome};
use crate::model::employee::EmployeeProfile;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CloseSession {
    #[schema(example = "left early for a client visit")]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DayOutcomeRequest {
    #[schema(example = "absent")]
    pub outcome: DayOutcome,
    #[schema(example = "doctor appointment")]
    pub notes: Option<String>,
}

async fn resolve_employee(
    auth: &AuthUser,
    directory: &dyn EmployeeDirectory,
) -> actix_web::Result<EmployeeProfile> {
    let employee_id = auth.require_employee()?;

    let profile = directory
        .lookup(employee_id)
        .await
        .map_err(LedgerError::from)?
        .ok_or_else(|| LedgerError::not_found("Employee not found"))?;

    Ok(profile)
}

/// Open a punch session (clock in)
#[utoipa::path(
    post,
    path = "/api/attendance",
    responses(
        (status = 201, description = "Session opened", body = AttendanceView),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "A session is already open", body = Object, example = json!({
            "message": "An attendance session is already open since 2024-03-05 09:00"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn open_session(
    req: HttpRequest,
    auth: AuthUser,
    ledger: web::Data<AttendanceLedger>,
    directory: web::Data<dyn EmployeeDirectory>,
    clock: web::Data<dyn Clock>,
) -> actix_web::Result<impl Responder> {
    let employee = resolve_employee(&auth, directory.get_ref()).await?;

    let record = ledger
        .open_session(&employee, clock.now(), client_origin(&req))
        .await?;

    Ok(HttpResponse::Created().json(AttendanceView::from(record)))
}

/// Close the open punch session (clock out)
#[utoipa::path(
    put,
    path = "/api/attendance",
    request_body(
        content = CloseSession,
        description = "Optional notes appended to the record",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Session closed", body = AttendanceView),
        (status = 400, description = "Clock-out earlier than clock-in"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 404, description = "No open session", body = Object, example = json!({
            "message": "No open attendance session found"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn close_session(
    req: HttpRequest,
    auth: AuthUser,
    ledger: web::Data<AttendanceLedger>,
    clock: web::Data<dyn Clock>,
    payload: Option<web::Json<CloseSession>>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let notes = payload.and_then(|p| p.into_inner().notes);

    let record = ledger
        .close_session(employee_id, clock.now(), client_origin(&req), notes)
        .await?;

    Ok(HttpResponse::Ok().json(AttendanceView::from(record)))
}

/// Register today's attendance in one step
#[utoipa::path(
    post,
    path = "/api/attendance/declaration",
    responses(
        (status = 201, description = "Attendance registered for today", body = AttendanceView),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 409, description = "Already registered today", body = Object, example = json!({
            "message": "Attendance already submitted today"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn submit_declaration(
    req: HttpRequest,
    auth: AuthUser,
    ledger: web::Data<AttendanceLedger>,
    directory: web::Data<dyn EmployeeDirectory>,
    clock: web::Data<dyn Clock>,
) -> actix_web::Result<impl Responder> {
    let employee = resolve_employee(&auth, directory.get_ref()).await?;

    let record = ledger
        .submit_daily_declaration(&employee, clock.now(), client_origin(&req))
        .await?;

    Ok(HttpResponse::Created().json(AttendanceView::from(record)))
}

/// Declare the outcome of a day (present / absent)
#[utoipa::path(
    put,
    path = "/api/attendance/day/{date}",
    params(
        ("date" = String, Path, description = "Work day (YYYY-MM-DD)", example = "2024-03-05")
    ),
    request_body(
        content = DayOutcomeRequest,
        description = "Day outcome",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Outcome recorded", body = AttendanceView),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn set_day_outcome(
    auth: AuthUser,
    ledger: web::Data<AttendanceLedger>,
    directory: web::Data<dyn EmployeeDirectory>,
    clock: web::Data<dyn Clock>,
    path: web::Path<NaiveDate>,
    payload: web::Json<DayOutcomeRequest>,
) -> actix_web::Result<impl Responder> {
    let employee = resolve_employee(&auth, directory.get_ref()).await?;
    let DayOutcomeRequest { outcome, notes } = payload.into_inner();

    let record = ledger
        .set_day_outcome(&employee, path.into_inner(), outcome, notes, clock.now())
        .await?;

    Ok(HttpResponse::Ok().json(AttendanceView::from(record)))
}

/// Today's reconciled attendance state
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Attendance state for the current day", body = DayStatusView),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today(
    auth: AuthUser,
    ledger: web::Data<AttendanceLedger>,
    clock: web::Data<dyn Clock>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let today = ledger.calendar().work_day(clock.now());

    let status = ledger.current_status(employee_id, today).await?;

    Ok(HttpResponse::Ok().json(DayStatusView::from(status)))
}

/// Own attendance history, newest first
#[utoipa::path(
    get,
    path = "/api/attendance/history",
    responses(
        (status = 200, description = "All records of the caller", body = [AttendanceView]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn history(
    auth: AuthUser,
    ledger: web::Data<AttendanceLedger>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;

    let records: Vec<AttendanceView> = ledger
        .history(employee_id)
        .await?
        .into_iter()
        .map(AttendanceView::from)
        .collect();

    Ok(HttpResponse::Ok().json(records))
}

/// Own attendance for one month, oldest first
#[utoipa::path(
    get,
    path = "/api/attendance/month/{year}/{month}",
    params(
        ("year" = i32, Path, description = "Calendar year", example = 2024),
        ("month" = u32, Path, description = "Month 1-12", example = 3)
    ),
    responses(
        (status = 200, description = "Records of the month", body = [AttendanceView]),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn month(
    auth: AuthUser,
    ledger: web::Data<AttendanceLedger>,
    path: web::Path<(i32, u32)>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let (year, month) = path.into_inner();

    let records: Vec<AttendanceView> = ledger
        .monthly(employee_id, year, month)
        .await?
        .into_iter()
        .map(AttendanceView::from)
        .collect();

    Ok(HttpResponse::Ok().json(records))
}
