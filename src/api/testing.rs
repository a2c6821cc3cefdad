use std::sync::Arc;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::middleware::from_fn;
use actix_web::{App, web};
use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;

use crate::auth::jwt::issue_token;
use crate::auth::middleware::auth_middleware;
use crate::clock::{Clock, FixedClock, WorkCalendar};
use crate::config::Config;
use crate::directory::{EmployeeDirectory, StaticDirectory};
use crate::export::{MonthKey, export_queue};
use crate::ledger::AttendanceLedger;
use crate::ledger::admin::AttendanceAdmin;
use crate::models::TokenType;
use crate::routes;
use crate::store::memory::MemoryLedgerStore;

/// `Authorization` header value for a user with the given role id.
pub fn bearer(role: u8, employee_id: Option<u64>) -> String {
    let token = issue_token(
        7,
        role,
        employee_id,
        TokenType::Access,
        &Config::for_tests().jwt_secret,
        600,
    );
    format!("Bearer {token}")
}

/// Wiring of the real routes over the in-memory store and a settable clock.
pub struct TestApp {
    pub store: Arc<MemoryLedgerStore>,
    // keeps the export queue open
    _exports: mpsc::Receiver<MonthKey>,
    clock: Arc<FixedClock>,
    ledger: web::Data<AttendanceLedger>,
    admin: web::Data<AttendanceAdmin>,
    directory: Arc<StaticDirectory>,
}

impl TestApp {
    pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> Self {
        let store = Arc::new(MemoryLedgerStore::new_in_memory());
        let directory = Arc::new(StaticDirectory::with(&[
            (1000, "John", "Doe"),
            (1001, "Jane", "Roe"),
        ]));
        let (handle, exports) = export_queue(64);
        let calendar = WorkCalendar::default();

        Self {
            ledger: web::Data::new(AttendanceLedger::new(
                store.clone(),
                handle.clone(),
                calendar,
            )),
            admin: web::Data::new(AttendanceAdmin::new(
                store.clone(),
                directory.clone(),
                handle,
                calendar,
            )),
            clock: Arc::new(FixedClock::new(
                Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap(),
            )),
            store,
            _exports: exports,
            directory,
        }
    }

    pub fn advance_to(&self, y: i32, m: u32, d: u32, h: u32, min: u32) {
        self.clock
            .set(Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap());
    }

    /// Owned handles for [`build_app`].
    pub fn parts(&self) -> AppParts {
        AppParts {
            ledger: self.ledger.clone(),
            admin: self.admin.clone(),
            directory: self.directory.clone(),
            clock: self.clock.clone(),
        }
    }
}

pub struct AppParts {
    ledger: web::Data<AttendanceLedger>,
    admin: web::Data<AttendanceAdmin>,
    directory: Arc<dyn EmployeeDirectory>,
    clock: Arc<dyn Clock>,
}

/// The real `/api` scope, auth middleware included, over the given handles.
pub fn build_app(
    parts: AppParts,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(Config::for_tests()))
        .app_data(parts.ledger)
        .app_data(parts.admin)
        .app_data(web::Data::from(parts.directory))
        .app_data(web::Data::from(parts.clock))
        .service(
            web::scope("/api")
                .wrap(from_fn(auth_middleware))
                .configure(routes::attendance_routes),
        )
}
