use crate::auth::auth::AuthUser;
use crate::clock::Clock;
use crate::ledger::admin::{AttendanceAdmin, ManualEntry, RecordPatch};
use crate::model::attendance::{AttendanceId, AttendanceView};
use crate::store::{RecordQuery, SortDir, SortField};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

const DEFAULT_PER_PAGE: u64 = 20;
const MAX_PER_PAGE: u64 = 100;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceFilter {
    /// Filter by employee ID
    #[param(example = 1000)]
    pub employee_id: Option<u64>,
    /// First work day included (YYYY-MM-DD)
    #[param(value_type = Option<String>, example = "2024-03-01")]
    pub date_from: Option<NaiveDate>,
    /// Last work day included (YYYY-MM-DD)
    #[param(value_type = Option<String>, example = "2024-03-31")]
    pub date_to: Option<NaiveDate>,
    /// active, completed, present or absent
    #[param(example = "completed")]
    pub status: Option<String>,
    /// Pagination page number (start with 1)
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Items per page, at most 100
    #[param(example = 20)]
    pub per_page: Option<u64>,
    pub sort: Option<SortField>,
    pub dir: Option<SortDir>,
}

impl From<AttendanceFilter> for RecordQuery {
    fn from(f: AttendanceFilter) -> Self {
        RecordQuery {
            employee_id: f.employee_id,
            date_from: f.date_from,
            date_to: f.date_to,
            status: f.status.map(|s| s.trim().to_lowercase()),
            page: f.page.unwrap_or(1).max(1),
            per_page: f.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
            sort: f.sort.unwrap_or_default(),
            dir: f.dir.unwrap_or_default(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<AttendanceView>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 20)]
    pub per_page: u64,
    #[schema(example = 1)]
    pub total: i64,
}

/* =========================
List attendance records
========================= */
#[utoipa::path(
    get,
    path = "/api/admin/attendance",
    params(AttendanceFilter),
    responses(
        (status = 200, description = "Page of attendance records", body = AttendanceListResponse),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance Admin"
)]
pub async fn list_records(
    auth: AuthUser,
    admin: web::Data<AttendanceAdmin>,
    query: web::Query<AttendanceFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let query = RecordQuery::from(query.into_inner());
    let (page, per_page) = (query.page, query.per_page);
    let result = admin.list(query).await?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data: result.records.into_iter().map(AttendanceView::from).collect(),
        page,
        per_page,
        total: result.total,
    }))
}

/* =========================
Create manual entry
========================= */
#[utoipa::path(
    post,
    path = "/api/admin/attendance",
    request_body(
        content = ManualEntry,
        description = "Manual attendance entry",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Record created", body = AttendanceView),
        (status = 400, description = "Missing employee_id or clock_in"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Rejected by a storage uniqueness rule"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance Admin"
)]
pub async fn create_record(
    auth: AuthUser,
    admin: web::Data<AttendanceAdmin>,
    clock: web::Data<dyn Clock>,
    payload: web::Json<ManualEntry>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let record = admin.create(payload.into_inner(), clock.now()).await?;
    info!(
        actor = %auth.username,
        actor_id = auth.user_id,
        record_id = %record.id,
        "Manual attendance entry by admin"
    );

    Ok(HttpResponse::Created().json(AttendanceView::from(record)))
}

/* =========================
Amend a record
========================= */
#[utoipa::path(
    put,
    path = "/api/admin/attendance/{id}",
    params(
        ("id" = String, Path, description = "Attendance record id")
    ),
    request_body(
        content = RecordPatch,
        description = "Fields to change. `clock_out: null` reopens the session",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Record updated", body = AttendanceView),
        (status = 400, description = "Invalid patch"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Record not found"),
        (status = 409, description = "Rejected by a storage uniqueness rule"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance Admin"
)]
pub async fn update_record(
    auth: AuthUser,
    admin: web::Data<AttendanceAdmin>,
    clock: web::Data<dyn Clock>,
    path: web::Path<Uuid>,
    payload: web::Json<RecordPatch>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let id = AttendanceId(path.into_inner());
    let record = admin.update(id, payload.into_inner(), clock.now()).await?;
    info!(
        actor = %auth.username,
        actor_id = auth.user_id,
        record_id = %id,
        "Attendance record amended by admin"
    );

    Ok(HttpResponse::Ok().json(AttendanceView::from(record)))
}

/* =========================
Delete a record
========================= */
#[utoipa::path(
    delete,
    path = "/api/admin/attendance/{id}",
    params(
        ("id" = String, Path, description = "Attendance record id")
    ),
    responses(
        (status = 200, description = "Record deleted", body = Object, example = json!({
            "message": "Attendance record deleted"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Record not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance Admin"
)]
pub async fn delete_record(
    auth: AuthUser,
    admin: web::Data<AttendanceAdmin>,
    path: web::Path<Uuid>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let id = AttendanceId(path.into_inner());
    admin.delete(id).await?;
    info!(
        actor = %auth.username,
        actor_id = auth.user_id,
        record_id = %id,
        "Attendance record deleted by admin"
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Attendance record deleted"
    })))
}
