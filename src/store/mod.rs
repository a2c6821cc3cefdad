use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use strum_macros::{AsRefStr, Display};
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::attendance::{AttendanceId, AttendanceRecord};

#[cfg(test)]
pub mod memory;
pub mod mysql;

/// Uniqueness rules the store itself guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Constraint {
    #[strum(serialize = "one open punch session per employee")]
    ActiveSession,
    #[strum(serialize = "one declaration per employee per day")]
    DeclarationDay,
    #[strum(serialize = "one daily submission per employee per day")]
    DailySubmission,
    #[strum(serialize = "record id")]
    PrimaryKey,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Duplicate(Constraint),
    #[error("stored row could not be decoded: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, AsRefStr, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortField {
    #[default]
    ClockIn,
    WorkDay,
    CreatedAt,
    EmployeeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

/// Admin review filter. All present filters combine with AND; date bounds are
/// inclusive and apply to the record's work day.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub employee_id: Option<u64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Either vocabulary: `active`, `completed`, `present` or `absent`.
    pub status: Option<String>,
    pub page: u64,
    pub per_page: u64,
    pub sort: SortField,
    pub dir: SortDir,
}

impl RecordQuery {
    /// Rows to skip. Saturates, so an absurd page simply lands past the end.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

#[derive(Debug)]
pub struct RecordPage {
    pub records: Vec<AttendanceRecord>,
    pub total: i64,
}

/// Durable keyed storage for attendance records.
///
/// Implementations must reject, with [`StoreError::Duplicate`], any write that
/// would leave two open punch sessions for one employee, two declaration
/// records for the same employee and day, or two one-step daily submissions
/// for the same employee and day. That check is the authoritative
/// guard against concurrent requests; callers' pre-checks are only there for
/// friendlier messages.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn insert(&self, record: &AttendanceRecord) -> Result<(), StoreError>;

    /// Replaces every mutable column of the record with the same id.
    /// Returns `false` when no such record exists.
    async fn update(&self, record: &AttendanceRecord) -> Result<bool, StoreError>;

    /// Closes record `id` only while it is still an open punch whose clock-in
    /// is not after `clock_out`. `notes` is appended on its own line. Returns
    /// `false` when nothing matched, e.g. a concurrent close got there first.
    async fn close_active(
        &self,
        id: AttendanceId,
        clock_out: DateTime<Utc>,
        origin: Option<&str>,
        notes: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Hard delete. Returns `false` when no such record exists.
    async fn delete(&self, id: AttendanceId) -> Result<bool, StoreError>;

    async fn get(&self, id: AttendanceId) -> Result<Option<AttendanceRecord>, StoreError>;

    async fn find_active(&self, employee_id: u64) -> Result<Option<AttendanceRecord>, StoreError>;

    async fn find_by_day(
        &self,
        employee_id: u64,
        day: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;

    async fn list_by_employee(&self, employee_id: u64)
    -> Result<Vec<AttendanceRecord>, StoreError>;

    /// Records whose work day is in `[from, until)`, for one employee or all.
    async fn list_in_range(
        &self,
        employee_id: Option<u64>,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;

    async fn query(&self, query: &RecordQuery) -> Result<RecordPage, StoreError>;
}
