use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttendanceId(pub Uuid);

impl AttendanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for AttendanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Punch lifecycle: `active` until clocked out, then `completed` for good.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PunchStatus {
    Active,
    Completed,
}

/// Day-level outcome of a one-shot declaration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DayOutcome {
    Present,
    Absent,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RecordSource {
    EmployeePunch,
    EmployeeDeclaration,
    AdminManual,
}

/// The two status vocabularies, kept apart by their discriminator so a punch
/// can never carry a day outcome and the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Punch(PunchStatus),
    Declaration(DayOutcome),
}

impl EntryKind {
    pub fn kind_str(&self) -> &'static str {
        match self {
            EntryKind::Punch(_) => "punch",
            EntryKind::Declaration(_) => "declaration",
        }
    }

    pub fn status_str(&self) -> &str {
        match self {
            EntryKind::Punch(status) => status.as_ref(),
            EntryKind::Declaration(outcome) => outcome.as_ref(),
        }
    }

    pub fn is_active_punch(&self) -> bool {
        matches!(self, EntryKind::Punch(PunchStatus::Active))
    }

    fn parse(kind: &str, status: &str) -> Result<Self, StoreError> {
        let corrupt = || StoreError::Corrupt(format!("kind={kind} status={status}"));
        match kind {
            "punch" => status.parse().map(EntryKind::Punch).map_err(|_| corrupt()),
            "declaration" => status.parse().map(EntryKind::Declaration).map_err(|_| corrupt()),
            _ => Err(corrupt()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub id: AttendanceId,
    pub employee_id: u64,
    pub employee_name: String,
    pub employee_surname: String,
    pub entry: EntryKind,
    pub source: RecordSource,
    /// Always populated; the one rule for which day a record belongs to.
    pub work_day: NaiveDate,
    pub clock_in: Option<DateTime<Utc>>,
    pub clock_in_origin: Option<String>,
    pub clock_out: Option<DateTime<Utc>>,
    pub clock_out_origin: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// Instant used to order records: the clock-in, else midnight of the day.
    pub fn sort_instant(&self) -> DateTime<Utc> {
        self.clock_in
            .unwrap_or_else(|| self.work_day.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    pub fn clock_order_is_valid(&self) -> bool {
        match (self.clock_in, self.clock_out) {
            (Some(clock_in), Some(clock_out)) => clock_out >= clock_in,
            _ => true,
        }
    }
}

/// Flat row as stored in `attendance_records`.
#[derive(Debug, FromRow)]
pub struct AttendanceRow {
    pub id: String,
    pub employee_id: u64,
    pub employee_name: String,
    pub employee_surname: String,
    pub kind: String,
    pub status: String,
    pub source: String,
    pub work_day: NaiveDate,
    pub clock_in: Option<DateTime<Utc>>,
    pub clock_in_origin: Option<String>,
    pub clock_out: Option<DateTime<Utc>>,
    pub clock_out_origin: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = StoreError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|_| StoreError::Corrupt(format!("id={}", row.id)))?;
        let entry = EntryKind::parse(&row.kind, &row.status)?;
        let source = row
            .source
            .parse()
            .map_err(|_| StoreError::Corrupt(format!("source={}", row.source)))?;

        Ok(AttendanceRecord {
            id: AttendanceId(id),
            employee_id: row.employee_id,
            employee_name: row.employee_name,
            employee_surname: row.employee_surname,
            entry,
            source,
            work_day: row.work_day,
            clock_in: row.clock_in,
            clock_in_origin: row.clock_in_origin,
            clock_out: row.clock_out,
            clock_out_origin: row.clock_out_origin,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Attendance record as returned over the API.
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "5f0c7c2e-8d1a-4c57-9a43-0d6f1f6f5b11",
    "employee_id": 1000,
    "employee_name": "John",
    "employee_surname": "Doe",
    "kind": "punch",
    "status": "completed",
    "source": "employee-punch",
    "work_day": "2024-03-05",
    "clock_in": "2024-03-05T09:00:00Z",
    "clock_in_origin": "10.0.0.12",
    "clock_out": "2024-03-05T18:00:00Z",
    "clock_out_origin": "10.0.0.12",
    "notes": null
}))]
pub struct AttendanceView {
    #[schema(value_type = String, format = "uuid")]
    pub id: AttendanceId,
    pub employee_id: u64,
    pub employee_name: String,
    pub employee_surname: String,
    #[schema(example = "punch")]
    pub kind: String,
    #[schema(example = "active")]
    pub status: String,
    pub source: RecordSource,
    #[schema(value_type = String, format = "date")]
    pub work_day: NaiveDate,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub clock_in: Option<DateTime<Utc>>,
    pub clock_in_origin: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub clock_out: Option<DateTime<Utc>>,
    pub clock_out_origin: Option<String>,
    pub notes: Option<String>,
}

impl From<AttendanceRecord> for AttendanceView {
    fn from(r: AttendanceRecord) -> Self {
        Self {
            id: r.id,
            employee_id: r.employee_id,
            employee_name: r.employee_name,
            employee_surname: r.employee_surname,
            kind: r.entry.kind_str().to_string(),
            status: r.entry.status_str().to_string(),
            source: r.source,
            work_day: r.work_day,
            clock_in: r.clock_in,
            clock_in_origin: r.clock_in_origin,
            clock_out: r.clock_out,
            clock_out_origin: r.clock_out_origin,
            notes: r.notes,
        }
    }
}
