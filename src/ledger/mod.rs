use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::clock::WorkCalendar;
use crate::error::{LedgerError, Result};
use crate::export::{ExportHandle, MonthKey};
use crate::model::attendance::{
    AttendanceId, AttendanceRecord, AttendanceView, DayOutcome, EntryKind, PunchStatus,
    RecordSource,
};
use crate::model::employee::EmployeeProfile;
use crate::store::{Constraint, LedgerStore, StoreError};

pub mod admin;

/// Reconciled answer to "what is this employee's attendance for the day".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum DayState {
    NotRegistered,
    ClockedIn,
    Present,
    DeclaredPresent,
    DeclaredAbsent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayStatus {
    pub work_day: NaiveDate,
    pub state: DayState,
    /// The canonical record for the day, whichever path created it.
    pub record: Option<AttendanceRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DayStatusView {
    #[schema(value_type = String, format = "date")]
    pub work_day: NaiveDate,
    pub state: DayState,
    pub record: Option<AttendanceView>,
}

impl From<DayStatus> for DayStatusView {
    fn from(s: DayStatus) -> Self {
        Self {
            work_day: s.work_day,
            state: s.state,
            record: s.record.map(AttendanceView::from),
        }
    }
}

/// Picks the canonical record among everything an employee has for one day.
/// A declaration wins over punches; then an open session; then the most
/// recently closed one.
pub fn reconcile(records: &[AttendanceRecord]) -> (DayState, Option<&AttendanceRecord>) {
    if let Some(declared) = records
        .iter()
        .find(|r| matches!(r.entry, EntryKind::Declaration(_)))
    {
        let state = match declared.entry {
            EntryKind::Declaration(DayOutcome::Absent) => DayState::DeclaredAbsent,
            _ => DayState::DeclaredPresent,
        };
        return (state, Some(declared));
    }

    if let Some(open) = records.iter().find(|r| r.entry.is_active_punch()) {
        return (DayState::ClockedIn, Some(open));
    }

    records
        .iter()
        .filter(|r| r.entry == EntryKind::Punch(PunchStatus::Completed))
        .max_by_key(|r| (r.clock_out, r.sort_instant()))
        .map_or((DayState::NotRegistered, None), |r| {
            (DayState::Present, Some(r))
        })
}

pub(crate) fn conflict_from_store(e: StoreError) -> LedgerError {
    match e {
        StoreError::Duplicate(constraint) => {
            LedgerError::conflict(format!("Conflicts with an existing record: {constraint}"))
        }
        other => other.into(),
    }
}

/// Employee-facing state machine over the ledger store.
pub struct AttendanceLedger {
    store: Arc<dyn LedgerStore>,
    exports: ExportHandle,
    calendar: WorkCalendar,
}

impl AttendanceLedger {
    pub fn new(store: Arc<dyn LedgerStore>, exports: ExportHandle, calendar: WorkCalendar) -> Self {
        Self {
            store,
            exports,
            calendar,
        }
    }

    pub fn calendar(&self) -> &WorkCalendar {
        &self.calendar
    }

    fn punch_record(
        &self,
        employee: &EmployeeProfile,
        source: RecordSource,
        now: DateTime<Utc>,
        origin: Option<String>,
    ) -> AttendanceRecord {
        AttendanceRecord {
            id: AttendanceId::new(),
            employee_id: employee.id,
            employee_name: employee.first_name.clone(),
            employee_surname: employee.last_name.clone(),
            entry: EntryKind::Punch(PunchStatus::Active),
            source,
            work_day: self.calendar.work_day(now),
            clock_in: Some(now),
            clock_in_origin: origin,
            clock_out: None,
            clock_out_origin: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn open_session(
        &self,
        employee: &EmployeeProfile,
        now: DateTime<Utc>,
        origin: Option<String>,
    ) -> Result<AttendanceRecord> {
        if let Some(open) = self.store.find_active(employee.id).await? {
            return Err(LedgerError::conflict(format!(
                "An attendance session is already open since {}",
                self.calendar.local(open.sort_instant()).format("%Y-%m-%d %H:%M")
            )));
        }

        let record = self.punch_record(employee, RecordSource::EmployeePunch, now, origin);

        // the unique key decides races the pre-check could not see
        self.store.insert(&record).await.map_err(|e| match e {
            StoreError::Duplicate(_) => {
                LedgerError::conflict("An attendance session is already open")
            }
            other => other.into(),
        })?;

        info!(employee_id = employee.id, record_id = %record.id, "Attendance session opened");
        self.exports.notify(MonthKey::from_date(record.work_day));
        Ok(record)
    }

    pub async fn close_session(
        &self,
        employee_id: u64,
        now: DateTime<Utc>,
        origin: Option<String>,
        notes: Option<String>,
    ) -> Result<AttendanceRecord> {
        let open = self
            .store
            .find_active(employee_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("No open attendance session found"))?;

        if open.clock_in.is_some_and(|clock_in| now < clock_in) {
            return Err(LedgerError::validation(
                "Clock-out cannot be earlier than clock-in",
            ));
        }

        let notes = notes.filter(|n| !n.trim().is_empty());
        // a concurrent close or an admin edit may have won since the read
        let closed = self
            .store
            .close_active(open.id, now, origin.as_deref(), notes.as_deref())
            .await?;
        if !closed {
            return Err(LedgerError::not_found("No open attendance session found"));
        }

        let record = self
            .store
            .get(open.id)
            .await?
            .ok_or_else(|| LedgerError::not_found("No open attendance session found"))?;

        info!(employee_id, record_id = %record.id, "Attendance session closed");
        self.exports.notify(MonthKey::from_date(record.work_day));
        Ok(record)
    }

    /// Opens and closes a session in one step, clocking out at the fixed end
    /// of the working day. Only allowed while the day has no record at all.
    pub async fn submit_daily_declaration(
        &self,
        employee: &EmployeeProfile,
        now: DateTime<Utc>,
        origin: Option<String>,
    ) -> Result<AttendanceRecord> {
        let day = self.calendar.work_day(now);

        if !self.store.find_by_day(employee.id, day).await?.is_empty() {
            return Err(LedgerError::conflict("Attendance already submitted today"));
        }

        let mut record =
            self.punch_record(employee, RecordSource::EmployeeDeclaration, now, origin.clone());
        // after hours the fixed end would precede the clock-in
        record.clock_out = Some(self.calendar.day_end(day).max(now));
        record.clock_out_origin = origin;
        record.entry = EntryKind::Punch(PunchStatus::Completed);

        // the unique key catches a concurrent submission the pre-check missed
        self.store.insert(&record).await.map_err(|e| match e {
            StoreError::Duplicate(Constraint::DailySubmission) => {
                LedgerError::conflict("Attendance already submitted today")
            }
            other => conflict_from_store(other),
        })?;

        info!(
            employee_id = employee.id,
            record_id = %record.id,
            %day,
            "Daily declaration submitted"
        );
        self.exports.notify(MonthKey::from_date(day));
        Ok(record)
    }

    /// Upserts the one-shot present/absent outcome for a day.
    pub async fn set_day_outcome(
        &self,
        employee: &EmployeeProfile,
        work_day: NaiveDate,
        outcome: DayOutcome,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord> {
        let existing = self
            .store
            .find_by_day(employee.id, work_day)
            .await?
            .into_iter()
            .find(|r| matches!(r.entry, EntryKind::Declaration(_)));

        let record = match existing {
            Some(mut record) => {
                record.entry = EntryKind::Declaration(outcome);
                record.notes = notes;
                record.updated_at = now;
                if !self.store.update(&record).await.map_err(conflict_from_store)? {
                    return Err(LedgerError::not_found("Attendance record no longer exists"));
                }
                debug!(
                    employee_id = employee.id,
                    record_id = %record.id,
                    "Day outcome overwritten"
                );
                record
            }
            None => {
                let record = AttendanceRecord {
                    id: AttendanceId::new(),
                    employee_id: employee.id,
                    employee_name: employee.first_name.clone(),
                    employee_surname: employee.last_name.clone(),
                    entry: EntryKind::Declaration(outcome),
                    source: RecordSource::EmployeeDeclaration,
                    work_day,
                    clock_in: None,
                    clock_in_origin: None,
                    clock_out: None,
                    clock_out_origin: None,
                    notes,
                    created_at: now,
                    updated_at: now,
                };
                self.store
                    .insert(&record)
                    .await
                    .map_err(conflict_from_store)?;
                record
            }
        };

        info!(employee_id = employee.id, %work_day, %outcome, "Day outcome recorded");
        self.exports.notify(MonthKey::from_date(work_day));
        Ok(record)
    }

    pub async fn current_status(&self, employee_id: u64, today: NaiveDate) -> Result<DayStatus> {
        let records = self.store.find_by_day(employee_id, today).await?;
        let (state, record) = reconcile(&records);

        Ok(DayStatus {
            work_day: today,
            state,
            record: record.cloned(),
        })
    }

    /// Newest first.
    pub async fn history(&self, employee_id: u64) -> Result<Vec<AttendanceRecord>> {
        let mut records = self.store.list_by_employee(employee_id).await?;
        records.sort_by_key(|r| std::cmp::Reverse(r.sort_instant()));
        Ok(records)
    }

    /// Oldest first.
    pub async fn monthly(
        &self,
        employee_id: u64,
        year: i32,
        month: u32,
    ) -> Result<Vec<AttendanceRecord>> {
        let key = MonthKey::new(year, month)
            .ok_or_else(|| LedgerError::validation("month must be between 1 and 12"))?;
        let (from, until) = key
            .bounds()
            .ok_or_else(|| LedgerError::validation("year out of range"))?;

        let mut records = self
            .store
            .list_in_range(Some(employee_id), from, until)
            .await?;
        records.sort_by_key(|r| r.sort_instant());
        Ok(records)
    }
}
