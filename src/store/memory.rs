use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{Constraint, LedgerStore, RecordPage, RecordQuery, SortDir, SortField, StoreError};
use crate::model::attendance::{
    AttendanceId, AttendanceRecord, EntryKind, PunchStatus, RecordSource,
};

/// Store used by tests. Enforces the same unique keys as the MySQL schema
/// under a single lock, so racing writers see exactly one winner.
#[derive(Default)]
pub struct MemoryLedgerStore {
    rows: Mutex<Vec<AttendanceRecord>>,
    interleave: bool,
}

impl MemoryLedgerStore {
    pub fn new_in_memory() -> Self {
        Self::default()
    }

    /// Yields to the executor before every call, so futures joined on one
    /// task interleave between their reads and writes like concurrent
    /// requests against a real database.
    pub fn interleaving() -> Self {
        Self {
            interleave: true,
            ..Self::default()
        }
    }

    async fn pause(&self) {
        if self.interleave {
            tokio::task::yield_now().await;
        }
    }

    pub fn snapshot(&self) -> Vec<AttendanceRecord> {
        self.rows.lock().expect("memory store poisoned").clone()
    }
}

fn check_unique(rows: &[AttendanceRecord], candidate: &AttendanceRecord) -> Result<(), StoreError> {
    for other in rows.iter().filter(|r| r.id != candidate.id) {
        if other.employee_id != candidate.employee_id {
            continue;
        }
        if candidate.entry.is_active_punch() && other.entry.is_active_punch() {
            return Err(StoreError::Duplicate(Constraint::ActiveSession));
        }
        if matches!(candidate.entry, EntryKind::Declaration(_))
            && matches!(other.entry, EntryKind::Declaration(_))
            && other.work_day == candidate.work_day
        {
            return Err(StoreError::Duplicate(Constraint::DeclarationDay));
        }
        if is_daily_submission(candidate)
            && is_daily_submission(other)
            && other.work_day == candidate.work_day
        {
            return Err(StoreError::Duplicate(Constraint::DailySubmission));
        }
    }
    Ok(())
}

fn is_daily_submission(record: &AttendanceRecord) -> bool {
    matches!(record.entry, EntryKind::Punch(_))
        && record.source == RecordSource::EmployeeDeclaration
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        self.pause().await;
        let mut rows = self.rows.lock().expect("memory store poisoned");
        if rows.iter().any(|r| r.id == record.id) {
            return Err(StoreError::Duplicate(Constraint::PrimaryKey));
        }
        check_unique(&rows, record)?;
        rows.push(record.clone());
        Ok(())
    }

    async fn update(&self, record: &AttendanceRecord) -> Result<bool, StoreError> {
        self.pause().await;
        let mut rows = self.rows.lock().expect("memory store poisoned");
        check_unique(&rows, record)?;
        match rows.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => {
                let employee_id = existing.employee_id;
                let source = existing.source;
                *existing = record.clone();
                existing.employee_id = employee_id;
                existing.source = source;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn close_active(
        &self,
        id: AttendanceId,
        clock_out: DateTime<Utc>,
        origin: Option<&str>,
        notes: Option<&str>,
    ) -> Result<bool, StoreError> {
        self.pause().await;
        let mut rows = self.rows.lock().expect("memory store poisoned");
        let Some(record) = rows.iter_mut().find(|r| {
            r.id == id
                && r.entry.is_active_punch()
                && r.clock_in.is_none_or(|clock_in| clock_in <= clock_out)
        }) else {
            return Ok(false);
        };

        record.entry = EntryKind::Punch(PunchStatus::Completed);
        record.clock_out = Some(clock_out);
        record.clock_out_origin = origin.map(str::to_owned);
        if let Some(extra) = notes {
            record.notes = Some(match record.notes.take() {
                Some(existing) => format!("{existing}\n{extra}"),
                None => extra.to_owned(),
            });
        }
        record.updated_at = clock_out;
        Ok(true)
    }

    async fn delete(&self, id: AttendanceId) -> Result<bool, StoreError> {
        self.pause().await;
        let mut rows = self.rows.lock().expect("memory store poisoned");
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() != before)
    }

    async fn get(&self, id: AttendanceId) -> Result<Option<AttendanceRecord>, StoreError> {
        self.pause().await;
        let rows = self.rows.lock().expect("memory store poisoned");
        Ok(rows.iter().find(|r| r.id == id).cloned())
    }

    async fn find_active(&self, employee_id: u64) -> Result<Option<AttendanceRecord>, StoreError> {
        self.pause().await;
        let rows = self.rows.lock().expect("memory store poisoned");
        Ok(rows
            .iter()
            .find(|r| r.employee_id == employee_id && r.entry.is_active_punch())
            .cloned())
    }

    async fn find_by_day(
        &self,
        employee_id: u64,
        day: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.pause().await;
        let rows = self.rows.lock().expect("memory store poisoned");
        Ok(rows
            .iter()
            .filter(|r| r.employee_id == employee_id && r.work_day == day)
            .cloned()
            .collect())
    }

    async fn list_by_employee(
        &self,
        employee_id: u64,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.pause().await;
        let rows = self.rows.lock().expect("memory store poisoned");
        Ok(rows
            .iter()
            .filter(|r| r.employee_id == employee_id)
            .cloned()
            .collect())
    }

    async fn list_in_range(
        &self,
        employee_id: Option<u64>,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.pause().await;
        let rows = self.rows.lock().expect("memory store poisoned");
        let mut found: Vec<_> = rows
            .iter()
            .filter(|r| r.work_day >= from && r.work_day < until)
            .filter(|r| employee_id.is_none_or(|id| r.employee_id == id))
            .cloned()
            .collect();
        found.sort_by_key(|r| (r.work_day, r.created_at));
        Ok(found)
    }

    async fn query(&self, query: &RecordQuery) -> Result<RecordPage, StoreError> {
        self.pause().await;
        let rows = self.rows.lock().expect("memory store poisoned");
        let mut matched: Vec<_> = rows
            .iter()
            .filter(|r| query.employee_id.is_none_or(|id| r.employee_id == id))
            .filter(|r| query.date_from.is_none_or(|d| r.work_day >= d))
            .filter(|r| query.date_to.is_none_or(|d| r.work_day <= d))
            .filter(|r| {
                query
                    .status
                    .as_deref()
                    .is_none_or(|s| r.entry.status_str() == s)
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            let ord = match query.sort {
                SortField::ClockIn => a.sort_instant().cmp(&b.sort_instant()),
                SortField::WorkDay => a.work_day.cmp(&b.work_day),
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::EmployeeId => a.employee_id.cmp(&b.employee_id),
            };
            let ord = match query.dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            };
            ord.then_with(|| a.id.cmp(&b.id))
        });

        let total = matched.len() as i64;
        let records = matched
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.per_page as usize)
            .collect();

        Ok(RecordPage { records, total })
    }
}
