use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use tracing::info;
use utoipa::ToSchema;

use super::conflict_from_store;
use crate::clock::WorkCalendar;
use crate::directory::EmployeeDirectory;
use crate::error::{LedgerError, Result};
use crate::export::{ExportHandle, MonthKey};
use crate::model::attendance::{
    AttendanceId, AttendanceRecord, DayOutcome, EntryKind, PunchStatus, RecordSource,
};
use crate::store::{LedgerStore, RecordPage, RecordQuery};

const STATUS_FILTERS: [&str; 4] = ["active", "completed", "present", "absent"];

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`).
fn double_option<'de, D, T>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ManualEntry {
    #[schema(example = 1000)]
    pub employee_id: Option<u64>,
    #[schema(example = "2024-03-05T09:00:00Z", value_type = Option<String>, format = "date-time")]
    pub clock_in: Option<DateTime<Utc>>,
    #[schema(example = "2024-03-05T18:00:00Z", value_type = Option<String>, format = "date-time")]
    pub clock_out: Option<DateTime<Utc>>,
    #[schema(example = "forgot to clock in")]
    pub notes: Option<String>,
}

/// Partial edit. `clock_out: null` reopens a punch session; omitting it keeps
/// the current value.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RecordPatch {
    #[schema(value_type = Option<String>, format = "date-time")]
    pub clock_in: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, format = "date-time", nullable)]
    pub clock_out: Option<Option<DateTime<Utc>>>,
    #[schema(value_type = Option<String>, format = "date")]
    pub work_day: Option<NaiveDate>,
    pub outcome: Option<DayOutcome>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, nullable)]
    pub notes: Option<Option<String>>,
}

/// Privileged CRUD over the ledger. Skips the state machine's pre-checks;
/// only the store's own unique keys can still refuse a write.
pub struct AttendanceAdmin {
    store: Arc<dyn LedgerStore>,
    directory: Arc<dyn EmployeeDirectory>,
    exports: ExportHandle,
    calendar: WorkCalendar,
}

impl AttendanceAdmin {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        directory: Arc<dyn EmployeeDirectory>,
        exports: ExportHandle,
        calendar: WorkCalendar,
    ) -> Self {
        Self {
            store,
            directory,
            exports,
            calendar,
        }
    }

    pub async fn list(&self, query: RecordQuery) -> Result<RecordPage> {
        if let Some(status) = query.status.as_deref() {
            if !STATUS_FILTERS.contains(&status) {
                return Err(LedgerError::validation(format!(
                    "Invalid status. Allowed: {}",
                    STATUS_FILTERS.join(", ")
                )));
            }
        }

        if let (Some(from), Some(to)) = (query.date_from, query.date_to) {
            if from > to {
                return Err(LedgerError::validation(
                    "date_from cannot be after date_to",
                ));
            }
        }

        Ok(self.store.query(&query).await?)
    }

    pub async fn create(&self, entry: ManualEntry, now: DateTime<Utc>) -> Result<AttendanceRecord> {
        let employee_id = entry
            .employee_id
            .ok_or_else(|| LedgerError::validation("employee_id is required"))?;
        let clock_in = entry
            .clock_in
            .ok_or_else(|| LedgerError::validation("clock_in is required"))?;

        let employee = self
            .directory
            .lookup(employee_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Employee not found"))?;

        let status = match entry.clock_out {
            Some(_) => PunchStatus::Completed,
            None => PunchStatus::Active,
        };

        let record = AttendanceRecord {
            id: AttendanceId::new(),
            employee_id,
            employee_name: employee.first_name,
            employee_surname: employee.last_name,
            entry: EntryKind::Punch(status),
            source: RecordSource::AdminManual,
            work_day: self.calendar.work_day(clock_in),
            clock_in: Some(clock_in),
            clock_in_origin: None,
            clock_out: entry.clock_out,
            clock_out_origin: None,
            notes: entry.notes,
            created_at: now,
            updated_at: now,
        };

        if !record.clock_order_is_valid() {
            return Err(LedgerError::validation(
                "clock_out cannot be earlier than clock_in",
            ));
        }

        self.store
            .insert(&record)
            .await
            .map_err(conflict_from_store)?;

        info!(employee_id, record_id = %record.id, "Manual attendance entry created");
        self.exports.notify(MonthKey::from_date(record.work_day));
        Ok(record)
    }

    pub async fn update(
        &self,
        id: AttendanceId,
        patch: RecordPatch,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord> {
        let mut record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Attendance record not found"))?;
        let previous_month = MonthKey::from_date(record.work_day);

        match record.entry {
            EntryKind::Punch(_) => {
                if patch.outcome.is_some() {
                    return Err(LedgerError::validation(
                        "outcome applies only to declaration records",
                    ));
                }

                if let Some(clock_in) = patch.clock_in {
                    record.clock_in = Some(clock_in);
                    record.work_day = self.calendar.work_day(clock_in);
                }

                match patch.clock_out {
                    None => {}
                    Some(Some(clock_out)) => {
                        record.clock_out = Some(clock_out);
                        record.entry = EntryKind::Punch(PunchStatus::Completed);
                    }
                    // reopening; may sit beside another open session only if
                    // the store lets it
                    Some(None) => {
                        record.clock_out = None;
                        record.clock_out_origin = None;
                        record.entry = EntryKind::Punch(PunchStatus::Active);
                    }
                }
            }
            EntryKind::Declaration(_) => {
                if patch.clock_in.is_some() || patch.clock_out.is_some() {
                    return Err(LedgerError::validation(
                        "clock_in/clock_out apply only to punch records",
                    ));
                }
                if let Some(outcome) = patch.outcome {
                    record.entry = EntryKind::Declaration(outcome);
                }
            }
        }

        if let Some(work_day) = patch.work_day {
            record.work_day = work_day;
        }
        if let Some(notes) = patch.notes {
            record.notes = notes;
        }

        if !record.clock_order_is_valid() {
            return Err(LedgerError::validation(
                "clock_out cannot be earlier than clock_in",
            ));
        }
        record.updated_at = now;

        if !self
            .store
            .update(&record)
            .await
            .map_err(conflict_from_store)?
        {
            return Err(LedgerError::not_found("Attendance record not found"));
        }

        info!(
            record_id = %record.id,
            employee_id = record.employee_id,
            "Attendance record amended"
        );

        let month = MonthKey::from_date(record.work_day);
        self.exports.notify(month);
        if month != previous_month {
            self.exports.notify(previous_month);
        }
        Ok(record)
    }

    pub async fn delete(&self, id: AttendanceId) -> Result<()> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Attendance record not found"))?;

        if !self.store.delete(id).await? {
            return Err(LedgerError::not_found("Attendance record not found"));
        }

        info!(record_id = %id, employee_id = record.employee_id, "Attendance record deleted");
        self.exports.notify(MonthKey::from_date(record.work_day));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use crate::export::export_queue;
    use crate::ledger::AttendanceLedger;
    use crate::store::memory::MemoryLedgerStore;
    use crate::store::{SortDir, SortField};
    use chrono::TimeZone;
    use tokio::sync::mpsc;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap()
    }

    struct Fixture {
        admin: AttendanceAdmin,
        ledger: AttendanceLedger,
        store: Arc<MemoryLedgerStore>,
        rx: mpsc::Receiver<MonthKey>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryLedgerStore::new_in_memory());
        let directory = Arc::new(StaticDirectory::with(&[
            (1, "Alan", "Turing"),
            (2, "Barbara", "Liskov"),
        ]));
        let (exports, rx) = export_queue(64);
        let calendar = WorkCalendar::default();
        Fixture {
            admin: AttendanceAdmin::new(store.clone(), directory, exports.clone(), calendar),
            ledger: AttendanceLedger::new(store.clone(), exports, calendar),
            store,
            rx,
        }
    }

    fn manual(
        employee_id: u64,
        clock_in: DateTime<Utc>,
        clock_out: Option<DateTime<Utc>>,
    ) -> ManualEntry {
        ManualEntry {
            employee_id: Some(employee_id),
            clock_in: Some(clock_in),
            clock_out,
            notes: None,
        }
    }

    fn page(query: RecordQuery) -> RecordQuery {
        RecordQuery {
            page: 1,
            per_page: 20,
            ..query
        }
    }

    #[tokio::test]
    async fn create_requires_employee_and_clock_in() {
        let f = fixture();

        let missing_employee = ManualEntry {
            clock_in: Some(at(5, 9)),
            ..Default::default()
        };
        assert!(matches!(
            f.admin.create(missing_employee, at(5, 12)).await,
            Err(LedgerError::Validation(_))
        ));

        let missing_clock_in = ManualEntry {
            employee_id: Some(1),
            ..Default::default()
        };
        assert!(matches!(
            f.admin.create(missing_clock_in, at(5, 12)).await,
            Err(LedgerError::Validation(_))
        ));

        assert!(matches!(
            f.admin.create(manual(99, at(5, 9), None), at(5, 12)).await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn create_derives_status_and_snapshots_name() {
        let f = fixture();

        let open = f.admin.create(manual(1, at(5, 9), None), at(5, 12)).await.unwrap();
        assert_eq!(open.entry, EntryKind::Punch(PunchStatus::Active));
        assert_eq!(open.source, RecordSource::AdminManual);
        assert_eq!(open.employee_surname, "Turing");

        let done = f
            .admin
            .create(manual(2, at(5, 9), Some(at(5, 17))), at(5, 12))
            .await
            .unwrap();
        assert_eq!(done.entry, EntryKind::Punch(PunchStatus::Completed));

        let backwards = f
            .admin
            .create(manual(2, at(6, 17), Some(at(6, 9))), at(6, 18))
            .await;
        assert!(matches!(backwards, Err(LedgerError::Validation(_))));
    }

    #[tokio::test]
    async fn update_closes_and_reopens_sessions() {
        let f = fixture();
        let record = f.admin.create(manual(1, at(5, 9), None), at(5, 12)).await.unwrap();

        let closed = f
            .admin
            .update(
                record.id,
                RecordPatch {
                    clock_out: Some(Some(at(5, 18))),
                    ..Default::default()
                },
                at(6, 8),
            )
            .await
            .unwrap();
        assert_eq!(closed.entry, EntryKind::Punch(PunchStatus::Completed));

        let reopened = f
            .admin
            .update(
                record.id,
                RecordPatch {
                    clock_out: Some(None),
                    ..Default::default()
                },
                at(6, 9),
            )
            .await
            .unwrap();
        assert_eq!(reopened.entry, EntryKind::Punch(PunchStatus::Active));
        assert_eq!(reopened.clock_out, None);
    }

    #[tokio::test]
    async fn reopen_beside_open_session_hits_storage_guard() {
        let f = fixture();
        let closed = f
            .admin
            .create(manual(1, at(4, 9), Some(at(4, 17))), at(4, 18))
            .await
            .unwrap();
        f.admin.create(manual(1, at(5, 9), None), at(5, 9)).await.unwrap();

        let err = f
            .admin
            .update(
                closed.id,
                RecordPatch {
                    clock_out: Some(None),
                    ..Default::default()
                },
                at(5, 10),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_rejects_mixed_vocabulary_and_bad_order() {
        let f = fixture();
        let profile = crate::model::employee::EmployeeProfile {
            id: 2,
            first_name: "Barbara".to_string(),
            last_name: "Liskov".to_string(),
        };
        let declared = f
            .ledger
            .set_day_outcome(&profile, at(5, 0).date_naive(), DayOutcome::Present, None, at(5, 8))
            .await
            .unwrap();

        let err = f
            .admin
            .update(
                declared.id,
                RecordPatch {
                    clock_out: Some(Some(at(5, 18))),
                    ..Default::default()
                },
                at(5, 19),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let absent = f
            .admin
            .update(
                declared.id,
                RecordPatch {
                    outcome: Some(DayOutcome::Absent),
                    notes: Some(Some("approved leave".to_string())),
                    ..Default::default()
                },
                at(5, 19),
            )
            .await
            .unwrap();
        assert_eq!(absent.entry, EntryKind::Declaration(DayOutcome::Absent));
        assert_eq!(absent.notes.as_deref(), Some("approved leave"));

        let punch = f
            .admin
            .create(manual(1, at(5, 9), Some(at(5, 17))), at(5, 18))
            .await
            .unwrap();
        let err = f
            .admin
            .update(
                punch.id,
                RecordPatch {
                    clock_in: Some(at(5, 20)),
                    ..Default::default()
                },
                at(5, 21),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn moving_a_record_re_exports_both_months() {
        let mut f = fixture();
        let record = f
            .admin
            .create(manual(1, at(31, 9), Some(at(31, 17))), at(31, 18))
            .await
            .unwrap();
        assert_eq!(f.rx.recv().await, MonthKey::new(2024, 3));

        f.admin
            .update(
                record.id,
                RecordPatch {
                    clock_in: Some(Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap()),
                    clock_out: Some(Some(Utc.with_ymd_and_hms(2024, 4, 1, 17, 0, 0).unwrap())),
                    ..Default::default()
                },
                at(31, 19),
            )
            .await
            .unwrap();

        assert_eq!(f.rx.recv().await, MonthKey::new(2024, 4));
        assert_eq!(f.rx.recv().await, MonthKey::new(2024, 3));
    }

    #[tokio::test]
    async fn delete_missing_then_existing() {
        let f = fixture();
        assert!(matches!(
            f.admin.delete(AttendanceId::new()).await,
            Err(LedgerError::NotFound(_))
        ));

        let record = f.admin.create(manual(1, at(5, 9), None), at(5, 9)).await.unwrap();
        f.admin.delete(record.id).await.unwrap();

        let listed = f.admin.list(page(RecordQuery::default())).await.unwrap();
        assert_eq!(listed.total, 0);
        assert!(listed.records.iter().all(|r| r.id != record.id));
        assert!(f.store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn list_filters_combine_and_paginate() {
        let f = fixture();
        for d in 1..=5 {
            f.admin
                .create(manual(1, at(d, 9), Some(at(d, 17))), at(d, 18))
                .await
                .unwrap();
        }
        f.admin.create(manual(2, at(3, 9), None), at(3, 9)).await.unwrap();

        let q = page(RecordQuery {
            employee_id: Some(1),
            date_from: Some(at(2, 0).date_naive()),
            date_to: Some(at(4, 0).date_naive()),
            status: Some("completed".to_string()),
            sort: SortField::ClockIn,
            dir: SortDir::Asc,
            ..Default::default()
        });
        let result = f.admin.list(q).await.unwrap();
        assert_eq!(result.total, 3);
        let days: Vec<_> = result.records.iter().map(|r| r.work_day.to_string()).collect();
        assert_eq!(days, ["2024-03-02", "2024-03-03", "2024-03-04"]);

        let second_page = f
            .admin
            .list(RecordQuery {
                page: 2,
                per_page: 4,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(second_page.total, 6);
        assert_eq!(second_page.records.len(), 2);

        let bad = f
            .admin
            .list(page(RecordQuery {
                status: Some("late".to_string()),
                ..Default::default()
            }))
            .await;
        assert!(matches!(bad, Err(LedgerError::Validation(_))));
    }

    #[tokio::test]
    async fn page_far_past_the_end_is_empty() {
        let f = fixture();
        f.admin
            .create(manual(1, at(5, 9), Some(at(5, 17))), at(5, 18))
            .await
            .unwrap();

        let result = f
            .admin
            .list(RecordQuery {
                page: u64::MAX,
                per_page: 100,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(result.total, 1);
        assert!(result.records.is_empty());
    }
}
