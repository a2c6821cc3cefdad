//! Monthly spreadsheet mirror of the ledger.
//!
//! Every ledger mutation drops the affected month onto a bounded queue. A
//! single worker re-reads that month in full, renders it as one xlsx sheet and
//! overwrites the previous artifact in the sink. Failures are logged and
//! dropped; the next mutation in the same month re-renders everything, which
//! is the only recovery path.

use chrono::{Datelike, NaiveDate};
use derive_more::Display;
use thiserror::Error;

use crate::store::StoreError;

pub mod sheet;
pub mod sink;
pub mod worker;

pub use sink::{LocalFolderSink, SpreadsheetSink};
pub use worker::{ExportHandle, ExportWorker, MonthlyExporter, export_queue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display(fmt = "{:04}-{:02}", year, month)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        let key = Self { year, month };
        // also rejects years chrono cannot represent
        key.bounds().map(|_| key)
    }

    pub fn from_date(day: NaiveDate) -> Self {
        Self {
            year: day.year(),
            month: day.month(),
        }
    }

    /// `[first day, first day of next month)`.
    pub fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = NaiveDate::from_ymd_opt(self.year, self.month, 1)?;
        let next = if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year.checked_add(1)?, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1)?
        };
        Some((first, next))
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("month {0} is out of range")]
    InvalidMonth(MonthKey),
    #[error("reading ledger: {0}")]
    Store(#[from] StoreError),
    #[error("rendering workbook: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),
    #[error("writing artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("export task aborted: {0}")]
    Aborted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_key_bounds_cover_whole_month() {
        let key = MonthKey::from_date(NaiveDate::from_ymd_opt(2024, 2, 17).unwrap());
        assert_eq!(key.to_string(), "2024-02");
        assert_eq!(
            key.bounds(),
            Some((
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
            ))
        );
    }

    #[test]
    fn december_rolls_into_next_year() {
        let key = MonthKey::new(2023, 12).unwrap();
        assert_eq!(key.bounds().unwrap().1, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn rejects_month_thirteen() {
        assert!(MonthKey::new(2024, 13).is_none());
        assert!(MonthKey::new(2024, 0).is_none());
    }
}
