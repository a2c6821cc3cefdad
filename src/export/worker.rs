use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{error, info, warn};

use super::sheet::{ExportRow, render_workbook};
use super::{ExportError, MonthKey, SpreadsheetSink};
use crate::clock::WorkCalendar;
use crate::store::LedgerStore;

/// Cheap, cloneable sender side held by the ledger and the admin layer.
#[derive(Clone)]
pub struct ExportHandle {
    tx: mpsc::Sender<MonthKey>,
}

impl ExportHandle {
    /// Fire-and-forget. Never blocks and never fails the caller: a full or
    /// closed queue only costs this one notification.
    pub fn notify(&self, month: MonthKey) {
        match self.tx.try_send(month) {
            Ok(()) => {}
            Err(TrySendError::Full(month)) => {
                warn!(%month, "Export queue full, dropping notification");
            }
            Err(TrySendError::Closed(month)) => {
                warn!(%month, "Export worker stopped, dropping notification");
            }
        }
    }
}

pub fn export_queue(capacity: usize) -> (ExportHandle, mpsc::Receiver<MonthKey>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ExportHandle { tx }, rx)
}

/// Reads a month from the ledger and pushes the rendered workbook to the sink.
pub struct MonthlyExporter {
    store: Arc<dyn LedgerStore>,
    sink: Arc<dyn SpreadsheetSink>,
    folder: String,
    calendar: WorkCalendar,
}

impl MonthlyExporter {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        sink: Arc<dyn SpreadsheetSink>,
        folder: impl Into<String>,
        calendar: WorkCalendar,
    ) -> Self {
        Self {
            store,
            sink,
            folder: folder.into(),
            calendar,
        }
    }

    /// Every record of the month across all employees, by day then creation.
    pub async fn snapshot(&self, month: MonthKey) -> Result<Vec<ExportRow>, ExportError> {
        let (from, until) = month.bounds().ok_or(ExportError::InvalidMonth(month))?;

        let mut records = self.store.list_in_range(None, from, until).await?;
        records.sort_by_key(|r| (r.work_day, r.created_at));

        Ok(records
            .iter()
            .map(|r| ExportRow::from_record(r, &self.calendar))
            .collect())
    }

    /// Full re-render of the month; replaces whatever the sink held before.
    pub async fn export_month(&self, month: MonthKey) -> Result<usize, ExportError> {
        let rows = self.snapshot(month).await?;
        let bytes = render_workbook(month, &rows)?;
        self.sink
            .upload(&month.to_string(), bytes, &self.folder)
            .await?;
        Ok(rows.len())
    }
}

pub struct ExportWorker {
    rx: mpsc::Receiver<MonthKey>,
    exporter: Arc<MonthlyExporter>,
}

impl ExportWorker {
    pub fn new(rx: mpsc::Receiver<MonthKey>, exporter: MonthlyExporter) -> Self {
        Self {
            rx,
            exporter: Arc::new(exporter),
        }
    }

    /// Runs until every [`ExportHandle`] is dropped.
    pub async fn run(mut self) {
        while let Some(first) = self.rx.recv().await {
            // collapse a burst of edits into one render per month
            let mut pending = BTreeSet::from([first]);
            while let Ok(month) = self.rx.try_recv() {
                pending.insert(month);
            }

            for month in pending {
                self.run_once(month).await;
            }
        }
        info!("Export worker stopped");
    }

    async fn run_once(&self, month: MonthKey) {
        let exporter = self.exporter.clone();
        let outcome = tokio::spawn(async move { exporter.export_month(month).await })
            .await
            .unwrap_or_else(|join_err| Err(ExportError::Aborted(join_err.to_string())));

        match outcome {
            Ok(rows) => info!(%month, rows, "Monthly attendance export uploaded"),
            Err(e) => error!(%month, error = %e, "Monthly attendance export failed"),
        }
    }
}
