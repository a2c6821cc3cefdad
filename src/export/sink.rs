use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::ExportError;

/// External destination for the monthly artifacts. Write-only from the
/// ledger's point of view; an upload for a month replaces the previous one.
#[async_trait]
pub trait SpreadsheetSink: Send + Sync {
    async fn upload(&self, month_key: &str, bytes: Vec<u8>, folder: &str)
    -> Result<(), ExportError>;
}

pub fn artifact_name(month_key: &str) -> String {
    format!("attendance_{month_key}.xlsx")
}

/// Sink that drops artifacts into `<root>/<folder>/attendance_<YYYY-MM>.xlsx`.
pub struct LocalFolderSink {
    root: PathBuf,
}

impl LocalFolderSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SpreadsheetSink for LocalFolderSink {
    async fn upload(
        &self,
        month_key: &str,
        bytes: Vec<u8>,
        folder: &str,
    ) -> Result<(), ExportError> {
        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir).await?;

        let target = dir.join(artifact_name(month_key));
        let staging = dir.join(format!(".{}.partial", artifact_name(month_key)));

        // readers never observe a half-written workbook
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &target).await?;

        debug!(path = %target.display(), size = bytes.len(), "Attendance artifact written");
        Ok(())
    }
}
