//! Periodic control-file writer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::ControlFile;
use crate::control::DownloadControl;
use crate::scheduler::PartTable;

/// Keeps the control file current while a download runs.
#[derive(Debug, Clone)]
pub struct Persister {
    path: PathBuf,
    file_name: String,
    etag: Option<String>,
    table: Arc<PartTable>,
}

impl Persister {
    pub fn new(path: PathBuf, file_name: String, etag: Option<String>, table: Arc<PartTable>) -> Self {
        Self {
            path,
            file_name,
            etag,
            table,
        }
    }

    /// Writes the current table. Failures are logged; the next tick retries.
    pub fn persist(&self) -> bool {
        let cf = ControlFile::from_snapshot(self.etag.clone(), &self.file_name, &self.table.snapshot());
        match cf.save(&self.path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "control file write failed");
                false
            }
        }
    }

    /// Persists every `interval` while the download is downloading or
    /// paused; returns once it stops or reaches a terminal state.
    pub fn run(&self, control: &DownloadControl, interval: Duration) {
        while control.sleep_while_running(interval) {
            if control.state().is_active() {
                self.persist();
            }
        }
    }
}
