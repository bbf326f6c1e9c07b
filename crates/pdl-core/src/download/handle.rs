//! Caller-side control of a running download.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::control::{DownloadControl, DownloadState};
use crate::job::DownloadJob;
use crate::monitor::{RateLimiter, Throughput};
use crate::partition::PartStatus;
use crate::scheduler::PartTable;
use crate::status::{percent, PartProgress, StatusSnapshot};

/// What the controller shares with handles, workers, and monitors.
#[derive(Debug)]
pub(super) struct Shared {
    pub job: DownloadJob,
    pub control: Arc<DownloadControl>,
    pub limiter: Arc<RateLimiter>,
    pub throughput: Arc<Throughput>,
    /// Set once the output name is resolved.
    pub file_name: Mutex<Option<String>>,
    /// Set once the part table is planned.
    pub table: Mutex<Option<Arc<PartTable>>>,
}

impl Shared {
    pub fn new(job: DownloadJob) -> Self {
        let limiter = RateLimiter::new(job.speed_limit);
        Self {
            job,
            control: Arc::new(DownloadControl::new()),
            limiter: Arc::new(limiter),
            throughput: Arc::new(Throughput::new()),
            file_name: Mutex::new(None),
            table: Mutex::new(None),
        }
    }

    pub fn table(&self) -> Option<Arc<PartTable>> {
        lock(&self.table).clone()
    }

    pub fn set_table(&self, table: Arc<PartTable>) {
        *lock(&self.table) = Some(table);
    }

    pub fn set_file_name(&self, name: &str) {
        *lock(&self.file_name) = Some(name.to_string());
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Cloneable remote for a download started on another thread.
#[derive(Debug, Clone)]
pub struct DownloadHandle {
    pub(super) shared: Arc<Shared>,
}

impl DownloadHandle {
    pub fn state(&self) -> DownloadState {
        self.shared.control.state()
    }

    /// Requests a cooperative stop. Idempotent; workers finish their current
    /// chunk and mark their parts stopped.
    pub fn stop(&self) {
        self.shared.control.stop();
    }

    /// Parks workers after their current chunk. False unless downloading.
    pub fn pause(&self) -> bool {
        self.shared.control.pause()
    }

    /// Resumes parked workers. False unless paused.
    pub fn unpause(&self) -> bool {
        let table = self.shared.table();
        // Time spent paused is not a stall.
        if let Some(t) = &table {
            t.touch_active();
        }
        let resumed = self.shared.control.unpause();
        if let Some(t) = &table {
            t.touch_active();
        }
        resumed
    }

    /// Rate-limit level, 1 (slowest) to 10 (unthrottled).
    pub fn set_speed_limit(&self, level: u8) {
        self.shared.limiter.set_level(level);
    }

    /// Read-only snapshot of the download.
    pub fn tell_status(&self) -> StatusSnapshot {
        let shared = &self.shared;
        let status = shared.control.state();
        let file_name = lock(&shared.file_name).clone();

        let (size, downloaded, parts) = match shared.table() {
            Some(table) => {
                let snap = table.snapshot();
                let downloaded = snap.parts.iter().map(|p| p.downloaded_bytes).sum();
                let parts = snap
                    .parts
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.status == PartStatus::Downloading)
                    .map(|(index, p)| PartProgress {
                        index,
                        start_offset: p.start_offset,
                        downloaded_bytes: p.downloaded_bytes,
                        status: p.status,
                    })
                    .collect::<Vec<_>>();
                (snap.file_size, downloaded, parts)
            }
            None => (None, 0, Vec::new()),
        };

        let rate = if status == DownloadState::Downloading {
            shared.throughput.rate()
        } else {
            0
        };
        let eta = match (status, size) {
            (DownloadState::Downloading, Some(size)) => {
                shared.throughput.eta(size.saturating_sub(downloaded))
            }
            _ => None,
        };

        StatusSnapshot {
            file_name,
            status,
            size,
            downloaded,
            percent: percent(downloaded, size),
            connections: parts.len(),
            rate,
            eta,
            url: shared.job.url.clone(),
            parts,
        }
    }
}
