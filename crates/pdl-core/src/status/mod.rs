//! Read-only status snapshot for callers and renderers.

mod units;

pub use units::{convert_time, human_readable_size};

use std::time::Duration;

use crate::control::DownloadState;
use crate::partition::PartStatus;

/// Progress of one in-flight part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartProgress {
    pub index: usize,
    pub start_offset: u64,
    pub downloaded_bytes: u64,
    pub status: PartStatus,
}

/// What `tellStatus` returns.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    /// None until the output name is resolved.
    pub file_name: Option<String>,
    pub status: DownloadState,
    /// None when the server did not report a size.
    pub size: Option<u64>,
    pub downloaded: u64,
    /// None when the size is unknown.
    pub percent: Option<u8>,
    /// Parts currently being fetched.
    pub connections: usize,
    /// Bytes per second at the last sample.
    pub rate: u64,
    pub eta: Option<Duration>,
    pub url: String,
    pub parts: Vec<PartProgress>,
}

impl StatusSnapshot {
    pub fn size_human(&self) -> String {
        self.size
            .map(human_readable_size)
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn downloaded_human(&self) -> String {
        human_readable_size(self.downloaded)
    }

    pub fn rate_human(&self) -> String {
        format!("{}/s", human_readable_size(self.rate))
    }

    pub fn eta_human(&self) -> String {
        self.eta
            .map(|d| convert_time(d.as_secs()))
            .unwrap_or_else(|| "--".to_string())
    }

    pub fn percent_human(&self) -> String {
        self.percent
            .map(|p| format!("{p}%"))
            .unwrap_or_else(|| "--".to_string())
    }
}

/// Whole percent of `size` covered by `downloaded`, capped at 100.
pub fn percent(downloaded: u64, size: Option<u64>) -> Option<u8> {
    match size {
        None => None,
        Some(0) => Some(100),
        Some(size) => {
            let p = (u128::from(downloaded) * 100 / u128::from(size)).min(100);
            Some(p as u8)
        }
    }
}
