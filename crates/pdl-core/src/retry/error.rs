//! Error returned by a single part attempt.

use thiserror::Error;

/// Why an attempt at a part ended without completing it.
///
/// `ShortChunk`, `OwnershipLost`, `Interrupted`, and `Stopped` are not
/// failures of the part: the worker releases it without charging a retry.
#[derive(Debug, Error)]
pub enum PartError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// HTTP response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Disk/storage write failed.
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
    /// A committed chunk was not the length the part boundary demanded.
    #[error("short chunk: expected {expected} bytes, got {actual}")]
    ShortChunk { expected: u64, actual: u64 },
    /// Another worker took the part over after this one stalled.
    #[error("part ownership moved to another worker")]
    OwnershipLost,
    /// Transport error on an attempt that sat through a pause; servers drop
    /// idle connections, so this is not held against the part.
    #[error("interrupted while paused: {0}")]
    Interrupted(curl::Error),
    /// Stop was requested while the part was in flight.
    #[error("stopped")]
    Stopped,
}

impl PartError {
    /// True for outcomes that release the part without counting a retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PartError::ShortChunk { .. } | PartError::OwnershipLost | PartError::Interrupted(_)
        )
    }
}
