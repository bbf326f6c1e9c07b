use std::time::Duration;

use crate::config::RetryConfig;

/// High-level classification of an error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read).
    Timeout,
    /// Server asked us to slow down (e.g. 429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// HTTP status that is retryable but not strictly throttling (5xx).
    Http5xx(u16),
    /// Anything else (4xx, local I/O).
    Other,
}

/// Per-part retry cap plus exponential backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Reassignments allowed after a part's first attempt.
    pub max_retries: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: Duration::from_secs_f64(cfg.wait_secs.max(0.0)),
            max_delay: Duration::from_secs(cfg.max_wait_secs),
        }
    }

    /// Delay before the worker that saw `kind` on the part's `attempt`-th
    /// failure (0-based, i.e. its `retry_count`) goes back for more work.
    ///
    /// Transient network kinds back off exponentially; everything else waits
    /// the flat base delay.
    pub fn backoff(&self, attempt: u32, kind: ErrorKind) -> Duration {
        match kind {
            ErrorKind::Other => self.base_delay.min(self.max_delay),
            ErrorKind::Timeout
            | ErrorKind::Connection
            | ErrorKind::Throttled
            | ErrorKind::Http5xx(_) => {
                let exp = 1u32 << attempt.min(8);
                let raw = self.base_delay.saturating_mul(exp);
                let raw = if kind == ErrorKind::Throttled {
                    raw.saturating_mul(2)
                } else {
                    raw
                };
                raw.min(self.max_delay)
            }
        }
    }
}
