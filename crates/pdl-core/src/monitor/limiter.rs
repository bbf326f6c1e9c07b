//! Level-based rate limiting by per-chunk sleeps.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

/// Sleep per level step, per active worker.
pub const LIMIT_STEP: Duration = Duration::from_millis(5);

const MIN_LEVEL: u8 = 1;
const MAX_LEVEL: u8 = 10;

/// Rate-limit level 1..=10, where 10 is unthrottled. Adjustable while the
/// download runs.
#[derive(Debug)]
pub struct RateLimiter {
    level: AtomicU8,
}

impl RateLimiter {
    pub fn new(level: u8) -> Self {
        Self {
            level: AtomicU8::new(level.clamp(MIN_LEVEL, MAX_LEVEL)),
        }
    }

    pub fn level(&self) -> u8 {
        self.level.load(Ordering::Relaxed)
    }

    /// Sets the level, clamped to 1..=10.
    pub fn set_level(&self, level: u8) {
        let level = level.clamp(MIN_LEVEL, MAX_LEVEL);
        let prev = self.level.swap(level, Ordering::Relaxed);
        if prev != level {
            tracing::info!(level, "speed limit changed");
        }
    }

    /// Sleep a worker takes after each chunk:
    /// `(10 - level) * LIMIT_STEP * active_workers`.
    pub fn delay(&self, active_workers: usize) -> Duration {
        let steps = u32::from(MAX_LEVEL - self.level());
        let workers = u32::try_from(active_workers).unwrap_or(u32::MAX);
        LIMIT_STEP.saturating_mul(steps).saturating_mul(workers)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(MAX_LEVEL)
    }
}
