//! Speed sampling and stall reclaim.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::control::{DownloadControl, DownloadState};
use crate::scheduler::PartTable;

/// Byte counters shared by workers and the sampler.
///
/// `received` counts every committed byte this session and only grows; the
/// sampler turns its deltas into a rate.
#[derive(Debug, Default)]
pub struct Throughput {
    received: AtomicU64,
    /// Bytes per second from the last sample.
    rate: AtomicU64,
}

impl Throughput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, bytes: u64) {
        self.received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn rate(&self) -> u64 {
        self.rate.load(Ordering::Relaxed)
    }

    /// Records `bytes` received over `elapsed` as the current rate.
    pub fn record(&self, bytes: u64, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 { (bytes as f64 / secs) as u64 } else { 0 };
        self.rate.store(rate, Ordering::Relaxed);
    }

    /// Time to fetch `remaining` bytes at the current rate. None while the
    /// rate is zero.
    pub fn eta(&self, remaining: u64) -> Option<Duration> {
        match self.rate() {
            0 => None,
            rate => Some(Duration::from_secs(remaining.div_ceil(rate))),
        }
    }
}

/// The speed sampler loop.
#[derive(Debug, Clone, Copy)]
pub struct Monitor {
    /// Delay before the first sample.
    pub first_sample: Duration,
    pub interval: Duration,
    /// Downloading parts idle longer than this are reclaimed.
    pub stall_timeout: Duration,
}

impl Monitor {
    /// Samples until the download stops or ends. While downloading, also
    /// hands stalled parts back to the table; their old owners notice on
    /// their next chunk.
    pub fn run(&self, control: &DownloadControl, table: &PartTable, throughput: &Throughput) {
        let mut last_at = Instant::now();
        let mut last_bytes = throughput.received();
        let mut wait = self.first_sample;
        while control.sleep_while_running(wait) {
            wait = self.interval;
            let now = Instant::now();
            let bytes = throughput.received();
            throughput.record(bytes.saturating_sub(last_bytes), now - last_at);
            last_at = now;
            last_bytes = bytes;

            if control.state() == DownloadState::Downloading {
                for part in table.reclaim_stalled(self.stall_timeout) {
                    tracing::warn!(part, timeout = ?self.stall_timeout, "part stalled, reclaimed");
                }
            }
        }
        throughput.record(0, Duration::ZERO);
    }
}
