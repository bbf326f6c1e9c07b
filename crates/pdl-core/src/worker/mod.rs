//! Download workers.
//!
//! Each worker owns one curl handle and one file handle, and loops: acquire
//! a part, fetch it, release it. A worker exits when the table has nothing
//! left for it or stop is requested.

mod chunk;
mod fetch;

pub(crate) use chunk::ChunkSink;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::control::DownloadControl;
use crate::monitor::{RateLimiter, Throughput};
use crate::retry::{classify, PartError, RetryPolicy};
use crate::scheduler::{PartTable, Release, WorkerId};
use crate::session::HttpSession;
use crate::storage::PartWriter;

/// State shared by every worker of one download.
#[derive(Debug)]
pub(crate) struct WorkerContext {
    pub session: HttpSession,
    pub table: Arc<PartTable>,
    pub control: Arc<DownloadControl>,
    pub limiter: Arc<RateLimiter>,
    pub throughput: Arc<Throughput>,
    pub file_path: PathBuf,
    pub chunk_size: usize,
    pub retry: RetryPolicy,
    pub range_support: bool,
    /// Workers currently inside `run_worker`.
    pub active: AtomicUsize,
}

impl WorkerContext {
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

/// Per-worker tally, logged when the worker exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WorkerSummary {
    pub completed: usize,
    pub failed: usize,
    pub requeued: usize,
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// The worker loop.
pub(crate) fn run_worker(id: WorkerId, ctx: &WorkerContext) -> WorkerSummary {
    let _active = ActiveGuard::enter(&ctx.active);
    let mut summary = WorkerSummary::default();

    let mut easy = match ctx.session.easy() {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(worker = id, error = %e, "cannot create HTTP handle");
            return summary;
        }
    };
    let writer = match PartWriter::open(&ctx.file_path) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(worker = id, error = %e, "cannot open output file");
            return summary;
        }
    };

    loop {
        if !ctx.control.wait_while_paused() {
            break;
        }
        let Some(part) = ctx.table.acquire_next_part(id) else {
            break;
        };
        tracing::debug!(
            worker = id,
            part = part.index,
            offset = part.resume_offset(),
            attempt = part.attempt,
            "part acquired"
        );

        match fetch::fetch_part(&mut easy, &writer, id, &part, ctx) {
            Ok(()) => {
                if ctx.table.release(part.index, id, Release::Complete) {
                    summary.completed += 1;
                    tracing::debug!(worker = id, part = part.index, "part complete");
                }
            }
            Err(PartError::Stopped) => {
                ctx.table.release(part.index, id, Release::Stopped);
                tracing::debug!(worker = id, part = part.index, "part stopped");
                break;
            }
            Err(e) if e.is_transient() => {
                ctx.table.release(part.index, id, Release::Transient);
                summary.requeued += 1;
                tracing::debug!(worker = id, part = part.index, reason = %e, "part requeued");
            }
            Err(e) => {
                let kind = classify(&e);
                ctx.table.release(part.index, id, Release::Failed);
                summary.failed += 1;
                tracing::warn!(
                    worker = id,
                    part = part.index,
                    attempt = part.attempt,
                    error = %e,
                    "part failed"
                );
                if !ctx.control.sleep(ctx.retry.backoff(part.attempt, kind)) {
                    break;
                }
            }
        }
    }

    tracing::debug!(
        worker = id,
        completed = summary.completed,
        failed = summary.failed,
        requeued = summary.requeued,
        "worker exiting"
    );
    summary
}
