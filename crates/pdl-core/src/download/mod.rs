//! Top-level download controller.
//!
//! `Download::start` runs the whole lifecycle on the calling thread:
//! probe, output resolution, pre-allocation, planning, then workers plus
//! the persister and speed sampler until every worker has exited. A
//! `DownloadHandle` (cloneable, usable from any thread) drives pause,
//! unpause, stop, speed limit, and `tell_status` meanwhile.
//!
//! States: waiting -> creating file -> downloading <-> paused ->
//! {complete, error, stopped}.

mod error;
mod handle;

pub use error::SetupError;
pub use handle::DownloadHandle;

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::control::DownloadState;
use crate::control_file::{resolve, Persister};
use crate::job::DownloadJob;
use crate::monitor::Monitor;
use crate::partition::{plan_fresh, plan_resume};
use crate::scheduler::PartTable;
use crate::session::{probe, HttpSession};
use crate::storage::{preallocate, DEFAULT_BLOCK_SIZE};
use crate::url_model::derive_filename;
use crate::worker::{run_worker, WorkerContext};

use handle::Shared;

/// Intervals of the auxiliary loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTimings {
    /// Control-file checkpoint interval.
    pub persist_interval: Duration,
    /// Delay before the first speed sample.
    pub first_sample: Duration,
    pub sample_interval: Duration,
}

impl Default for EngineTimings {
    fn default() -> Self {
        Self {
            persist_interval: Duration::from_secs(1),
            first_sample: Duration::from_secs(1),
            sample_interval: Duration::from_secs(5),
        }
    }
}

/// One download, from probe to finalization.
pub struct Download {
    shared: Arc<Shared>,
    timings: EngineTimings,
    session: Option<HttpSession>,
    aux: Vec<JoinHandle<()>>,
}

impl Download {
    pub fn new(job: DownloadJob) -> Self {
        Self::with_timings(job, EngineTimings::default())
    }

    pub fn with_timings(job: DownloadJob, timings: EngineTimings) -> Self {
        Self {
            shared: Arc::new(Shared::new(job)),
            timings,
            session: None,
            aux: Vec::new(),
        }
    }

    pub fn handle(&self) -> DownloadHandle {
        DownloadHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Runs the download to a terminal state and returns it.
    ///
    /// Setup failures (probe, naming, free space) end in `Error` and are
    /// returned as `Err`; a stop during setup ends in `Stopped`. Once
    /// workers run, the outcome is `Complete` if every part completed,
    /// `Stopped` if stop was requested, `Error` otherwise.
    pub fn start(&mut self) -> Result<DownloadState> {
        let control = Arc::clone(&self.shared.control);
        if control.state() != DownloadState::Waiting {
            bail!("download already started");
        }
        control.set_state(DownloadState::CreatingFile);
        tracing::info!(url = %self.shared.job.url, "download starting");

        match self.run() {
            Ok(state) => Ok(state),
            Err(_) if control.is_stopped() => {
                control.set_state(DownloadState::Stopped);
                self.join_aux();
                tracing::info!("download stopped during setup");
                Ok(DownloadState::Stopped)
            }
            Err(e) => {
                control.set_state(DownloadState::Error);
                self.join_aux();
                let msg = format!("{e:#}");
                tracing::error!(error = %msg, "download failed");
                Err(e)
            }
        }
    }

    fn run(&mut self) -> Result<DownloadState> {
        let shared = Arc::clone(&self.shared);
        let job = &shared.job;
        let control = &shared.control;

        let session = HttpSession::new(job);
        let descriptor = probe(&session).with_context(|| format!("probe {}", job.url))?;
        if !descriptor.is_usable() {
            bail!("probe of {} returned no usable headers", job.url);
        }
        self.session = Some(session.clone());

        let name = derive_filename(
            &job.url,
            job.out.as_deref(),
            descriptor.content_disposition.as_deref(),
        );
        let dir = job
            .download_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&dir)
            .with_context(|| format!("create download directory {}", dir.display()))?;
        let resolution = resolve(&dir, &name, &descriptor)?;
        shared.set_file_name(&resolution.file_name);

        let (plan, file_size) = match resolution.resume {
            Some(snapshot) => (
                plan_resume(snapshot.download_information_list, snapshot.number_of_parts),
                snapshot.file_size,
            ),
            None => {
                create_output(&resolution.file_path, descriptor.size, control)?;
                (plan_fresh(descriptor.size, descriptor.range_support), descriptor.size)
            }
        };
        let workers = plan.worker_count(job.worker_count());
        tracing::info!(
            file = %resolution.file_path.display(),
            size = ?file_size,
            parts = plan.number_of_parts,
            workers,
            ranges = descriptor.range_support,
            "download planned"
        );

        let table = Arc::new(PartTable::new(
            plan,
            file_size,
            job.retry.max_retries,
            descriptor.range_support,
        ));
        shared.set_table(Arc::clone(&table));

        let persister = Persister::new(
            resolution.control_path.clone(),
            resolution.file_name.clone(),
            descriptor.etag.clone(),
            Arc::clone(&table),
        );
        persister.persist();

        control.set_state(DownloadState::Downloading);
        self.spawn_aux(&persister, &table)?;

        let ctx = Arc::new(WorkerContext {
            session,
            table: Arc::clone(&table),
            control: Arc::clone(control),
            limiter: Arc::clone(&shared.limiter),
            throughput: Arc::clone(&shared.throughput),
            file_path: resolution.file_path.clone(),
            chunk_size: job.chunk_size,
            retry: job.retry,
            range_support: descriptor.range_support,
            active: AtomicUsize::new(0),
        });
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let ctx = Arc::clone(&ctx);
            let spawned = thread::Builder::new()
                .name(format!("pdl-worker-{id}"))
                .spawn(move || run_worker(id, &ctx));
            match spawned {
                Ok(h) => handles.push(h),
                Err(e) => {
                    // Workers already running pick up the remaining parts.
                    tracing::warn!(worker = id, error = %e, "cannot spawn worker");
                    break;
                }
            }
        }
        if handles.is_empty() {
            bail!("no worker thread could be started");
        }
        for h in handles {
            if h.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }

        let state = if table.all_complete() {
            DownloadState::Complete
        } else if control.is_stopped() {
            DownloadState::Stopped
        } else {
            DownloadState::Error
        };
        control.set_state(state);
        self.join_aux();

        if state == DownloadState::Complete {
            if let Err(e) = fs::remove_file(&resolution.control_path) {
                tracing::warn!(error = %e, "cannot remove control file");
            }
            tracing::info!(
                file = %resolution.file_path.display(),
                bytes = table.downloaded(),
                "download complete"
            );
        } else {
            persister.persist();
            match state {
                DownloadState::Stopped => tracing::info!("download stopped"),
                _ => tracing::error!(file = %resolution.file_path.display(), "download ended with failed parts"),
            }
        }
        Ok(state)
    }

    fn spawn_aux(&mut self, persister: &Persister, table: &Arc<PartTable>) -> Result<()> {
        let persister = persister.clone();
        let control = Arc::clone(&self.shared.control);
        let interval = self.timings.persist_interval;
        let h = thread::Builder::new()
            .name("pdl-persister".into())
            .spawn(move || persister.run(&control, interval))
            .context("spawn persister")?;
        self.aux.push(h);

        let monitor = Monitor {
            first_sample: self.timings.first_sample,
            interval: self.timings.sample_interval,
            stall_timeout: self.shared.job.timeout,
        };
        let shared = Arc::clone(&self.shared);
        let table = Arc::clone(table);
        let h = thread::Builder::new()
            .name("pdl-monitor".into())
            .spawn(move || monitor.run(&shared.control, &table, &shared.throughput))
            .context("spawn speed sampler")?;
        self.aux.push(h);
        Ok(())
    }

    fn join_aux(&mut self) {
        for h in self.aux.drain(..) {
            if h.join().is_err() {
                tracing::error!("auxiliary thread panicked");
            }
        }
    }

    /// Joins any remaining threads and releases the HTTP session. The
    /// control file is only ever removed on completion, inside `start`.
    pub fn close(mut self) -> DownloadState {
        let state = self.shared.control.state();
        if !state.is_terminal() {
            self.shared.control.stop();
        }
        self.join_aux();
        self.session = None;
        tracing::debug!(state = %self.shared.control.state(), "download closed");
        self.shared.control.state()
    }
}

/// Fresh output file: zero-filled to the target size when known, empty
/// otherwise.
fn create_output(
    path: &Path,
    size: Option<u64>,
    control: &crate::control::DownloadControl,
) -> Result<(), SetupError> {
    match size {
        Some(size) => preallocate(path, size, DEFAULT_BLOCK_SIZE, control),
        None => {
            File::create(path)?;
            Ok(())
        }
    }
}
