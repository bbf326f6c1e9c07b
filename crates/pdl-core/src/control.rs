//! Download state and the pause/stop protocol.
//!
//! The controller owns state transitions. Workers and monitors only observe:
//! they block while paused and unwind once stop is set. Stop is a one-way
//! flag; once set it is never cleared.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Overall status of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Waiting,
    CreatingFile,
    Downloading,
    Paused,
    Stopped,
    Error,
    Complete,
}

impl DownloadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadState::Waiting => "waiting",
            DownloadState::CreatingFile => "creating file",
            DownloadState::Downloading => "downloading",
            DownloadState::Paused => "paused",
            DownloadState::Stopped => "stopped",
            DownloadState::Error => "error",
            DownloadState::Complete => "complete",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadState::Stopped | DownloadState::Error | DownloadState::Complete
        )
    }

    /// States during which the control file is kept current.
    pub fn is_active(&self) -> bool {
        matches!(self, DownloadState::Downloading | DownloadState::Paused)
    }
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared state cell plus the stop token, with a condvar so paused workers
/// and sleeping monitors wake as soon as something changes.
#[derive(Debug)]
pub struct DownloadControl {
    state: Mutex<DownloadState>,
    changed: Condvar,
    stop: AtomicBool,
}

impl Default for DownloadControl {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadControl {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DownloadState::Waiting),
            changed: Condvar::new(),
            stop: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DownloadState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> DownloadState {
        *self.lock()
    }

    /// Controller-side transition.
    pub(crate) fn set_state(&self, next: DownloadState) {
        let mut state = self.lock();
        let from = *state;
        if from != next {
            tracing::debug!(from = %from, to = %next, "download state");
            *state = next;
        }
        self.changed.notify_all();
    }

    /// Requests a cooperative stop. Idempotent.
    pub fn stop(&self) {
        if !self.stop.swap(true, Ordering::SeqCst) {
            tracing::info!("stop requested");
        }
        // Take the lock so a waiter between its check and its wait cannot miss this.
        let _guard = self.lock();
        self.changed.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Downloading -> Paused. Returns false if not downloading.
    pub fn pause(&self) -> bool {
        let mut state = self.lock();
        if *state == DownloadState::Downloading && !self.is_stopped() {
            *state = DownloadState::Paused;
            tracing::info!("download paused");
            self.changed.notify_all();
            true
        } else {
            false
        }
    }

    /// Paused -> Downloading. Returns false if not paused.
    pub fn unpause(&self) -> bool {
        let mut state = self.lock();
        if *state == DownloadState::Paused {
            *state = DownloadState::Downloading;
            tracing::info!("download resumed");
            self.changed.notify_all();
            true
        } else {
            false
        }
    }

    /// Blocks while paused. Returns `true` if the caller should carry on,
    /// `false` if stop was requested.
    pub fn wait_while_paused(&self) -> bool {
        let mut state = self.lock();
        while *state == DownloadState::Paused && !self.is_stopped() {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
        !self.is_stopped()
    }

    pub fn is_paused(&self) -> bool {
        self.state() == DownloadState::Paused
    }

    /// Sleeps for `duration` unless stop arrives first. Returns `true` if the
    /// full duration elapsed without a stop.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut state = self.lock();
        loop {
            if self.is_stopped() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .map(|(g, _)| g)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }

    /// Like `sleep`, but also returns early (with `false`) once the state
    /// turns terminal. Used by the long-lived monitor loops.
    pub fn sleep_while_running(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut state = self.lock();
        loop {
            if self.is_stopped() || state.is_terminal() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .map(|(g, _)| g)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }
}
