//! Segmented, resumable HTTP(S) download engine.

pub mod config;
pub mod logging;

pub mod control;
pub mod control_file;
pub mod download;
pub mod job;
pub mod monitor;
pub mod partition;
pub mod retry;
pub mod scheduler;
pub mod session;
pub mod status;
pub mod storage;
pub mod url_model;
pub(crate) mod worker;

pub use control::DownloadState;
pub use download::{Download, DownloadHandle, EngineTimings, SetupError};
pub use job::DownloadJob;
pub use status::StatusSnapshot;
