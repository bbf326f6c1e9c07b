//! Runs one download: engine on a blocking thread, progress line and
//! Ctrl-C handling on the runtime.

use std::time::Duration;

use anyhow::{Context, Result};
use pdl_core::{Download, DownloadJob, DownloadState};

use super::progress::{format_parts, format_progress, ProgressView};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

pub async fn run_download(job: DownloadJob, view: ProgressView) -> Result<DownloadState> {
    let mut download = Download::new(job);
    let handle = download.handle();

    let engine = tokio::task::spawn_blocking(move || {
        let result = download.start();
        download.close();
        result
    });

    let stopper = handle.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nstopping, progress is kept for resume...");
            stopper.stop();
        }
    });

    let quiet = view == ProgressView::Quiet;
    let progress = (!quiet).then(|| {
        let handle = handle.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(PROGRESS_INTERVAL);
            loop {
                tick.tick().await;
                let status = handle.tell_status();
                if status.status.is_terminal() {
                    break;
                }
                match format_parts(&status).filter(|_| view == ProgressView::Parts) {
                    Some(parts) => eprintln!("{}\n{}", format_progress(&status), parts),
                    None => eprint!("\r{}  ", format_progress(&status)),
                }
            }
        })
    });

    let outcome = engine.await.context("download task panicked")?;
    signal.abort();
    if let Some(p) = progress {
        p.abort();
        let _ = p.await;
    }
    let state = outcome?;
    if !quiet {
        eprintln!("\r{}  ", format_progress(&handle.tell_status()));
    }
    Ok(state)
}
