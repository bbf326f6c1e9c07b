//! Integration tests: full download lifecycle against a local range server.
//!
//! Covers multi-part downloads, range-less and unsized servers, resume from
//! a control file, renaming on mismatch, retry exhaustion, pause and stop.

mod common;

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use common::range_server::{self, RangeServerOptions};
use pdl_core::control_file::ControlFile;
use pdl_core::partition::PartStatus;
use pdl_core::retry::RetryPolicy;
use pdl_core::{Download, DownloadHandle, DownloadJob, DownloadState, EngineTimings};
use tempfile::tempdir;

const MIB: usize = 1024 * 1024;

fn body(len: usize) -> Vec<u8> {
    (0u8..251).cycle().take(len).collect()
}

fn job(url: &str, dir: &Path) -> DownloadJob {
    let mut job = DownloadJob::new(url);
    job.download_dir = Some(dir.to_path_buf());
    job.out = Some("file.bin".into());
    job.threads = 8;
    job.chunk_size = 16 * 1024;
    job.timeout = Duration::from_secs(10);
    job.retry = RetryPolicy {
        max_retries: 5,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
    };
    job
}

fn timings() -> EngineTimings {
    EngineTimings {
        persist_interval: Duration::from_millis(50),
        first_sample: Duration::from_millis(50),
        sample_interval: Duration::from_millis(100),
    }
}

fn run(job: DownloadJob) -> (anyhow::Result<DownloadState>, DownloadState) {
    let mut dl = Download::with_timings(job, timings());
    let result = dl.start();
    let closed = dl.close();
    (result, closed)
}

fn spawn(job: DownloadJob) -> (DownloadHandle, thread::JoinHandle<anyhow::Result<DownloadState>>) {
    let mut dl = Download::with_timings(job, timings());
    let handle = dl.handle();
    let t = thread::spawn(move || {
        let r = dl.start();
        dl.close();
        r
    });
    (handle, t)
}

fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(20);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn multi_part_download_completes_and_file_matches() {
    let body = body(3 * MIB + 123);
    let server = range_server::start(body.clone());
    let dir = tempdir().unwrap();

    let (result, closed) = run(job(&server.url("file.bin"), dir.path()));
    assert_eq!(result.unwrap(), DownloadState::Complete);
    assert_eq!(closed, DownloadState::Complete);

    let content = std::fs::read(dir.path().join("file.bin")).unwrap();
    assert_eq!(content.len(), body.len(), "file size must match");
    assert_eq!(content, body, "file content must match");
    assert!(
        !dir.path().join("file.bin.persepolis").exists(),
        "control file removed on completion"
    );
    // four 1 MiB parts, one request each
    assert_eq!(server.gets(), 4);
}

#[test]
fn large_file_uses_all_64_parts() {
    let body = body(64 * MIB + 17);
    let server = range_server::start(body.clone());
    let dir = tempdir().unwrap();
    let mut j = job(&server.url("big.bin"), dir.path());
    j.chunk_size = 256 * 1024;

    let (result, _) = run(j);
    assert_eq!(result.unwrap(), DownloadState::Complete);
    assert_eq!(server.gets(), 64);
    assert_eq!(std::fs::read(dir.path().join("file.bin")).unwrap(), body);
}

#[test]
fn server_without_ranges_uses_single_part() {
    let body = body(2 * MIB);
    let server = range_server::start_with_options(
        body.clone(),
        RangeServerOptions {
            support_ranges: false,
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();

    let (result, _) = run(job(&server.url("file.bin"), dir.path()));
    assert_eq!(result.unwrap(), DownloadState::Complete);
    assert_eq!(server.gets(), 1);
    assert_eq!(std::fs::read(dir.path().join("file.bin")).unwrap(), body);
}

#[test]
fn unsized_stream_downloads_to_end() {
    let body = body(300 * 1024 + 5);
    let server = range_server::start_with_options(
        body.clone(),
        RangeServerOptions {
            r#unsized: true,
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();

    let (result, _) = run(job(&server.url("stream"), dir.path()));
    assert_eq!(result.unwrap(), DownloadState::Complete);
    assert_eq!(std::fs::read(dir.path().join("file.bin")).unwrap(), body);
}

#[test]
fn name_from_content_disposition() {
    let body = body(1000);
    let server = range_server::start_with_options(
        body.clone(),
        RangeServerOptions {
            content_disposition: Some("attachment; filename=\"report final.pdf\"".into()),
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();
    let mut j = job(&server.url("dl?id=7"), dir.path());
    j.out = None;

    let mut dl = Download::with_timings(j, timings());
    let handle = dl.handle();
    assert_eq!(dl.start().unwrap(), DownloadState::Complete);
    let status = handle.tell_status();
    let name = status.file_name.unwrap();
    assert!(name.starts_with("report") && name.ends_with(".pdf"), "{name}");
    assert_eq!(std::fs::read(dir.path().join(&name)).unwrap(), body);
    assert_eq!(status.percent, Some(100));
    dl.close();
}

#[test]
fn transient_failures_are_retried() {
    let body = body(2 * MIB);
    let server = range_server::start_with_options(
        body.clone(),
        RangeServerOptions {
            fail_first_gets: 3,
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();

    let (result, _) = run(job(&server.url("file.bin"), dir.path()));
    assert_eq!(result.unwrap(), DownloadState::Complete);
    assert_eq!(std::fs::read(dir.path().join("file.bin")).unwrap(), body);
}

#[test]
fn dropped_connection_is_requeued_without_spending_a_retry() {
    let body = body(512 * 1024);
    let server = range_server::start_with_options(
        body.clone(),
        RangeServerOptions {
            truncate_first_gets: 1,
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();
    let mut j = job(&server.url("file.bin"), dir.path());
    j.threads = 1;
    j.retry.max_retries = 0;

    let (result, _) = run(j);
    assert_eq!(result.unwrap(), DownloadState::Complete);
    assert_eq!(server.gets(), 2);
    assert_eq!(std::fs::read(dir.path().join("file.bin")).unwrap(), body);
}

#[test]
fn exhausted_retries_end_in_error_and_keep_control_file() {
    let body = body(1000);
    let server = range_server::start_with_options(
        body,
        RangeServerOptions {
            fail_first_gets: usize::MAX,
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();
    let mut j = job(&server.url("file.bin"), dir.path());
    j.retry.max_retries = 2;

    let (result, closed) = run(j);
    assert_eq!(result.unwrap(), DownloadState::Error);
    assert_eq!(closed, DownloadState::Error);
    // first attempt plus two retries
    assert_eq!(server.gets(), 3);

    let cf = ControlFile::load(&dir.path().join("file.bin.persepolis"))
        .unwrap()
        .unwrap();
    assert_eq!(cf.number_of_parts, 1);
    assert_eq!(cf.download_information_list.len(), 64);
    assert_eq!(cf.download_information_list[0].status, PartStatus::Error);
    assert_eq!(cf.download_information_list[0].retry_count, 2);
}

#[test]
fn failed_probe_is_fatal() {
    let server = range_server::start_with_options(
        body(10),
        RangeServerOptions {
            head_status: 404,
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();

    let (result, closed) = run(job(&server.url("missing"), dir.path()));
    assert!(result.is_err());
    assert_eq!(closed, DownloadState::Error);
    assert_eq!(server.gets(), 0);
    assert!(!dir.path().join("file.bin").exists());
}

fn throttled(body: Vec<u8>, etag: Option<&str>) -> range_server::RangeServer {
    range_server::start_with_options(
        body,
        RangeServerOptions {
            etag: etag.map(str::to_string),
            write_delay: Some(Duration::from_millis(20)),
            ..Default::default()
        },
    )
}

#[test]
fn stop_then_resume_completes_without_refetching() {
    let body = body(4 * MIB);
    let server = throttled(body.clone(), Some("v1"));
    let dir = tempdir().unwrap();

    let (handle, t) = spawn(job(&server.url("file.bin"), dir.path()));
    wait_for(|| handle.tell_status().downloaded >= 256 * 1024);
    handle.stop();
    assert_eq!(t.join().unwrap().unwrap(), DownloadState::Stopped);

    let control = dir.path().join("file.bin.persepolis");
    let cf = ControlFile::load(&control).unwrap().unwrap();
    assert_eq!(cf.etag.as_deref(), Some("v1"));
    let saved: u64 = cf
        .download_information_list
        .iter()
        .map(|p| p.downloaded_bytes)
        .sum();
    assert!(saved > 0 && saved < body.len() as u64);
    assert!(cf
        .download_information_list
        .iter()
        .all(|p| p.status != PartStatus::Downloading));

    // let the server notice the dropped connections before counting
    thread::sleep(Duration::from_millis(300));
    let served_before = server.served();
    let (result, _) = run(job(&server.url("file.bin"), dir.path()));
    assert_eq!(result.unwrap(), DownloadState::Complete);
    let served_on_resume = server.served() - served_before;
    assert!(served_on_resume <= body.len() as u64 - saved);
    assert_eq!(std::fs::read(dir.path().join("file.bin")).unwrap(), body);
    assert!(!control.exists());
}

#[test]
fn etag_mismatch_downloads_under_new_name() {
    let old = body(2 * MIB);
    let first = throttled(old.clone(), Some("v1"));
    let dir = tempdir().unwrap();

    let (handle, t) = spawn(job(&first.url("file.bin"), dir.path()));
    wait_for(|| handle.tell_status().downloaded > 0);
    handle.stop();
    assert_eq!(t.join().unwrap().unwrap(), DownloadState::Stopped);
    let stale = std::fs::read(dir.path().join("file.bin")).unwrap();

    let new: Vec<u8> = body(2 * MIB).into_iter().rev().collect();
    let second = range_server::start_with_options(
        new.clone(),
        RangeServerOptions {
            etag: Some("v2".into()),
            ..Default::default()
        },
    );
    let mut dl = Download::with_timings(job(&second.url("file.bin"), dir.path()), timings());
    let handle = dl.handle();
    assert_eq!(dl.start().unwrap(), DownloadState::Complete);
    assert_eq!(handle.tell_status().file_name.as_deref(), Some("file_1.bin"));
    dl.close();

    assert_eq!(std::fs::read(dir.path().join("file_1.bin")).unwrap(), new);
    // the interrupted download is left alone
    assert_eq!(std::fs::read(dir.path().join("file.bin")).unwrap(), stale);
    assert!(dir.path().join("file.bin.persepolis").exists());
}

#[test]
fn pause_holds_progress_until_unpaused() {
    let body = body(2 * MIB);
    let server = throttled(body.clone(), None);
    let dir = tempdir().unwrap();
    let mut j = job(&server.url("file.bin"), dir.path());
    j.threads = 2;

    let (handle, t) = spawn(j);
    wait_for(|| handle.tell_status().downloaded > 0);
    assert!(handle.pause());
    assert_eq!(handle.state(), DownloadState::Paused);

    // let in-flight chunks land, then progress must hold still
    thread::sleep(Duration::from_millis(150));
    let held = handle.tell_status();
    assert_eq!(held.status, DownloadState::Paused);
    assert_eq!(held.rate, 0);
    thread::sleep(Duration::from_millis(300));
    assert_eq!(handle.tell_status().downloaded, held.downloaded);

    assert!(handle.unpause());
    assert_eq!(t.join().unwrap().unwrap(), DownloadState::Complete);
    assert_eq!(std::fs::read(dir.path().join("file.bin")).unwrap(), body);
}

#[test]
fn status_reports_progress_while_downloading() {
    let body = body(2 * MIB);
    let server = throttled(body, None);
    let dir = tempdir().unwrap();

    let (handle, t) = spawn(job(&server.url("file.bin"), dir.path()));
    wait_for(|| handle.tell_status().connections > 0);
    let s = handle.tell_status();
    assert_eq!(s.status, DownloadState::Downloading);
    assert_eq!(s.size, Some(2 * MIB as u64));
    assert_eq!(s.file_name.as_deref(), Some("file.bin"));
    assert_eq!(s.url, server.url("file.bin"));
    assert!(s.connections <= 2);
    assert_eq!(s.parts.len(), s.connections);

    handle.stop();
    assert_eq!(t.join().unwrap().unwrap(), DownloadState::Stopped);
    assert_eq!(handle.tell_status().connections, 0);
}

fn downloaded_in_window(server: &range_server::RangeServer, level: u8) -> u64 {
    let dir = tempdir().unwrap();
    let mut j = job(&server.url("file.bin"), dir.path());
    j.threads = 2;
    let mut dl = Download::with_timings(j, timings());
    let handle = dl.handle();
    handle.set_speed_limit(level);
    let t = thread::spawn(move || {
        let r = dl.start();
        dl.close();
        r
    });

    wait_for(|| handle.tell_status().downloaded > 0);
    let before = handle.tell_status().downloaded;
    thread::sleep(Duration::from_millis(600));
    let after = handle.tell_status().downloaded;
    handle.stop();
    assert_eq!(t.join().unwrap().unwrap(), DownloadState::Stopped);
    after - before
}

#[test]
fn lower_speed_level_downloads_less() {
    let server = range_server::start_with_options(
        body(64 * MIB),
        RangeServerOptions {
            write_delay: Some(Duration::from_millis(2)),
            ..Default::default()
        },
    );

    let full = downloaded_in_window(&server, 10);
    let limited = downloaded_in_window(&server, 3);
    assert!(
        limited < full,
        "level 3 moved {limited} bytes, level 10 moved {full}"
    );
}
