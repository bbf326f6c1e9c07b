//! Minimal HTTP/1.1 server that supports HEAD and Range GET for integration tests.
//!
//! Serves a single static body, one request per connection. Options cover
//! the server behaviors the engine must cope with: missing range support,
//! unknown length, ETag and Content-Disposition headers, slow links, and
//! failing GETs.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RangeServerOptions {
    /// Status for HEAD; anything but 200 makes the probe fail.
    pub head_status: u16,
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, omit `Accept-Ranges: bytes` header even if ranges work.
    pub advertise_ranges: bool,
    /// Omit Content-Length and delimit the body by closing the connection.
    pub r#unsized: bool,
    pub etag: Option<String>,
    pub content_disposition: Option<String>,
    /// Pause after every `WRITE_BLOCK` bytes of body.
    pub write_delay: Option<Duration>,
    /// The first N GETs answer 500.
    pub fail_first_gets: usize,
    /// The next N GETs after those announce the full length but close the
    /// connection halfway through the body.
    pub truncate_first_gets: usize,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            head_status: 200,
            support_ranges: true,
            advertise_ranges: true,
            r#unsized: false,
            etag: None,
            content_disposition: None,
            write_delay: None,
            fail_first_gets: 0,
            truncate_first_gets: 0,
        }
    }
}

const WRITE_BLOCK: usize = 16 * 1024;

/// A running server. Runs until the process exits.
#[derive(Debug, Clone)]
pub struct RangeServer {
    /// Base URL, e.g. `http://127.0.0.1:12345/`.
    pub base: String,
    gets: Arc<AtomicUsize>,
    served: Arc<AtomicU64>,
}

impl RangeServer {
    /// URL of `path` on this server (the body is the same for every path).
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path.trim_start_matches('/'))
    }

    /// GET requests received so far.
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Body bytes written to sockets so far.
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::SeqCst)
    }
}

/// Starts a server in a background thread serving `body`.
pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

/// Like `start` but allows customizing server behavior.
pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let server = RangeServer {
        base: format!("http://127.0.0.1:{}/", port),
        gets: Arc::new(AtomicUsize::new(0)),
        served: Arc::new(AtomicU64::new(0)),
    };
    let body = Arc::new(body);
    let opts = Arc::new(opts);
    let shared = server.clone();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let opts = Arc::clone(&opts);
            let shared = shared.clone();
            thread::spawn(move || handle(stream, &body, &opts, &shared));
        }
    });
    server
}

fn handle(mut stream: TcpStream, body: &[u8], opts: &RangeServerOptions, server: &RangeServer) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, range) = parse_request(request);
    let total = body.len() as u64;

    let mut common = String::from("Connection: close\r\n");
    if opts.advertise_ranges && opts.support_ranges {
        common.push_str("Accept-Ranges: bytes\r\n");
    }
    if let Some(etag) = &opts.etag {
        common.push_str(&format!("ETag: \"{}\"\r\n", etag));
    }
    if let Some(cd) = &opts.content_disposition {
        common.push_str(&format!("Content-Disposition: {}\r\n", cd));
    }

    if method.eq_ignore_ascii_case("HEAD") {
        if opts.head_status != 200 {
            let response = format!(
                "HTTP/1.1 {} Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                opts.head_status
            );
            let _ = stream.write_all(response.as_bytes());
            return;
        }
        let length = if opts.r#unsized {
            String::new()
        } else {
            format!("Content-Length: {}\r\n", total)
        };
        let response = format!("HTTP/1.1 200 OK\r\n{}{}\r\n", length, common);
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    if method.eq_ignore_ascii_case("GET") {
        let nth = server.gets.fetch_add(1, Ordering::SeqCst);
        if nth < opts.fail_first_gets {
            let _ = stream.write_all(
                b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
            return;
        }

        let (status, content_range, slice) = match range.filter(|_| opts.support_ranges) {
            Some((start, end_incl)) => {
                let start = start.min(total);
                let end_incl = end_incl.min(total.saturating_sub(1));
                if start > end_incl {
                    (
                        "416 Range Not Satisfiable",
                        Some(format!("bytes */{}", total)),
                        &body[0..0],
                    )
                } else {
                    let end_excl = (end_incl + 1).min(total) as usize;
                    (
                        "206 Partial Content",
                        Some(format!("bytes {}-{}/{}", start, end_excl - 1, total)),
                        &body[start as usize..end_excl],
                    )
                }
            }
            None => ("200 OK", None, body),
        };

        let mut head = format!("HTTP/1.1 {}\r\n{}", status, common);
        if !opts.r#unsized {
            head.push_str(&format!("Content-Length: {}\r\n", slice.len()));
        }
        if let Some(cr) = content_range {
            head.push_str(&format!("Content-Range: {}\r\n", cr));
        }
        head.push_str("\r\n");
        if stream.write_all(head.as_bytes()).is_err() {
            return;
        }
        let truncate = nth - opts.fail_first_gets < opts.truncate_first_gets;
        let slice = if truncate { &slice[..slice.len() / 2] } else { slice };
        for block in slice.chunks(WRITE_BLOCK) {
            if stream.write_all(block).is_err() {
                return;
            }
            server.served.fetch_add(block.len() as u64, Ordering::SeqCst);
            if let Some(d) = opts.write_delay {
                thread::sleep(d);
            }
        }
        return;
    }
    let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n");
}

/// Returns (method, optional (start, end_inclusive) for Range: bytes=X-Y or bytes=X-).
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut method = "";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim();
                if value.to_lowercase().starts_with("bytes=") {
                    let part = value[6..].trim();
                    if let Some((a, b)) = part.split_once('-') {
                        let start = a.trim().parse::<u64>().unwrap_or(0);
                        let end = b.trim();
                        let end_incl = if end.is_empty() {
                            u64::MAX
                        } else {
                            end.parse::<u64>().unwrap_or(0)
                        };
                        range = Some((start, end_incl));
                    }
                }
            }
        }
    }
    (method, range)
}
