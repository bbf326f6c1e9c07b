//! HEAD probe: size, ETag, range support, filename hint.

use std::str;

use thiserror::Error;

use super::parse::parse_headers;
use super::HttpSession;
use crate::retry::{classify_curl_error, ErrorKind};

/// What the server told us about the resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// Total size; None when the server does not say (chunked/streamed).
    pub size: Option<u64>,
    pub etag: Option<String>,
    /// Server sent `Accept-Ranges: bytes`.
    pub range_support: bool,
    /// Raw `Content-Disposition` value (filename hint).
    pub content_disposition: Option<String>,
    /// Number of headers in the final response.
    pub header_count: usize,
}

impl ResourceDescriptor {
    /// A response with no headers at all gives nothing to plan from.
    pub fn is_usable(&self) -> bool {
        self.header_count > 0
    }
}

/// Why the probe failed. All of these are fatal for the download.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("HEAD returned HTTP {0}")]
    Http(u32),
    #[error("connection error: {0}")]
    Connection(curl::Error),
    #[error("timed out: {0}")]
    Timeout(curl::Error),
    #[error("{0}")]
    Other(String),
}

impl From<curl::Error> for ProbeError {
    fn from(e: curl::Error) -> Self {
        match classify_curl_error(&e) {
            ErrorKind::Timeout => ProbeError::Timeout(e),
            ErrorKind::Connection => ProbeError::Connection(e),
            _ => ProbeError::Other(e.to_string()),
        }
    }
}

/// Issues a HEAD request (following redirects, bounded by the job timeout)
/// and reads the resource capabilities from the final response.
///
/// Blocking; call from `spawn_blocking` if used from async code.
pub fn probe(session: &HttpSession) -> Result<ResourceDescriptor, ProbeError> {
    let mut lines: Vec<String> = Vec::new();

    let mut easy = session.easy()?;
    easy.nobody(true)?;
    easy.timeout(session.timeout())?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                lines.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(ProbeError::Http(code));
    }

    let parsed = parse_headers(&lines);
    let descriptor = ResourceDescriptor {
        size: parsed.content_length,
        etag: parsed.etag,
        range_support: parsed.accept_ranges,
        content_disposition: parsed.content_disposition,
        header_count: parsed.header_count,
    };
    tracing::debug!(
        size = ?descriptor.size,
        etag = ?descriptor.etag,
        ranges = descriptor.range_support,
        "probe complete"
    );
    Ok(descriptor)
}
