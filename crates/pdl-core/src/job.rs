//! Download job description: everything fixed before a download starts.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::PdlConfig;
use crate::retry::RetryPolicy;

/// Hard ceiling on parts and workers per download.
pub const MAX_PARTS: usize = 64;

/// User-Agent sent when the job does not set one.
pub const DEFAULT_USER_AGENT: &str = concat!("pdl/", env!("CARGO_PKG_VERSION"));

/// Proxy protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyScheme {
    #[default]
    Http,
    /// SOCKS5 with host name resolution on the proxy side.
    Socks5,
}

impl ProxyScheme {
    pub fn as_url_scheme(&self) -> &'static str {
        match self {
            ProxyScheme::Http => "http",
            ProxyScheme::Socks5 => "socks5h",
        }
    }
}

/// User name and password pair (proxy or origin basic auth).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub scheme: ProxyScheme,
    pub credentials: Option<Credentials>,
}

impl ProxyConfig {
    /// Proxy URL in the form libcurl expects, e.g. `socks5h://10.0.0.1:1080`.
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme.as_url_scheme(), self.host, self.port)
    }
}

/// Where request cookies come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieSource {
    /// Netscape-format cookie jar file; parsed by the HTTP client.
    Jar(PathBuf),
    /// Raw `Cookie` header value, e.g. `a=1; b=2`.
    Header(String),
}

/// Immutable-after-start configuration of one download.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: String,
    /// Output file name; derived from the response or URL when None.
    pub out: Option<String>,
    /// Directory the file is written to; current directory when None.
    pub download_dir: Option<PathBuf>,
    pub proxy: Option<ProxyConfig>,
    pub auth: Option<Credentials>,
    pub headers: Vec<(String, String)>,
    pub user_agent: Option<String>,
    pub cookies: Option<CookieSource>,
    pub referer: Option<String>,
    pub verify_tls: bool,
    /// Requested worker count; clamped to 1..=64 by `worker_count`.
    pub threads: usize,
    /// Bytes per committed chunk.
    pub chunk_size: usize,
    /// Per-request timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Initial rate-limit level 1..=10.
    pub speed_limit: u8,
}

impl DownloadJob {
    pub fn new(url: impl Into<String>) -> Self {
        Self::from_config(url, &PdlConfig::default())
    }

    /// Builds a job with defaults taken from the loaded configuration.
    pub fn from_config(url: impl Into<String>, cfg: &PdlConfig) -> Self {
        Self {
            url: url.into(),
            out: None,
            download_dir: cfg.download_dir.clone(),
            proxy: None,
            auth: None,
            headers: Vec::new(),
            user_agent: cfg.user_agent.clone(),
            cookies: None,
            referer: None,
            verify_tls: cfg.check_certificate,
            threads: cfg.threads,
            chunk_size: cfg.chunk_kib.max(1) * 1024,
            timeout: Duration::from_secs(cfg.timeout_secs.max(1)),
            retry: cfg
                .retry
                .as_ref()
                .map(RetryPolicy::from_config)
                .unwrap_or_default(),
            speed_limit: cfg.speed_limit,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.threads.clamp(1, MAX_PARTS)
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }
}

/// Parses a raw header block (`Name: value` per line) into pairs.
///
/// Request lines (`GET ...`, `POST ...`) and lines without a colon are skipped.
pub fn parse_header_block(block: &str) -> Vec<(String, String)> {
    block
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("GET") && !l.starts_with("POST"))
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}
