//! CLI for the pdl download engine.

mod progress;
mod run;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use pdl_core::config::{self, PdlConfig};
use pdl_core::job::{parse_header_block, CookieSource, Credentials, ProxyConfig, ProxyScheme};
use pdl_core::{DownloadJob, DownloadState};

use progress::ProgressView;

/// Proxy protocol on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProxyKind {
    Http,
    Socks5,
}

impl From<ProxyKind> for ProxyScheme {
    fn from(kind: ProxyKind) -> Self {
        match kind {
            ProxyKind::Http => ProxyScheme::Http,
            ProxyKind::Socks5 => ProxyScheme::Socks5,
        }
    }
}

/// Segmented, resumable HTTP(S) downloader.
#[derive(Debug, Parser)]
#[command(name = "pdl", version)]
#[command(about = "pdl: segmented, resumable HTTP(S) downloader", long_about = None)]
pub struct Cli {
    /// Direct HTTP/HTTPS URL to download.
    pub url: String,

    /// Output file name (default: from Content-Disposition or the URL).
    #[arg(short, long, value_name = "NAME")]
    pub out: Option<String>,

    /// Directory to download into (default: config, then current directory).
    #[arg(short, long, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Worker threads, at most 64.
    #[arg(short = 'n', long, value_name = "N")]
    pub threads: Option<usize>,

    /// Bytes per committed chunk, in KiB.
    #[arg(long, value_name = "N")]
    pub chunk_kib: Option<usize>,

    /// Per-request timeout in seconds.
    #[arg(long, value_name = "S")]
    pub timeout: Option<u64>,

    /// Retries allowed per part after its first attempt.
    #[arg(long, value_name = "N")]
    pub retry: Option<u32>,

    /// Base wait between retries, in seconds.
    #[arg(long, value_name = "S")]
    pub retry_wait: Option<f64>,

    #[arg(long, value_name = "HOST", requires = "proxy_port")]
    pub proxy_host: Option<String>,

    #[arg(long, value_name = "PORT")]
    pub proxy_port: Option<u16>,

    #[arg(long, value_enum, default_value = "http")]
    pub proxy_scheme: ProxyKind,

    #[arg(long, value_name = "USER", requires = "proxy_host")]
    pub proxy_user: Option<String>,

    #[arg(long, value_name = "PASS", requires = "proxy_user")]
    pub proxy_pass: Option<String>,

    /// Basic-auth user name.
    #[arg(long, value_name = "USER")]
    pub user: Option<String>,

    /// Basic-auth password.
    #[arg(long, value_name = "PASS", requires = "user")]
    pub password: Option<String>,

    /// Extra request header, `Name: value`. Repeatable.
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// File holding a raw header block, one `Name: value` per line.
    #[arg(long, value_name = "PATH")]
    pub header_file: Option<PathBuf>,

    #[arg(long, value_name = "UA")]
    pub user_agent: Option<String>,

    /// Netscape cookie-jar file, or a raw `a=1; b=2` cookie string.
    #[arg(long, value_name = "PATH|STRING")]
    pub cookies: Option<String>,

    #[arg(long, value_name = "URL")]
    pub referer: Option<String>,

    /// Skip TLS certificate verification.
    #[arg(long)]
    pub insecure: bool,

    /// Rate-limit level: 1 (slowest) to 10 (unthrottled).
    #[arg(long, value_name = "1..10", value_parser = clap::value_parser!(u8).range(1..=10))]
    pub speed_limit: Option<u8>,

    /// No progress line.
    #[arg(short, long)]
    pub quiet: bool,

    /// Also print the progress of every active part.
    #[arg(long, conflicts_with = "quiet")]
    pub parts: bool,
}

impl Cli {
    pub async fn run_from_args() -> Result<DownloadState> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let job = cli.build_job(&cfg)?;
        run::run_download(job, cli.progress_view()).await
    }

    pub fn progress_view(&self) -> ProgressView {
        if self.quiet {
            ProgressView::Quiet
        } else if self.parts {
            ProgressView::Parts
        } else {
            ProgressView::Line
        }
    }

    /// Merges flags over the configuration defaults.
    pub fn build_job(&self, cfg: &PdlConfig) -> Result<DownloadJob> {
        let mut job = DownloadJob::from_config(self.url.clone(), cfg);
        job.out = self.out.clone();
        if let Some(dir) = &self.dir {
            job.download_dir = Some(dir.clone());
        }
        if let Some(n) = self.threads {
            job.threads = n;
        }
        if let Some(kib) = self.chunk_kib {
            job.chunk_size = kib.max(1) * 1024;
        }
        if let Some(secs) = self.timeout {
            job.timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(n) = self.retry {
            job.retry.max_retries = n;
        }
        if let Some(wait) = self.retry_wait {
            job.retry.base_delay = Duration::from_secs_f64(wait.max(0.0));
        }

        if let Some(host) = &self.proxy_host {
            let port = self
                .proxy_port
                .context("--proxy-port is required with --proxy-host")?;
            job.proxy = Some(ProxyConfig {
                host: host.clone(),
                port,
                scheme: self.proxy_scheme.into(),
                credentials: self.proxy_user.as_ref().map(|user| Credentials {
                    user: user.clone(),
                    password: self.proxy_pass.clone().unwrap_or_default(),
                }),
            });
        }
        if let Some(user) = &self.user {
            job.auth = Some(Credentials {
                user: user.clone(),
                password: self.password.clone().unwrap_or_default(),
            });
        }

        for h in &self.headers {
            job.headers.extend(parse_header_block(h));
        }
        if let Some(path) = &self.header_file {
            let block = std::fs::read_to_string(path)
                .with_context(|| format!("read header file {}", path.display()))?;
            job.headers.extend(parse_header_block(&block));
        }

        if let Some(ua) = &self.user_agent {
            job.user_agent = Some(ua.clone());
        }
        job.cookies = self.cookies.as_deref().map(cookie_source);
        job.referer = self.referer.clone();
        if self.insecure {
            job.verify_tls = false;
        }
        if let Some(level) = self.speed_limit {
            job.speed_limit = level;
        }
        Ok(job)
    }
}

/// An existing file is a cookie jar; anything else is a raw cookie string.
fn cookie_source(arg: &str) -> CookieSource {
    let path = Path::new(arg);
    if path.is_file() {
        CookieSource::Jar(path.to_path_buf())
    } else {
        CookieSource::Header(arg.to_string())
    }
}
