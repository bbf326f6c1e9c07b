//! HTTP session built on libcurl.
//!
//! `HttpSession` holds the request settings of a job (proxy, auth, cookies,
//! headers, user agent, referer, TLS verification, timeout) and stamps them
//! onto every curl handle it hands out. Each worker keeps one handle for its
//! whole life so connections are reused across parts.

mod parse;
mod probe;

pub(crate) use parse::parse_status_line;
pub use probe::{probe, ProbeError, ResourceDescriptor};

use std::time::Duration;

use curl::easy::{Auth, Easy, List};

use crate::job::{CookieSource, DownloadJob};

/// Redirects followed before giving up.
const MAX_REDIRECTS: u32 = 10;

/// Shareable request configuration; cheap to clone.
#[derive(Debug, Clone)]
pub struct HttpSession {
    job: DownloadJob,
}

impl HttpSession {
    pub fn new(job: &DownloadJob) -> Self {
        Self { job: job.clone() }
    }

    pub fn timeout(&self) -> Duration {
        self.job.timeout
    }

    /// New curl handle with every session option applied.
    ///
    /// Transfers are bounded by a connect timeout and a stall timeout (no
    /// bytes for `timeout`), not by total duration, so large parts on slow
    /// links are not cut off.
    pub fn easy(&self) -> Result<Easy, curl::Error> {
        let job = &self.job;
        let mut easy = Easy::new();
        easy.url(&job.url)?;
        easy.follow_location(true)?;
        easy.max_redirections(MAX_REDIRECTS)?;
        easy.connect_timeout(job.timeout)?;
        easy.low_speed_limit(1)?;
        easy.low_speed_time(job.timeout)?;
        easy.useragent(job.user_agent())?;
        easy.ssl_verify_peer(job.verify_tls)?;
        easy.ssl_verify_host(job.verify_tls)?;

        if let Some(proxy) = &job.proxy {
            easy.proxy(&proxy.url())?;
            if let Some(creds) = &proxy.credentials {
                easy.proxy_username(&creds.user)?;
                easy.proxy_password(&creds.password)?;
            }
        }

        if let Some(creds) = &job.auth {
            let mut auth = Auth::new();
            auth.basic(true);
            easy.http_auth(&auth)?;
            easy.username(&creds.user)?;
            easy.password(&creds.password)?;
        }

        match &job.cookies {
            Some(CookieSource::Jar(path)) => easy.cookie_file(path)?,
            Some(CookieSource::Header(raw)) => easy.cookie(raw)?,
            None => {}
        }

        if let Some(referer) = &job.referer {
            easy.referer(referer)?;
        }

        if !job.headers.is_empty() {
            let mut list = List::new();
            for (k, v) in &job.headers {
                list.append(&format!("{}: {}", k.trim(), v.trim()))?;
            }
            easy.http_headers(list)?;
        }

        Ok(easy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Credentials, ProxyConfig, ProxyScheme};

    #[test]
    fn easy_accepts_full_option_set() {
        let mut job = DownloadJob::new("https://example.com/file.bin");
        job.proxy = Some(ProxyConfig {
            host: "127.0.0.1".into(),
            port: 1080,
            scheme: ProxyScheme::Socks5,
            credentials: Some(Credentials {
                user: "u".into(),
                password: "p".into(),
            }),
        });
        job.auth = Some(Credentials {
            user: "me".into(),
            password: "secret".into(),
        });
        job.cookies = Some(CookieSource::Header("a=1; b=2".into()));
        job.referer = Some("https://example.com/".into());
        job.headers = vec![("X-Test".into(), "1".into())];
        job.verify_tls = false;

        let session = HttpSession::new(&job);
        assert!(session.easy().is_ok());
    }
}
