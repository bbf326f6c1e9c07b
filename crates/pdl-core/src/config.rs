use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Retry parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// How many times a failed part may be reassigned after its first attempt.
    pub max_retries: u32,
    /// Base wait in seconds before a worker picks up work again after a part failure.
    pub wait_secs: f64,
    /// Upper bound on the backoff wait in seconds.
    pub max_wait_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            wait_secs: 1.0,
            max_wait_secs: 30,
        }
    }
}

/// Global configuration loaded from `~/.config/pdl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdlConfig {
    /// Number of workers per download (capped at 64).
    pub threads: usize,
    /// Size of one committed chunk, in KiB.
    pub chunk_kib: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Verify TLS certificates.
    pub check_certificate: bool,
    /// Rate-limit level 1..=10 (10 = unthrottled).
    pub speed_limit: u8,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Directory downloads are written to when none is given (None = current dir).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// User-Agent override (None = engine default).
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for PdlConfig {
    fn default() -> Self {
        Self {
            threads: 64,
            chunk_kib: 100,
            timeout_secs: 30,
            check_certificate: true,
            speed_limit: 10,
            retry: None,
            download_dir: None,
            user_agent: None,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PdlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = PdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: PdlConfig = toml::from_str(&data)?;
    Ok(cfg)
}
