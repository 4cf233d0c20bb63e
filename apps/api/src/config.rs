use std::path::PathBuf;

use anyhow::{Context, Result};

const DEFAULT_OUTPUT_DIR: &str = "branded_cvs";
const DEFAULT_MAX_UPLOAD_MB: usize = 50;
const DEFAULT_WRITE_RETRY_BASE_MS: u64 = 1000;

/// Application configuration loaded from environment variables.
///
/// Compositing constants (padding, shrink margin, retry count) are compiled in;
/// only deployment concerns live here.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Letterhead used when a request does not upload one.
    pub default_letterhead: Option<PathBuf>,
    /// Designated output location, cleared at the start of every run.
    pub output_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub write_retry_base_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Config {
            port: non_empty("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: non_empty("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            default_letterhead: non_empty("DEFAULT_LETTERHEAD").map(PathBuf::from),
            output_dir: non_empty("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            max_upload_bytes: match non_empty("MAX_UPLOAD_MB") {
                Some(v) => v
                    .parse::<usize>()
                    .context("MAX_UPLOAD_MB must be a whole number of megabytes")?,
                None => DEFAULT_MAX_UPLOAD_MB,
            }
            .saturating_mul(1024 * 1024),
            write_retry_base_ms: match non_empty("WRITE_RETRY_BASE_MS") {
                Some(v) => v
                    .parse::<u64>()
                    .context("WRITE_RETRY_BASE_MS must be a number of milliseconds")?,
                None => DEFAULT_WRITE_RETRY_BASE_MS,
            },
        })
    }
}
