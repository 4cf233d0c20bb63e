//! Persisting output documents with bounded, linearly backed-off retries.
//!
//! Another process holding the destination file (a viewer, a sync client,
//! an antivirus scan) shows up as a permission or would-block error. Those
//! are retried; anything else fails the document immediately.

use std::io;
use std::path::Path;
use std::time::Duration;

use crate::branding::BrandError;

/// Write attempts per document before giving up.
pub const MAX_WRITE_RETRIES: u32 = 5;
/// Base delay; the wait before attempt `n + 1` is `n × base`.
pub const WRITE_RETRY_BASE: Duration = Duration::from_secs(1);

/// Destination for finished documents. Swapped for a fake in tests.
pub trait OutputWriter: Send + Sync {
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
}

/// Writes straight to the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWriter;

impl OutputWriter for FsWriter {
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        std::fs::write(path, bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_WRITE_RETRIES,
            base_delay: WRITE_RETRY_BASE,
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Errors that may clear up if we wait.
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Writes `bytes` to `path`, retrying transient failures per `policy`.
///
/// `on_retry(attempt, wait, error)` runs before each sleep. Returns the number
/// of attempts used on success.
pub fn write_with_retry<W, F>(
    writer: &W,
    path: &Path,
    bytes: &[u8],
    policy: &RetryPolicy,
    mut on_retry: F,
) -> Result<u32, BrandError>
where
    W: OutputWriter + ?Sized,
    F: FnMut(u32, Duration, &io::Error),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match writer.write(path, bytes) {
            Ok(()) => return Ok(attempt),
            Err(e) if is_transient(&e) && attempt < max_attempts => {
                let wait = policy.delay_for(attempt);
                on_retry(attempt, wait, &e);
                std::thread::sleep(wait);
                attempt += 1;
            }
            Err(e) => {
                return Err(BrandError::Write {
                    attempts: attempt,
                    source: e,
                })
            }
        }
    }
}
