use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use crate::branding::batch::BatchReport;
use crate::branding::{BatchDriver, FitSettings, FsWriter, RetryPolicy};
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub driver: Arc<BatchDriver<FsWriter>>,
    /// Runs share one output directory, so only one may be in flight.
    pub run_lock: Arc<Mutex<()>>,
    /// Report of the most recent completed run.
    pub last_report: Arc<RwLock<Option<BatchReport>>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let retry = RetryPolicy {
            base_delay: Duration::from_millis(config.write_retry_base_ms),
            ..RetryPolicy::default()
        };
        let driver = BatchDriver::new(
            config.output_dir.clone(),
            FitSettings::default(),
            retry,
            FsWriter,
        );

        Self {
            config,
            driver: Arc::new(driver),
            run_lock: Arc::new(Mutex::new(())),
            last_report: Arc::new(RwLock::new(None)),
        }
    }
}
