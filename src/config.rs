//! Run configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::store::SWEEP_INTERVAL;

/// Default journal file, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "file.log";

/// Settings of one monitoring run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub source: PathBuf,
    pub backup: PathBuf,
    pub log_file: PathBuf,
    /// Number of backup workers.
    pub workers: usize,
    /// Capacity of the event queue.
    pub queue_capacity: usize,
    pub sweep_interval: Duration,
}

impl Config {
    pub fn new(source: impl Into<PathBuf>, backup: impl Into<PathBuf>) -> Self {
        let workers = default_workers();
        Self {
            source: source.into(),
            backup: backup.into(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            workers,
            queue_capacity: workers,
            sweep_interval: SWEEP_INTERVAL,
        }
    }

    /// Use `workers` workers and a queue of the same capacity.
    pub fn with_workers(mut self, workers: usize) -> Self {
        let workers = workers.max(1);
        self.workers = workers;
        self.queue_capacity = workers;
        self
    }

    pub fn with_log_file(mut self, log_file: impl Into<PathBuf>) -> Self {
        self.log_file = log_file.into();
        self
    }
}

/// `2 * available_parallelism - 1`, at least 1.
pub fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    (cpus * 2).saturating_sub(1).max(1)
}
