//! Scheduled deletions.
//!
//! A [`DeletionStore`] maps absolute paths to deadlines. The sweeper task
//! wakes on a fixed interval, deletes every due path and drops the entry
//! whatever the outcome. Failed deletions are never retried.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::file_watcher::events::Operation;
use crate::journal::EventLog;

/// Default pause between two sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_millis(500);

/// Lock-guarded path -> deadline registry. One deadline per path.
#[derive(Debug, Default)]
pub struct DeletionStore {
    entries: RwLock<HashMap<PathBuf, DateTime<Utc>>>,
}

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: usize,
    pub failed: usize,
}

impl DeletionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `at` for each path. A later request for the same path wins.
    pub fn schedule<I, P>(&self, at: DateTime<Utc>, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for path in paths {
            entries.insert(path.into(), at);
        }
    }

    pub fn deadline(&self, path: &Path) -> Option<DateTime<Utc>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete every path whose deadline is at or before `now`.
    ///
    /// The write lock is held for the whole pass.
    pub fn sweep(&self, now: DateTime<Utc>, journal: &dyn EventLog) -> SweepReport {
        let mut report = SweepReport::default();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        entries.retain(|path, deadline| {
            if now < *deadline {
                return true;
            }
            match std::fs::remove_file(path) {
                Ok(()) => {
                    journal.info("success: delete file", Operation::Delete.as_str(), path);
                    report.deleted += 1;
                }
                Err(e) => {
                    journal.error("failed: delete file", Operation::Delete.as_str(), path, &e);
                    report.failed += 1;
                }
            }
            false
        });

        report
    }
}

/// Sweep `store` every `every` until `shutdown` fires.
///
/// Each pass runs on the blocking pool.
pub async fn run_sweeper(
    store: Arc<DeletionStore>,
    journal: Arc<dyn EventLog>,
    every: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let pass = {
                    let store = Arc::clone(&store);
                    let journal = Arc::clone(&journal);
                    tokio::task::spawn_blocking(move || store.sweep(Utc::now(), journal.as_ref()))
                };
                match pass.await {
                    Ok(report) if report.deleted + report.failed > 0 => debug!(
                        target: "hotbackup::store",
                        "sweep: deleted={} failed={} pending={}",
                        report.deleted,
                        report.failed,
                        store.len()
                    ),
                    Ok(_) => {}
                    Err(e) => warn!(target: "hotbackup::store", "sweep task failed: {e}"),
                }
            }
        }
    }

    info!(target: "hotbackup::store", "stopped delete worker");
}
