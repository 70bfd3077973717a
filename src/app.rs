//! Backup run orchestration.
//!
//! Lifecycle: `Running -> Draining -> Archiving -> Terminated`.
//!
//! 1. The sweeper and the workers start, then the detector runs.
//! 2. A stop request (OS signal, [`App::stop`]) or the detector returning
//!    fires the shared stop token. Cancelling it twice is a no-op.
//! 3. The queue is closed; workers finish what is already queued and exit.
//! 4. Once every task has exited the backup folder is archived.
//!
//! The archiver takes no lock on the backup folder: draining first is what
//! keeps writers away.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::archive::{self, ArchiveReport};
use crate::config::Config;
use crate::error::BackupError;
use crate::file_watcher::{ChangeEvent, Monitor};
use crate::handlers::Handler;
use crate::journal::EventLog;
use crate::store::{run_sweeper, DeletionStore};
use crate::workers::{event_queue, start_backup_workers, SharedQueue};

/// Phase of a backup run. Every transition is broadcast to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Running,
    Draining,
    Archiving,
    Terminated,
}

/// One monitoring run over a source and a backup folder.
pub struct App {
    pid: u32,
    source: PathBuf,
    backup: PathBuf,
    workers: usize,
    sweep_interval: Duration,
    monitor: Arc<dyn Monitor>,
    queue_tx: mpsc::Sender<ChangeEvent>,
    queue: SharedQueue,
    store: Arc<DeletionStore>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    journal: Arc<dyn EventLog>,
    phases: broadcast::Sender<Lifecycle>,
}

impl App {
    pub fn new(config: &Config, pid: u32, monitor: Arc<dyn Monitor>, journal: Arc<dyn EventLog>) -> Self {
        let (queue_tx, queue) = event_queue(config.queue_capacity);
        let (phases, _) = broadcast::channel(8);
        Self {
            pid,
            source: config.source.clone(),
            backup: config.backup.clone(),
            workers: config.workers.max(1),
            sweep_interval: config.sweep_interval,
            monitor,
            queue_tx,
            queue,
            store: Arc::new(DeletionStore::new()),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            journal,
            phases,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn backup(&self) -> &Path {
        &self.backup
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_tx.max_capacity()
    }

    pub fn store(&self) -> Arc<DeletionStore> {
        Arc::clone(&self.store)
    }

    /// Token observed by the detector, the workers and the sweeper.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Request shutdown. Safe to call any number of times.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Receive every phase entered from now on, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<Lifecycle> {
        self.phases.subscribe()
    }

    /// Run until shutdown, then drain and archive.
    pub async fn run(self) -> Result<ArchiveReport, BackupError> {
        enter(&self.phases, Lifecycle::Running);
        let handler = Handler::new(&self.backup, Arc::clone(&self.store), Arc::clone(&self.journal));

        self.tracker.spawn(run_sweeper(
            Arc::clone(&self.store),
            Arc::clone(&self.journal),
            self.sweep_interval,
            self.shutdown.clone(),
        ));
        start_backup_workers(self.workers, &self.tracker, &self.queue, &handler, &self.shutdown);
        self.tracker.close();

        info!(
            target: "hotbackup::app",
            "monitoring {} into {} (pid {})",
            self.source.display(),
            self.backup.display(),
            self.pid
        );
        let started = self.monitor.start(self.shutdown.clone(), self.queue_tx.clone()).await;

        enter(&self.phases, Lifecycle::Draining);
        self.shutdown.cancel();
        if let Err(e) = self.monitor.stop() {
            warn!(target: "hotbackup::app", "failed to stop files monitor: {e}");
        }
        drop(self.queue_tx);
        self.tracker.wait().await;

        if let Err(e) = started {
            error!(target: "hotbackup::app", "files monitor failed to start: {e}");
            enter(&self.phases, Lifecycle::Terminated);
            return Err(BackupError::MonitorStart(e));
        }

        enter(&self.phases, Lifecycle::Archiving);
        let (backup, pid, journal) = (self.backup, self.pid, self.journal);
        let result =
            tokio::task::spawn_blocking(move || archive::save_as_zip(&backup, pid, Utc::now(), journal.as_ref())).await;
        enter(&self.phases, Lifecycle::Terminated);

        Ok(result??)
    }
}

fn enter(phases: &broadcast::Sender<Lifecycle>, phase: Lifecycle) {
    info!(target: "hotbackup::app", "lifecycle: {phase:?}");
    // No subscriber is fine.
    let _ = phases.send(phase);
}

/// Cancel `shutdown` on the first termination signal.
pub fn spawn_signal_listener(shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = shutdown.cancelled() => {}
            res = wait_for_signal() => {
                match res {
                    Ok(()) => info!(target: "hotbackup::app", "termination signal received"),
                    Err(e) => error!(target: "hotbackup::app", "failed to listen for signals: {e}"),
                }
                shutdown.cancel();
            }
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;
    let mut hangup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = interrupt.recv() => {}
        _ = terminate.recv() => {}
        _ = quit.recv() => {}
        _ = hangup.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
