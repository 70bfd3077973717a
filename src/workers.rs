//! Backup worker pool.
//!
//! N workers share one bounded queue. Each takes the next event, runs the
//! handler on the blocking pool and loops. Ordering holds per worker only:
//! two events for the same path may be handled by different workers.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::file_watcher::events::ChangeEvent;
use crate::handlers::Handler;

/// Receiving half of the event queue, shared by every worker.
pub type SharedQueue = Arc<Mutex<mpsc::Receiver<ChangeEvent>>>;

/// Bounded event queue. Senders wait while it is full.
pub fn event_queue(capacity: usize) -> (mpsc::Sender<ChangeEvent>, SharedQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, Arc::new(Mutex::new(rx)))
}

/// Take the next event.
///
/// Queued events win over the stop token, so whatever was enqueued before
/// shutdown is still handled. Returns `None` once the queue is closed and
/// empty, or the token has fired and nothing is ready.
async fn next_event(queue: &SharedQueue, shutdown: &CancellationToken) -> Option<ChangeEvent> {
    let mut rx = queue.lock().await;
    tokio::select! {
        biased;
        event = rx.recv() => event,
        () = shutdown.cancelled() => None,
    }
}

/// Consume events until the queue drains or shutdown is requested.
pub async fn backup_worker(id: usize, queue: SharedQueue, handler: Handler, shutdown: CancellationToken) {
    while let Some(event) = next_event(&queue, &shutdown).await {
        debug!(
            target: "hotbackup::workers",
            "worker {} handling {} {}",
            id,
            event.operation,
            event.path.display()
        );
        if let Some(err) = &event.error {
            warn!(target: "hotbackup::workers", "event for {} carries detector error: {}", event.path.display(), err);
        }

        let handler = handler.clone();
        let task = tokio::task::spawn_blocking(move || handler.handle(&event));
        if let Err(e) = task.await {
            warn!(target: "hotbackup::workers", "worker {} handler task failed: {}", id, e);
        }
    }

    info!(target: "hotbackup::workers", "stopped backup worker: {}", id);
}

/// Spawn `count` workers on `tracker`.
pub fn start_backup_workers(
    count: usize,
    tracker: &TaskTracker,
    queue: &SharedQueue,
    handler: &Handler,
    shutdown: &CancellationToken,
) {
    for id in 0..count {
        tracker.spawn(backup_worker(id, Arc::clone(queue), handler.clone(), shutdown.clone()));
    }
    info!(target: "hotbackup::workers", "started {} backup workers", count);
}
