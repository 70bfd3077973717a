//! Change detection for the source folder.
//!
//! Responsible for:
//! - the [`Monitor`] capability the pipeline consumes
//! - [`NotifyWatcher`], a recursive `notify` watcher on the source folder
//! - [`ScriptedMonitor`], a deterministic stand-in for tests
//! - graceful shutdown on the shared stop token

pub mod events;
pub mod scripted;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info, warn};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::WatchError;
use crate::paths::is_dir_path;

pub use events::{ChangeEvent, FsType, Operation};
pub use scripted::{Finish, ScriptedMonitor};

/// Something that reports changes of the source tree.
#[async_trait]
pub trait Monitor: Send + Sync {
  /// Push change events into `queue` until `shutdown` fires, `stop` is
  /// called or the detector ends on its own.
  ///
  /// An `Err` means the detector could not start.
  async fn start(&self, shutdown: CancellationToken, queue: mpsc::Sender<ChangeEvent>) -> Result<(), WatchError>;

  /// Ask a running `start` to return.
  fn stop(&self) -> Result<(), WatchError>;
}

/// Recursive `notify` watcher over one root folder.
#[derive(Debug)]
pub struct NotifyWatcher {
  root: PathBuf,
  stop: CancellationToken,
}

impl NotifyWatcher {
  pub fn new(root: impl Into<PathBuf>) -> Result<Self, WatchError> {
    let root = root.into();
    if !is_dir_path(&root) {
      return Err(WatchError::NotADirectory(root));
    }
    Ok(Self {
      root,
      stop: CancellationToken::new(),
    })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }
}

#[async_trait]
impl Monitor for NotifyWatcher {
  async fn start(&self, shutdown: CancellationToken, queue: mpsc::Sender<ChangeEvent>) -> Result<(), WatchError> {
    if !is_dir_path(&self.root) {
      return Err(WatchError::NotADirectory(self.root.clone()));
    }

    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<notify::Result<notify::Event>>();
    let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res| {
      // best-effort send; the receiver is gone only after shutdown.
      let _ = raw_tx.send(res);
    })?;
    watcher.watch(&self.root, RecursiveMode::Recursive)?;

    info!(target: "hotbackup::file_watcher", "Starting watcher for: {}", self.root.display());

    'relay: loop {
      let raw = tokio::select! {
        () = shutdown.cancelled() => break,
        () = self.stop.cancelled() => break,
        raw = raw_rx.recv() => raw,
      };

      match raw {
        Some(Ok(event)) => {
          debug!(target: "hotbackup::file_watcher", "notify event: {:?}", event.kind);
          for change in translate(&event) {
            // A full queue must never hold up shutdown.
            tokio::select! {
              () = shutdown.cancelled() => break 'relay,
              () = self.stop.cancelled() => break 'relay,
              sent = queue.send(change) => {
                if sent.is_err() {
                  warn!(target: "hotbackup::file_watcher", "event queue closed");
                  break 'relay;
                }
              }
            }
          }
        }
        Some(Err(err)) => {
          warn!(target: "hotbackup::file_watcher", "notify error: {err}");
        }
        None => {
          warn!(target: "hotbackup::file_watcher", "notify channel disconnected");
          break;
        }
      }
    }

    drop(watcher);
    info!(target: "hotbackup::file_watcher", "stopped files monitoring");
    Ok(())
  }

  fn stop(&self) -> Result<(), WatchError> {
    self.stop.cancel();
    Ok(())
  }
}

/// Map a notify event kind to a pipeline operation. `None` drops the event.
///
/// Renames map to `Rename` here; [`translate`] turns their destination
/// paths into arrivals.
pub fn operation_for(kind: &EventKind) -> Option<Operation> {
  match kind {
    EventKind::Create(_) => Some(Operation::Create),
    EventKind::Modify(ModifyKind::Name(_)) => Some(Operation::Rename),
    EventKind::Modify(ModifyKind::Metadata(_)) => Some(Operation::Attribute),
    EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other) => Some(Operation::Modify),
    EventKind::Remove(_) => Some(Operation::Delete),
    EventKind::Access(_) => None,
    EventKind::Other => None,
    EventKind::Any => None,
  }
}

/// Change events carried by `event`, one per path except for rename
/// destinations.
///
/// A path a file was renamed to yields `Create` then `Modify`, so moved-in
/// files and atomic saves (temp file renamed over the target) refresh the
/// backup. The source side of a rename stays a `Rename`. Backends that
/// cannot tell the two sides apart (`RenameMode::Any`) report a path that
/// still exists as a destination.
pub fn translate(event: &notify::Event) -> Vec<ChangeEvent> {
  if let EventKind::Modify(ModifyKind::Name(mode)) = event.kind {
    return translate_rename(mode, &event.paths);
  }
  let Some(operation) = operation_for(&event.kind) else {
    return Vec::new();
  };
  event
    .paths
    .iter()
    .map(|path| ChangeEvent::probed(path.clone(), operation))
    .collect()
}

fn translate_rename(mode: RenameMode, paths: &[PathBuf]) -> Vec<ChangeEvent> {
  let mut changes = Vec::new();
  for (i, path) in paths.iter().enumerate() {
    let destination = match mode {
      RenameMode::To => true,
      RenameMode::Both => i > 0,
      RenameMode::From => false,
      RenameMode::Any | RenameMode::Other => path.exists(),
    };
    if destination {
      changes.push(ChangeEvent::probed(path.clone(), Operation::Create));
      changes.push(ChangeEvent::probed(path.clone(), Operation::Modify));
    } else {
      changes.push(ChangeEvent::probed(path.clone(), Operation::Rename));
    }
  }
  changes
}
