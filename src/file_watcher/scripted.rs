//! Deterministic detector for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::events::ChangeEvent;
use super::Monitor;
use crate::error::WatchError;

/// What a [`ScriptedMonitor`] does once its events are queued.
#[derive(Clone, Debug)]
pub enum Finish {
  /// Keep running until shutdown or `stop`.
  WaitForShutdown,
  /// Return right away, as if the detector loop ended by itself.
  Return,
  /// Fail to start; no event is sent.
  Fail(String),
}

/// Replays a fixed list of events, then behaves as `finish` says.
#[derive(Debug)]
pub struct ScriptedMonitor {
  events: Vec<ChangeEvent>,
  finish: Finish,
  started: AtomicBool,
  stop_calls: AtomicUsize,
  stop: CancellationToken,
}

impl ScriptedMonitor {
  pub fn new(events: Vec<ChangeEvent>, finish: Finish) -> Self {
    Self {
      events,
      finish,
      started: AtomicBool::new(false),
      stop_calls: AtomicUsize::new(0),
      stop: CancellationToken::new(),
    }
  }

  pub fn started(&self) -> bool {
    self.started.load(Ordering::SeqCst)
  }

  pub fn stop_calls(&self) -> usize {
    self.stop_calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Monitor for ScriptedMonitor {
  async fn start(&self, shutdown: CancellationToken, queue: mpsc::Sender<ChangeEvent>) -> Result<(), WatchError> {
    self.started.store(true, Ordering::SeqCst);
    if let Finish::Fail(reason) = &self.finish {
      return Err(WatchError::Scripted(reason.clone()));
    }

    for event in &self.events {
      tokio::select! {
        () = shutdown.cancelled() => return Ok(()),
        sent = queue.send(event.clone()) => {
          if sent.is_err() {
            return Ok(());
          }
        }
      }
    }

    if matches!(self.finish, Finish::WaitForShutdown) {
      tokio::select! {
        () = shutdown.cancelled() => {}
        () = self.stop.cancelled() => {}
      }
    }
    Ok(())
  }

  fn stop(&self) -> Result<(), WatchError> {
    self.stop_calls.fetch_add(1, Ordering::SeqCst);
    self.stop.cancel();
    Ok(())
  }
}
