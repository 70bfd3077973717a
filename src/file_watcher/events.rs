//! Change events shared between a detector and the backup pipeline.
//!
//! A detector produces them; workers consume them. Once enqueued an event
//! is never mutated.

use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of filesystem change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
  Create,
  Modify,
  Delete,
  Rename,
  Attribute,
  /// Producer-side folder bookkeeping.
  Watch,
  /// Deletion request bookkeeping.
  RDelete,
}

impl Operation {
  /// Tag written to the journal `event` field.
  pub fn as_str(self) -> &'static str {
    match self {
      Operation::Create => "CREATE",
      Operation::Modify => "MODIFY",
      Operation::Delete => "DELETE",
      Operation::Rename => "RENAME",
      Operation::Attribute => "PERM",
      Operation::Watch => "WATCH",
      Operation::RDelete => "RREMOVE",
    }
  }
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Type hint reported by the detector. Handlers re-probe the path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FsType {
  File,
  Directory,
  Symlink,
  Unsupported,
}

impl FsType {
  /// Probe `path` without following symlinks.
  pub fn probe(path: &Path) -> Self {
    match std::fs::symlink_metadata(path) {
      Ok(m) if m.file_type().is_symlink() => FsType::Symlink,
      Ok(m) if m.is_dir() => FsType::Directory,
      Ok(m) if m.is_file() => FsType::File,
      _ => FsType::Unsupported,
    }
  }
}

/// One observed change of one path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
  pub path: PathBuf,
  pub operation: Operation,
  pub fs_type: FsType,
  pub error: Option<String>,
}

impl ChangeEvent {
  pub fn new(path: impl Into<PathBuf>, operation: Operation, fs_type: FsType) -> Self {
    Self {
      path: path.into(),
      operation,
      fs_type,
      error: None,
    }
  }

  /// Event whose type hint is probed from the live filesystem.
  pub fn probed(path: impl Into<PathBuf>, operation: Operation) -> Self {
    let path = path.into();
    let fs_type = FsType::probe(&path);
    Self::new(path, operation, fs_type)
  }
}
