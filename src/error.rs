use std::path::PathBuf;

/// Top-level error of a backup or log-viewing run.
#[derive(thiserror::Error, Debug)]
pub enum BackupError {
  #[error("invalid source or backup folder paths: {0}")]
  InvalidPath(String),

  #[error("failed to setup logger: {0}")]
  Journal(#[source] std::io::Error),

  #[error("failed to start files monitor: {0}")]
  MonitorStart(#[source] WatchError),

  #[error(transparent)]
  Archive(#[from] ArchiveError),

  #[error("invalid date and/or regex")]
  InvalidFilters,

  #[error("cannot open file {path:?}: {source}")]
  OpenLog {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("background task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

/// Errors raised by a change detector.
#[derive(thiserror::Error, Debug)]
pub enum WatchError {
  #[error("Notify error: {0}")]
  Notify(#[from] notify::Error),

  #[error("watch root is not a directory: {0:?}")]
  NotADirectory(PathBuf),

  #[error("{0}")]
  Scripted(String),
}

/// Structural archival failures. Per-file failures are only counted.
#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
  #[error("failed: load backup files {path:?}: {source}")]
  ListDirectory {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed: create zip file {path:?}: {source}")]
  CreateArchive {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed: finalize zip file {path:?}: {source}")]
  Finalize {
    path: PathBuf,
    #[source]
    source: zip::result::ZipError,
  },
}

impl ArchiveError {
  /// Journal message of the failed step.
  pub fn message(&self) -> &'static str {
    match self {
      ArchiveError::ListDirectory { .. } => "failed: load backup files",
      ArchiveError::CreateArchive { .. } => "failed: create zip file",
      ArchiveError::Finalize { .. } => "failed: finalize zip file",
    }
  }

  /// Path the failed step was operating on.
  pub fn path(&self) -> &std::path::Path {
    match self {
      ArchiveError::ListDirectory { path, .. }
      | ArchiveError::CreateArchive { path, .. }
      | ArchiveError::Finalize { path, .. } => path,
    }
  }
}
