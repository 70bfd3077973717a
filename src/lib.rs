//! hotbackup core.
//!
//! Watches a source folder, mirrors every file into a flat backup folder,
//! honours deletion-marker files and zips the backup folder on shutdown.
//! Every action is journaled as one JSON line.

pub mod api;
pub mod app;
pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod file_watcher;
pub mod handlers;
pub mod journal;
pub mod logging;
pub mod paths;
pub mod store;
pub mod viewer;
pub mod workers;

pub use api::{backup, exit_code, view_logs};
pub use app::{App, Lifecycle};
pub use config::Config;
pub use error::{ArchiveError, BackupError, WatchError};
