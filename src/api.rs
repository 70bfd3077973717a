//! Public entry points.
//!
//! Thin layer over the `src/*` modules: one function per command, each
//! returning either its outcome or a [`BackupError`]. The binary maps the
//! result to a process exit code with [`exit_code`].

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use log::info;

use crate::app::{spawn_signal_listener, App};
use crate::archive::ArchiveReport;
use crate::config::Config;
use crate::error::BackupError;
use crate::file_watcher::NotifyWatcher;
use crate::journal::JsonEventLog;
use crate::logging::BUILD_INFO;
use crate::paths::is_dir_path;
use crate::viewer;

/// Monitor `config.source` until a termination signal, then archive
/// `config.backup`.
pub async fn backup(config: &Config) -> Result<ArchiveReport, BackupError> {
    if !is_dir_path(&config.source) || !is_dir_path(&config.backup) {
        return Err(BackupError::InvalidPath(format!(
            "source={:?} backup={:?}",
            config.source, config.backup
        )));
    }

    let pid = std::process::id();
    let journal = JsonEventLog::create(&config.log_file, (*BUILD_INFO).clone(), pid).map_err(BackupError::Journal)?;
    let monitor = NotifyWatcher::new(&config.source).map_err(BackupError::MonitorStart)?;

    let app = App::new(config, pid, Arc::new(monitor), Arc::new(journal));
    spawn_signal_listener(app.shutdown_token());
    info!(
        target: "hotbackup::api",
        "backup started with {} workers, journal at {}",
        config.workers,
        config.log_file.display()
    );

    app.run().await
}

/// Print to stdout the journal lines of `date` whose file name matches
/// `pattern`.
pub fn view_logs(file: &Path, date: &str, pattern: &str) -> Result<usize, BackupError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    view_logs_to(file, date, pattern, &mut out)
}

/// [`view_logs`] writing into `out`.
pub fn view_logs_to<W: Write>(file: &Path, date: &str, pattern: &str, out: &mut W) -> Result<usize, BackupError> {
    if !viewer::is_valid_filters(date, pattern) {
        return Err(BackupError::InvalidFilters);
    }
    let reader = File::open(file).map_err(|source| BackupError::OpenLog {
        path: file.to_path_buf(),
        source,
    })?;
    Ok(viewer::filter(BufReader::new(reader), out, date, pattern)?)
}

/// `0` on success, `1` on any failure.
pub fn exit_code<T>(result: &Result<T, BackupError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}
