//! Command-line front end.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{error, info};
use once_cell::sync::Lazy;

use crate::api;
use crate::config::{default_workers, Config, DEFAULT_LOG_FILE};
use crate::logging::BUILD_INFO;

static LONG_VERSION: Lazy<String> = Lazy::new(|| BUILD_INFO.long_version());

#[derive(Parser, Debug)]
#[command(
    name = "hotbackup",
    version,
    long_version = LONG_VERSION.as_str(),
    about = "Mirror a hot folder into a flat backup folder and zip it on shutdown"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Watch a source folder and keep its backup folder in sync
    Monitor {
        /// Folder to watch
        #[arg(long, env = "HOTBACKUP_SOURCE")]
        source: PathBuf,

        /// Flat backup folder
        #[arg(long, env = "HOTBACKUP_BACKUP")]
        backup: PathBuf,

        /// JSON log file
        #[arg(long, env = "HOTBACKUP_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
        file: PathBuf,

        /// Number of backup workers [default: 2 * CPUs - 1]
        #[arg(long, env = "HOTBACKUP_WORKERS")]
        workers: Option<usize>,
    },

    /// Print log entries of one day involving matching file names
    Logs {
        /// JSON log file
        #[arg(long, default_value = DEFAULT_LOG_FILE)]
        file: PathBuf,

        /// Day to show, as YYYY-MM-DD
        #[arg(long)]
        date: String,

        /// Glob matched against the basename of each entry's path
        #[arg(long)]
        regex: String,
    },
}

impl Command {
    /// Run configuration of a `monitor` command.
    pub fn config(&self) -> Option<Config> {
        match self {
            Command::Monitor {
                source,
                backup,
                file,
                workers,
            } => Some(
                Config::new(source, backup)
                    .with_workers(workers.unwrap_or_else(default_workers))
                    .with_log_file(file),
            ),
            Command::Logs { .. } => None,
        }
    }
}

/// Run the selected command and return the process exit code.
pub fn execute(cli: Cli) -> i32 {
    match cli.command {
        command @ Command::Monitor { .. } => {
            let Some(config) = command.config() else {
                return 1;
            };
            let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!(target: "hotbackup::cli", "app monitoring mode: failed to start runtime: {e}");
                    return 1;
                }
            };

            let result = runtime.block_on(api::backup(&config));
            match &result {
                Ok(report) => info!(
                    target: "hotbackup::cli",
                    "backup folder saved [success/fails: {}/{}]",
                    report.success,
                    report.fails
                ),
                Err(e) => error!(target: "hotbackup::cli", "app monitoring mode: {e}"),
            }
            api::exit_code(&result)
        }
        Command::Logs { file, date, regex } => {
            let result = api::view_logs(&file, &date, &regex);
            if let Err(e) = &result {
                error!(target: "hotbackup::cli", "app logs filtering mode: {e}");
            }
            api::exit_code(&result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_monitor() {
        let cli = Cli::try_parse_from([
            "hotbackup", "monitor", "--source", "/src", "--backup", "/bak", "--workers", "3",
        ])
        .expect("valid arguments");

        let config = cli.command.config().expect("monitor config");
        assert_eq!(config.source, PathBuf::from("/src"));
        assert_eq!(config.backup, PathBuf::from("/bak"));
        assert_eq!(config.log_file, PathBuf::from("file.log"));
        assert_eq!(config.workers, 3);
        assert_eq!(config.queue_capacity, 3);
    }

    #[test]
    fn test_parse_logs() {
        let cli = Cli::try_parse_from([
            "hotbackup", "logs", "--file", "backup.log", "--date", "2023-08-14", "--regex", "*.bak",
        ])
        .expect("valid arguments");

        match cli.command {
            Command::Logs { file, date, regex } => {
                assert_eq!(file, PathBuf::from("backup.log"));
                assert_eq!(date, "2023-08-14");
                assert_eq!(regex, "*.bak");
            }
            Command::Monitor { .. } => panic!("expected logs command"),
        }
    }

    #[test]
    fn test_monitor_requires_backup() {
        let result = Cli::try_parse_from(["hotbackup", "monitor", "--source", "/src"]);
        if std::env::var_os("HOTBACKUP_BACKUP").is_none() {
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_logs_with_invalid_date_exits_one() {
        let cli = Cli::try_parse_from([
            "hotbackup", "logs", "--date", "2023:08:14", "--regex", "*",
        ])
        .expect("valid arguments");
        assert_eq!(execute(cli), 1);
    }
}
