//! Diagnostic logging for hotbackup.
//!
//! Two kinds of output exist side by side:
//! - the **journal** (`crate::journal`): one JSON record per backup action,
//!   written to the log file chosen on the command line;
//! - **diagnostics** (this module): process-level messages such as worker
//!   start/stop and lifecycle transitions, routed through the `log` facade.
//!
//! ## Levels
//! - `ERROR`: the run cannot continue
//! - `WARN`:  recoverable trouble (watch errors, dropped tasks)
//! - `INFO`:  lifecycle events (startup, draining, archiving, shutdown)
//! - `DEBUG`: per-event dispatch details
//!
//! ## Usage
//! ```ignore
//! use hotbackup::logging::init_logging;
//!
//! init_logging(); // once at startup
//! log::info!(target: "hotbackup::workers", "started backup worker: {}", id);
//! ```

use std::io::Write;
use std::sync::Once;

use log::{Level, LevelFilter};
use once_cell::sync::Lazy;

static INIT: Once = Once::new();

/// Build metadata, resolved once from compile-time environment.
pub static BUILD_INFO: Lazy<BuildInfo> = Lazy::new(BuildInfo::from_env);

/// Initialize diagnostic logging (idempotent).
///
/// Level is controlled through `RUST_LOG`, e.g. `RUST_LOG=hotbackup=debug`.
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env("RUST_LOG")
            .format(|buf, record| {
                let level = match record.level() {
                    Level::Error => "E",
                    Level::Warn => "W",
                    Level::Info => "I",
                    Level::Debug => "D",
                    Level::Trace => "T",
                };

                // [timestamp] [LEVEL] [target] message
                writeln!(
                    buf,
                    "[{}] [{}] [{}] {}",
                    chrono::Utc::now().format("%H:%M:%S%.3f"),
                    level,
                    record.target(),
                    record.args()
                )
            })
            .filter_module("hotbackup", LevelFilter::Info)
            .filter_module("notify", LevelFilter::Warn)
            .try_init();
    });
}

/// Commit, version tag and build time baked into the executable.
///
/// Values come from `HOTBACKUP_GIT_COMMIT`, `HOTBACKUP_GIT_TAG` and
/// `HOTBACKUP_BUILD_TIME` at compile time. Missing values read `(unknown)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub commit: String,
    pub tag: String,
    pub build_time: String,
}

impl BuildInfo {
    fn from_env() -> Self {
        Self {
            commit: normalize_flag(option_env!("HOTBACKUP_GIT_COMMIT")),
            tag: normalize_flag(option_env!("HOTBACKUP_GIT_TAG")),
            build_time: normalize_flag(option_env!("HOTBACKUP_BUILD_TIME")),
        }
    }

    /// Multi-line description for `--version`.
    pub fn long_version(&self) -> String {
        format!(
            "{}\nGit commit: {}\nVersion tag: {}\nOS/Arch: {}/{}\nBuilt: {}",
            env!("CARGO_PKG_VERSION"),
            self.commit,
            self.tag,
            std::env::consts::OS,
            std::env::consts::ARCH,
            self.build_time
        )
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            commit: normalize_flag(None),
            tag: normalize_flag(None),
            build_time: normalize_flag(None),
        }
    }
}

fn normalize_flag(flag: Option<&str>) -> String {
    match flag {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => "(unknown)".to_string(),
    }
}
