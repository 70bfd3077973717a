//! Structured event journal.
//!
//! Every backup action produces exactly one JSON line:
//!
//! ```text
//! {"time":"2023-08-14T10:00:00.123456789Z","level":"INFO","msg":"success: create file",
//!  "commit":"abc123","tag":"v0.1.0","pid":4242,"event":"CREATE","path":"/src/a.txt"}
//! ```
//!
//! Error records carry an extra `error` field. The offline viewer
//! (`crate::viewer`) reads these lines back.

use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::{LineWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::logging::BuildInfo;
use crate::paths::restore_colons;

/// Sink for journal records.
pub trait EventLog: Send + Sync {
    fn info(&self, msg: &str, event: &str, path: &Path);
    fn error(&self, msg: &str, event: &str, path: &Path, err: &dyn Display);
}

#[derive(Serialize)]
struct Record<'a> {
    time: String,
    level: &'static str,
    msg: &'a str,
    commit: &'a str,
    tag: &'a str,
    pid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    event: &'a str,
    path: String,
}

/// JSON-lines journal over any writer.
pub struct JsonEventLog<W: Write + Send> {
    out: Mutex<W>,
    build: BuildInfo,
    pid: u32,
}

impl JsonEventLog<LineWriter<std::fs::File>> {
    /// Create or append to the journal file at `path`.
    pub fn create(path: &Path, build: BuildInfo, pid: u32) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(LineWriter::new(file), build, pid))
    }
}

impl<W: Write + Send> JsonEventLog<W> {
    pub fn new(out: W, build: BuildInfo, pid: u32) -> Self {
        Self {
            out: Mutex::new(out),
            build,
            pid,
        }
    }

    fn write(&self, level: &'static str, msg: &str, event: &str, path: &Path, error: Option<String>) {
        let record = Record {
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
            level,
            msg,
            commit: &self.build.commit,
            tag: &self.build.tag,
            pid: self.pid,
            error,
            event,
            path: restore_colons(&path.to_string_lossy()),
        };

        let mut line = match serde_json::to_vec(&record) {
            Ok(line) => line,
            Err(e) => {
                log::error!(target: "hotbackup::journal", "cannot encode record: {e}");
                return;
            }
        };
        line.push(b'\n');

        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = out.write_all(&line) {
            log::error!(target: "hotbackup::journal", "cannot write record: {e}");
        }
    }
}

impl<W: Write + Send> EventLog for JsonEventLog<W> {
    fn info(&self, msg: &str, event: &str, path: &Path) {
        self.write("INFO", msg, event, path, None);
    }

    fn error(&self, msg: &str, event: &str, path: &Path, err: &dyn Display) {
        self.write("ERROR", msg, event, path, Some(err.to_string()));
    }
}

/// Journal that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventLog;

impl EventLog for NoopEventLog {
    fn info(&self, _msg: &str, _event: &str, _path: &Path) {}
    fn error(&self, _msg: &str, _event: &str, _path: &Path, _err: &dyn Display) {}
}

/// In-memory writer whose contents can be read back, for tests and tooling.
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer {
    inner: std::sync::Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every complete line written so far, parsed as JSON.
    pub fn records(&self) -> Vec<serde_json::Value> {
        let data = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&data)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
