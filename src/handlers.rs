//! Event classification and backup actions.
//!
//! [`classify`] maps a [`ChangeEvent`] plus a live probe of its path to
//! exactly one [`Action`]. [`Handler::apply`] performs it and journals the
//! outcome. Failures are journaled and never retried.
//!
//! Deletion markers are files named `delete_<suffix>`:
//! - `delete_<RFC3339>_<name>` schedules deletion of `<name>`, its backup
//!   and the marker at the given instant;
//! - any other non-empty suffix deletes `<suffix>`, its backup and the
//!   marker right away.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::file_watcher::events::{ChangeEvent, Operation};
use crate::journal::EventLog;
use crate::paths::{backup_path, basename, restore_colons, sibling, DELETE_PREFIX};
use crate::store::DeletionStore;

/// What the live filesystem says about an event path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Probe {
    Missing,
    Directory,
    RegularFile,
    Other,
}

impl Probe {
    /// Stat `path`, following symlinks.
    pub fn of(path: &Path) -> Self {
        match fs::metadata(path) {
            Ok(m) if m.is_dir() => Probe::Directory,
            Ok(m) if m.is_file() => Probe::RegularFile,
            Ok(_) => Probe::Other,
            Err(_) => Probe::Missing,
        }
    }
}

/// Targets of a deletion request, in deletion order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeletionTargets {
    pub source: PathBuf,
    pub backup: PathBuf,
    pub marker: PathBuf,
}

impl DeletionTargets {
    pub fn in_order(&self) -> [&Path; 3] {
        [&self.source, &self.backup, &self.marker]
    }
}

/// The single action decided for one event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    MaterializeFolder(PathBuf),
    CreatePlaceholder { backup: PathBuf },
    UpdateContent { source: PathBuf, backup: PathBuf },
    ScheduleDeletion { at: DateTime<Utc>, targets: DeletionTargets },
    ImmediateDeletion(DeletionTargets),
    Observe { operation: Operation, is_dir: bool },
    Ignore,
}

/// Whether `name` requests immediate deletion: prefix plus non-empty suffix.
pub fn is_immediate_delete(name: &str) -> bool {
    name.strip_prefix(DELETE_PREFIX).is_some_and(|rest| !rest.is_empty())
}

/// Parse `delete_<RFC3339>_<name>` at `marker`.
///
/// The datetime and the name are split on the first `_` after the prefix,
/// so `delete_2023-08-14T00:00:00Z__x` targets `_x`.
pub fn parse_schedule(marker: &Path, backup_dir: &Path) -> Option<(DateTime<Utc>, DeletionTargets)> {
    let name = basename(marker);
    let suffix = name.strip_prefix(DELETE_PREFIX)?;
    let (datetime, filename) = suffix.split_once('_')?;
    if filename.is_empty() {
        return None;
    }
    let datetime = restore_colons(datetime);
    if !is_strict_rfc3339(&datetime) {
        return None;
    }
    let at = DateTime::parse_from_rfc3339(&datetime).ok()?;

    Some((
        at.with_timezone(&Utc),
        DeletionTargets {
            source: sibling(marker, filename),
            backup: backup_path(backup_dir, filename),
            marker: marker.to_path_buf(),
        },
    ))
}

/// chrono also takes a space or a lowercase `t`/`z`; markers only use the
/// canonical `T` separator and `Z` zone.
fn is_strict_rfc3339(datetime: &str) -> bool {
    datetime.as_bytes().get(10) == Some(&b'T') && !datetime.ends_with('z')
}

fn immediate_targets(marker: &Path, backup_dir: &Path, name: &str) -> DeletionTargets {
    let filename = name.strip_prefix(DELETE_PREFIX).unwrap_or(name);
    DeletionTargets {
        source: sibling(marker, filename),
        backup: backup_path(backup_dir, filename),
        marker: marker.to_path_buf(),
    }
}

/// Decide the action for `event` given a probe of its path.
pub fn classify(event: &ChangeEvent, probe: Probe, backup_dir: &Path) -> Action {
    let name = basename(&event.path);

    match event.operation {
        Operation::Create => match probe {
            Probe::Directory => Action::MaterializeFolder(event.path.clone()),
            Probe::RegularFile if !name.starts_with(DELETE_PREFIX) => Action::CreatePlaceholder {
                backup: backup_path(backup_dir, &name),
            },
            Probe::RegularFile => {
                if let Some((at, targets)) = parse_schedule(&event.path, backup_dir) {
                    Action::ScheduleDeletion { at, targets }
                } else if is_immediate_delete(&name) {
                    Action::ImmediateDeletion(immediate_targets(&event.path, backup_dir, &name))
                } else {
                    Action::Ignore
                }
            }
            Probe::Missing | Probe::Other => Action::Ignore,
        },
        Operation::Modify => match probe {
            Probe::RegularFile if !is_immediate_delete(&name) => Action::UpdateContent {
                source: event.path.clone(),
                backup: backup_path(backup_dir, &name),
            },
            _ => Action::Ignore,
        },
        Operation::Rename | Operation::Delete | Operation::Attribute => Action::Observe {
            operation: event.operation,
            is_dir: probe == Probe::Directory,
        },
        Operation::Watch | Operation::RDelete => Action::Ignore,
    }
}

/// Create (or truncate) an empty backup placeholder.
pub fn create_backup_file(backup: &Path) -> io::Result<()> {
    File::create(backup).map(drop)
}

/// Overwrite `backup` with the full content of `source`.
pub fn update_backup_content(source: &Path, backup: &Path) -> io::Result<u64> {
    let mut reader = File::open(source)?;
    let mut writer = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(backup)?;
    io::copy(&mut reader, &mut writer)
}

/// Applies actions against the backup folder, the store and the journal.
#[derive(Clone)]
pub struct Handler {
    backup_dir: PathBuf,
    store: Arc<DeletionStore>,
    journal: Arc<dyn EventLog>,
}

impl Handler {
    pub fn new(backup_dir: impl Into<PathBuf>, store: Arc<DeletionStore>, journal: Arc<dyn EventLog>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            store,
            journal,
        }
    }

    /// Probe, classify and apply one event.
    pub fn handle(&self, event: &ChangeEvent) -> Action {
        let action = classify(event, Probe::of(&event.path), &self.backup_dir);
        self.apply(event, &action);
        action
    }

    pub fn apply(&self, event: &ChangeEvent, action: &Action) {
        let journal = self.journal.as_ref();
        let path = event.path.as_path();

        match action {
            Action::MaterializeFolder(dir) => match fs::create_dir_all(dir) {
                Ok(()) => journal.info("success: create folder", Operation::Watch.as_str(), dir),
                Err(e) => journal.error("failed: create folder", Operation::Watch.as_str(), dir, &e),
            },
            Action::CreatePlaceholder { backup } => match create_backup_file(backup) {
                Ok(()) => journal.info("success: create file", Operation::Create.as_str(), path),
                Err(e) => journal.error("failed: create file", Operation::Create.as_str(), path, &e),
            },
            Action::UpdateContent { source, backup } => match update_backup_content(source, backup) {
                Ok(_) => journal.info("success: update file", Operation::Modify.as_str(), path),
                Err(e) => journal.error("failed: update file", Operation::Modify.as_str(), path, &e),
            },
            Action::ScheduleDeletion { at, targets } => {
                self.store.schedule(*at, targets.in_order().map(Path::to_path_buf));
                for target in targets.in_order() {
                    journal.info("success: schedule deletion", Operation::RDelete.as_str(), target);
                }
            }
            Action::ImmediateDeletion(targets) => {
                for target in targets.in_order() {
                    match fs::remove_file(target) {
                        Ok(()) => journal.info("success: delete file", Operation::RDelete.as_str(), target),
                        Err(e) => journal.error("failed: delete file", Operation::RDelete.as_str(), target, &e),
                    }
                }
            }
            Action::Observe { operation, is_dir } => {
                journal.info(observe_message(*operation, *is_dir), operation.as_str(), path);
            }
            Action::Ignore => {}
        }
    }
}

fn observe_message(operation: Operation, is_dir: bool) -> &'static str {
    match (operation, is_dir) {
        (Operation::Rename, true) => "receive: rename folder event",
        (Operation::Rename, false) => "receive: rename file event",
        (Operation::Delete, true) => "receive: delete folder event",
        (Operation::Delete, false) => "receive: delete file event",
        (_, true) => "receive: folder attribute event",
        (_, false) => "receive: file attribute event",
    }
}
