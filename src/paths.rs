//! Filename conventions shared by handlers, the journal and the archiver.

use std::path::{Path, PathBuf};

/// Extension appended to every flat backup copy.
pub const BACKUP_EXTENSION: &str = ".bak";

/// Reserved prefix of deletion-marker filenames.
pub const DELETE_PREFIX: &str = "delete_";

/// Character some platforms store in place of `:` inside filenames.
pub const COLON_SENTINEL: char = '\u{f03a}';

/// Replace every colon sentinel with a real `:`.
pub fn restore_colons(s: &str) -> String {
    s.replace(COLON_SENTINEL, ":")
}

/// Final path component as UTF-8 (lossy), or empty.
pub fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<backup_dir>/<name>.bak`.
///
/// Backups are flat: two sources with the same basename in different
/// sub-folders share one backup file.
pub fn backup_path(backup_dir: &Path, name: &str) -> PathBuf {
    backup_dir.join(format!("{name}{BACKUP_EXTENSION}"))
}

/// Sibling of `path` in the same directory.
pub fn sibling(path: &Path, name: &str) -> PathBuf {
    match path.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// Whether `path` is an accessible directory.
pub fn is_dir_path(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}
