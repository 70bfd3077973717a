//! Flat zip snapshot of the backup folder.
//!
//! Runs once, after every worker has exited, so nothing else writes to the
//! backup folder meanwhile. Only top-level regular files are archived;
//! sub-folders are skipped. Entries are named by basename.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Timelike, Utc};
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::error::ArchiveError;
use crate::journal::EventLog;
use crate::paths::basename;

/// Journal tag of archival records.
pub const SAVE: &str = "SAVE";

/// Counts of one archival run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveReport {
    pub success: usize,
    pub fails: usize,
}

/// `YYYYMMDD.HHMMSS.<pid>`
pub fn archive_id(now: DateTime<Utc>, pid: u32) -> String {
    format!(
        "{}{:02}{:02}.{:02}{:02}{:02}.{}",
        now.year(),
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        pid
    )
}

/// `<parent>/<backupDirName>.<YYYYMMDD>.<HHMMSS>.<pid>.zip`
pub fn archive_path(backup_dir: &Path, now: DateTime<Utc>, pid: u32) -> PathBuf {
    let name = format!("{}.{}.zip", basename(backup_dir), archive_id(now, pid));
    match backup_dir.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// Top-level entries of `dir` that are not directories, sorted by name.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ArchiveError::ListDirectory {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let Ok(entry) = entry else { continue };
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        files.push(entry.path());
    }
    files.sort();
    Ok(files)
}

fn add_file(zip: &mut ZipWriter<File>, path: &Path, options: FileOptions) -> io::Result<()> {
    let mut reader = File::open(path)?;
    zip.start_file(basename(path), options)?;
    io::copy(&mut reader, zip)?;
    Ok(())
}

/// Write `files` into a new archive at `archive`.
///
/// A file that cannot be opened, added or copied counts as a failure and
/// the run continues.
pub fn write_archive(archive: &Path, files: &[PathBuf]) -> Result<ArchiveReport, ArchiveError> {
    let out = File::create(archive).map_err(|source| ArchiveError::CreateArchive {
        path: archive.to_path_buf(),
        source,
    })?;

    let mut zip = ZipWriter::new(out);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let mut report = ArchiveReport::default();

    for path in files {
        match add_file(&mut zip, path, options) {
            Ok(()) => report.success += 1,
            Err(e) => {
                log::debug!(target: "hotbackup::archive", "skip {}: {}", path.display(), e);
                report.fails += 1;
            }
        }
    }

    zip.finish().map_err(|source| ArchiveError::Finalize {
        path: archive.to_path_buf(),
        source,
    })?;
    Ok(report)
}

/// Snapshot `backup_dir` next to itself and journal exactly one summary.
pub fn save_as_zip(
    backup_dir: &Path,
    pid: u32,
    now: DateTime<Utc>,
    journal: &dyn EventLog,
) -> Result<ArchiveReport, ArchiveError> {
    let archive = archive_path(backup_dir, now, pid);
    let result = list_files(backup_dir).and_then(|files| write_archive(&archive, &files));
    record_summary(&archive, result, journal)
}

/// Journal the single summary record of an archival run and pass the
/// outcome through.
pub fn record_summary(
    archive: &Path,
    result: Result<ArchiveReport, ArchiveError>,
    journal: &dyn EventLog,
) -> Result<ArchiveReport, ArchiveError> {
    match &result {
        Ok(report) => journal.info(
            &format!(
                "success: save backup folder state [success/fails: {}/{}]",
                report.success, report.fails
            ),
            SAVE,
            archive,
        ),
        Err(e) => journal.error(
            &format!("{} [success/fails: 0/0]", e.message()),
            SAVE,
            e.path(),
            e,
        ),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{JsonEventLog, SharedBuffer};
    use crate::logging::BuildInfo;
    use std::fs;
    use tempfile::TempDir;

    fn at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2023-08-14T10:00:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn entry_names(archive: &Path) -> Vec<String> {
        let mut zip = zip::ZipArchive::new(File::open(archive).expect("archive exists")).expect("valid zip");
        (0..zip.len())
            .map(|i| zip.by_index(i).expect("entry").name().to_string())
            .collect()
    }

    #[test]
    fn test_archive_id() {
        assert_eq!(archive_id(at(), 1111), "20230814.100000.1111");
    }

    #[test]
    fn test_archive_path_is_sibling_of_backup_dir() {
        assert_eq!(
            archive_path(Path::new("/data/backup"), at(), 1111),
            PathBuf::from("/data/backup.20230814.100000.1111.zip")
        );
    }

    #[test]
    fn test_save_archives_top_level_files_only() {
        let root = TempDir::new().expect("Failed to create temp dir");
        let dst = root.path().join("backup");
        fs::create_dir_all(dst.join("nested")).expect("Failed to create nested");
        fs::write(dst.join("a.txt.bak"), b"alpha").expect("Failed to write file");
        fs::write(dst.join("nested").join("hidden.bak"), b"nope").expect("Failed to write file");

        let buf = SharedBuffer::new();
        let journal = JsonEventLog::new(buf.clone(), BuildInfo::default(), 1111);
        let report = save_as_zip(&dst, 1111, at(), &journal).expect("archive");

        assert_eq!(report, ArchiveReport { success: 1, fails: 0 });
        let archive = root.path().join("backup.20230814.100000.1111.zip");
        assert_eq!(entry_names(&archive), vec!["a.txt.bak".to_string()]);

        let mut zip = zip::ZipArchive::new(File::open(&archive).expect("archive")).expect("zip");
        let mut content = String::new();
        io::Read::read_to_string(&mut zip.by_name("a.txt.bak").expect("entry"), &mut content).expect("read");
        assert_eq!(content, "alpha");

        let records = buf.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], "INFO");
        assert_eq!(records[0]["msg"], "success: save backup folder state [success/fails: 1/0]");
        assert_eq!(records[0]["event"], "SAVE");
        assert_eq!(records[0]["path"], archive.to_string_lossy().as_ref());
    }

    #[test]
    fn test_file_removed_mid_scan_counts_as_failure() {
        let root = TempDir::new().expect("Failed to create temp dir");
        let dst = root.path().join("backup");
        fs::create_dir(&dst).expect("Failed to create backup");
        fs::write(dst.join("keep.bak"), b"keep").expect("Failed to write file");
        fs::write(dst.join("vanish.bak"), b"gone").expect("Failed to write file");

        let files = list_files(&dst).expect("listing");
        assert_eq!(files.len(), 2);
        fs::remove_file(dst.join("vanish.bak")).expect("Failed to remove file");

        let buf = SharedBuffer::new();
        let journal = JsonEventLog::new(buf.clone(), BuildInfo::default(), 1);
        let archive = archive_path(&dst, at(), 1);
        let report = record_summary(&archive, write_archive(&archive, &files), &journal).expect("archive");
        assert_eq!(report, ArchiveReport { success: 1, fails: 1 });
        assert_eq!(entry_names(&archive), vec!["keep.bak".to_string()]);

        let records = buf.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], "INFO");
        assert_eq!(records[0]["msg"], "success: save backup folder state [success/fails: 1/1]");
        assert_eq!(records[0]["event"], "SAVE");
    }

    #[test]
    fn test_missing_backup_dir_is_structural_failure() {
        let root = TempDir::new().expect("Failed to create temp dir");
        let dst = root.path().join("noexist.folderpath");

        let buf = SharedBuffer::new();
        let journal = JsonEventLog::new(buf.clone(), BuildInfo::default(), 1111);
        let err = save_as_zip(&dst, 1111, at(), &journal).expect_err("should fail");

        assert!(matches!(err, ArchiveError::ListDirectory { .. }));
        assert!(!archive_path(&dst, at(), 1111).exists());

        let records = buf.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], "ERROR");
        assert_eq!(records[0]["msg"], "failed: load backup files [success/fails: 0/0]");
        assert_eq!(records[0]["event"], "SAVE");
        assert_eq!(records[0]["path"], dst.to_string_lossy().as_ref());
    }

    #[test]
    fn test_unwritable_archive_location_is_structural_failure() {
        let root = TempDir::new().expect("Failed to create temp dir");
        let archive = root.path().join("noexist.folder").join("backup.zip");
        let err = write_archive(&archive, &[]).expect_err("should fail");
        assert_eq!(err.message(), "failed: create zip file");
        assert_eq!(err.path(), archive.as_path());
    }
}
