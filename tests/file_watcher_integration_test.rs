//! Integration tests for the notify-backed detector.
//!
//! Each test watches its own temporary directory.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use hotbackup::error::WatchError;
use hotbackup::file_watcher::{ChangeEvent, FsType, Monitor, NotifyWatcher, Operation};

struct Running {
    watcher: Arc<NotifyWatcher>,
    shutdown: CancellationToken,
    events: mpsc::Receiver<ChangeEvent>,
    task: JoinHandle<Result<(), WatchError>>,
}

async fn start(dir: &Path) -> Running {
    let watcher = Arc::new(NotifyWatcher::new(dir).expect("Failed to create watcher"));
    let shutdown = CancellationToken::new();
    let (tx, events) = mpsc::channel(64);

    let task = {
        let watcher = Arc::clone(&watcher);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { watcher.start(shutdown, tx).await })
    };

    // Give the backend time to register the watch.
    tokio::time::sleep(Duration::from_millis(200)).await;
    Running {
        watcher,
        shutdown,
        events,
        task,
    }
}

/// Wait for an event on a path ending with `name`.
async fn wait_for(events: &mut mpsc::Receiver<ChangeEvent>, name: &str, operation: Operation) -> Option<ChangeEvent> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let event = tokio::time::timeout_at(deadline, events.recv()).await.ok()??;
        if event.operation == operation && event.path.ends_with(name) {
            return Some(event);
        }
    }
}

fn create_test_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    File::create(&path).expect("Failed to create test file");
    path
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_watcher_starts_and_stops_successfully() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let running = start(temp_dir.path()).await;

    assert_eq!(running.watcher.root(), temp_dir.path());

    running.watcher.stop().expect("Failed to stop watcher");
    let result = tokio::time::timeout(Duration::from_secs(2), running.task)
        .await
        .expect("Stop took too long")
        .expect("watcher task panicked");
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_watcher_returns_on_shutdown_token() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let running = start(temp_dir.path()).await;

    running.shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(2), running.task)
        .await
        .expect("Shutdown took too long")
        .expect("watcher task panicked");
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_watcher_stops_with_full_queue() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let watcher = Arc::new(NotifyWatcher::new(temp_dir.path()).expect("Failed to create watcher"));
    let shutdown = CancellationToken::new();
    let (tx, _events) = mpsc::channel(1);

    let task = {
        let watcher = Arc::clone(&watcher);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { watcher.start(shutdown, tx).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    for i in 0..8 {
        create_test_file(temp_dir.path(), &format!("file{i}.txt"));
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("Shutdown blocked on a full queue")
        .expect("watcher task panicked")
        .expect("watcher failed");
}

// ============================================================================
// Detection
// ============================================================================

#[tokio::test]
async fn test_watcher_detects_new_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut running = start(temp_dir.path()).await;

    create_test_file(temp_dir.path(), "test_file.txt");

    let event = wait_for(&mut running.events, "test_file.txt", Operation::Create)
        .await
        .expect("Watcher did not detect the new file within timeout");
    assert_eq!(event.fs_type, FsType::File);
    assert!(event.path.is_absolute());

    running.shutdown.cancel();
}

#[tokio::test]
async fn test_watcher_detects_new_folder() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut running = start(temp_dir.path()).await;

    fs::create_dir(temp_dir.path().join("subdir")).expect("Failed to create subdir");

    let event = wait_for(&mut running.events, "subdir", Operation::Create)
        .await
        .expect("Watcher did not detect the new folder within timeout");
    assert_eq!(event.fs_type, FsType::Directory);

    running.shutdown.cancel();
}

#[tokio::test]
async fn test_watcher_reports_nested_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let nested = temp_dir.path().join("a").join("b");
    fs::create_dir_all(&nested).expect("Failed to create nested dirs");
    let mut running = start(temp_dir.path()).await;

    create_test_file(&nested, "deep.txt");

    wait_for(&mut running.events, "deep.txt", Operation::Create)
        .await
        .expect("Watcher did not detect the nested file within timeout");

    running.shutdown.cancel();
}

#[tokio::test]
async fn test_watcher_reports_moved_in_file_as_arrival() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let outside = TempDir::new_in(temp_dir.path()).expect("Failed to create outside dir");
    let watched = temp_dir.path().join("watched");
    fs::create_dir(&watched).expect("Failed to create watched dir");
    let mut running = start(&watched).await;

    let staged = create_test_file(outside.path(), "moved.txt");
    fs::rename(&staged, watched.join("moved.txt")).expect("Failed to move file");

    wait_for(&mut running.events, "moved.txt", Operation::Create)
        .await
        .expect("Watcher did not report the moved-in file as created");
    wait_for(&mut running.events, "moved.txt", Operation::Modify)
        .await
        .expect("Watcher did not report the moved-in file as modified");

    running.shutdown.cancel();
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_watcher_rejects_missing_root() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let result = NotifyWatcher::new(temp_dir.path().join("noexist"));
    assert!(matches!(result, Err(WatchError::NotADirectory(_))));
}

#[test]
fn test_watcher_rejects_file_root() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let file = create_test_file(temp_dir.path(), "plain.txt");
    assert!(NotifyWatcher::new(file).is_err());
}

#[tokio::test]
async fn test_start_fails_when_root_disappears() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path().join("root");
    fs::create_dir(&root).expect("Failed to create root");
    let watcher = NotifyWatcher::new(&root).expect("Failed to create watcher");
    fs::remove_dir(&root).expect("Failed to remove root");

    let (tx, _rx) = mpsc::channel(1);
    let result = watcher.start(CancellationToken::new(), tx).await;
    assert!(matches!(result, Err(WatchError::NotADirectory(_))));
}
