//! Incremental log file tailer.
//!
//! Reads complete lines from a growing log file, starting at a persisted
//! byte offset, and follows the file across rotation and truncation.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify_debouncer_full::{
    new_debouncer,
    notify::{RecommendedWatcher, RecursiveMode},
    DebounceEventResult, Debouncer, RecommendedCache,
};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;

use super::error::WatchError;

/// Debounce window for file system events.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

/// Tracks the last observed on-disk size of a file and flags shrinks.
///
/// A shrink (current size below the last observed size) is how truncation
/// and in-place rotation are detected.
#[derive(Debug, Clone)]
pub struct SizeTracker {
    last: u64,
}

impl SizeTracker {
    /// Create a tracker with an initial observed size.
    #[must_use]
    pub fn new(initial: u64) -> Self {
        Self { last: initial }
    }

    /// Get the last tracked size.
    #[must_use]
    pub fn last(&self) -> u64 {
        self.last
    }

    /// Observe the current size.
    ///
    /// Returns `true` (rotated) and resets the tracked size to 0 when the
    /// current size is below the last observed size; otherwise records the
    /// current size and returns `false`.
    pub fn observe(&mut self, current: u64) -> bool {
        if current < self.last {
            self.last = 0;
            true
        } else {
            self.last = current;
            false
        }
    }

    /// Forget the tracked size (used when the file identity changes).
    pub fn reset(&mut self) {
        self.last = 0;
    }
}

#[cfg(unix)]
fn file_identity(meta: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

#[cfg(not(unix))]
fn file_identity(_meta: &std::fs::Metadata) -> Option<u64> {
    None
}

/// Tails a log file from a byte offset, producing complete lines.
///
/// The file is reopened on every read pass, so an externally rotated file
/// (replaced at the same path) is picked up transparently. Wakeups come
/// from a debounced notify watch on the parent directory, with a poll
/// interval as fallback.
pub struct LogTailer {
    /// Path to the log file.
    path: PathBuf,
    /// Byte offset immediately after the most recently emitted line.
    offset: u64,
    /// Last observed on-disk size.
    size: SizeTracker,
    /// Inode of the file at the last read pass (unix only).
    identity: Option<u64>,
    /// Fallback wakeup interval when no file system event arrives.
    poll_interval: Duration,
    /// Wakeup events from the notify watcher.
    wake_rx: mpsc::UnboundedReceiver<()>,
    /// Keeps the directory watch registered for the tailer's lifetime.
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl LogTailer {
    /// Open a tailer for `path`, starting at `start_offset`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::NotFound`] when the log file does not exist,
    /// [`WatchError::Notify`] when the directory watch cannot be
    /// registered, and [`WatchError::Io`] for other stat failures.
    pub async fn open(
        path: PathBuf,
        start_offset: u64,
        poll_interval: Duration,
    ) -> Result<Self, WatchError> {
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WatchError::NotFound(path));
            }
            Err(e) => return Err(WatchError::Io(e)),
        };

        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        let mut debouncer = new_debouncer(DEBOUNCE_WINDOW, None, move |result: DebounceEventResult| {
            if result.is_ok() {
                let _ = wake_tx.send(());
            }
        })?;

        // Watch the parent directory so rotation (replacement of the file
        // itself) still produces events.
        let watch_target = path.parent().unwrap_or(&path).to_path_buf();
        debouncer.watch(&watch_target, RecursiveMode::NonRecursive)?;

        Ok(Self {
            identity: file_identity(&meta),
            size: SizeTracker::new(meta.len()),
            path,
            offset: start_offset,
            poll_interval,
            wake_rx,
            _debouncer: debouncer,
        })
    }

    /// Get the byte offset immediately after the most recently emitted line.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Get the path being tailed.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Produce the next complete line, waiting for new data as needed.
    ///
    /// Lines are emitted without their trailing newline. A trailing partial
    /// line (no newline yet) is not emitted and does not advance the
    /// offset. The sequence never ends on its own; it blocks the calling
    /// task until more data arrives.
    ///
    /// # Errors
    ///
    /// Returns an error for read failures other than the file being
    /// temporarily absent (a rotation gap, which is waited out).
    pub async fn next_line(&mut self) -> Result<String, WatchError> {
        loop {
            if let Some(line) = self.read_next().await? {
                return Ok(line);
            }
            // Wait for a file system event, or poll after the fallback
            // interval in case the event was missed.
            let _ = tokio::time::timeout(self.poll_interval, self.wake_rx.recv()).await;
        }
    }

    /// Stat the file and flag a shrink since the last observation.
    ///
    /// A stat failure is transient: the tracked size stays unchanged and
    /// no rotation is reported.
    pub async fn detect_shrink(&mut self) -> bool {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => self.size.observe(meta.len()),
            Err(e) => {
                tracing::debug!(
                    path = %self.path.display(),
                    error = %e,
                    "Cannot stat log file, keeping last known size"
                );
                false
            }
        }
    }

    /// Attempt to read one complete line at the current offset.
    ///
    /// Returns `Ok(None)` when no complete line is available yet, or when
    /// the file is momentarily absent between rotation and recreation.
    async fn read_next(&mut self) -> Result<Option<String>, WatchError> {
        let file = match File::open(&self.path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(WatchError::Io(e)),
        };

        let meta = file.metadata().await?;

        // A new inode at the same path means the file was swapped by an
        // external rotation tool: start over from the top of the new file.
        let identity = file_identity(&meta);
        if identity.is_some() && self.identity.is_some() && identity != self.identity {
            tracing::warn!(
                path = %self.path.display(),
                old_offset = self.offset,
                "Log file replaced, resetting offset to 0"
            );
            self.identity = identity;
            self.offset = 0;
            self.size.reset();
        }

        // Truncated in place: the persisted offset points past EOF.
        if meta.len() < self.offset {
            tracing::warn!(
                path = %self.path.display(),
                old_offset = self.offset,
                new_len = meta.len(),
                "Log file truncated, resetting offset to 0"
            );
            self.offset = 0;
        }

        if meta.len() == self.offset {
            return Ok(None);
        }

        let mut file = file;
        file.seek(SeekFrom::Start(self.offset)).await?;

        let mut reader = BufReader::new(file);
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;

        if bytes_read == 0 || !line.ends_with('\n') {
            // Partial line still being written; pick it up once complete.
            return Ok(None);
        }

        self.offset += bytes_read as u64;

        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const POLL: Duration = Duration::from_millis(20);

    async fn open_tailer(path: &Path, offset: u64) -> LogTailer {
        LogTailer::open(path.to_path_buf(), offset, POLL)
            .await
            .unwrap()
    }

    #[test]
    fn test_size_tracker_detects_shrink() {
        let mut tracker = SizeTracker::new(100);
        assert!(tracker.observe(40));
        assert_eq!(tracker.last(), 0);
    }

    #[test]
    fn test_size_tracker_follows_growth() {
        let mut tracker = SizeTracker::new(100);
        assert!(!tracker.observe(150));
        assert_eq!(tracker.last(), 150);
    }

    #[test]
    fn test_size_tracker_equal_size_is_not_rotation() {
        let mut tracker = SizeTracker::new(100);
        assert!(!tracker.observe(100));
        assert_eq!(tracker.last(), 100);
    }

    #[tokio::test]
    async fn test_open_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.log");

        let result = LogTailer::open(path, 0, POLL).await;
        assert!(matches!(result, Err(WatchError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reads_lines_and_tracks_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "alpha\nbeta\n").unwrap();

        let mut tailer = open_tailer(&path, 0).await;
        assert_eq!(tailer.next_line().await.unwrap(), "alpha");
        assert_eq!(tailer.position(), 6);
        assert_eq!(tailer.next_line().await.unwrap(), "beta");
        assert_eq!(tailer.position(), 11);
    }

    #[tokio::test]
    async fn test_resumes_from_start_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "alpha\nbeta\n").unwrap();

        let mut tailer = open_tailer(&path, 6).await;
        assert_eq!(tailer.next_line().await.unwrap(), "beta");
    }

    #[tokio::test]
    async fn test_blocks_without_new_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "alpha\n").unwrap();

        let mut tailer = open_tailer(&path, 0).await;
        assert_eq!(tailer.next_line().await.unwrap(), "alpha");

        let waited = tokio::time::timeout(Duration::from_millis(80), tailer.next_line()).await;
        assert!(waited.is_err());
        assert_eq!(tailer.position(), 6);
    }

    #[tokio::test]
    async fn test_picks_up_appended_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "alpha\n").unwrap();

        let mut tailer = open_tailer(&path, 0).await;
        assert_eq!(tailer.next_line().await.unwrap(), "alpha");

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "beta").unwrap();

        assert_eq!(tailer.next_line().await.unwrap(), "beta");
        assert_eq!(tailer.position(), 11);
    }

    #[tokio::test]
    async fn test_partial_line_is_withheld_until_complete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "alpha\npart").unwrap();

        let mut tailer = open_tailer(&path, 0).await;
        assert_eq!(tailer.next_line().await.unwrap(), "alpha");

        // The dangling fragment must not be emitted or advance the offset.
        let waited = tokio::time::timeout(Duration::from_millis(80), tailer.next_line()).await;
        assert!(waited.is_err());
        assert_eq!(tailer.position(), 6);

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        write!(f, "ial\n").unwrap();

        assert_eq!(tailer.next_line().await.unwrap(), "partial");
        assert_eq!(tailer.position(), 14);
    }

    #[tokio::test]
    async fn test_truncation_resets_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "a long opening line\nand another one\n").unwrap();

        let mut tailer = open_tailer(&path, 0).await;
        tailer.next_line().await.unwrap();
        tailer.next_line().await.unwrap();
        assert!(tailer.position() > 0);

        // Truncate in place (same inode, shorter content).
        std::fs::write(&path, "fresh\n").unwrap();

        assert_eq!(tailer.next_line().await.unwrap(), "fresh");
        assert_eq!(tailer.position(), 6);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rotation_by_rename_resets_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "old\n").unwrap();

        let mut tailer = open_tailer(&path, 0).await;
        assert_eq!(tailer.next_line().await.unwrap(), "old");

        // Replace the file wholesale; the new content is longer than the
        // consumed offset, so only the inode change reveals the swap.
        let staged = dir.path().join("app.log.new");
        std::fs::write(&staged, "first of new file\nsecond\n").unwrap();
        std::fs::rename(&staged, &path).unwrap();

        assert_eq!(tailer.next_line().await.unwrap(), "first of new file");
        assert_eq!(tailer.next_line().await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_detect_shrink_tolerates_stat_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "0123456789\n").unwrap();

        let mut tailer = open_tailer(&path, 0).await;
        let tracked = tailer.size.last();

        // A stat failure is transient: no rotation reported, tracked size
        // untouched.
        std::fs::remove_file(&path).unwrap();
        assert!(!tailer.detect_shrink().await);
        assert_eq!(tailer.size.last(), tracked);
    }

    #[tokio::test]
    async fn test_detect_shrink_reports_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "0123456789\n").unwrap();

        let mut tailer = open_tailer(&path, 0).await;
        assert!(!tailer.detect_shrink().await);

        std::fs::write(&path, "ok\n").unwrap();
        assert!(tailer.detect_shrink().await);
    }
}
