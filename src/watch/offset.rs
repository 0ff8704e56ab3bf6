//! Persistent byte-offset tracking for watched log files.
//!
//! Each watched log file has a companion offset file (`<log>.offset`)
//! holding the decimal byte position of the last processed line. Losing
//! or corrupting it only costs reprocessing from the start of the file.

use std::path::{Path, PathBuf};

use super::error::WatchError;

/// Reads and writes the persisted offset for one watched file.
#[derive(Debug, Clone)]
pub struct OffsetStore {
    /// Path to the companion offset file.
    path: PathBuf,
}

impl OffsetStore {
    /// Create a store for the given offset file path.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Create a store for the conventional companion path of a log file
    /// (`<log path>.offset`).
    #[must_use]
    pub fn for_log(log_path: &Path) -> Self {
        let mut os = log_path.as_os_str().to_owned();
        os.push(".offset");
        Self::new(PathBuf::from(os))
    }

    /// Get the offset file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted offset.
    ///
    /// A missing, empty, or unparseable offset file yields 0. That is the
    /// start-from-scratch fallback, not an error: the worst outcome is
    /// reprocessing lines that were already seen.
    pub async fn read(&self) -> u64 {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(_) => return 0,
        };

        let trimmed = content.trim();
        match trimmed.parse::<u64>() {
            Ok(offset) => offset,
            Err(_) => {
                if !trimmed.is_empty() {
                    tracing::warn!(
                        path = %self.path.display(),
                        content = %trimmed,
                        "Offset file content unparseable, starting from 0"
                    );
                }
                0
            }
        }
    }

    /// Overwrite the persisted offset.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying write fails. Callers treat this
    /// as non-fatal and log it: a stale offset merely causes duplicate
    /// reprocessing after a restart.
    pub async fn write(&self, offset: u64) -> Result<(), WatchError> {
        tokio::fs::write(&self.path, offset.to_string())
            .await
            .map_err(WatchError::Io)
    }

    /// Create the offset file only if it does not exist yet.
    ///
    /// Existing content is never overwritten. Returns `true` whether the
    /// file pre-existed or was just created.
    ///
    /// # Errors
    ///
    /// Returns an error when creation fails for any reason other than the
    /// file already existing.
    pub async fn ensure_exists(&self) -> Result<bool, WatchError> {
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await
        {
            Ok(_) => {
                tracing::debug!(path = %self.path.display(), "Created offset file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(true),
            Err(e) => Err(WatchError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = OffsetStore::new(dir.path().join("app.log.offset"));

        for offset in [0_u64, 1, 42, 1024, u64::MAX] {
            store.write(offset).await.unwrap();
            assert_eq!(store.read().await, offset);
        }
    }

    #[tokio::test]
    async fn test_read_missing_file_yields_zero() {
        let store = OffsetStore::new(PathBuf::from("/nonexistent/dir/app.log.offset"));
        assert_eq!(store.read().await, 0);
    }

    #[tokio::test]
    async fn test_read_empty_file_yields_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log.offset");
        std::fs::write(&path, "").unwrap();

        let store = OffsetStore::new(path);
        assert_eq!(store.read().await, 0);
    }

    #[tokio::test]
    async fn test_read_garbage_yields_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log.offset");
        std::fs::write(&path, "not a number").unwrap();

        let store = OffsetStore::new(path);
        assert_eq!(store.read().await, 0);
    }

    #[tokio::test]
    async fn test_read_tolerates_surrounding_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log.offset");
        std::fs::write(&path, "  1234\n").unwrap();

        let store = OffsetStore::new(path);
        assert_eq!(store.read().await, 1234);
    }

    #[tokio::test]
    async fn test_ensure_exists_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log.offset");

        let store = OffsetStore::new(path.clone());
        assert!(store.ensure_exists().await.unwrap());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_ensure_exists_preserves_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log.offset");
        std::fs::write(&path, "42").unwrap();

        let store = OffsetStore::new(path.clone());
        assert!(store.ensure_exists().await.unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "42");
        assert_eq!(store.read().await, 42);
    }

    #[tokio::test]
    async fn test_ensure_exists_fails_in_missing_directory() {
        let store = OffsetStore::new(PathBuf::from("/nonexistent/dir/app.log.offset"));
        assert!(store.ensure_exists().await.is_err());
    }

    #[test]
    fn test_for_log_appends_offset_suffix() {
        let store = OffsetStore::for_log(Path::new("/var/log/app.log"));
        assert_eq!(store.path(), Path::new("/var/log/app.log.offset"));
    }
}
