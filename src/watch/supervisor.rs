//! Per-file watch lifecycle.
//!
//! A supervisor owns everything for one watched log file: the offset
//! store, the tailer, and the error block detector. The notification sink
//! and the capture gate are injected, so one process can run many watches
//! with shared or independent resources.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::notifier::{ErrorReport, NotificationSink};

use super::detector::{DispatchPolicy, ErrorBlockDetector, StartPatterns};
use super::error::WatchError;
use super::offset::OffsetStore;
use super::tailer::LogTailer;

/// Immutable per-run settings shared by all watches.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    /// Display name of the watched service, used in report titles.
    pub service: String,
    /// When buffered blocks are dispatched.
    pub dispatch: DispatchPolicy,
    /// Tailer fallback wakeup interval.
    pub poll_interval: Duration,
}

/// Drives the tail → detect → notify → persist loop for one log file.
pub struct WatchSupervisor {
    path: PathBuf,
    store: OffsetStore,
    detector: ErrorBlockDetector,
    settings: WatchSettings,
    sink: Arc<dyn NotificationSink>,
    /// Capture gate: all of "open tailer, loop over lines" runs under this
    /// lock. With a process-wide gate, captures are serialized across
    /// watches; with a per-file gate they run in parallel.
    gate: Arc<Mutex<()>>,
}

impl WatchSupervisor {
    /// Create a supervisor for one log file.
    ///
    /// The offset store is placed at the conventional companion path
    /// (`<log path>.offset`).
    #[must_use]
    pub fn new(
        path: PathBuf,
        patterns: Arc<StartPatterns>,
        settings: WatchSettings,
        sink: Arc<dyn NotificationSink>,
        gate: Arc<Mutex<()>>,
    ) -> Self {
        let store = OffsetStore::for_log(&path);
        let detector = ErrorBlockDetector::new(patterns, settings.dispatch);
        Self {
            path,
            store,
            detector,
            settings,
            sink,
            gate,
        }
    }

    /// Run the watch until the process terminates.
    ///
    /// A missing log file ends the watch cleanly with a warning; other
    /// watches are unaffected. A tailer open failure is fatal to this
    /// watch only and is returned for the caller to log. Inside the loop,
    /// notification and offset-write failures are logged and swallowed.
    ///
    /// # Errors
    ///
    /// Returns an error when the offset file cannot be created, the log
    /// file cannot be stat'ed, or the tailer cannot be opened.
    pub async fn run(mut self) -> Result<(), WatchError> {
        // Preliminary steps run outside the capture gate.
        match tokio::fs::metadata(&self.path).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    path = %self.path.display(),
                    "Log file does not exist, not watching it"
                );
                return Ok(());
            }
            Err(e) => return Err(WatchError::Io(e)),
        }

        self.store.ensure_exists().await?;
        let offset = self.store.read().await;
        tracing::info!(
            path = %self.path.display(),
            offset,
            "Starting to tail"
        );

        let _guard = self.gate.lock().await;
        let mut tailer =
            LogTailer::open(self.path.clone(), offset, self.settings.poll_interval).await?;

        loop {
            let line = tailer.next_line().await?;

            if tailer.detect_shrink().await {
                tracing::info!(path = %self.path.display(), "Log file has been rotated");
            }

            if let Some(block) = self.detector.process(&line) {
                let report = ErrorReport::new(&self.settings.service, block.text());
                if let Err(e) = self.sink.send(&report).await {
                    tracing::error!(
                        path = %self.path.display(),
                        error = %e,
                        "Failed to send error notification"
                    );
                }
            }

            // Persist after every line so a restart resumes close to where
            // we stopped. Not atomic with the notification above.
            if let Err(e) = self.store.write(tailer.position()).await {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to persist offset"
                );
            }
        }
    }
}
