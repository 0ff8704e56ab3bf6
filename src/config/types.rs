//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::watch::DispatchPolicy;

use super::ConfigError;

/// How capture loops of multiple watches are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    /// One process-wide gate: only one watch is inside its capture loop at
    /// a time. Historical behavior, kept as the default.
    #[default]
    Serialized,
    /// A gate per watch: capture loops run concurrently.
    Parallel,
}

/// Application configuration, an immutable snapshot per process run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Display name of the watched service, embedded in report titles.
    pub service: String,
    /// Notification webhook endpoint.
    pub endpoint: String,
    /// Total timeout for one notification request, in seconds.
    pub response_timeout_secs: u64,
    /// Directory holding the watched log files.
    pub log_dir: PathBuf,
    /// Log file names inside `log_dir`, one watch each.
    pub log_files: Vec<String>,
    /// Regexes marking the first line of an error block, in order.
    pub start_error_patterns: Vec<String>,
    /// Scheduling of capture loops across watches.
    pub capture_mode: CaptureMode,
    /// When buffered blocks are dispatched.
    pub dispatch: DispatchPolicy,
    /// Tailer fallback wakeup interval, in milliseconds.
    pub poll_interval_ms: u64,
}

fn default_service() -> String {
    "unknown-service".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service: default_service(),
            endpoint: String::new(),
            response_timeout_secs: 30,
            log_dir: PathBuf::from("."),
            log_files: Vec::new(),
            start_error_patterns: Vec::new(),
            capture_mode: CaptureMode::default(),
            dispatch: DispatchPolicy::default(),
            poll_interval_ms: 250,
        }
    }
}

impl AppConfig {
    /// Parse and validate the notification endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error when the configured endpoint is not a valid URL
    /// (including the empty default).
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.endpoint).map_err(|source| ConfigError::InvalidEndpoint {
            value: self.endpoint.clone(),
            source,
        })
    }

    /// Absolute paths of the watched log files.
    #[must_use]
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.log_files
            .iter()
            .map(|name| self.log_dir.join(name))
            .collect()
    }

    /// Notification request timeout.
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    /// Tailer fallback wakeup interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
