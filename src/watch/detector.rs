//! Error block detection over a stream of log lines.
//!
//! A block begins when a line matches one of the configured start
//! patterns. The detector keeps the current block buffered and decides,
//! per line, whether the buffer should be handed to the notification
//! sink.

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Compiled start-of-error patterns, shared read-only across all watches.
///
/// Compiled once at watch start; invalid patterns are skipped with a
/// warning rather than failing the watch.
#[derive(Debug)]
pub struct StartPatterns {
    patterns: Vec<Regex>,
}

impl StartPatterns {
    /// Compile the given pattern strings, skipping invalid ones.
    #[must_use]
    pub fn compile(raw: &[String]) -> Self {
        let mut patterns = Vec::with_capacity(raw.len());
        for source in raw {
            match Regex::new(source) {
                Ok(re) => patterns.push(re),
                Err(e) => {
                    tracing::warn!(
                        pattern = %source,
                        error = %e,
                        "Skipping invalid start pattern"
                    );
                }
            }
        }
        Self { patterns }
    }

    /// Check whether any pattern matches the line.
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(line))
    }

    /// Number of successfully compiled patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether no pattern compiled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// When a buffered block is handed to the notification sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchPolicy {
    /// Dispatch the buffer on every line while it is non-empty.
    ///
    /// This reproduces the historical behavior: the buffer is never
    /// cleared, so the triggering line is re-sent on each following line
    /// until another match replaces it.
    #[default]
    EveryLine,
    /// Take the buffer on dispatch so each block is sent exactly once.
    Once,
}

/// Detector state, derived from the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// No block buffered.
    Idle,
    /// A block is buffered and eligible for dispatch.
    Capturing,
}

/// A captured block of error text. Never empty when dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBlock {
    lines: Vec<String>,
}

impl ErrorBlock {
    /// The captured lines, in order.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The captured lines joined with newlines.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Stateful classifier that turns a line stream into error blocks.
///
/// One instance per watched file; patterns are shared.
#[derive(Debug)]
pub struct ErrorBlockDetector {
    patterns: Arc<StartPatterns>,
    policy: DispatchPolicy,
    buffer: Vec<String>,
}

impl ErrorBlockDetector {
    /// Create a detector over the given patterns.
    #[must_use]
    pub fn new(patterns: Arc<StartPatterns>, policy: DispatchPolicy) -> Self {
        Self {
            patterns,
            policy,
            buffer: Vec::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> DetectorState {
        if self.buffer.is_empty() {
            DetectorState::Idle
        } else {
            DetectorState::Capturing
        }
    }

    /// Feed one line; returns a block to dispatch, if any.
    ///
    /// A matching line replaces the buffer with exactly that line; any
    /// previously buffered, undispatched content is discarded. After the
    /// match check, a non-empty buffer produces a dispatch. Under
    /// [`DispatchPolicy::EveryLine`] the buffer survives the dispatch, so
    /// subsequent lines re-dispatch the same content; under
    /// [`DispatchPolicy::Once`] the buffer is taken and the detector
    /// returns to idle.
    pub fn process(&mut self, line: &str) -> Option<ErrorBlock> {
        if self.patterns.matches(line) {
            tracing::info!("Starting new error capture");
            self.buffer = vec![line.to_string()];
        }

        if self.buffer.is_empty() {
            return None;
        }

        let lines = match self.policy {
            DispatchPolicy::EveryLine => self.buffer.clone(),
            DispatchPolicy::Once => std::mem::take(&mut self.buffer),
        };
        Some(ErrorBlock { lines })
    }
}
