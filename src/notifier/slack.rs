//! Notification sink trait and the Slack webhook implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use reqwest::Client;
use url::Url;

use super::message::SlackMessage;

/// Errors from notification delivery.
#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    /// Building the client or sending the request failed.
    #[error("Notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("Notification endpoint returned status {0}")]
    Status(reqwest::StatusCode),
}

/// A captured error block ready for delivery.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// Display name of the service the log belongs to.
    pub service: String,
    /// Newline-joined captured lines.
    pub text: String,
    /// When the block was captured.
    pub captured_at: DateTime<Local>,
}

impl ErrorReport {
    /// Create a report captured now.
    #[must_use]
    pub fn new(service: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            text: text.into(),
            captured_at: Local::now(),
        }
    }
}

/// Delivers captured error blocks. Injected into each watch supervisor.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one report. No retries; the caller logs failures and moves on.
    async fn send(&self, report: &ErrorReport) -> Result<(), NotifyError>;
}

/// Posts error reports as Slack block-kit JSON to a webhook URL.
#[derive(Debug, Clone)]
pub struct SlackSink {
    client: Client,
    endpoint: Url,
}

impl SlackSink {
    /// Create a sink for the given webhook endpoint.
    ///
    /// `timeout` bounds the whole request, mirroring the configured
    /// response timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl NotificationSink for SlackSink {
    async fn send(&self, report: &ErrorReport) -> Result<(), NotifyError> {
        let message = SlackMessage::error_report(&report.service, &report.text, report.captured_at);

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status));
        }

        tracing::debug!(endpoint = %self.endpoint, "Error report delivered");
        Ok(())
    }
}
