//! Notification delivery for captured error blocks.
//!
//! The watch core hands content to a [`NotificationSink`]; marshaling and
//! transport live here, out of the core's way.

mod message;
mod slack;

pub use message::{Block, HeaderText, MarkdownText, RichTextElement, SlackMessage, TextObject};
pub use slack::{ErrorReport, NotificationSink, NotifyError, SlackSink};
