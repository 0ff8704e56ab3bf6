//! Slack block-kit payload types for error reports.

use chrono::{DateTime, Local};
use serde::Serialize;

/// A single text object inside a rich text element.
///
/// The text field is optional on the wire; clients tolerate its absence.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TextObject {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Plain-text header content.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HeaderText {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub emoji: bool,
}

/// Markdown-formatted field content.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MarkdownText {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// A rich text element carrying preformatted text objects.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RichTextElement {
    #[serde(rename = "type")]
    pub kind: String,
    pub border: u32,
    pub elements: Vec<TextObject>,
}

/// One block in the message layout.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Visual separator.
    Divider,
    /// Prominent title line.
    Header { text: HeaderText },
    /// Preformatted body content.
    RichText { elements: Vec<RichTextElement> },
    /// Key/value style footer fields.
    Section { fields: Vec<MarkdownText> },
}

/// Top-level webhook message: fallback text plus structured blocks.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SlackMessage {
    pub text: String,
    pub blocks: Vec<Block>,
}

impl SlackMessage {
    /// Build the error report layout: divider, header naming the service,
    /// the captured lines as a preformatted block, a capture timestamp
    /// field, and a closing divider.
    #[must_use]
    pub fn error_report(service: &str, body: &str, captured_at: DateTime<Local>) -> Self {
        Self {
            text: "Error Report".to_string(),
            blocks: vec![
                Block::Divider,
                Block::Header {
                    text: HeaderText {
                        kind: "plain_text".to_string(),
                        text: format!("Error on {service}"),
                        emoji: true,
                    },
                },
                Block::RichText {
                    elements: vec![RichTextElement {
                        kind: "rich_text_preformatted".to_string(),
                        border: 0,
                        elements: vec![TextObject {
                            kind: "text".to_string(),
                            text: Some(body.to_string()),
                        }],
                    }],
                },
                Block::Section {
                    fields: vec![MarkdownText {
                        kind: "mrkdwn".to_string(),
                        text: format!(
                            "*Captured At:*\n{}",
                            captured_at.format("%Y-%m-%d %H:%M:%S")
                        ),
                    }],
                },
                Block::Divider,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_error_report_wire_shape() {
        let captured_at = Local.with_ymd_and_hms(2026, 8, 29, 10, 30, 0).unwrap();
        let message = SlackMessage::error_report("payments-api", "ERROR: boom", captured_at);
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["text"], "Error Report");
        assert_eq!(value["blocks"][0]["type"], "divider");
        assert_eq!(value["blocks"][1]["type"], "header");
        assert_eq!(value["blocks"][1]["text"]["type"], "plain_text");
        assert_eq!(value["blocks"][1]["text"]["text"], "Error on payments-api");
        assert_eq!(value["blocks"][1]["text"]["emoji"], true);
        assert_eq!(value["blocks"][2]["type"], "rich_text");
        assert_eq!(
            value["blocks"][2]["elements"][0]["type"],
            "rich_text_preformatted"
        );
        assert_eq!(value["blocks"][2]["elements"][0]["border"], 0);
        assert_eq!(
            value["blocks"][2]["elements"][0]["elements"][0]["text"],
            "ERROR: boom"
        );
        assert_eq!(value["blocks"][3]["type"], "section");
        assert_eq!(
            value["blocks"][3]["fields"][0]["text"],
            "*Captured At:*\n2026-08-29 10:30:00"
        );
        assert_eq!(value["blocks"][4]["type"], "divider");
    }

    #[test]
    fn test_absent_text_is_omitted_from_wire() {
        let object = TextObject {
            kind: "text".to_string(),
            text: None,
        };
        let value = serde_json::to_value(&object).unwrap();
        assert!(value.get("text").is_none());
    }

    #[test]
    fn test_multi_line_body_is_preserved() {
        let captured_at = Local.with_ymd_and_hms(2026, 8, 29, 10, 30, 0).unwrap();
        let message =
            SlackMessage::error_report("svc", "ERROR: one\nERROR: two", captured_at);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value["blocks"][2]["elements"][0]["elements"][0]["text"],
            "ERROR: one\nERROR: two"
        );
    }
}
