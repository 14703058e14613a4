//! Chat message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message body: user text as typed, or bot replies already translated to HTML.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "text", rename_all = "snake_case")]
pub enum MessageText {
    /// Plain text, rendered escaped.
    Plain(String),
    /// Trusted HTML produced by markup translation.
    Html(String),
}

impl MessageText {
    /// Borrow the raw string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plain(text) | Self::Html(text) => text,
        }
    }

    /// Whether there is any text content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

/// One entry of the conversation. Immutable once appended.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Body of the message.
    #[serde(flatten)]
    pub text: MessageText,
    /// Preview URI of the attached image, for user messages.
    pub file_url: Option<String>,
    /// True for user-authored messages, false for bot replies.
    pub is_user: bool,
    /// Append time.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Build a user message.
    #[must_use]
    pub fn user(text: impl Into<String>, file_url: Option<String>) -> Self {
        Self {
            text: MessageText::Plain(text.into()),
            file_url,
            is_user: true,
            created_at: Utc::now(),
        }
    }

    /// Build a bot message from translated HTML.
    #[must_use]
    pub fn bot(html: impl Into<String>) -> Self {
        Self {
            text: MessageText::Html(html.into()),
            file_url: None,
            is_user: false,
            created_at: Utc::now(),
        }
    }
}
