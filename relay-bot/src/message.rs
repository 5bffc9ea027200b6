//! Message types for channel communication.

use serde::{Deserialize, Serialize};

/// An inbound text message from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Message ID (channel-specific)
    pub id: String,
    /// Sender identifier, the key for conversation history
    pub user_id: String,
    /// Where replies go (Telegram chat ID)
    pub chat_id: String,
    /// Sender's display name, if the channel provides one
    #[serde(default)]
    pub display_name: Option<String>,
    /// Message text
    pub text: String,
    /// Timestamp (Unix millis)
    pub timestamp: i64,
    /// Trace ID for correlating logs of this message
    pub trace_id: String,
}

/// Outgoing reply addressed to a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub chat_id: String,
    pub text: String,
}

impl OutgoingMessage {
    pub fn new(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
        }
    }
}

/// What an inbound text asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `/start`, optionally `/start@bot` or with a payload
    Start,
    /// `/help`, optionally `/help@bot`
    Help,
    /// Anything else, relayed to the model as-is
    Text(&'a str),
}

impl<'a> Command<'a> {
    /// Classify a message text.
    ///
    /// Unknown slash commands are treated as plain text.
    pub fn parse(text: &'a str) -> Self {
        let Some(rest) = text.trim_start().strip_prefix('/') else {
            return Self::Text(text);
        };

        let word = rest.split_whitespace().next().unwrap_or_default();
        let name = word.split('@').next().unwrap_or_default();

        match name.to_ascii_lowercase().as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            _ => Self::Text(text),
        }
    }
}
