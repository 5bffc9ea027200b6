//! Telegram channel adapter.
//!
//! Long-polls the Bot API with `getUpdates` and replies with `sendMessage`.

use crate::message::{ChannelMessage, OutgoingMessage};
use crate::traits::{Channel, ChannelError, ChannelResult};
use async_trait::async_trait;
use relay_common::logging::generate_trace_id;
use relay_common::TelegramConfig;
use std::time::Duration;
use tokio::sync::mpsc;

/// Telegram rejects longer `sendMessage` texts.
const MAX_MESSAGE_LEN: usize = 4096;

/// Pause after a failed poll before trying again.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram channel - long-polls the Bot API for updates.
pub struct TelegramChannel {
    bot_token: String,
    api_url: String,
    poll_timeout_secs: u64,
    client: reqwest::Client,
}

impl TelegramChannel {
    /// Create a new Telegram channel.
    pub fn new(config: &TelegramConfig) -> Self {
        // The HTTP timeout must outlast the long-poll timeout.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default Telegram HTTP client: {e}");
                reqwest::Client::new()
            });

        Self {
            bot_token: config.bot_token.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            poll_timeout_secs: config.poll_timeout_secs,
            client,
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_url, self.bot_token)
    }

    /// Fetch one batch of updates starting at `offset`.
    ///
    /// Returns the parsed text messages and the offset for the next poll.
    async fn poll_updates(&self, offset: i64) -> anyhow::Result<(Vec<ChannelMessage>, i64)> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"]
        });

        let resp = self
            .client
            .post(self.api_url("getUpdates"))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            anyhow::bail!("Telegram getUpdates failed ({status}): {err}");
        }

        let data: serde_json::Value = resp.json().await?;
        let mut next_offset = offset;
        let mut messages = Vec::new();

        if let Some(results) = data.get("result").and_then(serde_json::Value::as_array) {
            for update in results {
                // Advance offset past this update
                if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64) {
                    next_offset = next_offset.max(uid + 1);
                }

                if let Some(msg) = parse_update(update) {
                    messages.push(msg);
                }
            }
        }

        Ok((messages, next_offset))
    }

    /// Send a single message chunk as plain text.
    async fn send_single_chunk(&self, text: &str, chat_id: &str) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text
        });

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            anyhow::bail!("Telegram sendMessage failed: {err}");
        }

        Ok(())
    }
}

/// Extract a text message from one `getUpdates` entry.
///
/// Updates without a text message (stickers, photos, edits, ...) yield `None`.
fn parse_update(update: &serde_json::Value) -> Option<ChannelMessage> {
    let message = update.get("message")?;
    let text = message.get("text").and_then(|v| v.as_str())?;

    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(serde_json::Value::as_i64)?
        .to_string();

    let from = message.get("from");
    let user_id = from
        .and_then(|f| f.get("id"))
        .and_then(serde_json::Value::as_i64)
        .map_or_else(|| chat_id.clone(), |id| id.to_string());
    let display_name = from
        .and_then(|f| f.get("first_name"))
        .and_then(|n| n.as_str())
        .map(String::from);

    let id = message
        .get("message_id")
        .and_then(serde_json::Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_default();

    let timestamp = message
        .get("date")
        .and_then(serde_json::Value::as_i64)
        .map_or(0, |secs| secs * 1000);

    Some(ChannelMessage {
        id,
        user_id,
        chat_id,
        display_name,
        text: text.to_string(),
        timestamp,
        trace_id: generate_trace_id(),
    })
}

/// Split a message into chunks that fit within Telegram's limit.
///
/// Prefers paragraph, line, sentence, then word boundaries, and never cuts
/// through a UTF-8 character.
fn split_message(message: &str, max_len: usize) -> Vec<String> {
    if message.len() <= max_len {
        return vec![message.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = message;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut limit = max_len;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }
        if limit == 0 {
            // max_len is smaller than the first character
            limit = remaining.chars().next().map_or(remaining.len(), char::len_utf8);
        }

        let chunk = &remaining[..limit];
        let split_pos = chunk
            .rfind("\n\n")
            .or_else(|| chunk.rfind('\n'))
            .or_else(|| chunk.rfind(". ").map(|p| p + 1))
            .or_else(|| chunk.rfind(' '))
            .filter(|&p| p > 0)
            .unwrap_or(limit);

        chunks.push(remaining[..split_pos].to_string());
        remaining = remaining[split_pos..].trim_start();
    }

    chunks
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn init(&self) -> ChannelResult<()> {
        // Verify bot token by calling getMe
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::Auth(format!("Invalid bot token: {err}")));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;
        let username = data
            .get("result")
            .and_then(|r| r.get("username"))
            .and_then(|u| u.as_str())
            .unwrap_or("unknown");

        tracing::info!(bot = %username, "Telegram channel initialized");
        Ok(())
    }

    async fn send(&self, message: &OutgoingMessage) -> ChannelResult<()> {
        if message.text.is_empty() {
            return Err(ChannelError::InvalidMessage("empty text".into()));
        }

        for chunk in split_message(&message.text, MAX_MESSAGE_LEN) {
            self.send_single_chunk(&chunk, &message.chat_id)
                .await
                .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        }

        Ok(())
    }

    async fn listen(&self, tx: mpsc::Sender<ChannelMessage>) -> ChannelResult<()> {
        let mut offset: i64 = 0;

        tracing::info!("Telegram channel listening for messages...");

        loop {
            let messages = match self.poll_updates(offset).await {
                Ok((messages, next_offset)) => {
                    offset = next_offset;
                    messages
                }
                Err(e) => {
                    tracing::warn!("Telegram poll error: {e}");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            for msg in messages {
                tracing::info!(
                    channel = "telegram",
                    trace_id = %msg.trace_id,
                    message_id = %msg.id,
                    user_id = %msg.user_id,
                    chat_id = %msg.chat_id,
                    "IM message received"
                );

                if tx.send(msg).await.is_err() {
                    tracing::info!("Message receiver dropped, Telegram listener stopping");
                    return Ok(());
                }
            }
        }
    }

    async fn health_check(&self) -> ChannelResult<()> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::NotReady)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn channel_for(server: &MockServer) -> TelegramChannel {
        let mut config = TelegramConfig::new("123:ABC");
        config.api_url = server.uri();
        config.poll_timeout_secs = 0;
        TelegramChannel::new(&config)
    }

    #[test]
    fn telegram_channel_name() {
        let ch = TelegramChannel::new(&TelegramConfig::new("fake-token"));
        assert_eq!(ch.name(), "telegram");
    }

    #[test]
    fn telegram_api_url() {
        let ch = TelegramChannel::new(&TelegramConfig::new("123:ABC"));
        assert_eq!(
            ch.api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    #[test]
    fn parse_text_update() {
        let update = json!({
            "update_id": 10,
            "message": {
                "message_id": 7,
                "date": 1_700_000_000,
                "from": {"id": 42, "first_name": "Alice", "username": "alice"},
                "chat": {"id": 42, "type": "private"},
                "text": "Hi"
            }
        });

        let msg = parse_update(&update).unwrap();
        assert_eq!(msg.id, "7");
        assert_eq!(msg.user_id, "42");
        assert_eq!(msg.chat_id, "42");
        assert_eq!(msg.display_name.as_deref(), Some("Alice"));
        assert_eq!(msg.text, "Hi");
        assert_eq!(msg.timestamp, 1_700_000_000_000);
        assert_eq!(msg.trace_id.len(), 36);
    }

    #[test]
    fn parse_group_message_keeps_sender_and_chat_apart() {
        let update = json!({
            "update_id": 11,
            "message": {
                "message_id": 8,
                "from": {"id": 42, "first_name": "Alice"},
                "chat": {"id": -100_123, "type": "group"},
                "text": "Hi all"
            }
        });

        let msg = parse_update(&update).unwrap();
        assert_eq!(msg.user_id, "42");
        assert_eq!(msg.chat_id, "-100123");
    }

    #[test]
    fn parse_skips_non_text() {
        let sticker = json!({
            "update_id": 12,
            "message": {
                "message_id": 9,
                "from": {"id": 42, "first_name": "Alice"},
                "chat": {"id": 42},
                "sticker": {"file_id": "abc"}
            }
        });
        assert!(parse_update(&sticker).is_none());

        let edited = json!({"update_id": 13, "edited_message": {"text": "x"}});
        assert!(parse_update(&edited).is_none());
    }

    #[test]
    fn split_message_short() {
        let result = split_message("Hello, World!", 4096);
        assert_eq!(result, vec!["Hello, World!".to_string()]);
    }

    #[test]
    fn split_message_long() {
        let msg = "x".repeat(5000);
        let result = split_message(&msg, 4096);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].len(), 4096);
        assert_eq!(result[1].len(), 904);
    }

    #[test]
    fn split_message_prefers_paragraphs() {
        let msg = format!("{}\n\n{}", "a".repeat(30), "b".repeat(30));
        let result = split_message(&msg, 40);
        assert_eq!(result, vec!["a".repeat(30), "b".repeat(30)]);
    }

    #[test]
    fn split_message_respects_char_boundaries() {
        let msg = "é".repeat(10); // 20 bytes
        let result = split_message(&msg, 5);
        assert!(result.iter().all(|c| c.len() <= 5));
        assert_eq!(result.concat(), msg);
    }

    #[tokio::test]
    async fn init_checks_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bot123:ABC/getMe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"id": 1, "is_bot": true, "username": "relay_bot"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        channel_for(&server).init().await.unwrap();
    }

    #[tokio::test]
    async fn init_rejects_bad_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bot123:ABC/getMe"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "ok": false,
                "description": "Unauthorized"
            })))
            .mount(&server)
            .await;

        let err = channel_for(&server).init().await.unwrap_err();
        assert!(matches!(err, ChannelError::Auth(_)));
        assert!(channel_for(&server).health_check().await.is_err());
    }

    #[tokio::test]
    async fn send_posts_plain_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .and(body_json(json!({"chat_id": "42", "text": "Hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        channel_for(&server)
            .send(&OutgoingMessage::new("42", "Hello"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn send_splits_long_replies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(2)
            .mount(&server)
            .await;

        channel_for(&server)
            .send(&OutgoingMessage::new("42", "y".repeat(5000)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn send_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Bad Request: chat not found"))
            .mount(&server)
            .await;

        let err = channel_for(&server)
            .send(&OutgoingMessage::new("42", "Hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::SendFailed(ref m) if m.contains("chat not found")));
    }

    #[tokio::test]
    async fn send_rejects_empty_text() {
        let server = MockServer::start().await;
        let err = channel_for(&server)
            .send(&OutgoingMessage::new("42", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidMessage(_)));
    }

    #[tokio::test]
    async fn poll_advances_offset_and_keeps_text_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/getUpdates"))
            .and(body_json(json!({
                "offset": 0,
                "timeout": 0,
                "allowed_updates": ["message"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    {
                        "update_id": 100,
                        "message": {
                            "message_id": 1,
                            "from": {"id": 42, "first_name": "Alice"},
                            "chat": {"id": 42},
                            "text": "Hi"
                        }
                    },
                    {
                        "update_id": 101,
                        "message": {
                            "message_id": 2,
                            "from": {"id": 42, "first_name": "Alice"},
                            "chat": {"id": 42},
                            "photo": []
                        }
                    }
                ]
            })))
            .mount(&server)
            .await;

        let (messages, next) = channel_for(&server).poll_updates(0).await.unwrap();
        assert_eq!(next, 102);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "Hi");
    }

    #[tokio::test]
    async fn listen_forwards_until_receiver_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [{
                    "update_id": 5,
                    "message": {
                        "message_id": 1,
                        "from": {"id": 7, "first_name": "Bob"},
                        "chat": {"id": 7},
                        "text": "ping"
                    }
                }]
            })))
            .mount(&server)
            .await;

        let channel = channel_for(&server);
        let (tx, mut rx) = mpsc::channel(1);

        let listener = tokio::spawn(async move { channel.listen(tx).await });

        let first = rx.recv().await.unwrap();
        assert_eq!(first.text, "ping");
        assert_eq!(first.user_id, "7");
        drop(rx);

        let result = tokio::time::timeout(Duration::from_secs(5), listener)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
