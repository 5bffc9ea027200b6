//! Completion API abstraction.
//!
//! `CompletionClient` performs one request against a remote chat-completion
//! endpoint and reports failures as a typed `CompletionError`.
//! `CompletionAdapter` sits on top of it and never fails: errors are logged
//! and replaced with a fixed apology the user can act on.

mod openrouter;

pub use openrouter::OpenRouterClient;

use crate::context::Turn;
use async_trait::async_trait;
use relay_common::CompletionConfig;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Reply sent to the user when the completion call fails.
pub const FALLBACK_REPLY: &str =
    "An error occurred while processing your request. Please try again later.";

// ============================================================================
// Client Trait
// ============================================================================

/// One chat-completion request.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// Model to use
    pub model: String,
    /// Conversation so far, oldest first
    pub messages: Vec<Turn>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
}

/// Why a completion request produced no text.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("API returned an error: {message}")]
    Api { message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("response contained no generated text")]
    EmptyResponse,
}

impl CompletionError {
    /// Short machine-friendly tag for log fields.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Timeout => "timeout",
            Self::Status { .. } => "status",
            Self::Api { .. } => "api",
            Self::Decode(_) => "decode",
            Self::EmptyResponse => "empty_response",
        }
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Remote completion endpoint.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Send one request and return the text of the first choice.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

// ============================================================================
// Adapter
// ============================================================================

/// Outcome of a completion as seen by the message handler.
#[derive(Debug)]
pub enum Completion {
    /// The model answered
    Generated(String),
    /// The call failed; `text` is the reply to show instead
    Fallback {
        text: String,
        cause: CompletionError,
    },
}

impl Completion {
    pub fn text(&self) -> &str {
        match self {
            Self::Generated(text) | Self::Fallback { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Generated(text) | Self::Fallback { text, .. } => text,
        }
    }

    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Wraps a `CompletionClient` with the configured model and token limit.
#[derive(Clone)]
pub struct CompletionAdapter {
    client: Arc<dyn CompletionClient>,
    model: String,
    max_tokens: u32,
    fallback: String,
}

impl CompletionAdapter {
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens,
            fallback: FALLBACK_REPLY.to_string(),
        }
    }

    /// Adapter using the model and limits from configuration.
    pub fn from_config(client: Arc<dyn CompletionClient>, config: &CompletionConfig) -> Self {
        Self::new(client, config.model.clone(), config.max_tokens)
    }

    /// Replace the apology sent on failure.
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = text.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request a reply for `messages`. Never fails.
    pub async fn complete(&self, messages: &[Turn]) -> Completion {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            max_tokens: self.max_tokens,
        };

        let start = Instant::now();
        match self.client.complete(&request).await {
            Ok(text) => {
                tracing::info!(
                    provider = %self.client.name(),
                    model = %self.model,
                    turns = messages.len(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    reply_chars = text.chars().count(),
                    "Completion succeeded"
                );
                Completion::Generated(text)
            }
            Err(cause) => {
                tracing::error!(
                    provider = %self.client.name(),
                    model = %self.model,
                    error_kind = cause.kind(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    error = %cause,
                    "Completion request failed"
                );
                Completion::Fallback {
                    text: self.fallback.clone(),
                    cause,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedClient {
        reply: Mutex<Option<Result<String, CompletionError>>>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedClient {
        fn new(reply: Result<String, CompletionError>) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(CompletionError::EmptyResponse))
        }
    }

    #[tokio::test]
    async fn adapter_passes_model_history_and_limit() {
        let client = Arc::new(ScriptedClient::new(Ok("Hello".into())));
        let adapter = CompletionAdapter::new(client.clone(), "test/model", 1024);

        let history = vec![Turn::user("Hi")];
        let completion = adapter.complete(&history).await;

        assert!(!completion.is_fallback());
        assert_eq!(completion.text(), "Hello");

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "test/model");
        assert_eq!(seen[0].max_tokens, 1024);
        assert_eq!(seen[0].messages, history);
    }

    #[tokio::test]
    async fn adapter_absorbs_failures() {
        let client = Arc::new(ScriptedClient::new(Err(CompletionError::Network(
            "connection refused".into(),
        ))));
        let adapter = CompletionAdapter::new(client, "m", 16);

        let completion = adapter.complete(&[Turn::user("Hi")]).await;

        assert!(completion.is_fallback());
        assert_eq!(completion.text(), FALLBACK_REPLY);
        match completion {
            Completion::Fallback { cause, .. } => assert_eq!(cause.kind(), "network"),
            Completion::Generated(_) => panic!("expected fallback"),
        }
    }

    #[tokio::test]
    async fn adapter_custom_fallback() {
        let client = Arc::new(ScriptedClient::new(Err(CompletionError::Timeout)));
        let adapter = CompletionAdapter::new(client, "m", 16).with_fallback("try later");

        let completion = adapter.complete(&[]).await;
        assert_eq!(completion.into_text(), "try later");
    }

    #[test]
    fn from_config_uses_model_and_limit() {
        let client = Arc::new(ScriptedClient::new(Ok(String::new())));
        let mut config = CompletionConfig::new("key");
        config.model = "openai/gpt-4o".into();
        let adapter = CompletionAdapter::from_config(client, &config);
        assert_eq!(adapter.model(), "openai/gpt-4o");
        assert_eq!(adapter.max_tokens, 1024);
    }

    #[test]
    fn request_serializes_as_chat_completion() {
        let request = CompletionRequest {
            model: "m".into(),
            messages: vec![Turn::user("Hi"), Turn::assistant("Hello")],
            max_tokens: 8,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "m",
                "messages": [
                    {"role": "user", "content": "Hi"},
                    {"role": "assistant", "content": "Hello"}
                ],
                "max_tokens": 8
            })
        );
    }

    #[test]
    fn error_kinds() {
        assert_eq!(CompletionError::Timeout.kind(), "timeout");
        assert_eq!(
            CompletionError::Status {
                status: 429,
                body: String::new()
            }
            .kind(),
            "status"
        );
        assert_eq!(CompletionError::EmptyResponse.kind(), "empty_response");
    }
}
