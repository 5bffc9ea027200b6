//! Configuration for the relay bot.
//!
//! All settings come from the process environment. The two credentials
//! (`TELEGRAM_BOT_TOKEN`, `OPENROUTER_API_KEY`) are required; everything else
//! has a default. Loading fails on a missing credential or a malformed value,
//! and the process must not start in that case.

use crate::error::{Error, Result};
use std::fmt;
use std::time::Duration;

pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_API_URL: &str = "TELEGRAM_API_URL";
pub const ENV_TELEGRAM_POLL_TIMEOUT: &str = "TELEGRAM_POLL_TIMEOUT_SECS";
pub const ENV_OPENROUTER_API_KEY: &str = "OPENROUTER_API_KEY";
pub const ENV_OPENROUTER_BASE_URL: &str = "OPENROUTER_BASE_URL";
pub const ENV_MODEL: &str = "RELAY_MODEL";
pub const ENV_MAX_TOKENS: &str = "RELAY_MAX_TOKENS";
pub const ENV_HISTORY_WINDOW: &str = "RELAY_HISTORY_WINDOW";
pub const ENV_REQUEST_TIMEOUT: &str = "RELAY_REQUEST_TIMEOUT_SECS";
pub const ENV_RECORD_FAILED_REPLIES: &str = "RELAY_RECORD_FAILED_REPLIES";
pub const ENV_LOG_LEVEL: &str = "RELAY_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "RELAY_LOG_FORMAT";

/// Root configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub completion: CompletionConfig,
    pub conversation: ConversationConfig,
    pub observability: ObservabilityConfig,
}

/// Telegram Bot API settings.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token issued by @BotFather
    pub bot_token: String,
    /// Bot API base URL (without trailing slash)
    pub api_url: String,
    /// Long-poll timeout passed to `getUpdates`
    pub poll_timeout_secs: u64,
}

/// Completion API settings.
#[derive(Clone)]
pub struct CompletionConfig {
    /// OpenRouter API key
    pub api_key: String,
    /// OpenAI-compatible base URL (without trailing slash)
    pub base_url: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
    /// Whole-request timeout
    pub request_timeout: Duration,
}

/// Conversation history settings.
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Number of most recent turns kept per user
    pub history_window: usize,
    /// Whether the fallback reply of a failed completion is stored as the
    /// assistant turn
    pub record_failed_replies: bool,
}

/// Observability configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log format (json, pretty)
    pub log_format: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            record_failed_replies: true,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl TelegramConfig {
    /// Telegram settings with default endpoint and poll timeout.
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_url: default_telegram_api_url(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

impl CompletionConfig {
    /// Completion settings with default endpoint, model and limits.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_openrouter_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            request_timeout: Duration::from_secs(default_request_timeout_secs()),
        }
    }
}

// Secrets stay out of Debug output.
impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

impl fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Blank values are treated as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bot_token = get(ENV_TELEGRAM_BOT_TOKEN).ok_or(Error::MissingCredential {
            var: ENV_TELEGRAM_BOT_TOKEN,
            description: "Telegram bot token",
        })?;
        let api_key = get(ENV_OPENROUTER_API_KEY).ok_or(Error::MissingCredential {
            var: ENV_OPENROUTER_API_KEY,
            description: "OpenRouter API key",
        })?;

        let mut telegram = TelegramConfig::new(bot_token);
        if let Some(url) = get(ENV_TELEGRAM_API_URL) {
            telegram.api_url = parse_url(ENV_TELEGRAM_API_URL, url)?;
        }
        if let Some(raw) = get(ENV_TELEGRAM_POLL_TIMEOUT) {
            telegram.poll_timeout_secs = parse_number(ENV_TELEGRAM_POLL_TIMEOUT, &raw)?;
        }

        let mut completion = CompletionConfig::new(api_key);
        if let Some(url) = get(ENV_OPENROUTER_BASE_URL) {
            completion.base_url = parse_url(ENV_OPENROUTER_BASE_URL, url)?;
        }
        if let Some(model) = get(ENV_MODEL) {
            completion.model = model;
        }
        if let Some(raw) = get(ENV_MAX_TOKENS) {
            completion.max_tokens = parse_positive(ENV_MAX_TOKENS, &raw)?;
        }
        if let Some(raw) = get(ENV_REQUEST_TIMEOUT) {
            completion.request_timeout =
                Duration::from_secs(parse_positive(ENV_REQUEST_TIMEOUT, &raw)?);
        }

        let mut conversation = ConversationConfig::default();
        if let Some(raw) = get(ENV_HISTORY_WINDOW) {
            conversation.history_window = parse_positive(ENV_HISTORY_WINDOW, &raw)?;
        }
        if let Some(raw) = get(ENV_RECORD_FAILED_REPLIES) {
            conversation.record_failed_replies = parse_bool(ENV_RECORD_FAILED_REPLIES, &raw)?;
        }

        let mut observability = ObservabilityConfig::default();
        if let Some(level) = get(ENV_LOG_LEVEL) {
            observability.log_level = level;
        }
        if let Some(format) = get(ENV_LOG_FORMAT) {
            observability.log_format = format;
        }

        let config = Self {
            telegram,
            completion,
            conversation,
            observability,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.conversation.history_window == 0 {
            return Err(Error::Config(
                "history window must keep at least one turn".into(),
            ));
        }
        if self.completion.model.is_empty() {
            return Err(Error::Config("model identifier must not be empty".into()));
        }
        if !matches!(self.observability.log_format.as_str(), "json" | "pretty") {
            return Err(Error::InvalidValue {
                var: ENV_LOG_FORMAT,
                value: self.observability.log_format.clone(),
                reason: "expected \"json\" or \"pretty\"".into(),
            });
        }
        Ok(())
    }
}

fn parse_url(var: &'static str, raw: String) -> Result<String> {
    if !(raw.starts_with("http://") || raw.starts_with("https://")) {
        return Err(Error::InvalidValue {
            var,
            value: raw,
            reason: "expected an http(s) URL".into(),
        });
    }
    Ok(raw.trim_end_matches('/').to_string())
}

fn parse_number<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T> {
    raw.parse().map_err(|_| Error::InvalidValue {
        var,
        value: raw.to_string(),
        reason: "expected a non-negative integer".into(),
    })
}

fn parse_positive<T>(var: &'static str, raw: &str) -> Result<T>
where
    T: std::str::FromStr + PartialEq + Default,
{
    let value: T = parse_number(var, raw)?;
    if value == T::default() {
        return Err(Error::InvalidValue {
            var,
            value: raw.to_string(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(value)
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidValue {
            var,
            value: raw.to_string(),
            reason: "expected true or false".into(),
        }),
    }
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".into()
}
fn default_poll_timeout_secs() -> u64 {
    30
}
fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "deepseek/deepseek-r1-0528-qwen3-8b:free".into()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_history_window() -> usize {
    5
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
