//! Chat handler: commands, history bookkeeping and completion relay.

use crate::context::{ContextStore, Turn};
use crate::message::{ChannelMessage, Command, OutgoingMessage};
use crate::provider::CompletionAdapter;
use crate::traits::MessageHandler;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Name used in the greeting when the channel provides none.
const ANONYMOUS_NAME: &str = "there";

/// Relays user text to the model with the user's recent history.
///
/// `on_message` holds a per-user lock from the first append until the
/// assistant turn is stored, so two messages from one user never interleave.
/// Different users proceed in parallel.
pub struct ChatHandler {
    store: Arc<dyn ContextStore>,
    completer: CompletionAdapter,
    user_locks: DashMap<String, Arc<Mutex<()>>>,
    record_failed_replies: bool,
}

impl ChatHandler {
    pub fn new(store: Arc<dyn ContextStore>, completer: CompletionAdapter) -> Self {
        Self {
            store,
            completer,
            user_locks: DashMap::new(),
            record_failed_replies: true,
        }
    }

    /// Whether fallback replies are kept in history (default: true).
    pub fn with_record_failed_replies(mut self, record: bool) -> Self {
        self.record_failed_replies = record;
        self
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    /// Greeting for `/start`.
    pub fn on_start(display_name: &str) -> String {
        format!("Hello, {display_name}!\nI'm a bot that lets you chat with an LLM.")
    }

    /// Text for `/help`.
    pub fn on_help() -> String {
        "I'm a bot for chatting with an LLM.\n\
         Just send me a message and I'll try to answer it.\n\
         Commands:\n\
         /start - Get started\n\
         /help - Show this help"
            .to_string()
    }

    /// Record `text` as a user turn, ask the model, record and return its reply.
    ///
    /// Always produces a reply: completion failures yield the fallback text.
    pub async fn on_message(&self, user_id: &str, text: &str) -> String {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        self.store.append(user_id, Turn::user(text));
        let history = self.store.get(user_id);

        let completion = self.completer.complete(&history).await;
        let failed = completion.is_fallback();
        let reply = completion.into_text();

        if failed && !self.record_failed_replies {
            tracing::debug!(user_id = %user_id, "Fallback reply not recorded in history");
        } else {
            self.store.append(user_id, Turn::assistant(reply.clone()));
        }

        reply
    }
}

#[async_trait]
impl MessageHandler for ChatHandler {
    async fn handle(&self, message: ChannelMessage) -> Option<OutgoingMessage> {
        if message.text.trim().is_empty() {
            tracing::debug!(message_id = %message.id, "Ignoring empty message");
            return None;
        }

        let reply = match Command::parse(&message.text) {
            Command::Start => {
                Self::on_start(message.display_name.as_deref().unwrap_or(ANONYMOUS_NAME))
            }
            Command::Help => Self::on_help(),
            Command::Text(text) => self.on_message(&message.user_id, text).await,
        };

        Some(OutgoingMessage::new(message.chat_id, reply))
    }
}
