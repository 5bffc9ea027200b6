//! Relay Bot - Telegram to LLM chat relay.
//!
//! Each Telegram user gets a short sliding window of recent turns that is sent
//! with every new message to an OpenRouter chat-completion model. Replies go
//! back to the chat the message came from.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod context;
pub mod dispatcher;
pub mod handler;
pub mod message;
pub mod provider;
pub mod telegram;
pub mod traits;

pub use context::{ContextStore, InMemoryContextStore, Role, Turn};
pub use dispatcher::Dispatcher;
pub use handler::ChatHandler;
pub use message::{ChannelMessage, Command, OutgoingMessage};
pub use provider::{
    Completion, CompletionAdapter, CompletionClient, CompletionError, CompletionRequest,
    OpenRouterClient, FALLBACK_REPLY,
};
pub use telegram::TelegramChannel;
pub use traits::{Channel, ChannelError, ChannelResult, MessageHandler};

use relay_common::Config;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Inbound queue between the listener and the dispatcher.
const INBOUND_BUFFER: usize = 100;

/// Wire up the relay and run until the listener stops or Ctrl-C arrives.
pub async fn start(config: Config) -> anyhow::Result<()> {
    let channel = Arc::new(TelegramChannel::new(&config.telegram));
    channel.init().await?;

    let client = Arc::new(OpenRouterClient::from_config(&config.completion)?);
    let completer = CompletionAdapter::from_config(client, &config.completion);
    let store = Arc::new(InMemoryContextStore::new(
        config.conversation.history_window,
    ));
    let handler = Arc::new(
        ChatHandler::new(store, completer)
            .with_record_failed_replies(config.conversation.record_failed_replies),
    );

    let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
    let dispatcher_handle = Dispatcher::new(handler, channel.clone()).spawn(rx);

    let listener = channel.clone();
    let mut listener_handle = tokio::spawn(async move { listener.listen(tx).await });

    tracing::info!(
        model = %config.completion.model,
        history_window = config.conversation.history_window,
        "Relay bot started"
    );

    tokio::select! {
        result = &mut listener_handle => {
            match result {
                Ok(Ok(())) => tracing::info!("Telegram listener stopped"),
                Ok(Err(e)) => tracing::error!(error = %e, "Telegram listener failed"),
                Err(e) => tracing::error!(error = %e, "Telegram listener panicked"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    listener_handle.abort();
    dispatcher_handle.abort();

    Ok(())
}
