//! Routes inbound messages to the handler and replies back to the channel.
//!
//! Every user gets a FIFO queue drained by its own worker task, so one user's
//! messages are handled strictly in arrival order while other users are never
//! held up by a slow completion.

use crate::message::ChannelMessage;
use crate::traits::{Channel, MessageHandler};
use relay_common::channel_span;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Instrument;

pub struct Dispatcher {
    handler: Arc<dyn MessageHandler>,
    channel: Arc<dyn Channel>,
    queues: HashMap<String, mpsc::UnboundedSender<ChannelMessage>>,
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn MessageHandler>, channel: Arc<dyn Channel>) -> Self {
        Self {
            handler,
            channel,
            queues: HashMap::new(),
        }
    }

    /// Consume `rx` on a background task until every sender is dropped.
    pub fn spawn(self, mut rx: mpsc::Receiver<ChannelMessage>) -> tokio::task::JoinHandle<()> {
        let mut dispatcher = self;
        tokio::spawn(async move {
            tracing::info!("Message dispatcher started");

            while let Some(message) = rx.recv().await {
                dispatcher.dispatch(message);
            }

            tracing::info!(
                users = dispatcher.queues.len(),
                "Message dispatcher stopped"
            );
        })
    }

    /// Queue a message behind earlier messages from the same user.
    pub fn dispatch(&mut self, message: ChannelMessage) {
        let user_id = message.user_id.clone();

        let message = match self.queues.get(&user_id) {
            Some(queue) => match queue.send(message) {
                Ok(()) => return,
                // Worker is gone; start a fresh one below.
                Err(mpsc::error::SendError(message)) => message,
            },
            None => message,
        };

        let queue = self.start_worker(&user_id);
        if queue.send(message).is_err() {
            tracing::error!(user_id = %user_id, "User worker exited immediately, message dropped");
            return;
        }
        self.queues.insert(user_id, queue);
    }

    fn start_worker(&self, user_id: &str) -> mpsc::UnboundedSender<ChannelMessage> {
        let (tx, mut rx) = mpsc::unbounded_channel::<ChannelMessage>();
        let handler = self.handler.clone();
        let channel = self.channel.clone();

        tracing::debug!(user_id = %user_id, "Starting user worker");

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let span = channel_span!(
                    channel.name(),
                    message.trace_id,
                    message.user_id,
                    chat_id = %message.chat_id
                );
                process(handler.as_ref(), channel.as_ref(), message)
                    .instrument(span)
                    .await;
            }
        });

        tx
    }
}

async fn process(handler: &dyn MessageHandler, channel: &dyn Channel, message: ChannelMessage) {
    let message_id = message.id.clone();

    let Some(reply) = handler.handle(message).await else {
        return;
    };

    match channel.send(&reply).await {
        Ok(()) => tracing::info!(message_id = %message_id, "Reply sent"),
        Err(e) => tracing::error!(message_id = %message_id, error = %e, "Failed to send reply"),
    }
}
