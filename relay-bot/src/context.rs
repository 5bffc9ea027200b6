//! Per-user conversation history with a bounded window.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One role-tagged message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Storage for conversation history keyed by user ID.
///
/// Implementations keep at most a fixed number of turns per user, dropping
/// the oldest first.
pub trait ContextStore: Send + Sync {
    /// Append a turn, creating the conversation if needed, then trim it to
    /// the window.
    fn append(&self, user_id: &str, turn: Turn);

    /// Current turns for a user in order. Empty for unknown users.
    fn get(&self, user_id: &str) -> Vec<Turn>;
}

/// Process-lifetime in-memory store.
///
/// Each user's history sits in its own map shard, so users never contend on
/// a single lock.
#[derive(Debug)]
pub struct InMemoryContextStore {
    conversations: DashMap<String, VecDeque<Turn>>,
    window: usize,
}

impl InMemoryContextStore {
    /// Create a store keeping the last `window` turns per user.
    ///
    /// A window of zero is raised to one.
    pub fn new(window: usize) -> Self {
        Self {
            conversations: DashMap::new(),
            window: window.max(1),
        }
    }

    /// Maximum turns retained per user.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Number of turns currently stored for a user.
    pub fn len(&self, user_id: &str) -> usize {
        self.conversations.get(user_id).map_or(0, |c| c.len())
    }

    /// Number of users with a conversation.
    pub fn user_count(&self) -> usize {
        self.conversations.len()
    }
}

impl ContextStore for InMemoryContextStore {
    fn append(&self, user_id: &str, turn: Turn) {
        let mut conversation = self
            .conversations
            .entry(user_id.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.window + 1));

        conversation.push_back(turn);
        while conversation.len() > self.window {
            conversation.pop_front();
        }
    }

    fn get(&self, user_id: &str) -> Vec<Turn> {
        self.conversations
            .get(user_id)
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default()
    }
}
