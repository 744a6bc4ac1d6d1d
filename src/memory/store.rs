//! Conversation transcript storage
//!
//! A bounded, ordered transcript of chat turns. Turns are appended in
//! (user, bot) pairs and the oldest are evicted first once capacity is hit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use uuid::Uuid;

/// Turns retained by default
pub const DEFAULT_CAPACITY: usize = 10;

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Bot,
}

/// A single turn in the transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub message_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: MessageRole,
    pub message: String,
}

impl ConversationTurn {
    pub fn new(role: MessageRole, message: String) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            role,
            message,
        }
    }
}

/// Bounded transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    capacity: usize,
    /// VecDeque for cheap eviction from the front
    turns: VecDeque<ConversationTurn>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            turns: VecDeque::with_capacity(capacity + 2),
            updated_at: Utc::now(),
        }
    }

    /// Append a user turn followed by the bot reply, then evict overflow
    pub fn push_exchange(&mut self, user_message: impl Into<String>, bot_reply: impl Into<String>) {
        self.turns
            .push_back(ConversationTurn::new(MessageRole::User, user_message.into()));
        self.turns
            .push_back(ConversationTurn::new(MessageRole::Bot, bot_reply.into()));

        while self.turns.len() > self.capacity {
            self.turns.pop_front();
        }

        self.updated_at = Utc::now();
    }

    /// Iterate oldest to newest
    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// `role: message` lines, oldest first
    pub fn formatted(&self) -> String {
        self.turns
            .iter()
            .map(|turn| format!("{}: {}", turn.role, turn.message))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageRole::User => "user",
            MessageRole::Bot => "bot",
        };
        write!(f, "{}", s)
    }
}
