//! Conversation Memory
//!
//! Rolling transcript that feeds context to the generative fallback.
//! By default one transcript is shared by every user; `MemoryScope::PerUser`
//! keys transcripts by user id instead.

pub mod prompt;
pub mod store;

pub use prompt::PromptBuilder;
pub use store::{ConversationHistory, ConversationTurn, MessageRole};

use crate::error::LoanAdvisorError;
use chrono::Utc;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Per-user transcripts untouched for this long are dropped
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(3600);

const SHARED_KEY: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryScope {
    /// One transcript for all users
    Shared,
    PerUser,
}

impl FromStr for MemoryScope {
    type Err = LoanAdvisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shared" => Ok(MemoryScope::Shared),
            "per_user" => Ok(MemoryScope::PerUser),
            other => Err(LoanAdvisorError::Config(format!(
                "unknown memory scope {:?} (expected shared or per_user)",
                other
            ))),
        }
    }
}

pub struct ConversationMemory {
    scope: MemoryScope,
    capacity: usize,
    idle_ttl: chrono::Duration,
    histories: RwLock<HashMap<String, ConversationHistory>>,
}

impl ConversationMemory {
    pub fn new(scope: MemoryScope, capacity: usize) -> Self {
        Self {
            scope,
            capacity,
            idle_ttl: to_chrono(DEFAULT_IDLE_TTL),
            histories: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = to_chrono(idle_ttl);
        self
    }

    fn key<'a>(&self, user_id: &'a str) -> &'a str {
        match self.scope {
            MemoryScope::Shared => SHARED_KEY,
            MemoryScope::PerUser => user_id,
        }
    }

    /// Copy of the transcript visible to `user_id`
    pub async fn snapshot(&self, user_id: &str) -> ConversationHistory {
        let histories = self.histories.read().await;
        histories
            .get(self.key(user_id))
            .cloned()
            .unwrap_or_else(|| ConversationHistory::with_capacity(self.capacity))
    }

    /// Record a (user, bot) pair; eviction happens under the same lock
    pub async fn record_exchange(&self, user_id: &str, user_message: &str, bot_reply: &str) {
        let mut histories = self.histories.write().await;
        let history = histories
            .entry(self.key(user_id).to_string())
            .or_insert_with(|| ConversationHistory::with_capacity(self.capacity));

        history.push_exchange(user_message, bot_reply);
        debug!(user_id, turns = history.len(), "Recorded conversation exchange");
    }

    /// Drop per-user transcripts idle past the TTL; the shared transcript is kept
    pub async fn purge_idle(&self) -> usize {
        if self.scope == MemoryScope::Shared {
            return 0;
        }

        let now = Utc::now();
        let mut histories = self.histories.write().await;
        let before = histories.len();
        histories.retain(|_, history| now - history.updated_at <= self.idle_ttl);
        before - histories.len()
    }

    pub async fn len(&self) -> usize {
        self.histories.read().await.len()
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(MemoryScope::Shared, store::DEFAULT_CAPACITY)
    }
}
