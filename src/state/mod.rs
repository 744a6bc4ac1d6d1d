//! Session state store
//!
//! Holds at most one pending loan request per user id.
//! Currently in-memory; entries expire after a fixed lifetime.

use crate::memory::ConversationMemory;
use crate::models::PendingLoanRequest;
use crate::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

/// Trait for pending dialogue state
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Replace any prior entry for the user
    async fn set(&self, user_id: &str, request: PendingLoanRequest) -> Result<()>;
    /// Live entry for the user, `None` if absent or expired
    async fn get(&self, user_id: &str) -> Result<Option<PendingLoanRequest>>;
    async fn clear(&self, user_id: &str) -> Result<()>;
    /// Atomically read and remove the user's live entry
    async fn take(&self, user_id: &str) -> Result<Option<PendingLoanRequest>>;
    /// Drop every expired entry, returning how many were removed
    async fn purge_expired(&self) -> Result<usize>;
}

/// In-memory session store
pub struct InMemorySessionStore {
    pending: Arc<RwLock<HashMap<String, PendingLoanRequest>>>,
    ttl: chrono::Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: Arc::new(RwLock::new(HashMap::new())),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500)),
        }
    }

    pub async fn len(&self) -> usize {
        self.pending.read().await.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(600))
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {

    async fn set(&self, user_id: &str, request: PendingLoanRequest) -> Result<()> {
        let mut pending = self.pending.write().await;
        if pending.insert(user_id.to_string(), request).is_some() {
            debug!(user_id, "Replaced existing pending loan request");
        }
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<PendingLoanRequest>> {
        let pending = self.pending.read().await;
        Ok(pending
            .get(user_id)
            .filter(|request| !request.is_expired(self.ttl, Utc::now()))
            .cloned())
    }

    async fn clear(&self, user_id: &str) -> Result<()> {
        let mut pending = self.pending.write().await;
        pending.remove(user_id);
        Ok(())
    }

    async fn take(&self, user_id: &str) -> Result<Option<PendingLoanRequest>> {
        let mut pending = self.pending.write().await;

        match pending.remove(user_id) {
            Some(request) if request.is_expired(self.ttl, Utc::now()) => {
                info!(user_id, "Discarding expired pending loan request");
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut pending = self.pending.write().await;

        let before = pending.len();
        pending.retain(|_, request| !request.is_expired(self.ttl, now));
        Ok(before - pending.len())
    }
}

/// Periodically purge expired requests and idle transcripts until the
/// returned sender fires `true`
pub fn start_cleanup_task(
    store: Arc<dyn SessionStore>,
    memory: Arc<ConversationMemory>,
    interval: Duration,
) -> watch::Sender<bool> {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    match store.purge_expired().await {
                        Ok(0) => {}
                        Ok(removed) => info!("Session cleanup: removed {} expired requests", removed),
                        Err(e) => tracing::warn!("Session cleanup failed: {}", e),
                    }
                    let dropped = memory.purge_idle().await;
                    if dropped > 0 {
                        info!("Memory cleanup: dropped {} idle transcripts", dropped);
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!("Session cleanup task stopping");
                        break;
                    }
                }
            }
        }
    });

    shutdown_tx
}
