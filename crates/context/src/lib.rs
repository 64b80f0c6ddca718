//! Conversation context store.
//!
//! Contexts live in memory behind a `RwLock<HashMap>`; each context sits in
//! its own `tokio::sync::Mutex` so turns on the same conversation serialize
//! while distinct conversations proceed in parallel. Expiry is lazy on
//! access plus an explicit sweep the host can run periodically.

pub mod topic;

pub use topic::EscalationPolicy;

use chrono::{Duration, Utc};
use ekimate_config::ContextConfig;
use ekimate_core::{ContextEntry, ConversationContext, ConversationId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Shared handle to one conversation's context.
pub type ContextHandle = Arc<Mutex<ConversationContext>>;

/// The in-memory conversation store.
pub struct ContextStore {
    conversations: RwLock<HashMap<ConversationId, ContextHandle>>,
    ttl: Duration,
    max_entries: usize,
    policy: EscalationPolicy,
}

impl ContextStore {
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(config.ttl_secs as i64),
            max_entries: config.max_entries,
            policy: EscalationPolicy::from_config(&config.escalation_policy),
        }
    }

    /// Fetch a conversation's context, creating it if absent or expired.
    pub async fn get_or_create(&self, id: &ConversationId) -> ContextHandle {
        if let Some(handle) = self.get_live(id).await {
            return handle;
        }

        let mut map = self.conversations.write().await;
        // Re-check under the write lock; another task may have raced us.
        if let Some(handle) = map.get(id) {
            if !is_stale(handle, self.ttl) {
                return Arc::clone(handle);
            }
            tracing::debug!(conversation_id = %id, "replacing expired conversation");
        }
        let handle = Arc::new(Mutex::new(ConversationContext::new(id.clone())));
        map.insert(id.clone(), Arc::clone(&handle));
        handle
    }

    async fn get_live(&self, id: &ConversationId) -> Option<ContextHandle> {
        let map = self.conversations.read().await;
        let handle = map.get(id)?;
        if is_stale(handle, self.ttl) {
            return None;
        }
        Some(Arc::clone(handle))
    }

    /// Record a completed turn on an already-locked context: advance the
    /// topic state, then append the entry with FIFO eviction.
    ///
    /// A timestamp-ordering violation means the context is corrupted; it is
    /// reset in place (same id, fresh history) and the turn lands in the
    /// fresh context. Returns whether a reset happened so the caller can
    /// tell the player the thread was lost.
    pub fn apply_turn(
        &self,
        context: &mut ConversationContext,
        entry: ContextEntry,
        completed: bool,
    ) -> bool {
        topic::advance(&mut context.topic, &entry, completed, self.policy);

        match context.push(entry.clone(), self.max_entries) {
            Ok(()) => false,
            Err(err) => {
                tracing::warn!(
                    conversation_id = %context.id,
                    error = %err,
                    "context corrupted; resetting conversation"
                );
                *context = ConversationContext::new(context.id.clone());
                topic::advance(&mut context.topic, &entry, completed, self.policy);
                // A fresh context has no prior entry to conflict with.
                let _ = context.push(entry, self.max_entries);
                true
            }
        }
    }

    /// Drop every expired conversation. Returns how many were removed.
    /// Contexts currently locked by an in-flight turn are left alone.
    pub async fn expire_stale(&self) -> usize {
        let mut map = self.conversations.write().await;
        let before = map.len();
        map.retain(|_, handle| !is_stale(handle, self.ttl));
        let removed = before - map.len();
        if removed > 0 {
            tracing::debug!(removed, "swept expired conversations");
        }
        removed
    }

    /// Explicitly end a conversation. Returns whether it existed.
    pub async fn close(&self, id: &ConversationId) -> bool {
        self.conversations.write().await.remove(id).is_some()
    }

    /// Number of live conversations (stale ones included until swept).
    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Check expiry without blocking: a context locked by an in-flight turn is
/// by definition not stale.
fn is_stale(handle: &ContextHandle, ttl: Duration) -> bool {
    match handle.try_lock() {
        Ok(guard) => guard.is_expired(Utc::now(), ttl),
        Err(_) => false,
    }
}
