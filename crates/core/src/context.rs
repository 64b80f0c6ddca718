//! Conversation context domain types.
//!
//! A `ConversationContext` is the ordered history and topic state of one
//! ongoing player-companion exchange. The store in `ekimate-context` owns
//! the mutability discipline; the types here enforce the per-context
//! invariants: append-only entries, FIFO eviction, monotonic timestamps.

use crate::error::ContextError;
use crate::request::{EntityMap, IntentCategory, Tier};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One completed turn: what the player asked, what was answered, and which
/// tier actually answered it. `tier_used = None` records an exhausted turn
/// where the fixed safe fallback was served.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    /// The player's request text.
    pub request_text: String,

    /// The response that was returned.
    pub response_text: String,

    /// When the turn completed.
    pub timestamp: DateTime<Utc>,

    /// Classified intent of the turn.
    pub intent: IntentCategory,

    /// Entities extracted for the turn.
    pub entities: EntityMap,

    /// The tier the classifier originally selected.
    pub tier_selected: Tier,

    /// The tier that actually produced the response (router override visible
    /// here, never on the `ClassifiedRequest`).
    pub tier_used: Option<Tier>,
}

/// Where the conversation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationPhase {
    /// No substantive request classified yet.
    Opening,
    /// Collecting what the player needs.
    Gathering,
    /// A tier has produced a successful outcome.
    Assisting,
    /// A handler reported the task complete.
    Closing,
}

/// Multi-turn topic tracking: the active topic, unresolved sub-topics, the
/// conversation phase, and the escalation floor (the cheapest tier the next
/// same-topic turn may select).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicState {
    /// The intent the conversation is currently about.
    pub active_intent: Option<IntentCategory>,

    /// Unresolved sub-topics, most recent last.
    pub pending_subtopics: Vec<String>,

    /// Conversation phase.
    pub phase: ConversationPhase,

    /// Escalation memory: turns on this topic never select a cheaper tier.
    pub escalation_floor: Option<Tier>,

    /// Floor parked by a topic switch under the "suspend" policy, restored
    /// if the conversation returns to `suspended_intent`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspended_floor: Option<(IntentCategory, Tier)>,
}

impl Default for TopicState {
    fn default() -> Self {
        Self {
            active_intent: None,
            pending_subtopics: Vec::new(),
            phase: ConversationPhase::Opening,
            escalation_floor: None,
            suspended_floor: None,
        }
    }
}

impl TopicState {
    /// Whether any pending sub-topic mentions the given intent.
    pub fn references(&self, intent: IntentCategory) -> bool {
        let needle = intent.to_string();
        self.pending_subtopics.iter().any(|s| s.contains(&needle))
    }
}

/// The ordered history and topic state of one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Conversation ID.
    pub id: ConversationId,

    /// Ordered turn history, oldest first. Bounded by the store's cap.
    pub entries: VecDeque<ContextEntry>,

    /// When the conversation was created.
    pub created_at: DateTime<Utc>,

    /// Last read or write. Drives time-based expiry.
    pub last_touched: DateTime<Utc>,

    /// Topic tracking state.
    pub topic: TopicState,
}

impl ConversationContext {
    /// Create a fresh context for a conversation.
    pub fn new(id: ConversationId) -> Self {
        let now = Utc::now();
        Self {
            id,
            entries: VecDeque::new(),
            created_at: now,
            last_touched: now,
            topic: TopicState::default(),
        }
    }

    /// Append a turn, evicting the oldest entry past `max_entries`.
    ///
    /// Rejects an entry whose timestamp precedes the last one — that is a
    /// corruption signal, and the store responds by resetting the context.
    pub fn push(&mut self, entry: ContextEntry, max_entries: usize) -> Result<(), ContextError> {
        if let Some(last) = self.entries.back() {
            if entry.timestamp < last.timestamp {
                return Err(ContextError::Corrupted {
                    conversation_id: self.id.to_string(),
                    reason: format!(
                        "append at {} precedes last entry at {}",
                        entry.timestamp, last.timestamp
                    ),
                });
            }
        }

        self.entries.push_back(entry);
        while self.entries.len() > max_entries {
            self.entries.pop_front();
        }
        self.last_touched = Utc::now();
        Ok(())
    }

    /// Mark the context as accessed now.
    pub fn touch(&mut self) {
        self.last_touched = Utc::now();
    }

    /// Whether the context has gone stale.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_touched > ttl
    }

    /// The most recent `n` entries, oldest first (for prompt windows).
    pub fn recent(&self, n: usize) -> Vec<&ContextEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).collect()
    }

    /// The last entry on the given intent, if any.
    pub fn last_on_intent(&self, intent: IntentCategory) -> Option<&ContextEntry> {
        self.entries.iter().rev().find(|e| e.intent == intent)
    }
}
