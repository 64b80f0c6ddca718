//! Request domain types.
//!
//! These are the value objects that flow through the pipeline:
//! the player asks something → the classifier attaches intent, complexity,
//! entities, and a tier → the router executes the cheapest capable tier.

use crate::context::ConversationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A snapshot of the game state at the moment of the request,
/// supplied by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// Where the player currently is (e.g. "ticket_gate", "platform_2").
    pub location: String,

    /// The active objective (e.g. "buy_ticket_to_odawara").
    pub objective: String,
}

/// The language the player typed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputLanguage {
    English,
    Japanese,
    /// Romaji or mixed-script input.
    Mixed,
}

/// An immutable player request, as handed in by the external request handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRequest {
    /// Unique request ID.
    pub id: String,

    /// The raw player text.
    pub text: String,

    /// Declared input language.
    pub language: InputLanguage,

    /// Conversation this request belongs to. `None` starts a new one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,

    /// Game state at the time of the request.
    pub game: GameSnapshot,

    /// When the request was received.
    pub timestamp: DateTime<Utc>,
}

impl PlayerRequest {
    /// Create a new request with a fresh ID and the current time.
    pub fn new(text: impl Into<String>, game: GameSnapshot) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            language: InputLanguage::English,
            conversation_id: None,
            game,
            timestamp: Utc::now(),
        }
    }

    /// Attach a conversation ID (builder style).
    pub fn in_conversation(mut self, id: ConversationId) -> Self {
        self.conversation_id = Some(id);
        self
    }
}

/// The classified purpose of a player request. A closed set — the router's
/// transition tables match on this exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    /// Assistance with a specific word.
    VocabularyHelp,
    /// Explanation of a grammar pattern.
    GrammarExplanation,
    /// Help navigating the station.
    DirectionGuidance,
    /// Verification of the player's own translation.
    TranslationConfirmation,
    /// Suggestions on what to do next (also the safe default).
    GeneralHint,
}

impl std::fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VocabularyHelp => write!(f, "vocabulary_help"),
            Self::GrammarExplanation => write!(f, "grammar_explanation"),
            Self::DirectionGuidance => write!(f, "direction_guidance"),
            Self::TranslationConfirmation => write!(f, "translation_confirmation"),
            Self::GeneralHint => write!(f, "general_hint"),
        }
    }
}

/// How much reasoning a request needs. Ordered: Simple < Moderate < Complex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    Simple,
    Moderate,
    Complex,
}

impl ComplexityLevel {
    /// Bump complexity one level (saturating at Complex).
    pub fn raised(self) -> Self {
        match self {
            Self::Simple => Self::Moderate,
            Self::Moderate | Self::Complex => Self::Complex,
        }
    }
}

/// A processing tier. Ordered by cost/capability: Tier1 < Tier2 < Tier3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Deterministic decision trees.
    Tier1,
    /// Local model (Ollama).
    Tier2,
    /// Remote model, scenario-shaped prompts.
    Tier3,
}

impl Tier {
    /// The next more capable tier, if any.
    pub fn next(self) -> Option<Tier> {
        match self {
            Self::Tier1 => Some(Self::Tier2),
            Self::Tier2 => Some(Self::Tier3),
            Self::Tier3 => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tier1 => write!(f, "tier_1"),
            Self::Tier2 => write!(f, "tier_2"),
            Self::Tier3 => write!(f, "tier_3"),
        }
    }
}

/// The kind of a lexically extracted entity. Keys of the entity map are
/// unique: one normalized value per kind per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A station/place the player wants to reach (e.g. "odawara").
    Destination,
    /// A vocabulary word being asked about (e.g. "kippu").
    VocabWord,
    /// A grammar particle or pattern (e.g. "wa").
    GrammarPoint,
    /// A ticket category (e.g. "one-way").
    TicketType,
    /// A station fixture (e.g. "platform", "ticket machine").
    LocationRef,
}

/// Typed entities extracted from the request text, normalized lowercase.
/// `BTreeMap` keeps iteration deterministic for tree criteria and prompts.
pub type EntityMap = BTreeMap<EntityKind, String>;

/// A request annotated with intent, complexity, entities, and the tier the
/// classifier selected. Produced once per request; immutable thereafter.
/// The router never writes its overrides back here — they land on the
/// `ContextEntry` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedRequest {
    /// The original request.
    pub request: PlayerRequest,

    /// Classified intent.
    pub intent: IntentCategory,

    /// Estimated complexity.
    pub complexity: ComplexityLevel,

    /// Extracted entities (kind → normalized value).
    pub entities: EntityMap,

    /// The tier the classifier selected. The router may still escalate.
    pub selected_tier: Tier,
}

impl ClassifiedRequest {
    /// The entity value for a kind, if extracted.
    pub fn entity(&self, kind: EntityKind) -> Option<&str> {
        self.entities.get(&kind).map(String::as_str)
    }

    /// Lowercased request text, for keyword predicates.
    pub fn text_lower(&self) -> String {
        self.request.text.to_lowercase()
    }
}
