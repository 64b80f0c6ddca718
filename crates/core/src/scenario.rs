//! Scenario types for tier-3 prompt shaping.
//!
//! A scenario is a higher-level, cross-cutting request pattern detected only
//! at the remote tier to pick a specialized handler. Derived per request and
//! never persisted beyond the current turn.

use serde::{Deserialize, Serialize};

/// The closed set of tier-3 scenarios, in detection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioType {
    TicketPurchase,
    Navigation,
    VocabularyHelp,
    GrammarExplanation,
    CulturalInformation,
    /// No scenario matched; the generic handler still makes the remote call,
    /// just without scenario-specific prompt shaping.
    Unknown,
}

impl ScenarioType {
    /// All scenarios in fixed detection order. First match wins; this order
    /// is a tie-break policy and must not change.
    pub const DETECTION_ORDER: [ScenarioType; 5] = [
        ScenarioType::TicketPurchase,
        ScenarioType::Navigation,
        ScenarioType::VocabularyHelp,
        ScenarioType::GrammarExplanation,
        ScenarioType::CulturalInformation,
    ];
}

impl std::fmt::Display for ScenarioType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TicketPurchase => write!(f, "ticket_purchase"),
            Self::Navigation => write!(f, "navigation"),
            Self::VocabularyHelp => write!(f, "vocabulary_help"),
            Self::GrammarExplanation => write!(f, "grammar_explanation"),
            Self::CulturalInformation => write!(f, "cultural_information"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}
