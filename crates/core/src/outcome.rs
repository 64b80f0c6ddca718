//! Tier outcomes and the final turn result.

use crate::error::TierFailure;
use crate::request::{EntityMap, IntentCategory, Tier};
use crate::scenario::ScenarioType;
use serde::{Deserialize, Serialize};

/// A successful tier execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierSuccess {
    /// The raw response text (persona shaping happens downstream).
    pub text: String,

    /// Whether the handler considers the player's task complete
    /// (drives the Closing phase transition).
    #[serde(default)]
    pub completed: bool,

    /// Prompt tokens consumed, when the tier reports them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_in: Option<u32>,

    /// Completion tokens produced, when the tier reports them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_out: Option<u32>,
}

impl TierSuccess {
    /// A plain text success with no token accounting.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            completed: false,
            tokens_in: None,
            tokens_out: None,
        }
    }
}

/// What executing a tier produced: a payload, or a typed failure the
/// router recovers from.
pub type TierOutcome = std::result::Result<TierSuccess, TierFailure>;

/// The structured result handed back to the external response formatter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    /// The response text (possibly the fixed safe fallback).
    pub response: String,

    /// The tier that actually answered; `None` means the turn was exhausted
    /// and the fixed fallback was served.
    pub tier_used: Option<Tier>,

    /// Classified intent, for the formatter and telemetry.
    pub intent: IntentCategory,

    /// Extracted entities, for the formatter.
    pub entities: EntityMap,

    /// The scenario detected at tier 3, if that tier ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<ScenarioType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_helper_defaults() {
        let s = TierSuccess::text("hello");
        assert_eq!(s.text, "hello");
        assert!(!s.completed);
        assert!(s.tokens_in.is_none());
    }

    #[test]
    fn outcome_is_result() {
        let ok: TierOutcome = Ok(TierSuccess::text("fine"));
        let err: TierOutcome = Err(TierFailure::Timeout("slow".into()));
        assert!(ok.is_ok());
        assert!(err.is_err());
    }
}
