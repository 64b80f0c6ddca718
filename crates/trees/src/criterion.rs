//! Branch predicates.
//!
//! Criteria are pure functions of the classified request and the
//! conversation context. They never touch the clock, the network, or any
//! mutable state, so a tree walk over the same inputs always takes the
//! same path.

use ekimate_core::{
    ClassifiedRequest, ComplexityLevel, ConversationContext, ConversationPhase, EntityKind,
    IntentCategory,
};
use serde::{Deserialize, Serialize};

/// A branch predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "criterion", rename_all = "snake_case")]
pub enum Criterion {
    /// The classified intent equals the given one.
    IntentIs { intent: IntentCategory },
    /// An entity of the given kind was extracted.
    HasEntity { kind: EntityKind },
    /// The entity of the given kind equals the given value.
    EntityEquals { kind: EntityKind, value: String },
    /// The lowercased request text contains any of the given phrases.
    TextContainsAny { phrases: Vec<String> },
    /// Classified complexity is at most the given level.
    ComplexityAtMost { level: ComplexityLevel },
    /// The conversation is in the given phase.
    PhaseIs { phase: ConversationPhase },
    /// The conversation has at least one completed turn.
    HasHistory,
}

impl Criterion {
    /// Evaluate the predicate.
    pub fn matches(&self, request: &ClassifiedRequest, context: &ConversationContext) -> bool {
        match self {
            Self::IntentIs { intent } => request.intent == *intent,
            Self::HasEntity { kind } => request.entities.contains_key(kind),
            Self::EntityEquals { kind, value } => request.entity(*kind) == Some(value.as_str()),
            Self::TextContainsAny { phrases } => {
                let lower = request.text_lower();
                phrases.iter().any(|p| lower.contains(p.as_str()))
            }
            Self::ComplexityAtMost { level } => request.complexity <= *level,
            Self::PhaseIs { phase } => context.topic.phase == *phase,
            Self::HasHistory => !context.entries.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ekimate_core::{ConversationId, EntityMap, GameSnapshot, PlayerRequest, Tier};

    fn classified(text: &str, intent: IntentCategory) -> ClassifiedRequest {
        let mut entities = EntityMap::new();
        entities.insert(EntityKind::Destination, "odawara".into());
        ClassifiedRequest {
            request: PlayerRequest::new(text, GameSnapshot::default()),
            intent,
            complexity: ComplexityLevel::Simple,
            entities,
            selected_tier: Tier::Tier1,
        }
    }

    #[test]
    fn entity_predicates() {
        let req = classified("ticket to Odawara", IntentCategory::VocabularyHelp);
        let ctx = ConversationContext::new(ConversationId::new());

        assert!(Criterion::HasEntity { kind: EntityKind::Destination }.matches(&req, &ctx));
        assert!(!Criterion::HasEntity { kind: EntityKind::VocabWord }.matches(&req, &ctx));
        assert!(
            Criterion::EntityEquals {
                kind: EntityKind::Destination,
                value: "odawara".into()
            }
            .matches(&req, &ctx)
        );
    }

    #[test]
    fn text_predicate_is_case_insensitive() {
        let req = classified("BUY a Ticket", IntentCategory::VocabularyHelp);
        let ctx = ConversationContext::new(ConversationId::new());
        let crit = Criterion::TextContainsAny {
            phrases: vec!["buy".into()],
        };
        assert!(crit.matches(&req, &ctx));
    }

    #[test]
    fn criteria_deserialize_from_tree_data() {
        // The tag and the entity-kind field must not collide.
        let crit: Criterion =
            serde_json::from_str(r#"{ "criterion": "has_entity", "kind": "destination" }"#)
                .unwrap();
        assert!(matches!(crit, Criterion::HasEntity { kind: EntityKind::Destination }));

        let round_trip = serde_json::to_string(&Criterion::EntityEquals {
            kind: EntityKind::Destination,
            value: "odawara".into(),
        })
        .unwrap();
        assert!(round_trip.contains("\"criterion\":\"entity_equals\""));
    }

    #[test]
    fn complexity_bound() {
        let req = classified("x", IntentCategory::GeneralHint);
        let ctx = ConversationContext::new(ConversationId::new());
        assert!(
            Criterion::ComplexityAtMost { level: ComplexityLevel::Moderate }.matches(&req, &ctx)
        );
    }
}
