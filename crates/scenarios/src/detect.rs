//! Fixed-priority scenario detection.

use ekimate_core::{ClassifiedRequest, ConversationContext, EntityKind, IntentCategory, ScenarioType};

struct Rule {
    scenario: ScenarioType,
    /// Intent the request must carry, if any.
    intent: Option<IntentCategory>,
    /// Entity kinds, at least one of which must be present, if any.
    entities: &'static [EntityKind],
    /// Keywords, at least one of which must appear, if any.
    keywords: &'static [&'static str],
}

impl Rule {
    fn matches(&self, request: &ClassifiedRequest, lower: &str) -> bool {
        if let Some(intent) = self.intent {
            if request.intent != intent {
                return false;
            }
        }
        if !self.entities.is_empty()
            && !self.entities.iter().any(|k| request.entities.contains_key(k))
        {
            return false;
        }
        if !self.keywords.is_empty() && !self.keywords.iter().any(|k| lower.contains(k)) {
            return false;
        }
        true
    }
}

/// Rules in detection priority order. First match wins, so the ticket rule
/// outranks navigation even when a request mentions both.
const RULES: &[Rule] = &[
    Rule {
        scenario: ScenarioType::TicketPurchase,
        intent: None,
        entities: &[EntityKind::Destination, EntityKind::TicketType],
        keywords: &["ticket", "buy", "fare", "kippu"],
    },
    Rule {
        scenario: ScenarioType::Navigation,
        intent: Some(IntentCategory::DirectionGuidance),
        entities: &[],
        keywords: &[],
    },
    Rule {
        scenario: ScenarioType::VocabularyHelp,
        intent: Some(IntentCategory::VocabularyHelp),
        entities: &[],
        keywords: &[],
    },
    Rule {
        scenario: ScenarioType::GrammarExplanation,
        intent: Some(IntentCategory::GrammarExplanation),
        entities: &[],
        keywords: &[],
    },
    Rule {
        scenario: ScenarioType::CulturalInformation,
        intent: None,
        entities: &[],
        keywords: &["culture", "custom", "etiquette", "polite", "bow", "why do people"],
    },
];

/// Pick the scenario for a tier-3 request. `Unknown` when nothing matches;
/// the generic handler still serves it.
pub fn detect(request: &ClassifiedRequest, _context: &ConversationContext) -> ScenarioType {
    let lower = request.text_lower();
    RULES
        .iter()
        .find(|rule| rule.matches(request, &lower))
        .map(|rule| rule.scenario)
        .unwrap_or(ScenarioType::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ekimate_core::{
        ComplexityLevel, ConversationId, EntityMap, GameSnapshot, PlayerRequest, Tier,
    };

    fn classified(text: &str, intent: IntentCategory, entities: EntityMap) -> ClassifiedRequest {
        ClassifiedRequest {
            request: PlayerRequest::new(text, GameSnapshot::default()),
            intent,
            complexity: ComplexityLevel::Complex,
            entities,
            selected_tier: Tier::Tier3,
        }
    }

    fn ctx() -> ConversationContext {
        ConversationContext::new(ConversationId::new())
    }

    #[test]
    fn ticket_purchase_beats_navigation() {
        let mut entities = EntityMap::new();
        entities.insert(EntityKind::Destination, "odawara".into());
        // Direction intent, but the ticket keyword plus a destination makes
        // this a purchase.
        let req = classified(
            "Which machine sells a ticket to Odawara?",
            IntentCategory::DirectionGuidance,
            entities,
        );
        assert_eq!(detect(&req, &ctx()), ScenarioType::TicketPurchase);
    }

    #[test]
    fn direction_intent_is_navigation() {
        let req = classified(
            "Which way to the north exit?",
            IntentCategory::DirectionGuidance,
            EntityMap::new(),
        );
        assert_eq!(detect(&req, &ctx()), ScenarioType::Navigation);
    }

    #[test]
    fn cultural_keywords_detected() {
        let req = classified(
            "Why do people bow at the gate?",
            IntentCategory::GeneralHint,
            EntityMap::new(),
        );
        assert_eq!(detect(&req, &ctx()), ScenarioType::CulturalInformation);
    }

    #[test]
    fn nothing_matches_yields_unknown() {
        let req = classified("hmm", IntentCategory::GeneralHint, EntityMap::new());
        assert_eq!(detect(&req, &ctx()), ScenarioType::Unknown);
    }

    #[test]
    fn detection_is_stable() {
        let mut entities = EntityMap::new();
        entities.insert(EntityKind::TicketType, "one-way".into());
        let req = classified(
            "one-way fare please",
            IntentCategory::VocabularyHelp,
            entities,
        );
        assert_eq!(detect(&req, &ctx()), detect(&req, &ctx()));
        assert_eq!(detect(&req, &ctx()), ScenarioType::TicketPurchase);
    }
}
