//! Intent scoring, complexity estimation, and tier selection.

use crate::entities::EntityMatcher;
use ekimate_config::ClassifierConfig;
use ekimate_core::{
    ClassifiedRequest, ComplexityLevel, ConversationContext, EntityKind, EntityMap,
    IntentCategory, PlayerRequest, Tier,
};

/// Keyword tables per intent. Matches are substring checks on the
/// lowercased text, so multi-word phrases work.
const VOCAB_KEYWORDS: &[&str] = &[
    "mean",
    "meaning",
    "word for",
    "vocabulary",
    "how do i say",
    "how to say",
    "what is the word",
    "buy a ticket",
    "buy the ticket",
];

const GRAMMAR_KEYWORDS: &[&str] = &[
    "grammar",
    "particle",
    "conjugate",
    "conjugation",
    "polite form",
    "sentence structure",
    "tense",
    "why is it",
];

const DIRECTION_KEYWORDS: &[&str] = &[
    "where is",
    "where are",
    "how do i get",
    "how to get",
    "which way",
    "direction",
    "find the",
    "way to",
];

const TRANSLATION_KEYWORDS: &[&str] = &[
    "did i say",
    "is this correct",
    "is that correct",
    "is this right",
    "am i saying",
    "check my",
    "translate",
    "translation",
];

const HINT_KEYWORDS: &[&str] = &[
    "what should i do",
    "what do i do",
    "what now",
    "next step",
    "hint",
    "help me",
    "stuck",
];

/// Direct patterns a tier-1 tree answers verbatim. A hit keeps complexity
/// at Simple regardless of other signals.
const DIRECT_PATTERNS: &[&str] = &[
    "how do i buy a ticket",
    "how do i buy the ticket",
    "what does",
    "where is the",
    "how do i get to",
    "how do i say",
];

/// Scoring order doubles as the final tie-break order: when scores and
/// context offer no preference, the earliest listed intent wins, and
/// GeneralHint is listed last on purpose.
const SCORED_INTENTS: [IntentCategory; 5] = [
    IntentCategory::VocabularyHelp,
    IntentCategory::GrammarExplanation,
    IntentCategory::DirectionGuidance,
    IntentCategory::TranslationConfirmation,
    IntentCategory::GeneralHint,
];

/// The classifier. Pure and synchronous; never fails.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    weights: ClassifierConfig,
    matcher: EntityMatcher,
}

impl IntentClassifier {
    pub fn new(weights: ClassifierConfig) -> Self {
        Self {
            weights,
            matcher: EntityMatcher::new(),
        }
    }

    /// Classify a request, optionally informed by conversation context.
    pub fn classify(
        &self,
        request: &PlayerRequest,
        context: Option<&ConversationContext>,
    ) -> ClassifiedRequest {
        let lower = request.text.to_lowercase();
        let entities = self.matcher.extract(&request.text);

        let intent = self.score_intent(&lower, &entities, context);
        let complexity = self.estimate_complexity(&lower, &entities, intent, context);
        let selected_tier = self.select_tier(complexity, intent, context);

        tracing::debug!(
            request_id = %request.id,
            intent = %intent,
            complexity = ?complexity,
            tier = %selected_tier,
            entity_count = entities.len(),
            "classified request"
        );

        ClassifiedRequest {
            request: request.clone(),
            intent,
            complexity,
            entities,
            selected_tier,
        }
    }

    fn score_intent(
        &self,
        lower: &str,
        entities: &EntityMap,
        context: Option<&ConversationContext>,
    ) -> IntentCategory {
        let kw = self.weights.keyword_weight;
        let boost = self.weights.entity_boost;

        let mut scores = [0.0f32; 5];
        for (i, intent) in SCORED_INTENTS.iter().enumerate() {
            let keywords = match intent {
                IntentCategory::VocabularyHelp => VOCAB_KEYWORDS,
                IntentCategory::GrammarExplanation => GRAMMAR_KEYWORDS,
                IntentCategory::DirectionGuidance => DIRECTION_KEYWORDS,
                IntentCategory::TranslationConfirmation => TRANSLATION_KEYWORDS,
                IntentCategory::GeneralHint => HINT_KEYWORDS,
            };
            scores[i] = keywords.iter().filter(|k| lower.contains(*k)).count() as f32 * kw;
        }

        // Entity-presence boosts.
        if entities.contains_key(&EntityKind::VocabWord)
            || entities.contains_key(&EntityKind::TicketType)
        {
            scores[0] += boost;
        }
        if entities.contains_key(&EntityKind::GrammarPoint) {
            scores[1] += boost;
        }
        // A destination in a purchase question supports the vocabulary
        // path ("how do I ask for a ticket to X"), not navigation.
        let ticketish = lower.contains("ticket") || lower.contains("buy");
        if entities.contains_key(&EntityKind::Destination) {
            if ticketish {
                scores[0] += boost;
            } else {
                scores[2] += boost;
            }
        }
        if entities.contains_key(&EntityKind::LocationRef) {
            scores[2] += boost;
        }

        let best = scores.iter().cloned().fold(0.0f32, f32::max);
        if best <= 0.0 {
            return IntentCategory::GeneralHint;
        }

        let tied: Vec<IntentCategory> = SCORED_INTENTS
            .iter()
            .enumerate()
            .filter(|(i, _)| (scores[*i] - best).abs() < f32::EPSILON)
            .map(|(_, intent)| *intent)
            .collect();

        if tied.len() == 1 {
            return tied[0];
        }

        // Continuity bias: among tied intents, prefer the one the
        // conversation was most recently about.
        if let Some(ctx) = context {
            for entry in ctx.entries.iter().rev() {
                if tied.contains(&entry.intent) {
                    return entry.intent;
                }
            }
        }

        tied[0]
    }

    fn estimate_complexity(
        &self,
        lower: &str,
        entities: &EntityMap,
        intent: IntentCategory,
        context: Option<&ConversationContext>,
    ) -> ComplexityLevel {
        let direct = DIRECT_PATTERNS.iter().any(|p| lower.contains(p));

        let mut complexity = if direct {
            ComplexityLevel::Simple
        } else if intent == IntentCategory::GeneralHint && entities.is_empty() {
            // Nothing concrete to anchor a canned answer on.
            ComplexityLevel::Complex
        } else if !entities.is_empty() {
            ComplexityLevel::Moderate
        } else {
            ComplexityLevel::Complex
        };

        // Context dependency: an unresolved sub-topic means the request
        // probably leans on earlier turns.
        if let Some(ctx) = context {
            if !ctx.topic.pending_subtopics.is_empty() {
                complexity = complexity.raised();
            }
        }

        complexity
    }

    fn select_tier(
        &self,
        complexity: ComplexityLevel,
        intent: IntentCategory,
        context: Option<&ConversationContext>,
    ) -> Tier {
        let mut tier = match complexity {
            ComplexityLevel::Simple => Tier::Tier1,
            ComplexityLevel::Moderate => Tier::Tier2,
            ComplexityLevel::Complex => Tier::Tier3,
        };

        // Escalation memory: same-topic turns never drop below the floor
        // the conversation already climbed to.
        if let Some(ctx) = context {
            if ctx.topic.active_intent == Some(intent) {
                if let Some(floor) = ctx.topic.escalation_floor {
                    tier = tier.max(floor);
                }
            }
        }

        tier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ekimate_core::{ContextEntry, ConversationId, GameSnapshot};

    fn classifier() -> IntentClassifier {
        IntentClassifier::new(ClassifierConfig::default())
    }

    fn req(text: &str) -> PlayerRequest {
        PlayerRequest::new(text, GameSnapshot::default())
    }

    fn entry(intent: IntentCategory, tier_used: Option<Tier>) -> ContextEntry {
        ContextEntry {
            request_text: "earlier".into(),
            response_text: "answer".into(),
            timestamp: Utc::now(),
            intent,
            entities: EntityMap::new(),
            tier_selected: Tier::Tier1,
            tier_used,
        }
    }

    #[test]
    fn direct_ticket_question_is_simple_tier1() {
        let c = classifier().classify(&req("How do I buy a ticket to Odawara?"), None);
        assert_eq!(c.intent, IntentCategory::VocabularyHelp);
        assert_eq!(c.complexity, ComplexityLevel::Simple);
        assert_eq!(c.selected_tier, Tier::Tier1);
        assert_eq!(c.entity(EntityKind::Destination), Some("odawara"));
    }

    #[test]
    fn direction_question_scores_direction() {
        let c = classifier().classify(&req("Where is the ticket machine?"), None);
        assert_eq!(c.intent, IntentCategory::DirectionGuidance);
        assert_eq!(c.selected_tier, Tier::Tier1);
    }

    #[test]
    fn ambiguous_text_defaults_safe() {
        let c = classifier().classify(&req("ehhh umm"), None);
        assert_eq!(c.intent, IntentCategory::GeneralHint);
        assert_eq!(c.complexity, ComplexityLevel::Complex);
        assert_eq!(c.selected_tier, Tier::Tier3);
    }

    #[test]
    fn classification_is_deterministic() {
        let c = classifier();
        let a = c.classify(&req("What does kippu mean?"), None);
        let b = c.classify(&req("What does kippu mean?"), None);
        assert_eq!(a.intent, b.intent);
        assert_eq!(a.complexity, b.complexity);
        assert_eq!(a.selected_tier, b.selected_tier);
        assert_eq!(a.entities, b.entities);
    }

    #[test]
    fn escalation_floor_raises_same_topic_tier() {
        let mut ctx = ConversationContext::new(ConversationId::new());
        ctx.topic.active_intent = Some(IntentCategory::VocabularyHelp);
        ctx.topic.escalation_floor = Some(Tier::Tier3);

        let c = classifier().classify(&req("How do I buy a ticket to Odawara?"), Some(&ctx));
        assert_eq!(c.intent, IntentCategory::VocabularyHelp);
        // Simple on its own merits, but the floor wins.
        assert_eq!(c.selected_tier, Tier::Tier3);
    }

    #[test]
    fn floor_ignored_on_different_topic() {
        let mut ctx = ConversationContext::new(ConversationId::new());
        ctx.topic.active_intent = Some(IntentCategory::GrammarExplanation);
        ctx.topic.escalation_floor = Some(Tier::Tier3);

        let c = classifier().classify(&req("Where is the exit?"), Some(&ctx));
        assert_eq!(c.intent, IntentCategory::DirectionGuidance);
        assert_eq!(c.selected_tier, Tier::Tier1);
    }

    #[test]
    fn pending_subtopic_raises_complexity() {
        let mut ctx = ConversationContext::new(ConversationId::new());
        ctx.topic.pending_subtopics.push("platform number".into());

        let c = classifier().classify(&req("Where is the ticket machine?"), Some(&ctx));
        assert_eq!(c.complexity, ComplexityLevel::Moderate);
        assert_eq!(c.selected_tier, Tier::Tier2);
    }

    #[test]
    fn continuity_bias_breaks_ties() {
        let mut ctx = ConversationContext::new(ConversationId::new());
        ctx.push(
            entry(IntentCategory::GrammarExplanation, Some(Tier::Tier1)),
            10,
        )
        .unwrap();

        // One vocabulary keyword, one grammar keyword, no entities: a
        // genuine tie. Recent context should pick grammar.
        let text = "Is that the right word for this tense?";
        let c = classifier().classify(&req(text), Some(&ctx));
        assert_eq!(c.intent, IntentCategory::GrammarExplanation);

        // Without context the tie falls to the fixed order.
        let c = classifier().classify(&req(text), None);
        assert_eq!(c.intent, IntentCategory::VocabularyHelp);
    }
}
