//! Topic state transitions.
//!
//! Applied once per completed turn, after the router has produced the
//! entry. The rules are small enough to keep in one place:
//!
//! - first substantive turn: Opening -> Gathering
//! - successful turn on the active topic: -> Assisting
//! - handler reports completion: -> Closing
//! - intent differs and no pending sub-topic refers to it: topic switch,
//!   back to Gathering, escalation floor handled per policy
//! - exhausted turn (fixed fallback served): the topic stays unresolved
//!   and is parked as a pending sub-topic

use ekimate_core::{ContextEntry, ConversationPhase, TopicState};

/// What happens to the escalation floor when the topic switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationPolicy {
    /// Forget the floor entirely.
    Reset,
    /// Park the floor with its topic; restore it if the conversation
    /// comes back to that topic.
    Suspend,
}

impl EscalationPolicy {
    /// Parse the config string. Unknown values were already rejected by
    /// config validation; fall back to Reset defensively anyway.
    pub fn from_config(s: &str) -> Self {
        match s {
            "suspend" => Self::Suspend,
            _ => Self::Reset,
        }
    }
}

/// Advance the topic state for a completed turn.
///
/// `completed` comes from the tier outcome (transaction handlers report
/// it); `entry.tier_used = None` marks an exhausted turn.
pub fn advance(topic: &mut TopicState, entry: &ContextEntry, completed: bool, policy: EscalationPolicy) {
    let switching = match topic.active_intent {
        Some(active) => active != entry.intent && !topic.references(entry.intent),
        None => false,
    };

    if switching {
        switch_topic(topic, entry, policy);
    } else if topic.active_intent.is_none() {
        topic.active_intent = Some(entry.intent);
        topic.phase = ConversationPhase::Gathering;
    }

    match entry.tier_used {
        Some(tier) => {
            // Escalation memory: the topic never drops below the tier that
            // actually answered it.
            topic.escalation_floor = Some(match topic.escalation_floor {
                Some(floor) => floor.max(tier),
                None => tier,
            });
            topic.phase = if completed {
                ConversationPhase::Closing
            } else {
                ConversationPhase::Assisting
            };
            // A successful answer resolves any sub-topic on this intent.
            let needle = entry.intent.to_string();
            topic.pending_subtopics.retain(|s| !s.contains(&needle));
        }
        None => {
            // Fixed fallback served: the question is still open.
            let marker = entry.intent.to_string();
            if !topic.pending_subtopics.contains(&marker) {
                topic.pending_subtopics.push(marker);
            }
        }
    }
}

fn switch_topic(topic: &mut TopicState, entry: &ContextEntry, policy: EscalationPolicy) {
    let old_intent = topic.active_intent;
    let old_floor = topic.escalation_floor.take();

    // Returning to a suspended topic restores its floor; read this before
    // the outgoing topic overwrites the parked slot.
    let restored = match topic.suspended_floor {
        Some((intent, floor)) if intent == entry.intent => Some(floor),
        _ => None,
    };

    match policy {
        EscalationPolicy::Reset => {
            topic.suspended_floor = None;
        }
        EscalationPolicy::Suspend => {
            topic.suspended_floor = match (old_intent, old_floor) {
                (Some(intent), Some(floor)) => Some((intent, floor)),
                _ => None,
            };
        }
    }

    topic.escalation_floor = restored;
    topic.active_intent = Some(entry.intent);
    topic.phase = ConversationPhase::Gathering;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ekimate_core::{EntityMap, IntentCategory, Tier};

    fn entry(intent: IntentCategory, tier_used: Option<Tier>) -> ContextEntry {
        ContextEntry {
            request_text: "q".into(),
            response_text: "a".into(),
            timestamp: Utc::now(),
            intent,
            entities: EntityMap::new(),
            tier_selected: Tier::Tier1,
            tier_used,
        }
    }

    #[test]
    fn first_turn_opens_then_gathers_then_assists() {
        let mut topic = TopicState::default();
        assert_eq!(topic.phase, ConversationPhase::Opening);

        advance(
            &mut topic,
            &entry(IntentCategory::VocabularyHelp, Some(Tier::Tier1)),
            false,
            EscalationPolicy::Reset,
        );
        assert_eq!(topic.active_intent, Some(IntentCategory::VocabularyHelp));
        assert_eq!(topic.phase, ConversationPhase::Assisting);
        assert_eq!(topic.escalation_floor, Some(Tier::Tier1));
    }

    #[test]
    fn floor_only_rises() {
        let mut topic = TopicState::default();
        let policy = EscalationPolicy::Reset;
        advance(&mut topic, &entry(IntentCategory::VocabularyHelp, Some(Tier::Tier3)), false, policy);
        advance(&mut topic, &entry(IntentCategory::VocabularyHelp, Some(Tier::Tier1)), false, policy);
        assert_eq!(topic.escalation_floor, Some(Tier::Tier3));
    }

    #[test]
    fn completion_closes() {
        let mut topic = TopicState::default();
        advance(
            &mut topic,
            &entry(IntentCategory::VocabularyHelp, Some(Tier::Tier3)),
            true,
            EscalationPolicy::Reset,
        );
        assert_eq!(topic.phase, ConversationPhase::Closing);
    }

    #[test]
    fn topic_switch_resets_floor_under_reset_policy() {
        let mut topic = TopicState::default();
        let policy = EscalationPolicy::Reset;
        advance(&mut topic, &entry(IntentCategory::VocabularyHelp, Some(Tier::Tier3)), false, policy);
        advance(&mut topic, &entry(IntentCategory::DirectionGuidance, Some(Tier::Tier1)), false, policy);

        assert_eq!(topic.active_intent, Some(IntentCategory::DirectionGuidance));
        assert_eq!(topic.escalation_floor, Some(Tier::Tier1));
    }

    #[test]
    fn suspend_policy_restores_floor_on_return() {
        let mut topic = TopicState::default();
        let policy = EscalationPolicy::Suspend;
        advance(&mut topic, &entry(IntentCategory::VocabularyHelp, Some(Tier::Tier3)), false, policy);
        advance(&mut topic, &entry(IntentCategory::DirectionGuidance, Some(Tier::Tier1)), false, policy);
        assert_eq!(topic.escalation_floor, Some(Tier::Tier1));

        advance(&mut topic, &entry(IntentCategory::VocabularyHelp, Some(Tier::Tier1)), false, policy);
        // Back on the old topic: the parked Tier3 floor applies again.
        assert_eq!(topic.escalation_floor, Some(Tier::Tier3));
    }

    #[test]
    fn exhausted_turn_parks_subtopic() {
        let mut topic = TopicState::default();
        advance(
            &mut topic,
            &entry(IntentCategory::GrammarExplanation, None),
            false,
            EscalationPolicy::Reset,
        );
        assert_eq!(topic.pending_subtopics, vec!["grammar_explanation".to_string()]);

        // A later success on the same intent resolves it.
        advance(
            &mut topic,
            &entry(IntentCategory::GrammarExplanation, Some(Tier::Tier2)),
            false,
            EscalationPolicy::Reset,
        );
        assert!(topic.pending_subtopics.is_empty());
    }
}
