//! The built-in tree set and response template table.
//!
//! These cover the requests a station companion answers constantly: ticket
//! purchases, directions inside the station, and a small core vocabulary
//! and particle glossary. Anything outside them falls through to the model
//! tiers.

use crate::criterion::Criterion;
use crate::{DecisionTree, TreeNode};
use ekimate_core::EntityKind;
use std::collections::HashMap;

fn branch(criterion: Criterion, on_true: &str, on_false: &str) -> TreeNode {
    TreeNode::Branch {
        criterion,
        on_true: on_true.to_string(),
        on_false: on_false.to_string(),
    }
}

fn leaf(template: &str) -> TreeNode {
    TreeNode::Leaf {
        template: template.to_string(),
        params: HashMap::new(),
    }
}

fn leaf_with(template: &str, key: &str, value: &str) -> TreeNode {
    TreeNode::Leaf {
        template: template.to_string(),
        params: [(key.to_string(), value.to_string())].into(),
    }
}

/// The built-in trees.
pub fn trees() -> Vec<DecisionTree> {
    vec![
        ticket_purchase(),
        directions(),
        vocabulary(),
        grammar(),
    ]
}

fn ticket_purchase() -> DecisionTree {
    DecisionTree {
        id: "ticket_purchase".into(),
        version: 1,
        root: "has_destination".into(),
        nodes: [
            (
                "has_destination".to_string(),
                branch(
                    Criterion::HasEntity {
                        kind: EntityKind::Destination,
                    },
                    "has_type",
                    "generic",
                ),
            ),
            (
                "has_type".to_string(),
                branch(
                    Criterion::HasEntity {
                        kind: EntityKind::TicketType,
                    },
                    "typed",
                    "plain",
                ),
            ),
            ("typed".to_string(), leaf("ticket_typed")),
            ("plain".to_string(), leaf("ticket_plain")),
            ("generic".to_string(), leaf("ticket_generic")),
        ]
        .into(),
    }
}

fn directions() -> DecisionTree {
    DecisionTree {
        id: "directions".into(),
        version: 1,
        root: "has_fixture".into(),
        nodes: [
            (
                "has_fixture".to_string(),
                branch(
                    Criterion::HasEntity {
                        kind: EntityKind::LocationRef,
                    },
                    "fixture",
                    "has_destination",
                ),
            ),
            (
                "has_destination".to_string(),
                branch(
                    Criterion::HasEntity {
                        kind: EntityKind::Destination,
                    },
                    "destination",
                    "generic",
                ),
            ),
            ("fixture".to_string(), leaf("direction_fixture")),
            ("destination".to_string(), leaf("direction_destination")),
            ("generic".to_string(), leaf("direction_generic")),
        ]
        .into(),
    }
}

/// Vocabulary glossary tree. Known words resolve to a definition leaf;
/// an unknown word reaches a leaf whose `{definition}` stays unresolved,
/// which fails the walk and sends the request up a tier.
fn vocabulary() -> DecisionTree {
    let words = [
        ("kippu", "ticket"),
        ("densha", "train"),
        ("eki", "station"),
        ("sumimasen", "excuse me"),
        ("arigatou", "thank you"),
    ];

    let mut nodes: HashMap<String, TreeNode> = HashMap::new();
    nodes.insert(
        "has_word".into(),
        branch(
            Criterion::HasEntity {
                kind: EntityKind::VocabWord,
            },
            "check_0",
            "ask_word",
        ),
    );
    nodes.insert("ask_word".into(), leaf("vocab_prompt"));

    for (i, (word, definition)) in words.iter().enumerate() {
        let next = if i + 1 < words.len() {
            format!("check_{}", i + 1)
        } else {
            "unknown".to_string()
        };
        nodes.insert(
            format!("check_{i}"),
            branch(
                Criterion::EntityEquals {
                    kind: EntityKind::VocabWord,
                    value: (*word).to_string(),
                },
                &format!("def_{i}"),
                &next,
            ),
        );
        nodes.insert(
            format!("def_{i}"),
            leaf_with("vocab_def", "definition", definition),
        );
    }
    nodes.insert("unknown".into(), leaf("vocab_def"));

    DecisionTree {
        id: "vocabulary".into(),
        version: 1,
        root: "has_word".into(),
        nodes,
    }
}

/// Particle glossary, same shape as the vocabulary tree.
fn grammar() -> DecisionTree {
    let particles = [
        ("wa", "marks the topic of the sentence"),
        ("ga", "marks the grammatical subject"),
        ("ni", "marks a destination or a point in time"),
        ("wo", "marks the direct object of a verb"),
        ("de", "marks where an action takes place"),
    ];

    let mut nodes: HashMap<String, TreeNode> = HashMap::new();
    nodes.insert(
        "has_point".into(),
        branch(
            Criterion::HasEntity {
                kind: EntityKind::GrammarPoint,
            },
            "check_0",
            "ask_point",
        ),
    );
    nodes.insert("ask_point".into(), leaf("grammar_prompt"));

    for (i, (particle, explanation)) in particles.iter().enumerate() {
        let next = if i + 1 < particles.len() {
            format!("check_{}", i + 1)
        } else {
            "unknown".to_string()
        };
        nodes.insert(
            format!("check_{i}"),
            branch(
                Criterion::EntityEquals {
                    kind: EntityKind::GrammarPoint,
                    value: (*particle).to_string(),
                },
                &format!("def_{i}"),
                &next,
            ),
        );
        nodes.insert(
            format!("def_{i}"),
            leaf_with("grammar_def", "explanation", explanation),
        );
    }
    nodes.insert("unknown".into(), leaf("grammar_def"));

    DecisionTree {
        id: "grammar".into(),
        version: 1,
        root: "has_point".into(),
        nodes,
    }
}

/// The response template table.
pub fn templates() -> HashMap<String, String> {
    [
        (
            "ticket_typed",
            "To buy a {ticket_type} ticket to {destination}, use the ticket machine near the gates. \
             You can say: \"{destination} made no kippu o kudasai.\"",
        ),
        (
            "ticket_plain",
            "To buy a ticket to {destination}, use the ticket machine near the gates. \
             You can say: \"{destination} made no kippu o kudasai.\"",
        ),
        (
            "ticket_generic",
            "You can buy tickets at the ticket machine or the ticket office. \
             Tell me where you're headed and I'll help with the wording.",
        ),
        (
            "direction_fixture",
            "Look for the overhead signs. The {location_ref} is marked from the main concourse.",
        ),
        (
            "direction_destination",
            "Trains toward {destination} are listed on the departure board. \
             Find your train there, then follow the signs to its platform.",
        ),
        (
            "direction_generic",
            "Follow the overhead signs. The departure board lists every platform and destination.",
        ),
        (
            "vocab_def",
            "\"{vocab_word}\" means {definition}. Try it in your next sentence!",
        ),
        (
            "vocab_prompt",
            "Tell me the word you're curious about and I'll explain it.",
        ),
        (
            "grammar_def",
            "The particle \"{grammar_point}\" {explanation}.",
        ),
        (
            "grammar_prompt",
            "Which particle or pattern should I explain?",
        ),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_leaf_template_exists() {
        let templates = templates();
        for tree in trees() {
            for node in tree.nodes.values() {
                if let TreeNode::Leaf { template, .. } = node {
                    assert!(templates.contains_key(template), "missing {template}");
                }
            }
        }
    }

    #[test]
    fn builtin_tree_ids() {
        let ids: Vec<String> = trees().into_iter().map(|t| t.id).collect();
        assert!(ids.contains(&"ticket_purchase".to_string()));
        assert!(ids.contains(&"directions".to_string()));
        assert!(ids.contains(&"vocabulary".to_string()));
        assert!(ids.contains(&"grammar".to_string()));
    }
}
