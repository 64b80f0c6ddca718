//! Decision tree engine for tier-1 responses.
//!
//! Trees are validated once at startup (unknown node references, cycles,
//! over-deep paths, dangling templates all refuse to load) and traversed
//! iteratively with a hard step bound at evaluation time. A broken walk is
//! a tier failure the router escalates past, never a panic.

pub mod builtin;
pub mod criterion;

pub use criterion::Criterion;

use ekimate_config::{ConfigError, TreeConfig};
use ekimate_core::{
    ClassifiedRequest, ConversationContext, EntityKind, IntentCategory, TierFailure, TierOutcome,
    TierSuccess,
};
use std::collections::{HashMap, HashSet};

/// A node in a decision tree, keyed by id in the tree's node map.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    /// Internal node: evaluate the criterion, follow one of two children.
    Branch {
        criterion: Criterion,
        on_true: String,
        on_false: String,
    },
    /// Terminal node: render the named template with the given params.
    Leaf {
        template: String,
        #[serde(default)]
        params: HashMap<String, String>,
    },
}

/// A named, versioned decision tree.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub id: String,
    pub version: u32,
    pub root: String,
    pub nodes: HashMap<String, TreeNode>,
}

/// The loaded tree set plus the response template table.
#[derive(Debug)]
pub struct TreeRegistry {
    trees: HashMap<String, DecisionTree>,
    templates: HashMap<String, String>,
    max_depth: usize,
}

impl TreeRegistry {
    /// Build a registry from trees and templates, validating everything.
    pub fn new(
        trees: Vec<DecisionTree>,
        templates: HashMap<String, String>,
        config: &TreeConfig,
    ) -> Result<Self, ConfigError> {
        let registry = Self {
            trees: trees.into_iter().map(|t| (t.id.clone(), t)).collect(),
            templates,
            max_depth: config.max_depth,
        };
        registry.validate()?;
        Ok(registry)
    }

    /// The built-in tree set.
    pub fn builtin(config: &TreeConfig) -> Result<Self, ConfigError> {
        Self::new(builtin::trees(), builtin::templates(), config)
    }

    /// Which tree answers this request, if any. `None` means tier 1 has
    /// nothing canned for the intent and the router should escalate.
    pub fn tree_for(&self, request: &ClassifiedRequest) -> Option<&str> {
        let lower = request.text_lower();
        let ticketish = lower.contains("ticket") || lower.contains("buy");
        if ticketish
            && (request.entities.contains_key(&EntityKind::Destination)
                || request.entities.contains_key(&EntityKind::TicketType))
        {
            return self.trees.get("ticket_purchase").map(|t| t.id.as_str());
        }

        let id = match request.intent {
            IntentCategory::DirectionGuidance => "directions",
            IntentCategory::VocabularyHelp => "vocabulary",
            IntentCategory::GrammarExplanation => "grammar",
            IntentCategory::TranslationConfirmation | IntentCategory::GeneralHint => return None,
        };
        self.trees.get(id).map(|t| t.id.as_str())
    }

    /// Walk a tree and render the reached leaf.
    pub fn evaluate(
        &self,
        tree_id: &str,
        request: &ClassifiedRequest,
        context: &ConversationContext,
    ) -> TierOutcome {
        let tree = self.trees.get(tree_id).ok_or_else(|| {
            TierFailure::MalformedOutput(format!("unknown decision tree '{tree_id}'"))
        })?;

        let mut node_id = tree.root.as_str();
        for _ in 0..self.max_depth {
            match tree.nodes.get(node_id) {
                Some(TreeNode::Branch {
                    criterion,
                    on_true,
                    on_false,
                }) => {
                    node_id = if criterion.matches(request, context) {
                        on_true
                    } else {
                        on_false
                    };
                }
                Some(TreeNode::Leaf { template, params }) => {
                    let text = self.render(template, params, request)?;
                    tracing::debug!(
                        tree = %tree_id,
                        leaf = %node_id,
                        template = %template,
                        "decision tree resolved"
                    );
                    return Ok(TierSuccess::text(text));
                }
                None => {
                    return Err(TierFailure::MalformedOutput(format!(
                        "tree '{tree_id}' references missing node '{node_id}'"
                    )));
                }
            }
        }

        Err(TierFailure::MalformedOutput(format!(
            "tree '{tree_id}' exceeded max depth {}",
            self.max_depth
        )))
    }

    /// Render a template, filling `{placeholders}` from leaf params, the
    /// extracted entities, and the game snapshot. An unresolved placeholder
    /// fails the walk so the router escalates instead of serving a hole.
    fn render(
        &self,
        template_id: &str,
        params: &HashMap<String, String>,
        request: &ClassifiedRequest,
    ) -> Result<String, TierFailure> {
        let template = self.templates.get(template_id).ok_or_else(|| {
            TierFailure::MalformedOutput(format!("missing response template '{template_id}'"))
        })?;

        let mut out = String::with_capacity(template.len());
        let mut rest = template.as_str();
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                return Err(TierFailure::MalformedOutput(format!(
                    "template '{template_id}' has an unterminated placeholder"
                )));
            };
            let key = &after[..end];
            let value = params
                .get(key)
                .map(String::as_str)
                .or_else(|| entity_value(request, key))
                .or_else(|| snapshot_value(request, key))
                .ok_or_else(|| {
                    TierFailure::MalformedOutput(format!(
                        "template '{template_id}' placeholder '{{{key}}}' has no value"
                    ))
                })?;
            out.push_str(value);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Validate every tree: root exists, all references resolve, no cycles,
    /// no path deeper than max_depth, every leaf template defined.
    fn validate(&self) -> Result<(), ConfigError> {
        for tree in self.trees.values() {
            self.validate_tree(tree)?;
        }
        Ok(())
    }

    fn validate_tree(&self, tree: &DecisionTree) -> Result<(), ConfigError> {
        // Iterative DFS carrying the path for cycle and depth detection.
        let mut stack: Vec<(String, Vec<String>)> = vec![(tree.root.clone(), Vec::new())];
        let mut seen: HashSet<String> = HashSet::new();

        while let Some((node_id, path)) = stack.pop() {
            if path.contains(&node_id) {
                return Err(ConfigError::ValidationError(format!(
                    "tree '{}' has a cycle through node '{node_id}'",
                    tree.id
                )));
            }
            if path.len() >= self.max_depth {
                return Err(ConfigError::ValidationError(format!(
                    "tree '{}' exceeds max depth {} at node '{node_id}'",
                    tree.id, self.max_depth
                )));
            }

            let node = tree.nodes.get(&node_id).ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "tree '{}' references unknown node '{node_id}'",
                    tree.id
                ))
            })?;
            seen.insert(node_id.clone());

            match node {
                TreeNode::Branch {
                    on_true, on_false, ..
                } => {
                    let mut child_path = path;
                    child_path.push(node_id);
                    stack.push((on_true.clone(), child_path.clone()));
                    stack.push((on_false.clone(), child_path));
                }
                TreeNode::Leaf { template, .. } => {
                    if !self.templates.contains_key(template) {
                        return Err(ConfigError::ValidationError(format!(
                            "tree '{}' leaf '{node_id}' references undefined template '{template}'",
                            tree.id
                        )));
                    }
                }
            }
        }

        // Orphan nodes are not an error, but they are worth a warning.
        for id in tree.nodes.keys() {
            if !seen.contains(id) {
                tracing::warn!(tree = %tree.id, node = %id, "unreachable tree node");
            }
        }

        Ok(())
    }
}

fn entity_value<'a>(request: &'a ClassifiedRequest, key: &str) -> Option<&'a str> {
    let kind = match key {
        "destination" => EntityKind::Destination,
        "vocab_word" => EntityKind::VocabWord,
        "grammar_point" => EntityKind::GrammarPoint,
        "ticket_type" => EntityKind::TicketType,
        "location_ref" => EntityKind::LocationRef,
        _ => return None,
    };
    request.entity(kind)
}

fn snapshot_value<'a>(request: &'a ClassifiedRequest, key: &str) -> Option<&'a str> {
    match key {
        "location" => Some(request.request.game.location.as_str()),
        "objective" => Some(request.request.game.objective.as_str()),
        _ => None,
    }
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
            complexity: ComplexityLevel::Simple,
            entities,
            selected_tier: Tier::Tier1,
        }
    }

    fn registry() -> TreeRegistry {
        TreeRegistry::builtin(&TreeConfig::default()).unwrap()
    }

    #[test]
    fn builtin_trees_validate() {
        registry();
    }

    #[test]
    fn ticket_tree_renders_destination() {
        let reg = registry();
        let mut entities = EntityMap::new();
        entities.insert(EntityKind::Destination, "odawara".into());
        let req = classified(
            "How do I buy a ticket to Odawara?",
            IntentCategory::VocabularyHelp,
            entities,
        );
        let ctx = ConversationContext::new(ConversationId::new());

        assert_eq!(reg.tree_for(&req), Some("ticket_purchase"));
        let out = reg.evaluate("ticket_purchase", &req, &ctx).unwrap();
        assert!(out.text.to_lowercase().contains("odawara"));
        assert!(!out.completed);
    }

    #[test]
    fn same_input_same_output() {
        let reg = registry();
        let mut entities = EntityMap::new();
        entities.insert(EntityKind::Destination, "odawara".into());
        let req = classified(
            "How do I buy a ticket to Odawara?",
            IntentCategory::VocabularyHelp,
            entities,
        );
        let ctx = ConversationContext::new(ConversationId::new());

        let a = reg.evaluate("ticket_purchase", &req, &ctx).unwrap();
        let b = reg.evaluate("ticket_purchase", &req, &ctx).unwrap();
        assert_eq!(a.text, b.text);
    }

    #[test]
    fn unknown_vocab_word_fails_walk() {
        let reg = registry();
        let mut entities = EntityMap::new();
        entities.insert(EntityKind::VocabWord, "zenzen".into());
        let req = classified(
            "What does zenzen mean?",
            IntentCategory::VocabularyHelp,
            entities,
        );
        let ctx = ConversationContext::new(ConversationId::new());

        let err = reg.evaluate("vocabulary", &req, &ctx).unwrap_err();
        assert!(matches!(err, TierFailure::MalformedOutput(_)));
    }

    #[test]
    fn known_vocab_word_resolves() {
        let reg = registry();
        let mut entities = EntityMap::new();
        entities.insert(EntityKind::VocabWord, "kippu".into());
        let req = classified(
            "What does kippu mean?",
            IntentCategory::VocabularyHelp,
            entities,
        );
        let ctx = ConversationContext::new(ConversationId::new());

        let out = reg.evaluate("vocabulary", &req, &ctx).unwrap();
        assert!(out.text.contains("ticket"));
    }

    #[test]
    fn unknown_tree_id_is_malformed_output() {
        let reg = registry();
        let req = classified("hi", IntentCategory::GeneralHint, EntityMap::new());
        let ctx = ConversationContext::new(ConversationId::new());
        let err = reg.evaluate("no_such_tree", &req, &ctx).unwrap_err();
        assert!(matches!(err, TierFailure::MalformedOutput(_)));
    }

    #[test]
    fn no_tree_for_general_hint() {
        let reg = registry();
        let req = classified("help me", IntentCategory::GeneralHint, EntityMap::new());
        assert_eq!(reg.tree_for(&req), None);
    }

    #[test]
    fn cycle_rejected_at_load() {
        let tree = DecisionTree {
            id: "looped".into(),
            version: 1,
            root: "a".into(),
            nodes: [
                (
                    "a".to_string(),
                    TreeNode::Branch {
                        criterion: Criterion::HasHistory,
                        on_true: "b".into(),
                        on_false: "b".into(),
                    },
                ),
                (
                    "b".to_string(),
                    TreeNode::Branch {
                        criterion: Criterion::HasHistory,
                        on_true: "a".into(),
                        on_false: "a".into(),
                    },
                ),
            ]
            .into(),
        };
        let err = TreeRegistry::new(vec![tree], HashMap::new(), &TreeConfig::default());
        assert!(matches!(err, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn dangling_node_rejected_at_load() {
        let tree = DecisionTree {
            id: "dangling".into(),
            version: 1,
            root: "missing".into(),
            nodes: HashMap::new(),
        };
        let err = TreeRegistry::new(vec![tree], HashMap::new(), &TreeConfig::default());
        assert!(matches!(err, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn undefined_template_rejected_at_load() {
        let tree = DecisionTree {
            id: "bad_leaf".into(),
            version: 1,
            root: "leaf".into(),
            nodes: [(
                "leaf".to_string(),
                TreeNode::Leaf {
                    template: "nope".into(),
                    params: HashMap::new(),
                },
            )]
            .into(),
        };
        let err = TreeRegistry::new(vec![tree], HashMap::new(), &TreeConfig::default());
        assert!(matches!(err, Err(ConfigError::ValidationError(_))));
    }
}
