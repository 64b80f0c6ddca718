//! Scenario handlers and the dispatch registry.
//!
//! Every handler follows the same recipe: build a bounded prompt (persona,
//! scenario instructions, a short context window, the current request and
//! game state), call the remote model, validate the output. The scenarios
//! differ only in their instruction block and whether they report task
//! completion, so one `PromptHandler` type covers all of them.

use async_trait::async_trait;
use ekimate_config::{ConfigError, PromptConfig};
use ekimate_core::{
    ClassifiedRequest, ConversationContext, GenerationParams, ModelClient, ScenarioType,
    TierFailure, TierOutcome, TierSuccess,
};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

/// Shared persona preamble for every remote prompt.
const PERSONA: &str = "You are Hachiko, a friendly dog companion helping an \
English-speaking player navigate a Japanese train station and practice \
simple Japanese. Answer in 2-4 short sentences, warm and encouraging, \
with romaji for any Japanese you teach.";

const TICKET_INSTRUCTIONS: &str = "The player is trying to buy a train ticket. \
Walk them through the purchase: which machine or counter, what to press or \
say in Japanese, and the romaji phrase for their destination and ticket type.";

const NAVIGATION_INSTRUCTIONS: &str = "The player is trying to find their way \
inside the station. Give concrete directions using station landmarks \
(gates, platforms, signs) and teach the one Japanese word most useful here.";

const VOCABULARY_INSTRUCTIONS: &str = "The player is asking about a Japanese \
word. Give its meaning, the romaji, and one short example sentence they \
could use in the station.";

const GRAMMAR_INSTRUCTIONS: &str = "The player is asking about Japanese \
grammar. Explain the pattern simply, without linguistic jargon, and show \
one station-related example.";

const CULTURAL_INSTRUCTIONS: &str = "The player is curious about Japanese \
customs. Give a brief, respectful explanation tied to what they can see \
around the station.";

const GENERIC_INSTRUCTIONS: &str = "Help the player with whatever they are \
asking, staying in the station setting.";

/// A tier-3 handler for one scenario.
#[async_trait]
pub trait ScenarioHandler: Send + Sync {
    fn scenario(&self) -> ScenarioType;

    async fn handle(
        &self,
        request: &ClassifiedRequest,
        context: &ConversationContext,
    ) -> TierOutcome;
}

/// The one concrete handler shape: instructions + a remote client.
pub struct PromptHandler {
    scenario: ScenarioType,
    instructions: &'static str,
    /// Transaction-style scenarios report completion so the conversation
    /// can move to Closing.
    reports_completion: bool,
    client: Arc<dyn ModelClient>,
    params: GenerationParams,
    history_window: usize,
    max_response_chars: usize,
}

impl PromptHandler {
    pub fn new(
        scenario: ScenarioType,
        instructions: &'static str,
        reports_completion: bool,
        client: Arc<dyn ModelClient>,
        params: GenerationParams,
        prompt: &PromptConfig,
    ) -> Self {
        Self {
            scenario,
            instructions,
            reports_completion,
            client,
            params,
            history_window: prompt.history_window,
            max_response_chars: prompt.max_response_chars,
        }
    }

    /// Assemble the bounded prompt.
    fn build_prompt(&self, request: &ClassifiedRequest, context: &ConversationContext) -> String {
        let mut prompt = String::new();
        prompt.push_str(PERSONA);
        prompt.push_str("\n\n");
        prompt.push_str(self.instructions);
        prompt.push('\n');

        let game = &request.request.game;
        if !game.location.is_empty() {
            let _ = writeln!(prompt, "The player is at: {}.", game.location);
        }
        if !game.objective.is_empty() {
            let _ = writeln!(prompt, "Their current objective: {}.", game.objective);
        }

        let recent = context.recent(self.history_window);
        if !recent.is_empty() {
            prompt.push_str("\nRecent conversation:\n");
            for entry in recent {
                let _ = writeln!(prompt, "Player: {}", entry.request_text);
                let _ = writeln!(prompt, "You: {}", entry.response_text);
            }
        }

        let _ = write!(prompt, "\nPlayer: {}", request.request.text);
        prompt
    }
}

#[async_trait]
impl ScenarioHandler for PromptHandler {
    fn scenario(&self) -> ScenarioType {
        self.scenario
    }

    async fn handle(
        &self,
        request: &ClassifiedRequest,
        context: &ConversationContext,
    ) -> TierOutcome {
        let prompt = self.build_prompt(request, context);

        tracing::debug!(
            scenario = %self.scenario,
            model = %self.params.model,
            prompt_chars = prompt.len(),
            "dispatching remote scenario call"
        );

        let output = self
            .client
            .generate(&prompt, &self.params)
            .await
            .map_err(|e| e.into_tier_failure())?;

        let text = output.text.trim();
        if text.is_empty() {
            return Err(TierFailure::MalformedOutput(format!(
                "{} handler got an empty response",
                self.scenario
            )));
        }
        let chars = text.chars().count();
        if chars > self.max_response_chars {
            return Err(TierFailure::MalformedOutput(format!(
                "{} handler response too long ({chars} chars)",
                self.scenario
            )));
        }

        Ok(TierSuccess {
            text: text.to_string(),
            completed: self.reports_completion,
            tokens_in: output.tokens_in,
            tokens_out: output.tokens_out,
        })
    }
}

/// Maps every scenario to its handler. Built once at startup; an
/// incomplete map refuses to start rather than failing mid-conversation.
pub struct HandlerRegistry {
    handlers: HashMap<ScenarioType, Arc<dyn ScenarioHandler>>,
}

impl HandlerRegistry {
    /// Build from an explicit handler list, verifying completeness.
    pub fn new(handlers: Vec<Arc<dyn ScenarioHandler>>) -> Result<Self, ConfigError> {
        let map: HashMap<ScenarioType, Arc<dyn ScenarioHandler>> =
            handlers.into_iter().map(|h| (h.scenario(), h)).collect();

        let mut required: Vec<ScenarioType> = ScenarioType::DETECTION_ORDER.to_vec();
        required.push(ScenarioType::Unknown);
        for scenario in required {
            if !map.contains_key(&scenario) {
                return Err(ConfigError::ValidationError(format!(
                    "no handler registered for scenario '{scenario}'"
                )));
            }
        }

        Ok(Self { handlers: map })
    }

    /// The standard registry: every scenario backed by the given remote
    /// client.
    pub fn with_client(
        client: Arc<dyn ModelClient>,
        params: GenerationParams,
        prompt: &PromptConfig,
    ) -> Result<Self, ConfigError> {
        let specs: [(ScenarioType, &'static str, bool); 6] = [
            (ScenarioType::TicketPurchase, TICKET_INSTRUCTIONS, true),
            (ScenarioType::Navigation, NAVIGATION_INSTRUCTIONS, false),
            (ScenarioType::VocabularyHelp, VOCABULARY_INSTRUCTIONS, false),
            (ScenarioType::GrammarExplanation, GRAMMAR_INSTRUCTIONS, false),
            (ScenarioType::CulturalInformation, CULTURAL_INSTRUCTIONS, false),
            (ScenarioType::Unknown, GENERIC_INSTRUCTIONS, false),
        ];

        let handlers = specs
            .into_iter()
            .map(|(scenario, instructions, completes)| {
                Arc::new(PromptHandler::new(
                    scenario,
                    instructions,
                    completes,
                    Arc::clone(&client),
                    params.clone(),
                    prompt,
                )) as Arc<dyn ScenarioHandler>
            })
            .collect();

        Self::new(handlers)
    }

    /// Dispatch a request to its scenario's handler.
    pub async fn dispatch(
        &self,
        scenario: ScenarioType,
        request: &ClassifiedRequest,
        context: &ConversationContext,
    ) -> TierOutcome {
        match self.handlers.get(&scenario) {
            Some(handler) => handler.handle(request, context).await,
            // Unreachable after a completeness-checked build.
            None => Err(TierFailure::ServiceUnavailable(format!(
                "no handler for scenario '{scenario}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ekimate_core::{
        ComplexityLevel, ContextEntry, ConversationId, EntityMap, GameSnapshot, IntentCategory,
        ModelError, ModelOutput, PlayerRequest, Tier,
    };

    struct CannedClient {
        reply: String,
    }

    #[async_trait]
    impl ModelClient for CannedClient {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> std::result::Result<ModelOutput, ModelError> {
            Ok(ModelOutput {
                text: self.reply.clone(),
                tokens_in: Some(100),
                tokens_out: Some(20),
            })
        }
    }

    fn classified(text: &str) -> ClassifiedRequest {
        ClassifiedRequest {
            request: PlayerRequest::new(text, GameSnapshot::default()),
            intent: IntentCategory::VocabularyHelp,
            complexity: ComplexityLevel::Complex,
            entities: EntityMap::new(),
            selected_tier: Tier::Tier3,
        }
    }

    fn entry(text: &str) -> ContextEntry {
        ContextEntry {
            request_text: text.into(),
            response_text: format!("re: {text}"),
            timestamp: Utc::now(),
            intent: IntentCategory::VocabularyHelp,
            entities: EntityMap::new(),
            tier_selected: Tier::Tier1,
            tier_used: Some(Tier::Tier1),
        }
    }

    fn registry(reply: &str) -> HandlerRegistry {
        HandlerRegistry::with_client(
            Arc::new(CannedClient {
                reply: reply.into(),
            }),
            GenerationParams::default(),
            &PromptConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn dispatch_returns_handler_output() {
        let reg = registry("Kippu means ticket!");
        let ctx = ConversationContext::new(ConversationId::new());
        let out = reg
            .dispatch(ScenarioType::VocabularyHelp, &classified("kippu?"), &ctx)
            .await
            .unwrap();
        assert_eq!(out.text, "Kippu means ticket!");
        assert!(!out.completed);
        assert_eq!(out.tokens_in, Some(100));
    }

    #[tokio::test]
    async fn ticket_purchase_reports_completion() {
        let reg = registry("Press the button for Odawara.");
        let ctx = ConversationContext::new(ConversationId::new());
        let out = reg
            .dispatch(ScenarioType::TicketPurchase, &classified("ticket"), &ctx)
            .await
            .unwrap();
        assert!(out.completed);
    }

    #[tokio::test]
    async fn empty_output_is_malformed() {
        let reg = registry("   ");
        let ctx = ConversationContext::new(ConversationId::new());
        let err = reg
            .dispatch(ScenarioType::Unknown, &classified("hi"), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, TierFailure::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn overlong_output_is_malformed() {
        let reg = registry(&"a".repeat(5_000));
        let ctx = ConversationContext::new(ConversationId::new());
        let err = reg
            .dispatch(ScenarioType::Navigation, &classified("where"), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, TierFailure::MalformedOutput(_)));
    }

    #[test]
    fn incomplete_registry_rejected() {
        let handler = PromptHandler::new(
            ScenarioType::Navigation,
            NAVIGATION_INSTRUCTIONS,
            false,
            Arc::new(CannedClient { reply: "x".into() }),
            GenerationParams::default(),
            &PromptConfig::default(),
        );
        let err = HandlerRegistry::new(vec![Arc::new(handler)]);
        assert!(matches!(err, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn prompt_window_is_bounded() {
        let handler = PromptHandler::new(
            ScenarioType::VocabularyHelp,
            VOCABULARY_INSTRUCTIONS,
            false,
            Arc::new(CannedClient { reply: "x".into() }),
            GenerationParams::default(),
            &PromptConfig {
                history_window: 3,
                max_response_chars: 2_000,
            },
        );

        let mut ctx = ConversationContext::new(ConversationId::new());
        for i in 0..6 {
            ctx.push(entry(&format!("turn {i}")), 50).unwrap();
        }

        let prompt = handler.build_prompt(&classified("what about eki?"), &ctx);
        assert!(!prompt.contains("turn 2"));
        assert!(prompt.contains("turn 3"));
        assert!(prompt.contains("turn 5"));
        assert!(prompt.contains("what about eki?"));
    }
}
