//! Tier routing and the turn pipeline.
//!
//! The router owns the fallback state machine: attempt the selected tier,
//! escalate on failure, degrade gracefully when the last tier fails. It
//! guarantees the caller a response for every request, whatever breaks
//! underneath.

pub mod pipeline;
mod tiers;

pub use pipeline::Pipeline;

use ekimate_config::RouterConfig;
use ekimate_core::{
    ClassifiedRequest, ConversationContext, GenerationParams, ModelClient, ScenarioType, Tier,
    TierFailure,
};
use ekimate_scenarios::HandlerRegistry;
use ekimate_trees::TreeRegistry;
use ekimate_usage::UsageGuard;
use std::sync::Arc;
use std::time::Duration;
use tiers::{Tier1Executor, Tier2Executor, Tier3Executor};

/// What routing produced for one turn.
#[derive(Debug, Clone)]
pub struct RoutedTurn {
    /// The response text. Never empty; the fixed fallback covers the
    /// exhausted case.
    pub response: String,
    /// The tier whose output is being served. `None` means every tier
    /// failed and the fixed fallback was used.
    pub tier_used: Option<Tier>,
    /// The scenario detected, if tier 3 was attempted.
    pub scenario: Option<ScenarioType>,
    /// Whether a handler reported the player's task complete.
    pub completed: bool,
}

/// Where the state machine ends up, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteState {
    Succeeded(Tier),
    Degraded,
    Exhausted,
}

/// The tier router.
pub struct Router {
    tier1: Tier1Executor,
    tier2: Tier2Executor,
    tier3: Tier3Executor,
    tier1_timeout: Duration,
    tier2_timeout: Duration,
    tier3_enabled: bool,
    fallback_response: String,
}

impl Router {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &RouterConfig,
        trees: Arc<TreeRegistry>,
        tier2_client: Arc<dyn ModelClient>,
        tier2_params: GenerationParams,
        handlers: HandlerRegistry,
        guard: Arc<UsageGuard>,
        tier3_model: String,
        history_window: usize,
        max_response_chars: usize,
    ) -> Self {
        Self {
            tier1: Tier1Executor::new(trees),
            tier2: Tier2Executor::new(
                tier2_client,
                tier2_params,
                history_window,
                max_response_chars,
            ),
            tier3: Tier3Executor::new(
                handlers,
                guard,
                tier3_model,
                Duration::from_millis(config.tier3_timeout_ms),
            ),
            tier1_timeout: Duration::from_millis(config.tier1_timeout_ms),
            tier2_timeout: Duration::from_millis(config.tier2_timeout_ms),
            tier3_enabled: config.tier3_enabled,
            fallback_response: config.fallback_response.clone(),
        }
    }

    /// Drive a classified request through the fallback state machine.
    /// Always returns a response.
    pub async fn route(
        &self,
        request: &ClassifiedRequest,
        context: &ConversationContext,
    ) -> RoutedTurn {
        let mut tier = request.selected_tier;
        let mut best_effort: Option<String> = None;
        let mut scenario: Option<ScenarioType> = None;

        loop {
            tracing::debug!(request_id = %request.request.id, tier = %tier, "attempting tier");

            let outcome = match tier {
                Tier::Tier1 => {
                    match tokio::time::timeout(self.tier1_timeout, async {
                        self.tier1.attempt(request, context)
                    })
                    .await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => Err(TierFailure::Timeout("tier_1 deadline exceeded".into())),
                    }
                }
                Tier::Tier2 => {
                    match tokio::time::timeout(
                        self.tier2_timeout,
                        self.tier2.attempt(request, context),
                    )
                    .await
                    {
                        Ok((outcome, raw)) => {
                            if raw.is_some() {
                                best_effort = raw;
                            }
                            outcome
                        }
                        Err(_) => Err(TierFailure::Timeout("tier_2 deadline exceeded".into())),
                    }
                }
                Tier::Tier3 => {
                    let detected = ekimate_scenarios::detect(request, context);
                    scenario = Some(detected);
                    // The executor applies its own timeout so quota
                    // recording survives cancellation.
                    self.tier3.attempt(detected, request, context).await
                }
            };

            match outcome {
                Ok(success) => {
                    self.log_final(request, RouteState::Succeeded(tier));
                    return RoutedTurn {
                        response: success.text,
                        tier_used: Some(tier),
                        scenario,
                        completed: success.completed,
                    };
                }
                Err(failure) => {
                    tracing::warn!(
                        request_id = %request.request.id,
                        tier = %tier,
                        error = %failure,
                        "tier failed"
                    );
                    match tier {
                        Tier::Tier1 => tier = Tier::Tier2,
                        Tier::Tier2 => {
                            if self.tier3_enabled {
                                tier = Tier::Tier3;
                            } else {
                                self.log_final(request, RouteState::Exhausted);
                                return self.exhausted(scenario);
                            }
                        }
                        Tier::Tier3 => {
                            if let Some(text) = best_effort {
                                // The local model did produce something;
                                // a rough answer beats the canned apology.
                                self.log_final(request, RouteState::Degraded);
                                return RoutedTurn {
                                    response: text,
                                    tier_used: Some(Tier::Tier2),
                                    scenario,
                                    completed: false,
                                };
                            }
                            self.log_final(request, RouteState::Exhausted);
                            return self.exhausted(scenario);
                        }
                    }
                }
            }
        }
    }

    fn exhausted(&self, scenario: Option<ScenarioType>) -> RoutedTurn {
        RoutedTurn {
            response: self.fallback_response.clone(),
            tier_used: None,
            scenario,
            completed: false,
        }
    }

    fn log_final(&self, request: &ClassifiedRequest, state: RouteState) {
        match state {
            RouteState::Succeeded(tier) => {
                tracing::info!(
                    request_id = %request.request.id,
                    selected = %request.selected_tier,
                    tier_used = %tier,
                    "turn routed"
                );
            }
            RouteState::Degraded => {
                tracing::info!(
                    request_id = %request.request.id,
                    selected = %request.selected_tier,
                    "turn degraded to retained local output"
                );
            }
            RouteState::Exhausted => {
                tracing::warn!(
                    request_id = %request.request.id,
                    selected = %request.selected_tier,
                    "all tiers exhausted; serving fixed fallback"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ekimate_config::{PromptConfig, QuotaConfig, TreeConfig};
    use ekimate_core::{
        ComplexityLevel, ConversationId, EntityKind, EntityMap, GameSnapshot, IntentCategory,
        ModelError, ModelOutput, PlayerRequest,
    };
    use std::sync::Mutex;

    /// Always answers.
    struct SuccessClient {
        reply: String,
        calls: Mutex<usize>,
    }

    impl SuccessClient {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.into(),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl ModelClient for SuccessClient {
        fn name(&self) -> &str {
            "success"
        }

        async fn generate(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> std::result::Result<ModelOutput, ModelError> {
            *self.calls.lock().unwrap() += 1;
            Ok(ModelOutput {
                text: self.reply.clone(),
                tokens_in: Some(50),
                tokens_out: Some(10),
            })
        }
    }

    /// Always fails with a network error.
    struct FailingClient {
        calls: Mutex<usize>,
    }

    impl FailingClient {
        fn new() -> Self {
            Self {
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl ModelClient for FailingClient {
        fn name(&self) -> &str {
            "failing"
        }

        async fn generate(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> std::result::Result<ModelOutput, ModelError> {
            *self.calls.lock().unwrap() += 1;
            Err(ModelError::Network("connection refused".into()))
        }
    }

    /// Never returns within any reasonable deadline.
    struct HangingClient;

    #[async_trait]
    impl ModelClient for HangingClient {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn generate(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> std::result::Result<ModelOutput, ModelError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    fn router_config() -> RouterConfig {
        RouterConfig {
            tier1_timeout_ms: 150,
            tier2_timeout_ms: 200,
            tier3_timeout_ms: 200,
            tier3_enabled: true,
            fallback_response: "Hmm, I didn't quite catch that.".into(),
        }
    }

    fn build_router(
        config: RouterConfig,
        tier2: Arc<dyn ModelClient>,
        tier3: Arc<dyn ModelClient>,
        quota: QuotaConfig,
    ) -> Router {
        let trees = Arc::new(TreeRegistry::builtin(&TreeConfig::default()).unwrap());
        let guard = Arc::new(UsageGuard::new(quota));
        let prompt = PromptConfig::default();
        let handlers =
            HandlerRegistry::with_client(tier3, GenerationParams::default(), &prompt).unwrap();
        Router::new(
            &config,
            trees,
            tier2,
            GenerationParams::default(),
            handlers,
            guard,
            "test-model".into(),
            prompt.history_window,
            prompt.max_response_chars,
        )
    }

    fn classified(
        text: &str,
        intent: IntentCategory,
        tier: Tier,
        entities: EntityMap,
    ) -> ClassifiedRequest {
        ClassifiedRequest {
            request: PlayerRequest::new(text, GameSnapshot::default()),
            intent,
            complexity: ComplexityLevel::Simple,
            entities,
            selected_tier: tier,
        }
    }

    fn ctx() -> ConversationContext {
        ConversationContext::new(ConversationId::new())
    }

    fn odawara_request(tier: Tier) -> ClassifiedRequest {
        let mut entities = EntityMap::new();
        entities.insert(EntityKind::Destination, "odawara".into());
        classified(
            "How do I buy a ticket to Odawara?",
            IntentCategory::VocabularyHelp,
            tier,
            entities,
        )
    }

    #[tokio::test]
    async fn tier1_success_never_touches_models() {
        let tier2 = Arc::new(FailingClient::new());
        let tier3 = Arc::new(FailingClient::new());
        let router = build_router(
            router_config(),
            Arc::clone(&tier2) as Arc<dyn ModelClient>,
            Arc::clone(&tier3) as Arc<dyn ModelClient>,
            QuotaConfig::default(),
        );

        let turn = router.route(&odawara_request(Tier::Tier1), &ctx()).await;
        assert_eq!(turn.tier_used, Some(Tier::Tier1));
        assert!(turn.response.to_lowercase().contains("odawara"));
        assert_eq!(*tier2.calls.lock().unwrap(), 0);
        assert_eq!(*tier3.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn tier1_failure_escalates_to_tier2() {
        let tier2 = Arc::new(SuccessClient::new("The local model answers."));
        let tier3 = Arc::new(FailingClient::new());
        let router = build_router(
            router_config(),
            Arc::clone(&tier2) as Arc<dyn ModelClient>,
            tier3,
            QuotaConfig::default(),
        );

        // GeneralHint has no tier-1 tree.
        let req = classified(
            "help me",
            IntentCategory::GeneralHint,
            Tier::Tier1,
            EntityMap::new(),
        );
        let turn = router.route(&req, &ctx()).await;
        assert_eq!(turn.tier_used, Some(Tier::Tier2));
        assert_eq!(turn.response, "The local model answers.");
        assert_eq!(*tier2.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn full_escalation_reaches_tier3() {
        let tier2 = Arc::new(FailingClient::new());
        let tier3 = Arc::new(SuccessClient::new("Remote ticket help."));
        let router = build_router(
            router_config(),
            tier2,
            Arc::clone(&tier3) as Arc<dyn ModelClient>,
            QuotaConfig::default(),
        );

        let mut req = odawara_request(Tier::Tier1);
        // Force the tier-1 walk to fail: unknown vocab word, no tree match.
        req.intent = IntentCategory::TranslationConfirmation;
        req.entities.clear();
        req.request.text = "Did I say the ticket phrase right?".into();

        let turn = router.route(&req, &ctx()).await;
        assert_eq!(turn.tier_used, Some(Tier::Tier3));
        assert_eq!(turn.response, "Remote ticket help.");
        assert!(turn.scenario.is_some());
    }

    #[tokio::test]
    async fn total_outage_serves_fixed_fallback() {
        let router = build_router(
            router_config(),
            Arc::new(FailingClient::new()),
            Arc::new(FailingClient::new()),
            QuotaConfig::default(),
        );

        let req = classified(
            "help",
            IntentCategory::GeneralHint,
            Tier::Tier1,
            EntityMap::new(),
        );
        let turn = router.route(&req, &ctx()).await;
        assert_eq!(turn.tier_used, None);
        assert!(!turn.response.is_empty());
        assert_eq!(turn.response, "Hmm, I didn't quite catch that.");
    }

    #[tokio::test]
    async fn hanging_tier2_times_out_and_escalates() {
        let tier3 = Arc::new(SuccessClient::new("Remote saves the day."));
        let router = build_router(
            router_config(),
            Arc::new(HangingClient),
            Arc::clone(&tier3) as Arc<dyn ModelClient>,
            QuotaConfig::default(),
        );

        let req = classified(
            "help",
            IntentCategory::GeneralHint,
            Tier::Tier2,
            EntityMap::new(),
        );
        let turn = router.route(&req, &ctx()).await;
        assert_eq!(turn.tier_used, Some(Tier::Tier3));
    }

    #[tokio::test]
    async fn quota_lockout_skips_remote_call() {
        let tier3 = Arc::new(SuccessClient::new("should not be called"));
        let quota = QuotaConfig {
            hourly_requests: 0,
            ..QuotaConfig::default()
        };
        let router = build_router(
            router_config(),
            Arc::new(FailingClient::new()),
            Arc::clone(&tier3) as Arc<dyn ModelClient>,
            quota,
        );

        let req = classified(
            "help",
            IntentCategory::GeneralHint,
            Tier::Tier3,
            EntityMap::new(),
        );
        let turn = router.route(&req, &ctx()).await;
        assert_eq!(turn.tier_used, None);
        assert_eq!(*tier3.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn tier3_disabled_exhausts_after_tier2() {
        let tier3 = Arc::new(SuccessClient::new("unreachable"));
        let config = RouterConfig {
            tier3_enabled: false,
            ..router_config()
        };
        let router = build_router(
            config,
            Arc::new(FailingClient::new()),
            Arc::clone(&tier3) as Arc<dyn ModelClient>,
            QuotaConfig::default(),
        );

        let req = classified(
            "help",
            IntentCategory::GeneralHint,
            Tier::Tier2,
            EntityMap::new(),
        );
        let turn = router.route(&req, &ctx()).await;
        assert_eq!(turn.tier_used, None);
        assert_eq!(*tier3.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn overlong_tier2_output_degrades_when_tier3_fails() {
        let long_reply = "a".repeat(3_000);
        let tier2 = Arc::new(SuccessClient::new(&long_reply));
        let router = build_router(
            router_config(),
            tier2,
            Arc::new(FailingClient::new()),
            QuotaConfig::default(),
        );

        let req = classified(
            "help",
            IntentCategory::GeneralHint,
            Tier::Tier2,
            EntityMap::new(),
        );
        let turn = router.route(&req, &ctx()).await;
        // Tier 2 overflowed, tier 3 failed: the truncated local output is
        // still better than the canned fallback.
        assert_eq!(turn.tier_used, Some(Tier::Tier2));
        assert_eq!(turn.response.chars().count(), 2_000);
    }
}
