//! The turn pipeline: the one entry point a host embeds.
//!
//! `handle()` owns the full lifecycle of a turn: resolve the conversation,
//! serialize on it, classify, route, record. Distinct conversations run
//! concurrently; two requests on the same conversation queue up on its
//! mutex.

use crate::Router;
use chrono::Utc;
use ekimate_classify::IntentClassifier;
use ekimate_config::{AppConfig, ModelConfig};
use ekimate_context::ContextStore;
use ekimate_core::{
    ContextEntry, ConversationId, Error, GenerationParams, ModelClient, PlayerRequest, Result,
    TurnResult,
};
use ekimate_providers::ChatClient;
use ekimate_scenarios::HandlerRegistry;
use ekimate_trees::TreeRegistry;
use ekimate_usage::{UsageGuard, UsageSnapshot};
use std::sync::Arc;

/// Prefixed to the response after a context corruption reset.
const RESET_NOTICE: &str = "(Sorry, I lost the thread of our conversation there.) ";

const DEFAULT_TIER2_MODEL: &str = "llama3.1:8b";
const DEFAULT_TIER3_MODEL: &str = "anthropic/claude-3.5-haiku";
const DEFAULT_TIER3_URL: &str = "https://openrouter.ai/api/v1";

/// The assembled request-processing pipeline.
pub struct Pipeline {
    classifier: IntentClassifier,
    store: ContextStore,
    router: Router,
    guard: Arc<UsageGuard>,
    tier2_client: Arc<dyn ModelClient>,
    tier3_client: Arc<dyn ModelClient>,
}

fn params_from(config: &ModelConfig, default_model: &str) -> GenerationParams {
    GenerationParams {
        model: config
            .model
            .clone()
            .unwrap_or_else(|| default_model.to_string()),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
    }
}

impl Pipeline {
    /// Build the whole pipeline from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let trees = Arc::new(
            TreeRegistry::builtin(&config.trees)
                .map_err(|e| Error::Config {
                    message: e.to_string(),
                })?,
        );

        let tier2_client: Arc<dyn ModelClient> =
            Arc::new(ChatClient::ollama(config.tier2.api_url.as_deref()));
        let tier3_client: Arc<dyn ModelClient> = Arc::new(ChatClient::remote(
            config
                .tier3
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_TIER3_URL.to_string()),
            config.api_key.clone().unwrap_or_default(),
        ));

        Self::new(config, trees, tier2_client, tier3_client)
    }

    /// Build from pre-constructed parts. Tests inject fakes through here.
    pub fn new(
        config: &AppConfig,
        trees: Arc<TreeRegistry>,
        tier2_client: Arc<dyn ModelClient>,
        tier3_client: Arc<dyn ModelClient>,
    ) -> Result<Self> {
        let tier3_params = params_from(&config.tier3, DEFAULT_TIER3_MODEL);
        let tier3_model = tier3_params.model.clone();

        let guard = Arc::new(UsageGuard::new(config.quota.clone()));
        let handlers = HandlerRegistry::with_client(
            Arc::clone(&tier3_client),
            tier3_params,
            &config.prompt,
        )
        .map_err(|e| Error::Config {
            message: e.to_string(),
        })?;

        let router = Router::new(
            &config.router,
            trees,
            Arc::clone(&tier2_client),
            params_from(&config.tier2, DEFAULT_TIER2_MODEL),
            handlers,
            Arc::clone(&guard),
            tier3_model,
            config.prompt.history_window,
            config.prompt.max_response_chars,
        );

        Ok(Self {
            classifier: IntentClassifier::new(config.classifier.clone()),
            store: ContextStore::new(&config.context),
            router,
            guard,
            tier2_client,
            tier3_client,
        })
    }

    /// Process one player request end to end.
    pub async fn handle(&self, request: PlayerRequest) -> Result<TurnResult> {
        let conversation_id = request
            .conversation_id
            .clone()
            .unwrap_or_else(ConversationId::new);

        let handle = self.store.get_or_create(&conversation_id).await;
        let mut context = handle.lock().await;
        context.touch();

        let classified = self.classifier.classify(&request, Some(&context));
        let routed = self.router.route(&classified, &context).await;

        let entry = ContextEntry {
            request_text: request.text.clone(),
            response_text: routed.response.clone(),
            timestamp: Utc::now(),
            intent: classified.intent,
            entities: classified.entities.clone(),
            tier_selected: classified.selected_tier,
            tier_used: routed.tier_used,
        };
        let reset = self.store.apply_turn(&mut context, entry, routed.completed);

        let response = if reset {
            format!("{RESET_NOTICE}{}", routed.response)
        } else {
            routed.response
        };

        Ok(TurnResult {
            response,
            tier_used: routed.tier_used,
            intent: classified.intent,
            entities: classified.entities,
            scenario: routed.scenario,
        })
    }

    /// The conversation id a caller should reuse for follow-ups. Exposed
    /// because `handle` mints one when the request carries none.
    pub async fn open_conversation(&self) -> ConversationId {
        let id = ConversationId::new();
        self.store.get_or_create(&id).await;
        id
    }

    /// Explicitly end a conversation.
    pub async fn close_conversation(&self, id: &ConversationId) -> bool {
        self.store.close(id).await
    }

    /// Sweep expired conversations. Hosts call this on a timer.
    pub async fn expire_stale(&self) -> usize {
        self.store.expire_stale().await
    }

    /// Current remote usage and quota standing.
    pub fn usage(&self) -> UsageSnapshot {
        self.guard.snapshot()
    }

    /// Health of the two model backends (tier 2, tier 3).
    pub async fn health(&self) -> (bool, bool) {
        let tier2 = self.tier2_client.health_check().await.unwrap_or(false);
        let tier3 = self.tier3_client.health_check().await.unwrap_or(false);
        (tier2, tier3)
    }
}
