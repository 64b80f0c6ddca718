//! Tier executors.
//!
//! Each executor turns one tier's machinery into a uniform
//! attempt-and-outcome shape the router's state machine can drive. The
//! remote executor owns its own timeout so that quota recording happens
//! even when the call is cancelled mid-flight.

use ekimate_core::{
    ClassifiedRequest, ConversationContext, GenerationParams, ModelClient, ScenarioType,
    TierFailure, TierOutcome, TierSuccess,
};
use ekimate_scenarios::HandlerRegistry;
use ekimate_trees::TreeRegistry;
use ekimate_usage::UsageGuard;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

/// Tier 1: decision trees. Synchronous and deterministic.
pub(crate) struct Tier1Executor {
    trees: Arc<TreeRegistry>,
}

impl Tier1Executor {
    pub(crate) fn new(trees: Arc<TreeRegistry>) -> Self {
        Self { trees }
    }

    pub(crate) fn attempt(
        &self,
        request: &ClassifiedRequest,
        context: &ConversationContext,
    ) -> TierOutcome {
        let Some(tree_id) = self.trees.tree_for(request) else {
            return Err(TierFailure::ServiceUnavailable(format!(
                "no tier-1 tree for intent '{}'",
                request.intent
            )));
        };
        self.trees.evaluate(tree_id, request, context)
    }
}

/// Instructions for the local model. Tier 2 skips scenario shaping; the
/// local model gets one general-purpose prompt.
const TIER2_INSTRUCTIONS: &str = "You are Hachiko, a friendly dog companion \
helping an English-speaking player in a Japanese train station. Answer the \
player's question in 2-3 short sentences, with romaji for any Japanese.";

/// Tier 2: the local model.
pub(crate) struct Tier2Executor {
    client: Arc<dyn ModelClient>,
    params: GenerationParams,
    history_window: usize,
    max_response_chars: usize,
}

impl Tier2Executor {
    pub(crate) fn new(
        client: Arc<dyn ModelClient>,
        params: GenerationParams,
        history_window: usize,
        max_response_chars: usize,
    ) -> Self {
        Self {
            client,
            params,
            history_window,
            max_response_chars,
        }
    }

    /// Attempt the local model. On validation failure the raw text (if any)
    /// rides along so the router can serve it if tier 3 also fails.
    pub(crate) async fn attempt(
        &self,
        request: &ClassifiedRequest,
        context: &ConversationContext,
    ) -> (TierOutcome, Option<String>) {
        let prompt = self.build_prompt(request, context);

        let output = match self.client.generate(&prompt, &self.params).await {
            Ok(out) => out,
            Err(e) => return (Err(e.into_tier_failure()), None),
        };

        let text = output.text.trim();
        if text.is_empty() {
            return (
                Err(TierFailure::MalformedOutput(
                    "local model returned an empty response".into(),
                )),
                None,
            );
        }

        let chars = text.chars().count();
        if chars > self.max_response_chars {
            // Too long to serve as-is; keep a truncated copy as the
            // degraded answer of last resort.
            let truncated: String = text.chars().take(self.max_response_chars).collect();
            return (
                Err(TierFailure::MalformedOutput(format!(
                    "local model response too long ({chars} chars)"
                ))),
                Some(truncated),
            );
        }

        (
            Ok(TierSuccess {
                text: text.to_string(),
                completed: false,
                tokens_in: output.tokens_in,
                tokens_out: output.tokens_out,
            }),
            None,
        )
    }

    fn build_prompt(&self, request: &ClassifiedRequest, context: &ConversationContext) -> String {
        let mut prompt = String::from(TIER2_INSTRUCTIONS);
        prompt.push('\n');

        let game = &request.request.game;
        if !game.location.is_empty() {
            let _ = writeln!(prompt, "The player is at: {}.", game.location);
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

/// Tier 3: quota-guarded remote scenario handlers.
pub(crate) struct Tier3Executor {
    handlers: HandlerRegistry,
    guard: Arc<UsageGuard>,
    model: String,
    timeout: Duration,
}

impl Tier3Executor {
    pub(crate) fn new(
        handlers: HandlerRegistry,
        guard: Arc<UsageGuard>,
        model: String,
        timeout: Duration,
    ) -> Self {
        Self {
            handlers,
            guard,
            model,
            timeout,
        }
    }

    /// Attempt the remote tier. A quota denial never reaches the network;
    /// everything past authorization is recorded, timeouts and abandoned
    /// calls included.
    pub(crate) async fn attempt(
        &self,
        scenario: ScenarioType,
        request: &ClassifiedRequest,
        context: &ConversationContext,
    ) -> TierOutcome {
        self.guard
            .authorize(&self.model)
            .map_err(|denied| TierFailure::QuotaExceeded(denied.to_string()))?;

        // Armed from here on: dropping this future mid-dispatch still
        // charges the attempt.
        let charge = AttemptCharge::new(&self.guard, &self.model);

        let dispatched = tokio::time::timeout(
            self.timeout,
            self.handlers.dispatch(scenario, request, context),
        )
        .await;

        match dispatched {
            Ok(Ok(success)) => {
                charge.settle(
                    success.tokens_in.unwrap_or(0),
                    success.tokens_out.unwrap_or(0),
                    true,
                );
                Ok(success)
            }
            Ok(Err(failure)) => {
                charge.settle(0, 0, false);
                Err(failure)
            }
            Err(_) => {
                // The call may still have consumed tokens upstream; the
                // counts are unknown, but the attempt itself is charged.
                charge.settle(0, 0, false);
                Err(TierFailure::Timeout(format!(
                    "remote call exceeded {:?}",
                    self.timeout
                )))
            }
        }
    }
}

/// Records an in-flight remote attempt unless it was settled with real
/// counts first. Runs on drop, so a caller abandoning the attempt future
/// still hits the hourly request bucket.
struct AttemptCharge<'a> {
    guard: &'a UsageGuard,
    model: &'a str,
    settled: bool,
}

impl<'a> AttemptCharge<'a> {
    fn new(guard: &'a UsageGuard, model: &'a str) -> Self {
        Self {
            guard,
            model,
            settled: false,
        }
    }

    fn settle(mut self, tokens_in: u32, tokens_out: u32, succeeded: bool) {
        self.settled = true;
        self.guard.record(self.model, tokens_in, tokens_out, succeeded);
    }
}

impl Drop for AttemptCharge<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.guard.record(self.model, 0, 0, false);
        }
    }
}
