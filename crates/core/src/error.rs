//! Error types for the ekimate domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant. Tier failures are a
//! recovery signal for the router, not a caller-visible error: the router
//! always produces *some* response, so only configuration problems and
//! context resets ever reach the surface.

use thiserror::Error;

/// The top-level error type for all ekimate operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Tier execution failures (recovered by the router) ---
    #[error("Tier failure: {0}")]
    Tier(#[from] TierFailure),

    // --- Model client errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Conversation context errors ---
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    // --- Configuration errors (startup-fatal) ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Why a tier attempt failed. Drives the fallback state machine: every
/// variant escalates or degrades, none of them aborts the turn.
#[derive(Debug, Clone, Error)]
pub enum TierFailure {
    #[error("Tier timed out: {0}")]
    Timeout(String),

    #[error("Tier unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Malformed output: {0}")]
    MalformedOutput(String),
}

/// Errors from a model client (tier-2 local or tier-3 remote).
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ModelError {
    /// Collapse a model error into the tier failure the router acts on.
    pub fn into_tier_failure(self) -> TierFailure {
        match self {
            ModelError::Timeout(msg) => TierFailure::Timeout(msg),
            other => TierFailure::ServiceUnavailable(other.to_string()),
        }
    }
}

/// Errors from the conversation context store.
#[derive(Debug, Error)]
pub enum ContextError {
    /// An append would violate ordering or size invariants. Fatal to that
    /// conversation only: the store resets the context and carries on.
    #[error("Context corrupted for conversation {conversation_id}: {reason}")]
    Corrupted {
        conversation_id: String,
        reason: String,
    },
}
