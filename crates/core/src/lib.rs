//! # Ekimate Core
//!
//! Domain types, traits, and error definitions for the ekimate companion
//! pipeline. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem boundary is a trait or value type defined here.
//! Implementations live in their respective crates. This enables:
//! - Swapping tier executors and model clients via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod context;
pub mod error;
pub mod model;
pub mod outcome;
pub mod request;
pub mod scenario;

// Re-export key types at crate root for ergonomics
pub use context::{ContextEntry, ConversationContext, ConversationId, ConversationPhase, TopicState};
pub use error::{ContextError, Error, ModelError, Result, TierFailure};
pub use model::{GenerationParams, ModelClient, ModelOutput};
pub use outcome::{TierOutcome, TierSuccess, TurnResult};
pub use request::{
    ClassifiedRequest, ComplexityLevel, EntityKind, EntityMap, GameSnapshot, InputLanguage,
    IntentCategory, PlayerRequest, Tier,
};
pub use scenario::ScenarioType;
