//! Scenario detection and specialized tier-3 handlers.
//!
//! Only the remote tier looks at scenarios: tier 1 and tier 2 already
//! failed or were skipped by the time a request lands here, so the extra
//! prompt shaping is worth the cost. Detection is a fixed-priority rule
//! pass; dispatch goes through a registry that is verified complete at
//! startup.

pub mod detect;
pub mod handler;

pub use detect::detect;
pub use handler::{HandlerRegistry, PromptHandler, ScenarioHandler};
