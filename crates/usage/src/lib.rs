//! Usage tracking and quota enforcement for the remote tier.
//!
//! The guard answers two questions: may this remote call happen now, and
//! what has been spent so far. Local tiers never consult it.

pub mod guard;
pub mod pricing;

pub use guard::{ModelUsage, QuotaDenied, UsageGuard, UsageSnapshot};
pub use pricing::{ModelPricing, PricingTable};
