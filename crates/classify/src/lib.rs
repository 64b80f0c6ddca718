//! Intent classification and entity extraction for Ekimate.
//!
//! Classification is a pure, synchronous, fallible-nowhere step: every
//! request gets exactly one intent, one complexity estimate, a set of typed
//! entities, and a selected tier. Total ambiguity falls back to
//! `GeneralHint` at `Complex` rather than failing.

pub mod entities;
pub mod intent;

pub use entities::EntityMatcher;
pub use intent::IntentClassifier;
