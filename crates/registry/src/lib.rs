//! # Event Registry
//!
//! Concurrent store that correlates events from every bookmaker by identity
//! key. Adapters upsert what they see each polling cycle and then report the
//! ids they saw, so events that drop out of a feed are evicted after a grace
//! period instead of on the first missed poll.

pub mod entry;
pub mod registry;

pub use entry::{MissingReport, RegistryConfig, RegistryEntry, UpsertOutcome};
pub use registry::EventRegistry;
