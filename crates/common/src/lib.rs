//! # Forkscan Common Crate
//!
//! Shared event model, identity normalization and error taxonomy used across
//! the `forkscan` workspace.

/// Module for the error taxonomy.
pub mod errors;

/// Module for participant-name normalization and identity keys.
pub mod identity;

/// Module for the bookmaker-agnostic event model.
pub mod types;

// Re-export key items for easier access.
pub use errors::EventError;
pub use identity::{build_key, normalize_name, IdentityKey};
pub use types::{Bookmaker, EventStatus, SportEvent, SportType};
