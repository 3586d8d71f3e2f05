use common::{Bookmaker, IdentityKey, SportEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Registry tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Consecutive cycles an event may be absent from its feed before eviction.
    pub grace_cycles: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { grace_cycles: 3 }
    }
}

/// What an `upsert` did to the (key, bookmaker) slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
    /// Another id of the same bookmaker holds the slot and ranks first; the
    /// event was not stored.
    Duplicate,
}

/// Result of one `mark_missing` pass for a bookmaker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissingReport {
    /// Tracked events absent from this cycle, evicted ones included.
    pub missing: usize,
    /// Events removed because they hit the grace threshold.
    pub evicted: Vec<SportEvent>,
}

/// One identity key with every bookmaker's view of the match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryEntry {
    pub key: IdentityKey,
    pub events: HashMap<Bookmaker, SportEvent>,
}

impl RegistryEntry {
    pub fn bookmaker_count(&self) -> usize {
        self.events.len()
    }

    /// Bookmakers sorted, for stable output.
    pub fn bookmakers(&self) -> Vec<Bookmaker> {
        let mut bookmakers: Vec<Bookmaker> = self.events.keys().copied().collect();
        bookmakers.sort();
        bookmakers
    }
}
