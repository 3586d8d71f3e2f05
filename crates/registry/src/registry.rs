use crate::entry::{MissingReport, RegistryConfig, RegistryEntry, UpsertOutcome};
use common::{build_key, Bookmaker, EventError, IdentityKey, SportEvent};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};

/// Per-bookmaker bookkeeping for one source-native id.
#[derive(Debug, Clone)]
struct Tracked {
    key: IdentityKey,
    misses: u32,
}

/// Shared store of every bookmaker's events, keyed by identity.
///
/// Two sharded maps:
/// - `entries`: identity key -> bookmaker -> event. This is what readers see.
/// - `index`: bookmaker -> source id -> (key, miss counter). Only writers touch it.
///
/// Writers always lock the bookmaker's `index` shard first and then one
/// `entries` shard at a time, never two `entries` guards at once. Readers only
/// lock `entries`. A (key, bookmaker) slot is replaced under its shard lock, so
/// it is never observed half-written.
pub struct EventRegistry {
    config: RegistryConfig,
    entries: DashMap<IdentityKey, HashMap<Bookmaker, SportEvent>>,
    index: DashMap<Bookmaker, HashMap<String, Tracked>>,
}

impl EventRegistry {
    /// Creates a new, empty registry. `grace_cycles` is clamped to at least 1.
    pub fn new(config: RegistryConfig) -> Self {
        let config = RegistryConfig {
            grace_cycles: config.grace_cycles.max(1),
        };
        Self {
            config,
            entries: DashMap::new(),
            index: DashMap::new(),
        }
    }

    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    /// Inserts or replaces the (key, bookmaker) slot for `event` and resets its
    /// miss counter.
    ///
    /// If the same source id was previously stored under another key (the feed
    /// renamed a participant) the old slot is dropped. When two ids of one
    /// bookmaker map to the same key, the lower id keeps the slot: a higher id
    /// gets [`UpsertOutcome::Duplicate`] and is not tracked, a lower one
    /// displaces the holder.
    pub fn upsert(&self, event: SportEvent) -> Result<UpsertOutcome, EventError> {
        let key = event.identity_key()?;
        let bookmaker = event.bookmaker;
        let source_id = event.source_id.clone();

        let mut tracked = self.index.entry(bookmaker).or_default();
        let previous = tracked.insert(
            source_id.clone(),
            Tracked {
                key: key.clone(),
                misses: 0,
            },
        );

        if let Some(previous) = previous.filter(|p| p.key != key) {
            log::debug!(
                "{} event {} moved from {} to {}",
                bookmaker,
                source_id,
                previous.key,
                key
            );
            self.remove_slot(&previous.key, bookmaker, &source_id);
        }

        let (outcome, other) = {
            let mut slots = self.entries.entry(key.clone()).or_default();
            let held = slots
                .get(&bookmaker)
                .map(|held| (held.source_id.clone(), held == &event));
            match held {
                Some((held_id, _)) if held_id != source_id && id_precedes(&held_id, &source_id) => {
                    (UpsertOutcome::Duplicate, Some(held_id))
                }
                Some((_, true)) => (UpsertOutcome::Unchanged, None),
                Some((held_id, false)) => {
                    slots.insert(bookmaker, event);
                    let displaced = (held_id != source_id).then_some(held_id);
                    (UpsertOutcome::Updated, displaced)
                }
                None => {
                    slots.insert(bookmaker, event);
                    (UpsertOutcome::Inserted, None)
                }
            }
        };

        match (outcome, other) {
            (UpsertOutcome::Duplicate, Some(holder)) => {
                log::debug!(
                    "{} event {} shares key {} with {}, which keeps the slot",
                    bookmaker,
                    source_id,
                    key,
                    holder
                );
                tracked.remove(&source_id);
            }
            (_, Some(displaced)) => {
                log::debug!(
                    "{} event {} displaced {} under key {}",
                    bookmaker,
                    source_id,
                    displaced,
                    key
                );
                tracked.remove(&displaced);
            }
            (UpsertOutcome::Inserted, None) => {
                log::trace!("Inserted {} event {} under key {}", bookmaker, source_id, key);
            }
            _ => {}
        }
        Ok(outcome)
    }

    pub fn get(&self, key: &IdentityKey, bookmaker: Bookmaker) -> Option<SportEvent> {
        self.entries
            .get(key)
            .and_then(|slots| slots.get(&bookmaker).cloned())
    }

    /// Every bookmaker's view of the match behind `key`. Empty if unknown.
    pub fn same_event_across_bookmakers(&self, key: &IdentityKey) -> HashMap<Bookmaker, SportEvent> {
        self.entries
            .get(key)
            .map(|slots| slots.clone())
            .unwrap_or_default()
    }

    /// Convenience lookup by raw participant names, in either order.
    pub fn lookup(&self, team1: &str, team2: &str) -> Result<HashMap<Bookmaker, SportEvent>, EventError> {
        let key = build_key(team1, team2)?;
        Ok(self.same_event_across_bookmakers(&key))
    }

    /// Reconciles `bookmaker`'s tracked events against the ids seen this cycle.
    ///
    /// Seen ids get their miss counter reset, absent ones get it incremented.
    /// An event whose counter reaches `grace_cycles` is evicted, together with
    /// its key when no other bookmaker reports the match.
    pub fn mark_missing(&self, bookmaker: Bookmaker, seen_ids: &HashSet<String>) -> MissingReport {
        let grace = self.config.grace_cycles;
        let mut report = MissingReport::default();

        let Some(mut tracked) = self.index.get_mut(&bookmaker) else {
            return report;
        };

        let mut expired = Vec::new();
        for (source_id, entry) in tracked.iter_mut() {
            if seen_ids.contains(source_id) {
                entry.misses = 0;
                continue;
            }
            entry.misses += 1;
            report.missing += 1;
            if entry.misses >= grace {
                expired.push(source_id.clone());
            }
        }

        for source_id in expired {
            if let Some(entry) = tracked.remove(&source_id) {
                if let Some(event) = self.remove_slot(&entry.key, bookmaker, &source_id) {
                    log::info!(
                        "Evicted {} event {} ({}) after {} missed cycles",
                        bookmaker,
                        source_id,
                        event.name,
                        entry.misses
                    );
                    report.evicted.push(event);
                }
            }
        }

        report
    }

    /// Current miss counter of a tracked event.
    pub fn misses(&self, bookmaker: Bookmaker, source_id: &str) -> Option<u32> {
        self.index
            .get(&bookmaker)
            .and_then(|tracked| tracked.get(source_id).map(|t| t.misses))
    }

    /// Number of events currently tracked for `bookmaker`.
    pub fn tracked(&self, bookmaker: Bookmaker) -> usize {
        self.index.get(&bookmaker).map(|t| t.len()).unwrap_or(0)
    }

    /// Number of identity keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of (key, bookmaker) slots.
    pub fn event_count(&self) -> usize {
        self.entries.iter().map(|e| e.value().len()).sum()
    }

    /// Point-in-time copy of the whole registry, sorted by key.
    pub fn snapshot(&self) -> Vec<RegistryEntry> {
        let mut entries: Vec<RegistryEntry> = self
            .entries
            .iter()
            .map(|e| RegistryEntry {
                key: e.key().clone(),
                events: e.value().clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// Matches reported by at least `min_bookmakers` bookmakers.
    pub fn cross_source_matches(&self, min_bookmakers: usize) -> Vec<RegistryEntry> {
        self.snapshot()
            .into_iter()
            .filter(|e| e.bookmaker_count() >= min_bookmakers)
            .collect()
    }

    /// Removes the (key, bookmaker) slot if it still belongs to `source_id`,
    /// and the key itself once no bookmaker is left.
    fn remove_slot(&self, key: &IdentityKey, bookmaker: Bookmaker, source_id: &str) -> Option<SportEvent> {
        let removed = {
            let mut slots = self.entries.get_mut(key)?;
            match slots.get(&bookmaker) {
                Some(event) if event.source_id == source_id => slots.remove(&bookmaker),
                _ => None,
            }
        };
        self.entries.remove_if(key, |_, slots| slots.is_empty());
        removed
    }
}

/// Ordering between two ids of one bookmaker competing for a slot. Shorter
/// ids rank first, so numeric ids compare by value.
fn id_precedes(a: &str, b: &str) -> bool {
    (a.len(), a) < (b.len(), b)
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::SportType;

    fn event(bookmaker: Bookmaker, id: &str, team1: &str, team2: &str) -> SportEvent {
        SportEvent::create(
            bookmaker,
            id,
            1_735_689_600,
            "Premier League",
            team1,
            team2,
            SportType::Football,
            "prematch",
        )
        .unwrap()
    }

    fn seen(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn registry(grace_cycles: u32) -> EventRegistry {
        EventRegistry::new(RegistryConfig { grace_cycles })
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let registry = registry(3);
        let e = event(Bookmaker::Fonbet, "1", "Spartak", "Zenit");

        assert_eq!(registry.upsert(e.clone()).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(registry.upsert(e.clone()).unwrap(), UpsertOutcome::Unchanged);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.event_count(), 1);
        assert_eq!(registry.get(&e.identity_key().unwrap(), Bookmaker::Fonbet), Some(e));
    }

    #[test]
    fn test_upsert_replaces_changed_fields() {
        let registry = registry(3);
        registry.upsert(event(Bookmaker::Fonbet, "1", "Spartak", "Zenit")).unwrap();

        let mut live = event(Bookmaker::Fonbet, "1", "Spartak", "Zenit");
        live.status = common::EventStatus::Live;
        assert_eq!(registry.upsert(live.clone()).unwrap(), UpsertOutcome::Updated);

        let key = live.identity_key().unwrap();
        assert_eq!(registry.get(&key, Bookmaker::Fonbet).unwrap().status, common::EventStatus::Live);
    }

    #[test]
    fn test_cross_source_match() {
        let registry = registry(3);
        registry.upsert(event(Bookmaker::Fonbet, "48213390", "Spartak", "Zenit")).unwrap();
        registry.upsert(event(Bookmaker::Betboom, "77", "Зенит", "Спартак")).unwrap();

        assert_eq!(registry.len(), 1);
        let key = build_key("zenit", "spartak").unwrap();
        let all = registry.same_event_across_bookmakers(&key);
        assert_eq!(all.len(), 2);
        assert_eq!(all[&Bookmaker::Fonbet].source_id, "48213390");
        assert_eq!(all[&Bookmaker::Betboom].source_id, "77");

        let matches = registry.cross_source_matches(2);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].bookmakers(), vec![Bookmaker::Fonbet, Bookmaker::Betboom]);
    }

    #[test]
    fn test_lookup_unknown_is_empty() {
        let registry = registry(3);
        assert!(registry.lookup("Real Madrid", "Barcelona").unwrap().is_empty());
        assert!(registry.lookup("", "Barcelona").is_err());
    }

    #[test]
    fn test_upsert_rejects_blank_participant() {
        let registry = registry(3);
        let err = registry.upsert(event(Bookmaker::Fonbet, "1", "!!!", "Zenit")).unwrap_err();
        assert!(matches!(err, EventError::InvalidIdentity(_)));
        assert!(registry.is_empty());
        assert_eq!(registry.tracked(Bookmaker::Fonbet), 0);
    }

    #[test]
    fn test_evicted_after_grace_cycles() {
        let registry = registry(3);
        let e = event(Bookmaker::Fonbet, "1", "Spartak", "Zenit");
        let key = e.identity_key().unwrap();
        registry.upsert(e.clone()).unwrap();

        for cycle in 1..3 {
            let report = registry.mark_missing(Bookmaker::Fonbet, &seen(&[]));
            assert_eq!(report.missing, 1);
            assert!(report.evicted.is_empty());
            assert_eq!(registry.misses(Bookmaker::Fonbet, "1"), Some(cycle));
        }
        assert!(registry.get(&key, Bookmaker::Fonbet).is_some());

        let report = registry.mark_missing(Bookmaker::Fonbet, &seen(&[]));
        assert_eq!(report.evicted, vec![e]);
        assert!(registry.get(&key, Bookmaker::Fonbet).is_none());
        assert!(registry.is_empty());
        assert_eq!(registry.tracked(Bookmaker::Fonbet), 0);
    }

    #[test]
    fn test_reappearance_resets_counter() {
        let registry = registry(2);
        registry.upsert(event(Bookmaker::Fonbet, "1", "Spartak", "Zenit")).unwrap();

        registry.mark_missing(Bookmaker::Fonbet, &seen(&[]));
        assert_eq!(registry.misses(Bookmaker::Fonbet, "1"), Some(1));

        registry.mark_missing(Bookmaker::Fonbet, &seen(&["1"]));
        assert_eq!(registry.misses(Bookmaker::Fonbet, "1"), Some(0));

        let report = registry.mark_missing(Bookmaker::Fonbet, &seen(&[]));
        assert!(report.evicted.is_empty());
        assert_eq!(registry.tracked(Bookmaker::Fonbet), 1);
    }

    #[test]
    fn test_upsert_resets_counter() {
        let registry = registry(2);
        let e = event(Bookmaker::Fonbet, "1", "Spartak", "Zenit");
        registry.upsert(e.clone()).unwrap();
        registry.mark_missing(Bookmaker::Fonbet, &seen(&[]));
        registry.upsert(e).unwrap();
        assert_eq!(registry.misses(Bookmaker::Fonbet, "1"), Some(0));
    }

    #[test]
    fn test_eviction_keeps_other_bookmakers() {
        let registry = registry(1);
        registry.upsert(event(Bookmaker::Fonbet, "1", "Spartak", "Zenit")).unwrap();
        registry.upsert(event(Bookmaker::Betboom, "77", "Zenit", "Spartak")).unwrap();

        let report = registry.mark_missing(Bookmaker::Fonbet, &seen(&[]));
        assert_eq!(report.evicted.len(), 1);

        let key = build_key("Spartak", "Zenit").unwrap();
        let remaining = registry.same_event_across_bookmakers(&key);
        assert_eq!(remaining.len(), 1);
        assert!(remaining.contains_key(&Bookmaker::Betboom));
    }

    #[test]
    fn test_mark_missing_only_touches_own_bookmaker() {
        let registry = registry(1);
        registry.upsert(event(Bookmaker::Fonbet, "1", "Spartak", "Zenit")).unwrap();
        let report = registry.mark_missing(Bookmaker::Betboom, &seen(&[]));
        assert_eq!(report, MissingReport::default());
        assert_eq!(registry.tracked(Bookmaker::Fonbet), 1);
    }

    #[test]
    fn test_renamed_participant_moves_slot() {
        let registry = registry(3);
        registry.upsert(event(Bookmaker::Fonbet, "1", "Spartak", "Zenit")).unwrap();
        registry
            .upsert(event(Bookmaker::Fonbet, "1", "Spartak Moscow", "Zenit"))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("Spartak", "Zenit").unwrap().is_empty());
        assert_eq!(registry.lookup("Spartak Moscow", "Zenit").unwrap().len(), 1);
        assert_eq!(registry.tracked(Bookmaker::Fonbet), 1);
    }

    #[test]
    fn test_lower_id_displaces_holder() {
        let registry = registry(1);
        registry.upsert(event(Bookmaker::Fonbet, "10", "Spartak", "Zenit")).unwrap();
        let outcome = registry.upsert(event(Bookmaker::Fonbet, "9", "Zenit", "Spartak")).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(registry.tracked(Bookmaker::Fonbet), 1);
        assert_eq!(registry.misses(Bookmaker::Fonbet, "10"), None);

        // Only the live id counts against the grace period.
        let report = registry.mark_missing(Bookmaker::Fonbet, &seen(&["9"]));
        assert_eq!(report.missing, 0);
        assert_eq!(registry.len(), 1);
        let key = build_key("Spartak", "Zenit").unwrap();
        assert_eq!(registry.get(&key, Bookmaker::Fonbet).unwrap().source_id, "9");
    }

    #[test]
    fn test_higher_id_is_duplicate() {
        let registry = registry(1);
        registry.upsert(event(Bookmaker::Fonbet, "9", "Spartak", "Zenit")).unwrap();
        let outcome = registry.upsert(event(Bookmaker::Fonbet, "10", "Zenit", "Spartak")).unwrap();
        assert_eq!(outcome, UpsertOutcome::Duplicate);
        assert_eq!(registry.tracked(Bookmaker::Fonbet), 1);
        assert_eq!(registry.misses(Bookmaker::Fonbet, "10"), None);

        let key = build_key("Spartak", "Zenit").unwrap();
        assert_eq!(registry.get(&key, Bookmaker::Fonbet).unwrap().source_id, "9");
    }

    #[test]
    fn test_shared_key_settles_across_cycles() {
        let registry = registry(2);
        let key = build_key("Spartak", "Zenit").unwrap();

        // The feed lists both ids every cycle, higher one first.
        let mut outcomes = Vec::new();
        for _ in 0..4 {
            let a = registry.upsert(event(Bookmaker::Fonbet, "200", "Spartak", "Zenit")).unwrap();
            let b = registry.upsert(event(Bookmaker::Fonbet, "150", "Zenit", "Spartak")).unwrap();
            registry.mark_missing(Bookmaker::Fonbet, &seen(&["200", "150"]));
            outcomes.push((a, b));
        }

        assert_eq!(outcomes[0], (UpsertOutcome::Inserted, UpsertOutcome::Updated));
        for cycle in &outcomes[1..] {
            assert_eq!(*cycle, (UpsertOutcome::Duplicate, UpsertOutcome::Unchanged));
        }
        assert_eq!(registry.get(&key, Bookmaker::Fonbet).unwrap().source_id, "150");
        assert_eq!(registry.tracked(Bookmaker::Fonbet), 1);
        assert_eq!(registry.misses(Bookmaker::Fonbet, "150"), Some(0));
    }

    #[test]
    fn test_duplicate_takes_over_after_holder_evicted() {
        let registry = registry(1);
        registry.upsert(event(Bookmaker::Fonbet, "1", "Spartak", "Zenit")).unwrap();
        registry.upsert(event(Bookmaker::Fonbet, "2", "Spartak", "Zenit")).unwrap();

        let report = registry.mark_missing(Bookmaker::Fonbet, &seen(&["2"]));
        assert_eq!(report.evicted.len(), 1);
        assert!(registry.is_empty());

        assert_eq!(
            registry.upsert(event(Bookmaker::Fonbet, "2", "Spartak", "Zenit")).unwrap(),
            UpsertOutcome::Inserted
        );
    }

    #[test]
    fn test_id_precedes() {
        assert!(id_precedes("9", "10"));
        assert!(id_precedes("100", "101"));
        assert!(!id_precedes("101", "101"));
        assert!(id_precedes("abc", "abd"));
    }

    #[test]
    fn test_zero_grace_is_clamped() {
        assert_eq!(registry(0).config().grace_cycles, 1);
    }
}
