use common::Bookmaker;
use std::fmt;
use std::time::Duration;

/// Counters for one completed polling cycle of one bookmaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub bookmaker: Bookmaker,
    /// Records in the payload.
    pub received: usize,
    /// Records rejected by the adapter's record filter.
    pub invalid: usize,
    /// Valid records of a sport or tournament the adapter does not map.
    pub unsupported: usize,
    /// Records that failed conversion or identity normalization.
    pub failed: usize,
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Events skipped because a lower id of this bookmaker holds their key.
    pub duplicate: usize,
    /// Ids active last cycle that this cycle did not produce.
    pub disappeared: usize,
    /// Tracked events absent from this cycle, per the registry.
    pub missing: usize,
    pub evicted: usize,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn new(bookmaker: Bookmaker) -> Self {
        Self {
            bookmaker,
            received: 0,
            invalid: 0,
            unsupported: 0,
            failed: 0,
            added: 0,
            updated: 0,
            unchanged: 0,
            duplicate: 0,
            disappeared: 0,
            missing: 0,
            evicted: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Events this cycle stored in the registry.
    pub fn stored(&self) -> usize {
        self.added + self.updated + self.unchanged
    }

    /// Whether the cycle changed anything in the registry.
    pub fn has_changes(&self) -> bool {
        self.added > 0 || self.updated > 0 || self.evicted > 0
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: received={} invalid={} unsupported={} failed={} added={} updated={} unchanged={} \
             duplicate={} disappeared={} missing={} evicted={} in {:?}",
            self.bookmaker,
            self.received,
            self.invalid,
            self.unsupported,
            self.failed,
            self.added,
            self.updated,
            self.unchanged,
            self.duplicate,
            self.disappeared,
            self.missing,
            self.evicted,
            self.elapsed
        )
    }
}
