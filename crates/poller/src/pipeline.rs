use crate::report::CycleReport;
use async_trait::async_trait;
use common::{Bookmaker, EventError};
use registry::{EventRegistry, UpsertOutcome};
use source_adapter_trait::SourceAdapter;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Something the scheduler can run once per tick.
///
/// Object safe, so adapters with different record types can share one
/// scheduler.
#[async_trait]
pub trait CycleRunner: Send {
    fn bookmaker(&self) -> Bookmaker;

    /// Runs one fetch-parse-register pass. Fails only when the whole payload is
    /// unusable ([`EventError::Fetch`] or [`EventError::Parse`]); the registry
    /// is left untouched in that case.
    async fn run_cycle(&mut self, registry: &EventRegistry) -> Result<CycleReport, EventError>;
}

/// Drives one adapter through its cycle and remembers which of its ids were
/// active last time.
pub struct AdapterPipeline<A> {
    adapter: A,
    active: HashSet<String>,
}

impl<A: SourceAdapter> AdapterPipeline<A> {
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            active: HashSet::new(),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Source ids registered by the last successful cycle.
    pub fn active_ids(&self) -> &HashSet<String> {
        &self.active
    }
}

#[async_trait]
impl<A: SourceAdapter> CycleRunner for AdapterPipeline<A> {
    fn bookmaker(&self) -> Bookmaker {
        self.adapter.bookmaker()
    }

    async fn run_cycle(&mut self, registry: &EventRegistry) -> Result<CycleReport, EventError> {
        let started = Instant::now();
        let bookmaker = self.adapter.bookmaker();

        let payload = self.adapter.fetch().await?;
        let parsed = self.adapter.parse(&payload)?;

        let mut report = CycleReport::new(bookmaker);
        report.received = parsed.records.len();
        let mut seen = HashSet::with_capacity(parsed.records.len());

        for record in &parsed.records {
            if !self.adapter.is_valid_record(record) {
                report.invalid += 1;
                continue;
            }

            let event = match self.adapter.to_event(record, &parsed.aux) {
                Ok(Some(event)) => event,
                Ok(None) => {
                    report.unsupported += 1;
                    continue;
                }
                Err(e) => {
                    warn!(bookmaker = %bookmaker, error = %e, "Skipping record");
                    report.failed += 1;
                    continue;
                }
            };

            let source_id = event.source_id.clone();
            match registry.upsert(event) {
                Ok(UpsertOutcome::Inserted) => report.added += 1,
                Ok(UpsertOutcome::Updated) => report.updated += 1,
                Ok(UpsertOutcome::Unchanged) => report.unchanged += 1,
                Ok(UpsertOutcome::Duplicate) => {
                    report.duplicate += 1;
                    continue;
                }
                Err(e) => {
                    warn!(bookmaker = %bookmaker, source_id = %source_id, error = %e, "Skipping event");
                    report.failed += 1;
                    continue;
                }
            }
            seen.insert(source_id);
        }

        let disappeared: Vec<&String> = self.active.difference(&seen).collect();
        if !disappeared.is_empty() {
            debug!(bookmaker = %bookmaker, ids = ?disappeared, "Events dropped out of the feed");
        }
        report.disappeared = disappeared.len();

        let missing = registry.mark_missing(bookmaker, &seen);
        report.missing = missing.missing;
        report.evicted = missing.evicted.len();
        if report.evicted > 0 {
            info!(bookmaker = %bookmaker, evicted = report.evicted, "Evicted stale events");
        }

        self.active = seen;
        report.elapsed = started.elapsed();
        debug!(
            bookmaker = %bookmaker,
            received = report.received,
            stored = report.stored(),
            invalid = report.invalid,
            unsupported = report.unsupported,
            failed = report.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Cycle complete"
        );
        Ok(report)
    }
}
