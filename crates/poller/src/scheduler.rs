use crate::pipeline::{AdapterPipeline, CycleRunner};
use crate::report::CycleReport;
use common::EventError;
use futures::future::join_all;
use registry::EventRegistry;
use source_adapter_trait::SourceAdapter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
/// Shortest polling interval a registration is allowed.
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

struct Registration {
    runner: Box<dyn CycleRunner>,
    interval: Duration,
}

/// Runs every registered adapter on its own interval against a shared registry.
pub struct PollingScheduler {
    registry: Arc<EventRegistry>,
    registrations: Vec<Registration>,
    report_tx: Option<mpsc::Sender<CycleReport>>,
}

impl PollingScheduler {
    pub fn new(registry: Arc<EventRegistry>) -> Self {
        Self {
            registry,
            registrations: Vec::new(),
            report_tx: None,
        }
    }

    /// Publishes every successful cycle's report on `tx`. Reports are dropped
    /// when the channel is full.
    pub fn with_report_sender(mut self, tx: mpsc::Sender<CycleReport>) -> Self {
        self.report_tx = Some(tx);
        self
    }

    /// Adds a runner polled every `interval`, raised to [`MIN_INTERVAL`] if
    /// shorter.
    pub fn register(&mut self, runner: Box<dyn CycleRunner>, interval: Duration) {
        if interval < MIN_INTERVAL {
            warn!(
                bookmaker = %runner.bookmaker(),
                interval_ms = interval.as_millis() as u64,
                min_ms = MIN_INTERVAL.as_millis() as u64,
                "Polling interval too short, using minimum"
            );
        }
        let interval = interval.max(MIN_INTERVAL);
        self.registrations.push(Registration { runner, interval });
    }

    pub fn register_adapter<A>(&mut self, adapter: A, interval: Duration)
    where
        A: SourceAdapter + 'static,
    {
        self.register(Box::new(AdapterPipeline::new(adapter)), interval);
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Effective polling interval of each registration, in order.
    pub fn intervals(&self) -> Vec<Duration> {
        self.registrations.iter().map(|r| r.interval).collect()
    }

    pub fn registry(&self) -> &Arc<EventRegistry> {
        &self.registry
    }

    /// Runs one cycle of every registered adapter concurrently and waits for
    /// all of them.
    pub async fn run_once(&mut self) -> Vec<Result<CycleReport, EventError>> {
        let registry = &self.registry;
        join_all(
            self.registrations
                .iter_mut()
                .map(|r| r.runner.run_cycle(registry)),
        )
        .await
    }

    /// Starts one polling task per registered adapter.
    pub fn spawn(self) -> SchedulerHandle {
        let PollingScheduler {
            registry,
            registrations,
            report_tx,
        } = self;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handles = registrations
            .into_iter()
            .map(|r| {
                tokio::spawn(poll_loop(
                    r.runner,
                    r.interval,
                    registry.clone(),
                    report_tx.clone(),
                    shutdown_rx.clone(),
                ))
            })
            .collect();

        SchedulerHandle {
            shutdown_tx,
            handles,
        }
    }
}

/// Running scheduler. Dropping it without calling [`SchedulerHandle::shutdown`]
/// stops the tasks too, but nothing waits for them.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn task_count(&self) -> usize {
        self.handles.len()
    }

    /// Signals every polling task, abandoning cycles in flight, and waits for
    /// them to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for result in join_all(self.handles).await {
            if let Err(e) = result {
                error!(error = %e, "Polling task failed");
            }
        }
        info!("Scheduler stopped");
    }
}

async fn poll_loop(
    mut runner: Box<dyn CycleRunner>,
    interval: Duration,
    registry: Arc<EventRegistry>,
    report_tx: Option<mpsc::Sender<CycleReport>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let bookmaker = runner.bookmaker();
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(bookmaker = %bookmaker, interval_ms = interval.as_millis() as u64, "Polling started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            _ = shutdown_rx.changed() => {
                debug!(bookmaker = %bookmaker, "Abandoning cycle in flight");
                break;
            }
            result = runner.run_cycle(&registry) => result,
        };

        match result {
            Ok(report) => {
                trace!(bookmaker = %bookmaker, %report, "Cycle report");
                if let Some(tx) = &report_tx {
                    if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(report) {
                        warn!(bookmaker = %bookmaker, "Report channel full, dropping report");
                    }
                }
            }
            Err(e) if e.is_recoverable() => {
                warn!(bookmaker = %bookmaker, error = %e, "Polling cycle failed");
            }
            Err(e) => {
                error!(bookmaker = %bookmaker, error = %e, "Polling cycle failed");
            }
        }
    }

    info!(bookmaker = %bookmaker, "Polling stopped");
}
