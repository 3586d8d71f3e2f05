use anyhow::{bail, Context, Result};
use clap::Parser;
use common::Bookmaker;
use config::{AdapterConfig, ForkscanConfig, SourceConfig, DEFAULT_CONFIG_PATH};
use poller::{CycleReport, PollingScheduler};
use registry::EventRegistry;
use source_adapter_trait::FeedSource;
use source_adapters::{BetboomAdapter, FileFeed, FonbetAdapter, HttpFeed};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const REPORT_CHANNEL_CAPACITY: usize = 256;

/// Command line arguments for forkscan.
#[derive(Parser, Debug)]
struct Args {
    /// Path to the forkscan configuration YAML
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,
    /// Run one cycle per adapter, print the registry summary and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = ForkscanConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;
    cfg.validate()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let registry = Arc::new(EventRegistry::new(cfg.registry));
    let mut scheduler = PollingScheduler::new(registry.clone());
    for adapter_cfg in cfg.enabled_adapters() {
        register_adapter(&mut scheduler, adapter_cfg)?;
    }
    info!(
        adapters = scheduler.len(),
        grace_cycles = cfg.registry.grace_cycles,
        "Configured event registry"
    );

    if args.once {
        for result in scheduler.run_once().await {
            match result {
                Ok(report) => info!(%report, "Cycle complete"),
                Err(e) => warn!(error = %e, "Cycle failed"),
            }
        }
        print_summary(&registry);
        return Ok(());
    }

    let (report_tx, report_rx) = mpsc::channel(REPORT_CHANNEL_CAPACITY);
    let handle = scheduler.with_report_sender(report_tx).spawn();
    let reports_handle = tokio::spawn(log_reports(ReceiverStream::new(report_rx)));

    let summary_handle = cfg.report_interval().map(|period| {
        let registry = registry.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately; skip the empty summary.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                log_summary(&registry);
            }
        })
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    // Graceful shutdown
    if let Some(summary) = summary_handle {
        summary.abort();
    }
    handle.shutdown().await;
    if let Err(e) = reports_handle.await {
        error!(error = %e, "Report logger exited with error");
    }
    log_summary(&registry);

    Ok(())
}

fn build_feed(source: &SourceConfig) -> Result<Arc<dyn FeedSource>> {
    let feed: Arc<dyn FeedSource> = match source {
        SourceConfig::Http {
            url,
            timeout_ms,
            headers,
        } => Arc::new(HttpFeed::new(url.clone(), Duration::from_millis(*timeout_ms), headers)?),
        SourceConfig::File { path } => Arc::new(FileFeed::new(path.clone())),
    };
    Ok(feed)
}

fn register_adapter(scheduler: &mut PollingScheduler, adapter_cfg: &AdapterConfig) -> Result<()> {
    let feed = build_feed(&adapter_cfg.source)
        .with_context(|| format!("Failed to set up feed for {}", adapter_cfg.bookmaker))?;
    info!(
        bookmaker = %adapter_cfg.bookmaker,
        source = %feed.describe(),
        interval_ms = adapter_cfg.interval_ms,
        "Registering adapter"
    );

    match adapter_cfg.bookmaker {
        Bookmaker::Fonbet => scheduler.register_adapter(FonbetAdapter::new(feed), adapter_cfg.interval()),
        Bookmaker::Betboom => scheduler.register_adapter(BetboomAdapter::new(feed), adapter_cfg.interval()),
        other => bail!("No adapter implementation for {}", other),
    }
    Ok(())
}

async fn log_reports(mut reports: ReceiverStream<CycleReport>) {
    while let Some(report) = reports.next().await {
        if report.has_changes() || report.failed > 0 {
            info!(%report, "Cycle complete");
        } else {
            debug!(%report, "Cycle complete");
        }
    }
}

fn log_summary(registry: &EventRegistry) {
    info!(
        matches = registry.len(),
        events = registry.event_count(),
        cross_source = registry.cross_source_matches(2).len(),
        "Registry summary"
    );
}

fn print_summary(registry: &EventRegistry) {
    println!(
        "{} matches, {} events, tracked per bookmaker:",
        registry.len(),
        registry.event_count()
    );
    for bookmaker in Bookmaker::ALL {
        let tracked = registry.tracked(bookmaker);
        if tracked > 0 {
            println!("  {:<12} {}", bookmaker.as_str(), tracked);
        }
    }

    let matches = registry.cross_source_matches(2);
    println!("{} cross-source matches:", matches.len());
    for entry in matches {
        let names: Vec<String> = entry
            .bookmakers()
            .into_iter()
            .filter_map(|b| entry.events.get(&b).map(|e| format!("{}={}", b, e.source_id)))
            .collect();
        println!("  {}  [{}]", entry.key, names.join(", "));
    }
}
