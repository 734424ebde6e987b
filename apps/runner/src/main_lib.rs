use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use harvest_core::registry::{ConnectionRegistry, RecorderRegistry};
use harvest_core::sync::{
    BatchReport, BroadcastProgressSink, HarvestService, ProgressEvent, ProgressKind, StopSignal,
};
use harvest_market_data::RateLimiter;
use harvest_storage_sqlite::SqliteStores;

const PROGRESS_CAPACITY: usize = 256;

/// Installs the tracing subscriber. `log` records from the library crates are
/// captured through the `tracing-log` bridge.
pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub fn build_registry() -> anyhow::Result<RecorderRegistry> {
    let mut registry = RecorderRegistry::new();
    harvest_market_data::register(&mut registry, Arc::new(RateLimiter::new()))?;
    Ok(registry)
}

/// Opens the database, runs the configured recorder once and returns its report.
pub async fn run_batch(config: &Config) -> anyhow::Result<BatchReport> {
    let stores = SqliteStores::open(&config.db_path)?;
    info!("Database path in use: {}", config.db_path);
    let connections = Arc::new(ConnectionRegistry::new(stores.store_set()));
    let recorders = Arc::new(build_registry()?);

    let progress = BroadcastProgressSink::new(PROGRESS_CAPACITY);
    let progress_task = tokio::spawn(log_progress(progress.subscribe()));

    let service = HarvestService::new(recorders, connections).with_progress(Arc::new(progress));
    spawn_stop_on_ctrl_c(service.stop_signal());

    let result = service
        .run(&config.key, config.sync_options(), config.engine_options())
        .await;
    // Dropping the service closes the channel and ends the progress task.
    drop(service);
    if let Err(e) = progress_task.await {
        warn!("Progress logger ended abnormally: {}", e);
    }
    Ok(result?)
}

fn spawn_stop_on_ctrl_c(stop: StopSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight entities");
            stop.stop();
        }
    });
}

/// Renders progress events as log lines. Lagging only skips lines.
async fn log_progress(mut events: broadcast::Receiver<ProgressEvent>) {
    let mut completed = 0;
    loop {
        match events.recv().await {
            Ok(event) => {
                completed += event.completed_delta;
                match event.kind {
                    ProgressKind::Started => {
                        info!("{}: started, {} entities", event.task, event.total)
                    }
                    ProgressKind::Advanced => {
                        info!("{}: {}/{} entities done", event.task, completed, event.total)
                    }
                    ProgressKind::Finished => info!("{}: finished", event.task),
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Progress logger skipped {} events", skipped)
            }
            Err(RecvError::Closed) => break,
        }
    }
}
