//! Batch entry point: resolve a recorder, prepare its dataset and run it.

use std::sync::Arc;

use chrono::Duration;
use log::{info, warn};

use super::{
    BatchReport, EngineOptions, EntitySync, NoOpProgressSink, ProgressSink, RecorderKey,
    StopSignal, SyncEngine, SyncOptions,
};
use crate::calendar::TradingCalendar;
use crate::errors::Result;
use crate::registry::{ConnectionRegistry, RecorderRegistry, StoreSet};

/// Days of trading sessions loaded before "today" for planning.
pub const CALENDAR_LOOKBACK_DAYS: i64 = 30;

/// Runs sync batches for registered recorders.
pub struct HarvestService {
    recorders: Arc<RecorderRegistry>,
    connections: Arc<ConnectionRegistry>,
    progress: Arc<dyn ProgressSink>,
    stop: StopSignal,
}

impl HarvestService {
    pub fn new(recorders: Arc<RecorderRegistry>, connections: Arc<ConnectionRegistry>) -> Self {
        HarvestService {
            recorders,
            connections,
            progress: Arc::new(NoOpProgressSink),
            stop: StopSignal::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Runs one batch of the recorder registered under `key`.
    ///
    /// Registry, configuration and dataset setup errors are returned before
    /// any entity is scheduled.
    pub async fn run(
        &self,
        key: &RecorderKey,
        options: SyncOptions,
        engine: EngineOptions,
    ) -> Result<BatchReport> {
        options.validate()?;
        engine.validate()?;

        let recorder = self.recorders.create(key, &self.connections)?;
        let descriptor = recorder.descriptor();
        descriptor.schema.validate()?;

        let stores = self.connections.stores_for(&key.provider);
        stores.records.ensure_dataset(&descriptor.schema).await?;

        let entities = options.selector.apply(recorder.init_entities().await?);
        info!("{}: {} entities selected", key, entities.len());

        let calendar = load_calendar(stores, key, &options);
        let sync = Arc::new(EntitySync::new(
            Arc::clone(&recorder),
            Arc::clone(&stores.records),
            Arc::new(calendar),
            options,
        ));

        SyncEngine::new(engine)
            .with_progress(Arc::clone(&self.progress))
            .with_stop_signal(self.stop.clone())
            .run(&key.to_string(), sync, entities)
            .await
    }
}

fn load_calendar(stores: &StoreSet, key: &RecorderKey, options: &SyncOptions) -> TradingCalendar {
    let today = key.region.local_time(options.now()).date();
    let from = today - Duration::days(CALENDAR_LOOKBACK_DAYS);
    match stores.calendars.load_calendar(key.region, from, today) {
        Ok(calendar) => calendar,
        Err(e) => {
            warn!(
                "Failed to load {} calendar for {}: {}. Planning with default sizes",
                key.region, key, e
            );
            TradingCalendar::empty(key.region)
        }
    }
}
