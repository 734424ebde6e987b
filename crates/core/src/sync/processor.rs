//! Per-entity fetch/persist state machine.

use std::sync::Arc;

use chrono::NaiveDateTime;
use log::{debug, error, info, warn};
use tokio::sync::Semaphore;

use super::{
    DatasetDescriptor, EntityReport, FetchBatch, PassOutcome, PlanningMode, Recorder,
    SyncOptions, SyncPlanner, SyncWindow,
};
use crate::calendar::TradingCalendar;
use crate::entities::{Entity, EntityUpdate};
use crate::errors::{Error, Result};
use crate::records::RecordStore;
use crate::writer::BulkWriter;

/// Drives one entity through plan → fetch → shape → persist until a pass
/// ends with a terminal outcome.
pub struct EntitySync {
    recorder: Arc<dyn Recorder>,
    records: Arc<dyn RecordStore>,
    writer: BulkWriter,
    calendar: Arc<TradingCalendar>,
    planner: SyncPlanner,
    options: SyncOptions,
}

impl EntitySync {
    pub fn new(
        recorder: Arc<dyn Recorder>,
        records: Arc<dyn RecordStore>,
        calendar: Arc<TradingCalendar>,
        options: SyncOptions,
    ) -> Self {
        let descriptor = recorder.descriptor();
        let planner = SyncPlanner::new(
            descriptor.key.region,
            descriptor.level(),
            options.default_size.unwrap_or(descriptor.default_size),
        )
        .with_bounds(options.start, options.end);
        EntitySync {
            writer: BulkWriter::new(Arc::clone(&records)),
            recorder,
            records,
            calendar,
            planner,
            options,
        }
    }

    pub fn recorder(&self) -> &Arc<dyn Recorder> {
        &self.recorder
    }

    pub fn descriptor(&self) -> &DatasetDescriptor {
        self.recorder.descriptor()
    }

    /// Runs every pass for `entity`. Fetches are gated by `gate`.
    ///
    /// Fetch and shape failures end the entity with [`PassOutcome::Exhausted`]
    /// and an error in the report. Reference-load and persist failures leave
    /// the entity unfinished so a rerun picks it up.
    pub async fn process_entity(&self, entity: &Entity, gate: &Semaphore) -> EntityReport {
        let mut report = EntityReport::new(&entity.id);
        let dataset = &self.descriptor().key;

        loop {
            report.passes += 1;
            let outcome = match self.run_pass(entity, gate, &mut report).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(
                        "Sync of {} for {} stopped unfinished after {} passes: {}",
                        dataset, entity.id, report.passes, e
                    );
                    report.error = Some(e.to_string());
                    return report;
                }
            };

            if outcome.is_terminal() || self.descriptor().one_shot {
                debug!(
                    "{} finished {} after {} passes ({}), saved {}",
                    entity.id, dataset, report.passes, outcome, report.saved
                );
                report.outcome = Some(outcome);
                self.recorder.on_entity_finished(entity, outcome).await;
                return report;
            }
        }
    }

    async fn run_pass(
        &self,
        entity: &Entity,
        gate: &Semaphore,
        report: &mut EntityReport,
    ) -> Result<PassOutcome> {
        let descriptor = self.descriptor();
        let reference = self.records.load_reference(&descriptor.schema, &entity.id)?;
        let now = descriptor.key.region.local_time(self.options.now());

        let window = match descriptor.planning {
            PlanningMode::Range { .. } => {
                self.planner.plan(entity, &reference, &self.calendar, now)
            }
            PlanningMode::Discrete => match self.declared(entity, gate).await {
                Ok(declared) => self.planner.plan_discrete(entity, &reference, &declared, now),
                Err(e) => return Ok(self.fetch_failed(entity, e, report)),
            },
        };
        if window.is_current() {
            return Ok(PassOutcome::AlreadyCurrent);
        }

        let batch = match self.fetch(entity, &window, gate).await {
            Ok(batch) => batch,
            Err(e) => return Ok(self.fetch_failed(entity, e, report)),
        };
        if batch.rows.is_empty() && !batch.delisted {
            debug!("No data for {} in {:?}..{:?}", entity.id, window.start, window.end);
            return Ok(PassOutcome::Exhausted);
        }

        let FetchBatch {
            rows,
            exhausted,
            delisted,
        } = batch;
        let records = match self.recorder.shape(entity, rows) {
            Ok(records) => records,
            Err(e) => return Ok(self.fetch_failed(entity, e, report)),
        };

        let update = if delisted {
            info!("{} reported delisted by {}", entity.id, descriptor.key.provider);
            Some(EntityUpdate::deactivate(&entity.id))
        } else {
            None
        };
        let saved = self
            .writer
            .upsert(
                &descriptor.schema,
                records,
                &reference,
                self.options.write_mode,
                update,
            )
            .await?;
        report.saved += saved;

        Ok(if delisted || exhausted {
            PassOutcome::Exhausted
        } else if saved == 0 {
            PassOutcome::NoNewRows
        } else {
            PassOutcome::MoreWork
        })
    }

    async fn declared(&self, entity: &Entity, gate: &Semaphore) -> Result<Vec<NaiveDateTime>> {
        let _permit = gate
            .acquire()
            .await
            .map_err(|e| Error::Unexpected(e.to_string()))?;
        let declared = self.recorder.declared_timestamps(entity).await?;
        debug!("{} declares {} timestamps", entity.id, declared.len());
        Ok(declared)
    }

    async fn fetch(
        &self,
        entity: &Entity,
        window: &SyncWindow,
        gate: &Semaphore,
    ) -> Result<FetchBatch> {
        let _permit = gate
            .acquire()
            .await
            .map_err(|e| Error::Unexpected(e.to_string()))?;
        let result = self.recorder.fetch(entity, window).await;
        if let Some(pause) = self.options.sleeping_time {
            tokio::time::sleep(pause).await;
        }
        result
    }

    fn fetch_failed(&self, entity: &Entity, e: Error, report: &mut EntityReport) -> PassOutcome {
        let key = &self.descriptor().key;
        warn!(
            "Fetch failed for {} (provider {}, dataset {}): {}",
            entity.id, key.provider, key.dataset, e
        );
        report.error = Some(e.to_string());
        PassOutcome::Exhausted
    }
}
