//! Bounded worker pool over a shared entity queue.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::Semaphore;

use super::{
    BatchReport, EngineOptions, EntityReport, EntitySync, NoOpProgressSink, ProgressEvent,
    ProgressSink, StopSignal,
};
use crate::entities::Entity;
use crate::errors::{Error, Result};

type EntityQueue = Arc<Mutex<VecDeque<Entity>>>;

/// Fans entities out over `worker_count` workers.
///
/// Workers pull from one shared queue. Each worker keeps up to
/// `entity_slots` entities in flight and gates their fetches with its own
/// semaphore of `concurrency_limit` permits.
pub struct SyncEngine {
    options: EngineOptions,
    progress: Arc<dyn ProgressSink>,
    stop: StopSignal,
}

impl SyncEngine {
    pub fn new(options: EngineOptions) -> Self {
        SyncEngine {
            options,
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

    /// Runs every entity to a terminal outcome, then the recorder's
    /// finalization hook.
    ///
    /// Per-entity failures are reported, not returned. Errors are reserved for
    /// invalid options, crashed workers and a failed finalization.
    pub async fn run(
        &self,
        task: &str,
        sync: Arc<EntitySync>,
        entities: Vec<Entity>,
    ) -> Result<BatchReport> {
        self.options.validate()?;

        let mut seen = HashSet::new();
        let entities: Vec<Entity> = entities
            .into_iter()
            .filter(|e| seen.insert(e.id.clone()))
            .collect();
        let total = entities.len();
        let mut batch = BatchReport::new(task, total);

        info!(
            "Starting {} for {} entities ({} workers, {} fetches per worker)",
            task, total, self.options.worker_count, self.options.concurrency_limit
        );
        self.progress.emit(ProgressEvent::started(task, total));

        let queue: EntityQueue = Arc::new(Mutex::new(entities.iter().cloned().collect()));
        let workers = self.options.worker_count.min(total.max(1));
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    task.to_string(),
                    total,
                    Arc::clone(&sync),
                    Arc::clone(&queue),
                    self.options,
                    Arc::clone(&self.progress),
                    self.stop.clone(),
                ))
            })
            .collect();

        for handle in handles {
            let reports = handle
                .await
                .map_err(|e| Error::Unexpected(format!("sync worker crashed: {}", e)))?;
            for report in reports {
                batch.add(report);
            }
        }

        let unscheduled: Vec<Entity> = queue
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .drain(..)
            .collect();
        for entity in &unscheduled {
            batch.add_unscheduled(&entity.id);
        }
        batch.stopped = self.stop.is_stopped();

        let finalized = if batch.stopped {
            warn!(
                "{} stopped with {} entities never scheduled; skipping finalization",
                task,
                unscheduled.len()
            );
            Ok(())
        } else {
            sync.recorder().on_all_finished(&entities).await
        };

        self.progress.emit(ProgressEvent::finished(task, total));
        for failure in batch.failures() {
            warn!(
                "{}: {} failed: {}",
                task,
                failure.entity_id,
                failure.error.as_deref().unwrap_or("unfinished")
            );
        }
        info!("{}: {}", task, batch.summary());

        if let Err(e) = finalized {
            error!("{}: finalization failed: {}", task, e);
            return Err(e);
        }
        Ok(batch)
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_worker(
    worker: usize,
    task: String,
    total: usize,
    sync: Arc<EntitySync>,
    queue: EntityQueue,
    options: EngineOptions,
    progress: Arc<dyn ProgressSink>,
    stop: StopSignal,
) -> Vec<EntityReport> {
    let gate = Semaphore::new(options.concurrency_limit);
    let slots = options.slots();
    let mut in_flight = FuturesUnordered::new();
    let mut reports = Vec::new();

    loop {
        while in_flight.len() < slots && !stop.is_stopped() {
            let next = queue.lock().unwrap_or_else(|p| p.into_inner()).pop_front();
            let Some(entity) = next else {
                break;
            };
            let sync = Arc::clone(&sync);
            let gate = &gate;
            in_flight.push(async move { sync.process_entity(&entity, gate).await });
        }

        match in_flight.next().await {
            Some(report) => {
                progress.emit(ProgressEvent::advanced(&task, total));
                reports.push(report);
            }
            None => break,
        }
    }

    debug!("Worker {} of {} done after {} entities", worker, task, reports.len());
    reports
}
