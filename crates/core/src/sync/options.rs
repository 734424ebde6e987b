use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::EntitySelector;
use crate::errors::{Error, Result, ValidationError};
use crate::writer::WriteMode;

/// Per-batch synchronization options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    /// Earliest timestamp to fetch.
    pub start: Option<NaiveDateTime>,
    /// Latest timestamp to fetch.
    pub end: Option<NaiveDateTime>,
    pub write_mode: WriteMode,
    pub selector: EntitySelector,
    /// Pause after each fetch while still holding the fetch permit.
    pub sleeping_time: Option<Duration>,
    /// Overrides the descriptor's default fetch size.
    pub default_size: Option<usize>,
    /// Wall clock used for planning. `None` means the current time.
    pub as_of: Option<DateTime<Utc>>,
}

impl SyncOptions {
    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(Error::Validation(ValidationError::InvalidWindow(format!(
                    "start {} is after end {}",
                    start, end
                ))));
            }
        }
        if self.default_size == Some(0) {
            return Err(Error::Config("default size must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.as_of.unwrap_or_else(Utc::now)
    }
}

/// Worker pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOptions {
    pub worker_count: usize,
    /// Size of each worker's fetch semaphore.
    pub concurrency_limit: usize,
    /// Entities in flight per worker. Defaults to `concurrency_limit`.
    pub entity_slots: Option<usize>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            worker_count: 1,
            concurrency_limit: 10,
            entity_slots: None,
        }
    }
}

impl EngineOptions {
    pub fn new(worker_count: usize, concurrency_limit: usize) -> Self {
        EngineOptions {
            worker_count,
            concurrency_limit,
            entity_slots: None,
        }
    }

    pub fn with_entity_slots(mut self, slots: usize) -> Self {
        self.entity_slots = Some(slots);
        self
    }

    pub fn slots(&self) -> usize {
        self.entity_slots.unwrap_or(self.concurrency_limit)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(Error::Config("worker count must be at least 1".to_string()));
        }
        if self.concurrency_limit == 0 {
            return Err(Error::Config(
                "concurrency limit must be at least 1".to_string(),
            ));
        }
        if self.slots() == 0 {
            return Err(Error::Config("entity slots must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Shared stop flag. Once raised, workers stop taking new entities and let
/// in-flight entities drain.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
