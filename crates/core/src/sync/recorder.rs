use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use super::{DatasetDescriptor, PassOutcome, SyncWindow};
use crate::entities::Entity;
use crate::errors::Result;
use crate::records::Record;

/// Raw rows returned by one provider fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchBatch {
    pub rows: Vec<JsonValue>,
    /// The provider has nothing beyond these rows.
    pub exhausted: bool,
    /// The provider reports the entity as delisted.
    pub delisted: bool,
}

impl FetchBatch {
    pub fn new(rows: Vec<JsonValue>) -> Self {
        FetchBatch {
            rows,
            exhausted: false,
            delisted: false,
        }
    }

    /// No data for this window.
    pub fn empty() -> Self {
        FetchBatch {
            rows: Vec::new(),
            exhausted: true,
            delisted: false,
        }
    }

    /// Entity no longer listed upstream.
    pub fn delisted() -> Self {
        FetchBatch {
            rows: Vec::new(),
            exhausted: true,
            delisted: true,
        }
    }

    pub fn exhausted(mut self) -> Self {
        self.exhausted = true;
        self
    }
}

/// Provider plugin: produces one dataset for one `(region, provider)`.
#[async_trait]
pub trait Recorder: Send + Sync {
    fn descriptor(&self) -> &DatasetDescriptor;

    /// Entities this recorder covers.
    async fn init_entities(&self) -> Result<Vec<Entity>>;

    /// Timestamps available upstream for discrete datasets.
    async fn declared_timestamps(&self, _entity: &Entity) -> Result<Vec<NaiveDateTime>> {
        Ok(Vec::new())
    }

    /// Fetches the rows of `window` for `entity`.
    async fn fetch(&self, entity: &Entity, window: &SyncWindow) -> Result<FetchBatch>;

    /// Maps raw rows onto records, assigning deterministic ids.
    fn shape(&self, entity: &Entity, rows: Vec<JsonValue>) -> Result<Vec<Record>>;

    async fn on_entity_finished(&self, _entity: &Entity, _outcome: PassOutcome) {}

    /// Dataset-level finalization after every entity is done.
    async fn on_all_finished(&self, _entities: &[Entity]) -> Result<()> {
        Ok(())
    }
}
