use std::sync::Arc;

use async_trait::async_trait;

use super::{DatasetSchema, RecordKey, RecordQuery, ReferenceRecords};
use crate::entities::EntityUpdate;
use crate::errors::Result;
use crate::writer::BulkPayload;

/// One transactional write against a dataset table.
///
/// Applied atomically in this order: delete `delete_ids`, stream `payload`,
/// apply `entity_update`. On any failure nothing is kept.
#[derive(Debug, Clone)]
pub struct BulkLoad {
    pub schema: Arc<DatasetSchema>,
    pub delete_ids: Vec<String>,
    pub payload: Option<BulkPayload>,
    pub entity_update: Option<EntityUpdate>,
}

impl BulkLoad {
    pub fn new(schema: Arc<DatasetSchema>) -> Self {
        BulkLoad {
            schema,
            delete_ids: Vec::new(),
            payload: None,
            entity_update: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.delete_ids.is_empty()
            && self.payload.as_ref().map_or(true, |p| p.row_count() == 0)
            && self.entity_update.as_ref().map_or(true, |u| u.is_noop())
    }
}

/// Storage for dataset records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Creates the dataset table if it does not exist.
    async fn ensure_dataset(&self, schema: &DatasetSchema) -> Result<()>;

    /// Loads the keys of rows matching `query`.
    fn query_keys(&self, schema: &DatasetSchema, query: &RecordQuery) -> Result<Vec<RecordKey>>;

    /// Loads the reference record set of one entity.
    fn load_reference(&self, schema: &DatasetSchema, entity_id: &str) -> Result<ReferenceRecords> {
        let keys = self.query_keys(schema, &RecordQuery::for_entity(entity_id))?;
        Ok(ReferenceRecords::new(entity_id, keys))
    }

    /// Applies a bulk load in one transaction and returns the number of rows written.
    async fn bulk_load(&self, load: BulkLoad) -> Result<usize>;
}
