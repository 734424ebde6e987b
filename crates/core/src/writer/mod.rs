//! Bulk writer and deduplicator.
//!
//! Reconciles freshly fetched rows against the persisted reference set of an
//! entity, projects them onto the target schema and hands a delimiter-separated
//! payload to the store's bulk-load path.

mod dedup;
mod payload;

pub use dedup::{collapse_duplicates, net_new};
pub use payload::{BulkPayload, FIELD_DELIMITER, NULL_MARKER};

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::constants::ID_COLUMN;
use crate::entities::EntityUpdate;
use crate::errors::{Error, Result, ValidationError};
use crate::records::{BulkLoad, DatasetSchema, Record, RecordStore, ReferenceRecords};

/// How fetched rows are reconciled with persisted rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Drop rows whose id is already persisted; existing rows are never touched.
    #[default]
    Normal,
    /// Delete every incoming id first, then write all incoming rows.
    ForceUpdate,
}

/// Writes shaped records through a [`RecordStore`].
#[derive(Clone)]
pub struct BulkWriter {
    store: Arc<dyn RecordStore>,
}

impl BulkWriter {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        BulkWriter { store }
    }

    /// Deduplicates `rows` and persists the net-new (or, under
    /// [`WriteMode::ForceUpdate`], all) rows together with an optional
    /// entity update. Returns the number of rows written.
    ///
    /// A failed load surfaces the store error; nothing is kept.
    pub async fn upsert(
        &self,
        schema: &Arc<DatasetSchema>,
        rows: Vec<Record>,
        reference: &ReferenceRecords,
        mode: WriteMode,
        entity_update: Option<EntityUpdate>,
    ) -> Result<usize> {
        let incoming = rows.len();
        let rows = collapse_duplicates(rows);
        let (rows, delete_ids) = match mode {
            WriteMode::Normal => (net_new(rows, reference), Vec::new()),
            WriteMode::ForceUpdate => {
                let ids = rows.iter().map(|r| r.id.clone()).collect();
                (rows, ids)
            }
        };
        debug!(
            "Upserting into '{}' ({:?}): {} incoming, {} to write",
            schema.table(),
            mode,
            incoming,
            rows.len()
        );

        let mut load = BulkLoad::new(Arc::clone(schema));
        load.entity_update = entity_update.filter(|u| !u.is_noop());

        if !rows.is_empty() {
            let mut shape = BTreeSet::new();
            for row in &rows {
                shape.extend(row.shape());
            }
            let columns = schema.project(&shape);
            if columns.is_empty() {
                return Err(Error::Validation(ValidationError::EmptyProjection {
                    table: schema.table().to_string(),
                }));
            }
            if !columns.iter().any(|c| c.name == ID_COLUMN) {
                return Err(Error::Validation(ValidationError::MissingKeyColumn {
                    table: schema.table().to_string(),
                    column: ID_COLUMN.to_string(),
                }));
            }
            load.payload = Some(BulkPayload::encode(&columns, &rows)?);
            load.delete_ids = delete_ids;
        }

        if load.is_empty() {
            return Ok(0);
        }

        match self.store.bulk_load(load).await {
            Ok(saved) => Ok(saved),
            Err(e) => {
                error!("Bulk load into '{}' failed: {}", schema.table(), e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ColumnDef, ColumnKind, Level, RecordKey};
    use crate::testing::MockRecordStore;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn schema() -> Arc<DatasetSchema> {
        Arc::new(DatasetSchema::keyed(
            "stock_1d_kdata",
            vec![
                ColumnDef::new("close", ColumnKind::Real),
                ColumnDef::new("volume", ColumnKind::Integer),
            ],
        ))
    }

    fn day(offset: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(offset)
    }

    fn bar(offset: i64, close: f64) -> Record {
        Record::new("stock_sh_600000", day(offset), Level::Day1)
            .set("close", close)
            .set("volume", 1000_i64)
    }

    #[tokio::test]
    async fn test_normal_mode_writes_only_net_new_rows() {
        let store = Arc::new(MockRecordStore::new());
        let schema = schema();
        let existing: Vec<Record> = (0..10).map(|i| bar(i, 1.0)).collect();
        store.seed(&schema, &existing);
        let reference = ReferenceRecords::new(
            "stock_sh_600000",
            existing.iter().map(|r| RecordKey {
                id: r.id.clone(),
                timestamp: r.timestamp,
            }),
        );

        let writer = BulkWriter::new(store.clone());
        let rows: Vec<Record> = (0..100).map(|i| bar(i, 2.0)).collect();
        let saved = writer
            .upsert(&schema, rows, &reference, WriteMode::Normal, None)
            .await
            .unwrap();

        assert_eq!(saved, 90);
        assert_eq!(store.row_count(&schema), 100);
        // existing rows are not updated in place
        assert_eq!(store.value(&schema, &bar(0, 0.0).id, "close").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_force_update_rewrites_existing_rows() {
        let store = Arc::new(MockRecordStore::new());
        let schema = schema();
        let existing: Vec<Record> = (0..5).map(|i| bar(i, 1.0)).collect();
        store.seed(&schema, &existing);
        let reference = store.load_reference(&schema, "stock_sh_600000").unwrap();

        let writer = BulkWriter::new(store.clone());
        let rows: Vec<Record> = (3..8).map(|i| bar(i, 2.5)).collect();
        let saved = writer
            .upsert(&schema, rows, &reference, WriteMode::ForceUpdate, None)
            .await
            .unwrap();

        assert_eq!(saved, 5);
        assert_eq!(store.row_count(&schema), 8);
        assert_eq!(store.value(&schema, &bar(3, 0.0).id, "close").as_deref(), Some("2.5"));
        assert_eq!(store.value(&schema, &bar(0, 0.0).id, "close").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_duplicates_within_batch_keep_last() {
        let store = Arc::new(MockRecordStore::new());
        let schema = schema();
        let writer = BulkWriter::new(store.clone());
        let rows = vec![bar(1, 1.0), bar(2, 1.0), bar(1, 3.0)];
        let saved = writer
            .upsert(
                &schema,
                rows,
                &ReferenceRecords::empty("stock_sh_600000"),
                WriteMode::Normal,
                None,
            )
            .await
            .unwrap();
        assert_eq!(saved, 2);
        assert_eq!(store.value(&schema, &bar(1, 0.0).id, "close").as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_unknown_columns_are_dropped() {
        let store = Arc::new(MockRecordStore::new());
        let schema = schema();
        let writer = BulkWriter::new(store.clone());
        let rows = vec![bar(1, 1.0).set("turnover_rate", 0.3)];
        let saved = writer
            .upsert(
                &schema,
                rows,
                &ReferenceRecords::empty("stock_sh_600000"),
                WriteMode::Normal,
                None,
            )
            .await
            .unwrap();
        assert_eq!(saved, 1);
        assert_eq!(
            store.last_payload_columns(),
            vec!["id", "entity_id", "timestamp", "close", "volume"]
        );
    }

    #[tokio::test]
    async fn test_empty_projection_is_rejected() {
        let store = Arc::new(MockRecordStore::new());
        let schema = Arc::new(DatasetSchema::new(
            "holders",
            vec![ColumnDef::new("holder_name", ColumnKind::Text)],
        ));
        let writer = BulkWriter::new(store.clone());
        let result = writer
            .upsert(
                &schema,
                vec![bar(1, 1.0)],
                &ReferenceRecords::empty("stock_sh_600000"),
                WriteMode::Normal,
                None,
            )
            .await;
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::EmptyProjection { .. }))
        ));
        assert_eq!(store.load_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_load_reports_error_and_writes_nothing() {
        let store = Arc::new(MockRecordStore::new());
        store.set_fail_on_load(true);
        let schema = schema();
        let writer = BulkWriter::new(store.clone());
        let result = writer
            .upsert(
                &schema,
                vec![bar(1, 1.0)],
                &ReferenceRecords::empty("stock_sh_600000"),
                WriteMode::Normal,
                None,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(store.row_count(&schema), 0);
    }

    #[tokio::test]
    async fn test_entity_update_without_rows_still_applied() {
        let store = Arc::new(MockRecordStore::new());
        let schema = schema();
        let writer = BulkWriter::new(store.clone());
        let saved = writer
            .upsert(
                &schema,
                Vec::new(),
                &ReferenceRecords::empty("stock_sh_600000"),
                WriteMode::Normal,
                Some(EntityUpdate::deactivate("stock_sh_600000")),
            )
            .await
            .unwrap();
        assert_eq!(saved, 0);
        assert_eq!(
            store.entity_updates(),
            vec![EntityUpdate::deactivate("stock_sh_600000")]
        );
    }

    #[tokio::test]
    async fn test_second_identical_upsert_saves_nothing() {
        let store = Arc::new(MockRecordStore::new());
        let schema = schema();
        let writer = BulkWriter::new(store.clone());
        let rows: Vec<Record> = (0..20).map(|i| bar(i, 1.0)).collect();

        let first = writer
            .upsert(
                &schema,
                rows.clone(),
                &store.load_reference(&schema, "stock_sh_600000").unwrap(),
                WriteMode::Normal,
                None,
            )
            .await
            .unwrap();
        let second = writer
            .upsert(
                &schema,
                rows,
                &store.load_reference(&schema, "stock_sh_600000").unwrap(),
                WriteMode::Normal,
                None,
            )
            .await
            .unwrap();

        assert_eq!(first, 20);
        assert_eq!(second, 0);
        assert_eq!(store.row_count(&schema), 20);
    }
}
