use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Nullable, Text};
use diesel::sqlite::{Sqlite, SqliteConnection};
use log::{debug, error};
use std::sync::Arc;

use super::sql;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::entities::apply_entity_update;
use crate::errors::IntoCore;
use crate::utils::{chunk_for_sqlite, rows_per_statement};
use harvest_core::constants::TIMESTAMP_STORAGE_FORMAT;
use harvest_core::errors::{DatabaseError, Error, Result};
use harvest_core::records::{
    BulkLoad, ColumnDef, DatasetSchema, RecordKey, RecordQuery, RecordStore, Value,
};

#[derive(QueryableByName)]
struct KeyRow {
    #[diesel(sql_type = Text)]
    id: String,
    #[diesel(sql_type = Nullable<Text>)]
    timestamp: Option<String>,
}

/// Dataset tables in SQLite.
///
/// Reads go through the pool; every write is a writer-actor job so a bulk
/// load is one immediate transaction.
pub struct RecordRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl RecordRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl RecordStore for RecordRepository {
    async fn ensure_dataset(&self, schema: &DatasetSchema) -> Result<()> {
        schema.validate()?;
        let ddl = sql::create_table(schema);
        self.writer
            .exec(move |conn: &mut SqliteConnection| conn.batch_execute(&ddl).into_core())
            .await
    }

    fn query_keys(&self, schema: &DatasetSchema, query: &RecordQuery) -> Result<Vec<RecordKey>> {
        let rendered = sql::select_keys(schema.table(), query)?;
        let mut conn = get_connection(&self.pool)?;
        let rows = rendered
            .into_query()
            .load::<KeyRow>(&mut conn)
            .into_core()?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            // Rows without a timestamp cannot anchor a resume point.
            let Some(text) = row.timestamp else {
                continue;
            };
            let timestamp = NaiveDateTime::parse_from_str(&text, TIMESTAMP_STORAGE_FORMAT)?;
            keys.push(RecordKey {
                id: row.id,
                timestamp,
            });
        }
        Ok(keys)
    }

    async fn bulk_load(&self, load: BulkLoad) -> Result<usize> {
        if load.is_empty() {
            return Ok(0);
        }
        let table = load.schema.table().to_string();
        let result = self
            .writer
            .exec(move |conn: &mut SqliteConnection| apply_bulk_load(conn, &load))
            .await;

        result.map_err(|e| match e {
            Error::Database(DatabaseError::BulkLoadFailed { .. }) => e,
            other => {
                error!("Bulk load into {} failed: {}", table, other);
                Error::Database(DatabaseError::BulkLoadFailed {
                    table: table.clone(),
                    message: other.to_string(),
                })
            }
        })
    }
}

/// Deletes, inserts and applies the entity update on the writer connection.
fn apply_bulk_load(conn: &mut SqliteConnection, load: &BulkLoad) -> Result<usize> {
    let schema = &load.schema;
    let table = schema.table();

    // Decode first so a malformed payload fails before anything is touched.
    let (columns, rows) = match &load.payload {
        Some(payload) => {
            let columns = payload
                .columns()
                .iter()
                .map(|name| {
                    schema.column(name).ok_or_else(|| {
                        Error::Database(DatabaseError::BulkLoadFailed {
                            table: table.to_string(),
                            message: format!("column '{}' is not declared", name),
                        })
                    })
                })
                .collect::<Result<Vec<&ColumnDef>>>()?;
            let rows = typed_rows(&columns, payload.decode()?)?;
            (columns, rows)
        }
        None => (Vec::new(), Vec::new()),
    };

    let mut deleted = 0;
    for chunk in chunk_for_sqlite(&load.delete_ids) {
        let query = chunk.iter().fold(
            sql_query(sql::delete_ids(table, chunk.len())).into_boxed::<Sqlite>(),
            |q, id| q.bind::<Text, _>(id.clone()),
        );
        deleted += query.execute(conn).into_core()?;
    }

    let mut written = 0;
    if !columns.is_empty() {
        for chunk in rows.chunks(rows_per_statement(columns.len())) {
            let query = chunk.iter().flatten().fold(
                sql_query(sql::insert_rows(table, &columns, chunk.len())).into_boxed::<Sqlite>(),
                sql::bind_value,
            );
            written += query.execute(conn).into_core()?;
        }
    }

    if let Some(update) = &load.entity_update {
        apply_entity_update(conn, update)?;
    }

    debug!(
        "Bulk load into {}: deleted {}, wrote {}",
        table, deleted, written
    );
    Ok(written)
}

fn typed_rows(columns: &[&ColumnDef], fields: Vec<Vec<Option<String>>>) -> Result<Vec<Vec<Value>>> {
    fields
        .into_iter()
        .map(|row| {
            columns
                .iter()
                .zip(row.iter())
                .map(|(column, field)| column.kind.parse_field(&column.name, field.as_deref()))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;
    use crate::entities::EntityRepository;
    use chrono::NaiveDate;
    use harvest_core::entities::{Entity, EntityStore, EntityUpdate};
    use harvest_core::records::{Column, ColumnKind, Level, Order, Record};
    use harvest_core::writer::BulkPayload;

    const ENTITY: &str = "stock_sh_600000";

    fn schema() -> Arc<DatasetSchema> {
        Arc::new(DatasetSchema::keyed(
            "stock_1d_kdata",
            vec![
                ColumnDef::new("close", ColumnKind::Real),
                ColumnDef::new("volume", ColumnKind::Integer),
            ],
        ))
    }

    fn bar(day: u32, close: f64) -> Record {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::days(day as i64);
        Record::new(ENTITY, ts, Level::Day1)
            .set("close", close)
            .set("volume", 100i64)
    }

    fn load_of(schema: &Arc<DatasetSchema>, rows: &[Record]) -> BulkLoad {
        let shape = rows[0].shape();
        let columns = schema.project(&shape);
        let mut load = BulkLoad::new(schema.clone());
        load.payload = Some(BulkPayload::encode(&columns, rows).unwrap());
        load
    }

    async fn repo() -> (test_support::TestDb, RecordRepository) {
        let db = test_support::open();
        let repo = RecordRepository::new(db.pool.clone(), db.writer.clone());
        repo.ensure_dataset(&schema()).await.unwrap();
        (db, repo)
    }

    #[tokio::test]
    async fn test_ensure_dataset_is_idempotent() {
        let (_db, repo) = repo().await;
        repo.ensure_dataset(&schema()).await.unwrap();
        assert!(repo.load_reference(&schema(), ENTITY).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_dataset_rejects_bad_names() {
        let (_db, repo) = repo().await;
        let bad = DatasetSchema::keyed("kdata; DROP TABLE entities", vec![]);
        assert!(matches!(repo.ensure_dataset(&bad).await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_bulk_load_and_reference() {
        let (_db, repo) = repo().await;
        let schema = schema();
        let rows: Vec<Record> = (0..90).map(|d| bar(d, 10.0)).collect();

        let written = repo.bulk_load(load_of(&schema, &rows)).await.unwrap();
        assert_eq!(written, 90);

        let reference = repo.load_reference(&schema, ENTITY).unwrap();
        assert_eq!(reference.len(), 90);
        assert_eq!(reference.latest(), Some(rows[89].timestamp));
        assert!(repo.load_reference(&schema, "stock_sz_000001").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_load_replaces_deleted_ids() {
        let (_db, repo) = repo().await;
        let schema = schema();
        repo.bulk_load(load_of(&schema, &[bar(0, 10.0), bar(1, 11.0)]))
            .await
            .unwrap();

        let mut load = load_of(&schema, &[bar(0, 20.0), bar(1, 21.0)]);
        load.delete_ids = vec![bar(0, 0.0).id, bar(1, 0.0).id];
        assert_eq!(repo.bulk_load(load).await.unwrap(), 2);
        assert_eq!(repo.load_reference(&schema, ENTITY).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_bad_value_rolls_back() {
        let (_db, repo) = repo().await;
        let schema = schema();
        repo.bulk_load(load_of(&schema, &[bar(0, 10.0)])).await.unwrap();

        let broken = bar(1, 0.0).set("close", "not-a-number");
        let mut load = load_of(&schema, &[broken]);
        load.delete_ids = vec![bar(0, 0.0).id];

        let err = repo.bulk_load(load).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Database(DatabaseError::BulkLoadFailed { ref table, .. }) if table == "stock_1d_kdata"
        ));
        let reference = repo.load_reference(&schema, ENTITY).unwrap();
        assert_eq!(reference.len(), 1);
        assert!(reference.contains(&bar(0, 0.0).id));
    }

    #[tokio::test]
    async fn test_entity_update_in_same_transaction() {
        let (db, repo) = repo().await;
        let entities = EntityRepository::new(db.pool.clone(), db.writer.clone());
        entities
            .upsert_entities(&[Entity::new("stock", "sh", "600000", "SPDB")])
            .await
            .unwrap();

        let mut load = load_of(&schema(), &[bar(0, 10.0)]);
        load.entity_update = Some(EntityUpdate::deactivate(ENTITY));
        assert_eq!(repo.bulk_load(load).await.unwrap(), 1);

        let entity = entities.get_entity(ENTITY).unwrap().unwrap();
        assert!(!entity.is_active);
    }

    #[tokio::test]
    async fn test_query_predicates() {
        let (_db, repo) = repo().await;
        let schema = schema();
        let rows: Vec<Record> = (0..10).map(|d| bar(d, 10.0)).collect();
        repo.bulk_load(load_of(&schema, &rows)).await.unwrap();

        let latest = repo
            .query_keys(
                &schema,
                &RecordQuery::for_entity(ENTITY)
                    .order_by(Column::Timestamp, Order::Desc)
                    .limit(1),
            )
            .unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].timestamp, rows[9].timestamp);

        let since = repo
            .query_keys(
                &schema,
                &RecordQuery::for_entity(ENTITY)
                    .filter(Column::Timestamp.ge("2024-01-08 00:00:00")),
            )
            .unwrap();
        assert_eq!(since.len(), 3);

        let none = repo
            .query_keys(
                &schema,
                &RecordQuery::for_entity(ENTITY).filter(Column::Id.is_in(Vec::<String>::new())),
            )
            .unwrap();
        assert!(none.is_empty());
    }
}
