//! Test doubles shared by the unit tests of this crate.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{json, Value as JsonValue};

use crate::calendar::{report_periods, CalendarProvider, Region, TradingCalendar, WeekdayCalendar};
use crate::constants::{ID_COLUMN, TIMESTAMP_COLUMN, TIMESTAMP_STORAGE_FORMAT};
use crate::entities::{Entity, EntityStore, EntityUpdate};
use crate::errors::{DatabaseError, Error, Result};
use crate::records::{
    BulkLoad, ColumnDef, ColumnKind, DatasetSchema, Level, Order, Predicate, Record, RecordKey,
    RecordQuery, RecordStore, Value,
};
use crate::registry::{ConnectionRegistry, StoreSet};
use crate::sync::{
    DatasetDescriptor, FetchBatch, PassOutcome, Recorder, RecorderKey, SyncWindow,
};
use crate::writer::BulkPayload;

/// 2024-01-11 09:00 in Shanghai: the 2024-01-10 session is the latest complete one.
pub fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 11, 1, 0, 0).unwrap()
}

pub fn day(d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn calendar(region: Region) -> TradingCalendar {
    WeekdayCalendar::new()
        .load_calendar(
            region,
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap()
}

/// Shanghai stock listed on 2024-01-02.
pub fn entity(code: &str) -> Entity {
    Entity::new("stock", "sh", code, code).with_timestamp(day(2))
}

pub fn kdata_schema() -> DatasetSchema {
    DatasetSchema::keyed(
        "stock_1d_kdata",
        vec![
            ColumnDef::new("close", ColumnKind::Real),
            ColumnDef::new("volume", ColumnKind::Integer),
        ],
    )
}

pub fn holder_schema() -> DatasetSchema {
    DatasetSchema::keyed(
        "stock_holder_stats",
        vec![ColumnDef::new("holder_count", ColumnKind::Integer)],
    )
}

pub fn connections() -> ConnectionRegistry {
    connections_with(
        Arc::new(MockRecordStore::new()),
        Arc::new(MockEntityStore::new(Vec::new())),
    )
}

pub fn connections_with(
    records: Arc<MockRecordStore>,
    entities: Arc<MockEntityStore>,
) -> ConnectionRegistry {
    ConnectionRegistry::new(StoreSet::new(
        records,
        entities,
        Arc::new(WeekdayCalendar::new()),
    ))
}

// =============================================================================
// Record store
// =============================================================================

type Row = HashMap<String, Option<String>>;

#[derive(Default)]
struct StoreState {
    tables: HashMap<String, BTreeMap<String, Row>>,
    updates: Vec<EntityUpdate>,
    last_columns: Vec<String>,
}

/// In-memory record store that decodes bulk payloads like a real one.
#[derive(Default)]
pub struct MockRecordStore {
    state: Mutex<StoreState>,
    fail_on_load: AtomicBool,
    load_calls: AtomicUsize,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_load(&self, fail: bool) {
        self.fail_on_load.store(fail, Ordering::SeqCst);
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    /// Writes records directly, bypassing the writer.
    pub fn seed(&self, schema: &DatasetSchema, records: &[Record]) {
        let columns: Vec<&ColumnDef> = schema.columns().iter().collect();
        let mut load = BulkLoad::new(Arc::new(schema.clone()));
        load.payload = Some(BulkPayload::encode(&columns, records).unwrap());
        apply(&mut self.state.lock().unwrap(), &load).unwrap();
    }

    pub fn has_dataset(&self, table: &str) -> bool {
        self.state.lock().unwrap().tables.contains_key(table)
    }

    pub fn row_count(&self, schema: &DatasetSchema) -> usize {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(schema.table())
            .map_or(0, |t| t.len())
    }

    pub fn value(&self, schema: &DatasetSchema, id: &str, column: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(schema.table())
            .and_then(|t| t.get(id))
            .and_then(|row| row.get(column).cloned().flatten())
    }

    pub fn last_payload_columns(&self) -> Vec<String> {
        self.state.lock().unwrap().last_columns.clone()
    }

    pub fn entity_updates(&self) -> Vec<EntityUpdate> {
        self.state.lock().unwrap().updates.clone()
    }
}

fn apply(state: &mut StoreState, load: &BulkLoad) -> Result<usize> {
    let table = state
        .tables
        .entry(load.schema.table().to_string())
        .or_default();
    for id in &load.delete_ids {
        table.remove(id);
    }
    let mut written = 0;
    if let Some(payload) = &load.payload {
        for fields in payload.decode()? {
            let row: Row = payload.columns().iter().cloned().zip(fields).collect();
            let id = row
                .get(ID_COLUMN)
                .cloned()
                .flatten()
                .ok_or_else(|| Error::Unexpected("row without id".to_string()))?;
            table.insert(id, row);
            written += 1;
        }
        state.last_columns = payload.columns().to_vec();
    }
    if let Some(update) = &load.entity_update {
        state.updates.push(update.clone());
    }
    Ok(written)
}

fn matches(row: &Row, predicate: &Predicate) -> bool {
    let field = |column: &crate::records::Column| row.get(column.name()).cloned().flatten();
    match predicate {
        Predicate::Eq(c, v) => field(c) == v.to_field(),
        Predicate::Ge(c, v) => field(c) >= v.to_field(),
        Predicate::Le(c, v) => field(c).is_some() && field(c) <= v.to_field(),
        Predicate::In(c, values) => values.iter().any(|v| field(c) == v.to_field()),
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn ensure_dataset(&self, schema: &DatasetSchema) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .tables
            .entry(schema.table().to_string())
            .or_default();
        Ok(())
    }

    fn query_keys(&self, schema: &DatasetSchema, query: &RecordQuery) -> Result<Vec<RecordKey>> {
        let state = self.state.lock().unwrap();
        let Some(table) = state.tables.get(schema.table()) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<&Row> = table
            .values()
            .filter(|row| query.predicates.iter().all(|p| matches(row, p)))
            .collect();
        if let Some((column, order)) = query.order {
            rows.sort_by_key(|row| row.get(column.name()).cloned().flatten());
            if order == Order::Desc {
                rows.reverse();
            }
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        rows.into_iter()
            .map(|row| {
                let id = row.get(ID_COLUMN).cloned().flatten().unwrap_or_default();
                let ts = row.get(TIMESTAMP_COLUMN).cloned().flatten().unwrap_or_default();
                Ok(RecordKey {
                    id,
                    timestamp: NaiveDateTime::parse_from_str(&ts, TIMESTAMP_STORAGE_FORMAT)?,
                })
            })
            .collect()
    }

    async fn bulk_load(&self, load: BulkLoad) -> Result<usize> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_load.load(Ordering::SeqCst) {
            return Err(Error::Database(DatabaseError::BulkLoadFailed {
                table: load.schema.table().to_string(),
                message: "injected failure".to_string(),
            }));
        }
        apply(&mut self.state.lock().unwrap(), &load)
    }
}

// =============================================================================
// Entity store
// =============================================================================

#[derive(Default)]
pub struct MockEntityStore {
    entities: Mutex<BTreeMap<String, Entity>>,
}

impl MockEntityStore {
    pub fn new(entities: Vec<Entity>) -> Self {
        MockEntityStore {
            entities: Mutex::new(entities.into_iter().map(|e| (e.id.clone(), e)).collect()),
        }
    }
}

#[async_trait]
impl EntityStore for MockEntityStore {
    fn list_entities(&self, entity_type: &str, exchanges: &[String]) -> Result<Vec<Entity>> {
        Ok(self
            .entities
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.entity_type == entity_type)
            .filter(|e| exchanges.is_empty() || exchanges.contains(&e.exchange))
            .cloned()
            .collect())
    }

    fn get_entity(&self, entity_id: &str) -> Result<Option<Entity>> {
        Ok(self.entities.lock().unwrap().get(entity_id).cloned())
    }

    async fn upsert_entities(&self, entities: &[Entity]) -> Result<usize> {
        let mut stored = self.entities.lock().unwrap();
        for entity in entities {
            stored.insert(entity.id.clone(), entity.clone());
        }
        Ok(entities.len())
    }

    async fn apply_update(&self, update: &EntityUpdate) -> Result<()> {
        if let Some(entity) = self.entities.lock().unwrap().get_mut(&update.entity_id) {
            if let Some(active) = update.is_active {
                entity.is_active = active;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Recorder
// =============================================================================

/// Recorder over synthetic upstream data: one bar per calendar session for
/// range datasets, quarter-end report dates for discrete ones.
pub struct MockRecorder {
    descriptor: DatasetDescriptor,
    entities: Vec<Entity>,
    calendar: TradingCalendar,
    failing: HashSet<String>,
    delisting: HashSet<String>,
    page_size: Option<usize>,
    fetch_delay: Option<Duration>,
    fail_finalization: bool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetch_calls: AtomicUsize,
    all_finished_calls: AtomicUsize,
    finished: Mutex<Vec<(String, PassOutcome)>>,
}

impl MockRecorder {
    pub fn daily(entities: Vec<Entity>) -> Self {
        let key = RecorderKey::new(Region::China, "mock", "stock_1d_kdata");
        Self::with_descriptor(DatasetDescriptor::range(key, kdata_schema(), Level::Day1), entities)
    }

    pub fn quarterly(entities: Vec<Entity>) -> Self {
        let key = RecorderKey::new(Region::China, "mock", "stock_holder_stats");
        Self::with_descriptor(DatasetDescriptor::discrete(key, holder_schema()), entities)
    }

    fn with_descriptor(descriptor: DatasetDescriptor, entities: Vec<Entity>) -> Self {
        MockRecorder {
            descriptor,
            entities,
            calendar: calendar(Region::China),
            failing: HashSet::new(),
            delisting: HashSet::new(),
            page_size: None,
            fetch_delay: None,
            fail_finalization: false,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            all_finished_calls: AtomicUsize::new(0),
            finished: Mutex::new(Vec::new()),
        }
    }

    pub fn failing<const N: usize>(mut self, ids: [&str; N]) -> Self {
        self.failing.extend(ids.iter().map(|s| s.to_string()));
        self
    }

    pub fn delisting<const N: usize>(mut self, ids: [&str; N]) -> Self {
        self.delisting.extend(ids.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn failing_finalization(mut self) -> Self {
        self.fail_finalization = true;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn all_finished_calls(&self) -> usize {
        self.all_finished_calls.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> Vec<(String, PassOutcome)> {
        self.finished.lock().unwrap().clone()
    }

    fn upstream(&self, entity: &Entity, window: &SyncWindow) -> FetchBatch {
        if self.delisting.contains(&entity.id) {
            return FetchBatch::delisted();
        }
        let timestamps: Vec<NaiveDateTime> = if window.is_discrete() {
            window.timestamps.clone()
        } else {
            let (Some(start), Some(end)) = (window.start, window.end) else {
                return FetchBatch::empty();
            };
            let mut sessions: Vec<NaiveDateTime> = self
                .calendar
                .sessions()
                .iter()
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap())
                .filter(|ts| *ts >= start && *ts < end)
                .collect();
            sessions.reverse();
            sessions
        };
        let take = self.page_size.unwrap_or(timestamps.len());
        let rows = timestamps
            .iter()
            .take(take)
            .map(|ts| match self.descriptor.planning {
                crate::sync::PlanningMode::Discrete => json!({
                    "timestamp": ts.format(TIMESTAMP_STORAGE_FORMAT).to_string(),
                    "holder_count": 1200,
                }),
                crate::sync::PlanningMode::Range { .. } => json!({
                    "timestamp": ts.format(TIMESTAMP_STORAGE_FORMAT).to_string(),
                    "close": 10.5,
                    "volume": 1000,
                }),
            })
            .collect();
        FetchBatch::new(rows)
    }
}

#[async_trait]
impl Recorder for MockRecorder {
    fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    async fn init_entities(&self) -> Result<Vec<Entity>> {
        Ok(self.entities.clone())
    }

    async fn declared_timestamps(&self, _entity: &Entity) -> Result<Vec<NaiveDateTime>> {
        Ok(report_periods(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
        ))
    }

    async fn fetch(&self, entity: &Entity, window: &SyncWindow) -> Result<FetchBatch> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&entity.id) {
            return Err(Error::fetch("mock", "connection reset by peer"));
        }
        Ok(self.upstream(entity, window))
    }

    fn shape(&self, entity: &Entity, rows: Vec<JsonValue>) -> Result<Vec<Record>> {
        rows.into_iter()
            .map(|row| {
                let object = row
                    .as_object()
                    .ok_or_else(|| Error::Shape("row is not an object".to_string()))?;
                let ts = object
                    .get(TIMESTAMP_COLUMN)
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::Shape("row without timestamp".to_string()))?;
                let ts = NaiveDateTime::parse_from_str(ts, TIMESTAMP_STORAGE_FORMAT)?;
                let mut record = Record::new(&entity.id, ts, self.descriptor.level());
                for (column, value) in object.iter().filter(|(k, _)| *k != TIMESTAMP_COLUMN) {
                    let value = match value {
                        JsonValue::Number(n) => n
                            .as_i64()
                            .map(Value::Int)
                            .or_else(|| n.as_f64().map(Value::Float))
                            .unwrap_or(Value::Null),
                        JsonValue::String(s) => Value::Text(s.clone()),
                        JsonValue::Bool(b) => Value::Bool(*b),
                        _ => Value::Null,
                    };
                    record.insert(column.clone(), value);
                }
                Ok(record)
            })
            .collect()
    }

    async fn on_entity_finished(&self, entity: &Entity, outcome: PassOutcome) {
        self.finished
            .lock()
            .unwrap()
            .push((entity.id.clone(), outcome));
    }

    async fn on_all_finished(&self, _entities: &[Entity]) -> Result<()> {
        self.all_finished_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_finalization {
            return Err(Error::Unexpected("finalization failed".to_string()));
        }
        Ok(())
    }
}
