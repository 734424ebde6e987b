use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;

use super::Level;
use crate::constants::{ENTITY_ID_COLUMN, ID_COLUMN, TIMESTAMP_COLUMN, TIMESTAMP_STORAGE_FORMAT};

/// A single column value of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text form written into bulk payloads; `None` for NULL.
    pub fn to_field(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(if *b { "t" } else { "f" }.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Timestamp(ts) => Some(ts.format(TIMESTAMP_STORAGE_FORMAT).to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Builds the deterministic record id for `(entity, timestamp[, secondary])`.
pub fn make_record_id(
    entity_id: &str,
    timestamp: NaiveDateTime,
    level: Level,
    secondary: Option<&str>,
) -> String {
    let ts = timestamp.format(level.id_format());
    match secondary {
        Some(key) => format!("{}_{}_{}", entity_id, ts, key),
        None => format!("{}_{}", entity_id, ts),
    }
}

/// One row of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub entity_id: String,
    pub timestamp: NaiveDateTime,
    pub values: BTreeMap<String, Value>,
}

impl Record {
    /// Creates a record whose id is derived from entity, timestamp and level.
    pub fn new(entity_id: impl Into<String>, timestamp: NaiveDateTime, level: Level) -> Self {
        let entity_id = entity_id.into();
        Record {
            id: make_record_id(&entity_id, timestamp, level, None),
            entity_id,
            timestamp,
            values: BTreeMap::new(),
        }
    }

    /// Creates a record with an explicit id.
    pub fn with_id(
        id: impl Into<String>,
        entity_id: impl Into<String>,
        timestamp: NaiveDateTime,
    ) -> Self {
        Record {
            id: id.into(),
            entity_id: entity_id.into(),
            timestamp,
            values: BTreeMap::new(),
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    /// Value of a column, including the key columns.
    pub fn get(&self, column: &str) -> Option<Value> {
        match column {
            ID_COLUMN => Some(Value::Text(self.id.clone())),
            ENTITY_ID_COLUMN => Some(Value::Text(self.entity_id.clone())),
            TIMESTAMP_COLUMN => Some(Value::Timestamp(self.timestamp)),
            _ => self.values.get(column).cloned(),
        }
    }

    /// Every column name this record carries.
    pub fn shape(&self) -> BTreeSet<String> {
        let mut columns: BTreeSet<String> = self.values.keys().cloned().collect();
        columns.insert(ID_COLUMN.to_string());
        columns.insert(ENTITY_ID_COLUMN.to_string());
        columns.insert(TIMESTAMP_COLUMN.to_string());
        columns
    }
}
