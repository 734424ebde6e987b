use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::Value;
use crate::constants::{ENTITY_ID_COLUMN, ID_COLUMN, TIMESTAMP_COLUMN, TIMESTAMP_STORAGE_FORMAT};
use crate::errors::{Error, Result, ValidationError};

/// Storage type of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
    Boolean,
    Timestamp,
}

impl ColumnKind {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Text | ColumnKind::Timestamp => "TEXT",
            ColumnKind::Integer | ColumnKind::Boolean => "INTEGER",
            ColumnKind::Real => "REAL",
        }
    }

    /// Parses a bulk payload field into a typed value for this column.
    pub fn parse_field(&self, column: &str, field: Option<&str>) -> Result<Value> {
        let Some(text) = field else {
            return Ok(Value::Null);
        };
        let invalid = || {
            Error::Validation(ValidationError::InvalidValue {
                column: column.to_string(),
                value: text.to_string(),
            })
        };
        match self {
            ColumnKind::Text => Ok(Value::Text(text.to_string())),
            ColumnKind::Integer => text.parse::<i64>().map(Value::Int).map_err(|_| invalid()),
            ColumnKind::Real => text.parse::<f64>().map(Value::Float).map_err(|_| invalid()),
            ColumnKind::Boolean => match text {
                "t" | "true" | "1" => Ok(Value::Bool(true)),
                "f" | "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            ColumnKind::Timestamp => NaiveDateTime::parse_from_str(text, TIMESTAMP_STORAGE_FORMAT)
                .map(Value::Timestamp)
                .map_err(|_| invalid()),
        }
    }
}

/// A declared column of a dataset table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        ColumnDef {
            name: name.into(),
            kind,
        }
    }
}

/// Target table of a dataset with its declared column order.
///
/// The declared order is the order of fields in bulk payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSchema {
    table: String,
    columns: Vec<ColumnDef>,
}

impl DatasetSchema {
    pub fn new(table: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        DatasetSchema {
            table: table.into(),
            columns,
        }
    }

    /// Schema with the `id`, `entity_id`, `timestamp` key columns followed by
    /// the given data columns.
    pub fn keyed(table: impl Into<String>, data_columns: Vec<ColumnDef>) -> Self {
        let mut columns = vec![
            ColumnDef::new(ID_COLUMN, ColumnKind::Text),
            ColumnDef::new(ENTITY_ID_COLUMN, ColumnKind::Text),
            ColumnDef::new(TIMESTAMP_COLUMN, ColumnKind::Timestamp),
        ];
        columns.extend(data_columns);
        Self::new(table, columns)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Declared columns that also appear in `shape`, in declared order.
    pub fn project(&self, shape: &BTreeSet<String>) -> Vec<&ColumnDef> {
        self.columns
            .iter()
            .filter(|c| shape.contains(&c.name))
            .collect()
    }

    /// Checks that table and column names are plain identifiers, unique, and
    /// that the `id` key column is declared.
    pub fn validate(&self) -> Result<()> {
        if !is_identifier(&self.table) {
            return Err(Error::Config(format!(
                "invalid table name '{}'",
                self.table
            )));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !is_identifier(&column.name) {
                return Err(Error::Config(format!(
                    "invalid column name '{}' in table '{}'",
                    column.name, self.table
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate column '{}' in table '{}'",
                    column.name, self.table
                )));
            }
        }
        if !self.has_column(ID_COLUMN) {
            return Err(Error::Validation(ValidationError::MissingKeyColumn {
                table: self.table.clone(),
                column: ID_COLUMN.to_string(),
            }));
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
