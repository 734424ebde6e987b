use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_query;
use diesel::sql_types::{BigInt, Bool, Double, Nullable, Text};
use diesel::sqlite::Sqlite;

use crate::utils::{placeholders, quote_ident};
use harvest_core::constants::{ENTITY_ID_COLUMN, ID_COLUMN, TIMESTAMP_COLUMN};
use harvest_core::errors::{Error, Result, ValidationError};
use harvest_core::records::{ColumnDef, DatasetSchema, Order, Predicate, RecordQuery, Value};

pub(crate) type BoxedQuery<'a> = BoxedSqlQuery<'a, Sqlite, SqlQuery>;

/// SQL text with its positional binds.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Rendered {
    pub sql: String,
    pub binds: Vec<Value>,
}

impl Rendered {
    pub fn into_query(self) -> BoxedQuery<'static> {
        self.binds
            .iter()
            .fold(sql_query(self.sql).into_boxed::<Sqlite>(), bind_value)
    }
}

/// `CREATE TABLE IF NOT EXISTS` plus the `(entity_id, timestamp)` index.
pub(crate) fn create_table(schema: &DatasetSchema) -> String {
    let table = schema.table();
    let columns: Vec<String> = schema
        .columns()
        .iter()
        .map(|c| {
            if c.name == ID_COLUMN {
                format!("{} TEXT NOT NULL PRIMARY KEY", quote_ident(&c.name))
            } else {
                format!("{} {}", quote_ident(&c.name), c.kind.sql_type())
            }
        })
        .collect();
    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        quote_ident(table),
        columns.join(", ")
    );
    if schema.has_column(ENTITY_ID_COLUMN) && schema.has_column(TIMESTAMP_COLUMN) {
        sql.push_str(&format!(
            "\nCREATE INDEX IF NOT EXISTS {} ON {} ({}, {});",
            quote_ident(&format!("idx_{}_entity_timestamp", table)),
            quote_ident(table),
            quote_ident(ENTITY_ID_COLUMN),
            quote_ident(TIMESTAMP_COLUMN)
        ));
    }
    sql
}

/// `SELECT id, timestamp` for the rows matching `query`.
pub(crate) fn select_keys(table: &str, query: &RecordQuery) -> Result<Rendered> {
    let mut sql = format!(
        "SELECT {}, {} FROM {}",
        quote_ident(ID_COLUMN),
        quote_ident(TIMESTAMP_COLUMN),
        quote_ident(table)
    );
    let mut binds = Vec::new();
    let mut clauses = Vec::with_capacity(query.predicates.len());
    for predicate in &query.predicates {
        clauses.push(render_predicate(predicate, &mut binds)?);
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    if let Some((column, order)) = query.order {
        let direction = match order {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        };
        sql.push_str(&format!(" ORDER BY {} {}", quote_ident(column.name()), direction));
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    Ok(Rendered { sql, binds })
}

fn render_predicate(predicate: &Predicate, binds: &mut Vec<Value>) -> Result<String> {
    let (column, op, value) = match predicate {
        Predicate::In(column, values) => {
            if values.is_empty() {
                return Ok("0 = 1".to_string());
            }
            if values.iter().any(Value::is_null) {
                return Err(null_comparison(column.name()));
            }
            binds.extend(values.iter().cloned());
            return Ok(format!(
                "{} IN ({})",
                quote_ident(column.name()),
                placeholders(values.len())
            ));
        }
        Predicate::Eq(column, value) => (column, "=", value),
        Predicate::Ge(column, value) => (column, ">=", value),
        Predicate::Le(column, value) => (column, "<=", value),
    };
    if value.is_null() {
        return match predicate {
            Predicate::Eq(..) => Ok(format!("{} IS NULL", quote_ident(column.name()))),
            _ => Err(null_comparison(column.name())),
        };
    }
    binds.push(value.clone());
    Ok(format!("{} {} ?", quote_ident(column.name()), op))
}

fn null_comparison(column: &str) -> Error {
    Error::Validation(ValidationError::InvalidInput(format!(
        "cannot compare column '{}' against NULL",
        column
    )))
}

/// `DELETE ... WHERE id IN (...)` for `n` ids.
pub(crate) fn delete_ids(table: &str, n: usize) -> String {
    format!(
        "DELETE FROM {} WHERE {} IN ({})",
        quote_ident(table),
        quote_ident(ID_COLUMN),
        placeholders(n)
    )
}

/// Multi-row `INSERT` of `rows` rows over `columns`.
pub(crate) fn insert_rows(table: &str, columns: &[&ColumnDef], rows: usize) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();
    let tuple = format!("({})", placeholders(columns.len()));
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table),
        names.join(", "),
        vec![tuple; rows].join(", ")
    )
}

/// Binds one value with the SQL type matching its variant.
pub(crate) fn bind_value<'a>(query: BoxedQuery<'a>, value: &Value) -> BoxedQuery<'a> {
    match value {
        Value::Null => query.bind::<Nullable<Text>, _>(None::<String>),
        Value::Bool(b) => query.bind::<Bool, _>(*b),
        Value::Int(i) => query.bind::<BigInt, _>(*i),
        Value::Float(f) => query.bind::<Double, _>(*f),
        Value::Text(s) => query.bind::<Text, _>(s.clone()),
        Value::Timestamp(_) => query.bind::<Text, _>(value.to_field().unwrap_or_default()),
    }
}
