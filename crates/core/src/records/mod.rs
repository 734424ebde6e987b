//! Records and dataset schemas.
//!
//! A [`Record`] is one persisted unit for an `(entity, timestamp)` pair inside a
//! dataset. Its `id` is deterministic (see [`make_record_id`]) and is the dedup
//! and upsert key for every write path.

mod level;
mod model;
mod query;
mod reference;
mod schema;
mod store;

pub use level::Level;
pub use model::{make_record_id, Record, Value};
pub use query::{Column, Order, Predicate, RecordQuery};
pub use reference::{RecordKey, ReferenceRecords};
pub use schema::{ColumnDef, ColumnKind, DatasetSchema};
pub use store::{BulkLoad, RecordStore};
