//! Dataset tables.
//!
//! Dataset tables are declared at runtime by a `DatasetSchema`, so they are
//! created and queried through rendered SQL with bound parameters instead of
//! `diesel::table!` definitions.

mod repository;
mod sql;

pub use repository::RecordRepository;
