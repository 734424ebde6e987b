//! SQLite storage for the harvest engine.
//!
//! This crate implements the store traits defined in `harvest-core` with
//! Diesel over SQLite:
//! - connection pooling and migrations for the fixed tables
//! - a single writer actor that runs every write in an immediate transaction
//! - dataset tables created at runtime from a `DatasetSchema`
//! - entity and trading-session repositories
//!
//! ```text
//! harvest-core (traits)
//!        │
//!        ▼
//! storage-sqlite (this crate) ──▶ SQLite DB
//! ```

pub mod calendar;
pub mod db;
pub mod entities;
pub mod errors;
pub mod records;
pub mod schema;
pub mod utils;

use std::sync::Arc;

use harvest_core::registry::StoreSet;
use harvest_core::Result;

pub use calendar::CalendarRepository;
pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};
pub use entities::EntityRepository;
pub use errors::StorageError;
pub use records::RecordRepository;

/// Repositories sharing one pool and one writer.
#[derive(Clone)]
pub struct SqliteStores {
    pub records: Arc<RecordRepository>,
    pub entities: Arc<EntityRepository>,
    pub calendars: Arc<CalendarRepository>,
}

impl SqliteStores {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        SqliteStores {
            records: Arc::new(RecordRepository::new(pool.clone(), writer.clone())),
            entities: Arc::new(EntityRepository::new(pool.clone(), writer.clone())),
            calendars: Arc::new(CalendarRepository::new(pool, writer)),
        }
    }

    /// Initializes the database file, runs migrations and starts the writer.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn open(db_path: &str) -> Result<Self> {
        let db_path = init(db_path)?;
        let pool = create_pool(&db_path)?;
        run_migrations(&pool)?;
        let writer = spawn_writer(pool.as_ref().clone());
        Ok(Self::new(pool, writer))
    }

    pub fn store_set(&self) -> StoreSet {
        StoreSet::new(
            self.records.clone(),
            self.entities.clone(),
            self.calendars.clone(),
        )
    }
}
