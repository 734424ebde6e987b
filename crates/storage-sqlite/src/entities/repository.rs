use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;
use std::sync::Arc;

use super::model::EntityDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::entities;
use crate::utils::rows_per_statement;
use harvest_core::entities::{Entity, EntityStore, EntityUpdate};
use harvest_core::Result;

const ENTITY_COLUMNS: usize = 7;

pub struct EntityRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl EntityRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

/// Applies an entity update on `conn`, inside the caller's transaction.
pub(crate) fn apply_entity_update(conn: &mut SqliteConnection, update: &EntityUpdate) -> Result<()> {
    if let Some(active) = update.is_active {
        let changed = diesel::update(entities::table.find(&update.entity_id))
            .set(entities::is_active.eq(active))
            .execute(conn)
            .into_core()?;
        debug!(
            "Set is_active={} on {} ({} rows)",
            active, update.entity_id, changed
        );
    }
    Ok(())
}

#[async_trait]
impl EntityStore for EntityRepository {
    fn list_entities(&self, entity_type: &str, exchanges: &[String]) -> Result<Vec<Entity>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = entities::table
            .filter(entities::entity_type.eq(entity_type))
            .into_boxed();
        if !exchanges.is_empty() {
            query = query.filter(entities::exchange.eq_any(exchanges));
        }
        let rows = query
            .order(entities::id.asc())
            .select(EntityDB::as_select())
            .load::<EntityDB>(&mut conn)
            .into_core()?;
        Ok(rows.into_iter().map(Entity::from).collect())
    }

    fn get_entity(&self, entity_id: &str) -> Result<Option<Entity>> {
        let mut conn = get_connection(&self.pool)?;
        let row = entities::table
            .find(entity_id)
            .select(EntityDB::as_select())
            .first::<EntityDB>(&mut conn)
            .optional()
            .into_core()?;
        Ok(row.map(Entity::from))
    }

    async fn upsert_entities(&self, input: &[Entity]) -> Result<usize> {
        if input.is_empty() {
            return Ok(0);
        }
        let rows: Vec<EntityDB> = input.iter().map(EntityDB::from).collect();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut written = 0;
                for chunk in rows.chunks(rows_per_statement(ENTITY_COLUMNS)) {
                    written += diesel::replace_into(entities::table)
                        .values(chunk)
                        .execute(conn)
                        .into_core()?;
                }
                Ok(written)
            })
            .await
    }

    async fn apply_update(&self, update: &EntityUpdate) -> Result<()> {
        let update = update.clone();
        self.writer
            .exec(move |conn: &mut SqliteConnection| apply_entity_update(conn, &update))
            .await
    }
}
