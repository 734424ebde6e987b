use async_trait::async_trait;

use super::{Entity, EntityUpdate};
use crate::errors::Result;

/// Storage for entity lists.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Lists entities of a type, optionally restricted to exchanges.
    /// An empty `exchanges` slice means every exchange.
    fn list_entities(&self, entity_type: &str, exchanges: &[String]) -> Result<Vec<Entity>>;

    /// Gets a single entity by id.
    fn get_entity(&self, entity_id: &str) -> Result<Option<Entity>>;

    /// Inserts or replaces entities.
    async fn upsert_entities(&self, entities: &[Entity]) -> Result<usize>;

    /// Applies a standalone entity update.
    async fn apply_update(&self, update: &EntityUpdate) -> Result<()>;
}
