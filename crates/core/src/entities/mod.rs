//! Entities: the addressable subjects of synchronization (stocks, indices, ETFs).
//!
//! Entities are read-only inputs to the engine. Their lifecycle is owned by
//! upstream entity-list recorders; the engine only ever flips `is_active`
//! when a provider reports an entity as delisted.

mod model;
mod selector;
mod store;

pub use model::{Entity, EntityUpdate};
pub use selector::EntitySelector;
pub use store::EntityStore;
