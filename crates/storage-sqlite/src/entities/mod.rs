mod model;
mod repository;

pub use model::EntityDB;
pub use repository::EntityRepository;
pub(crate) use repository::apply_entity_update;
