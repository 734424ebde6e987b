use chrono::NaiveDateTime;
use diesel::prelude::*;
use harvest_core::constants::TIMESTAMP_STORAGE_FORMAT;
use harvest_core::entities::Entity;

/// Database model for entities.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = crate::schema::entities)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EntityDB {
    pub id: String,
    pub entity_type: String,
    pub exchange: String,
    pub code: String,
    pub name: String,
    pub timestamp: Option<String>,
    pub is_active: bool,
}

impl From<&Entity> for EntityDB {
    fn from(entity: &Entity) -> Self {
        EntityDB {
            id: entity.id.clone(),
            entity_type: entity.entity_type.clone(),
            exchange: entity.exchange.clone(),
            code: entity.code.clone(),
            name: entity.name.clone(),
            timestamp: entity
                .timestamp
                .map(|ts| ts.format(TIMESTAMP_STORAGE_FORMAT).to_string()),
            is_active: entity.is_active,
        }
    }
}

impl From<EntityDB> for Entity {
    fn from(db: EntityDB) -> Self {
        Entity {
            id: db.id,
            entity_type: db.entity_type,
            exchange: db.exchange,
            code: db.code,
            name: db.name,
            timestamp: db
                .timestamp
                .and_then(|ts| NaiveDateTime::parse_from_str(&ts, TIMESTAMP_STORAGE_FORMAT).ok()),
            is_active: db.is_active,
        }
    }
}
