use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// An addressable subject of synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Unique id, `{entity_type}_{exchange}_{code}`.
    pub id: String,
    pub entity_type: String,
    pub exchange: String,
    pub code: String,
    pub name: String,
    /// Origin of the entity (listing date). Used as the resume point when
    /// nothing has been persisted yet.
    pub timestamp: Option<NaiveDateTime>,
    pub is_active: bool,
}

impl Entity {
    pub fn new(
        entity_type: impl Into<String>,
        exchange: impl Into<String>,
        code: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let entity_type = entity_type.into();
        let exchange = exchange.into();
        let code = code.into();
        Entity {
            id: Self::make_id(&entity_type, &exchange, &code),
            entity_type,
            exchange,
            code,
            name: name.into(),
            timestamp: None,
            is_active: true,
        }
    }

    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Builds the canonical entity id.
    pub fn make_id(entity_type: &str, exchange: &str, code: &str) -> String {
        format!("{}_{}_{}", entity_type, exchange, code)
    }
}

/// Mutation of an entity committed together with a dataset write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityUpdate {
    pub entity_id: String,
    pub is_active: Option<bool>,
}

impl EntityUpdate {
    /// Marks the entity delisted.
    pub fn deactivate(entity_id: impl Into<String>) -> Self {
        EntityUpdate {
            entity_id: entity_id.into(),
            is_active: Some(false),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.is_active.is_none()
    }
}
