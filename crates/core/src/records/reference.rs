use std::collections::HashSet;

use chrono::NaiveDateTime;

/// Primary key and timestamp of a persisted row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKey {
    pub id: String,
    pub timestamp: NaiveDateTime,
}

/// Snapshot of the keys already persisted for one entity in one dataset.
///
/// Loaded once per sync pass and used only for membership tests and to find
/// the resume point; never mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct ReferenceRecords {
    entity_id: String,
    ids: HashSet<String>,
    latest: Option<NaiveDateTime>,
}

impl ReferenceRecords {
    pub fn new(entity_id: impl Into<String>, keys: impl IntoIterator<Item = RecordKey>) -> Self {
        let mut ids = HashSet::new();
        let mut latest: Option<NaiveDateTime> = None;
        for key in keys {
            latest = Some(latest.map_or(key.timestamp, |l| l.max(key.timestamp)));
            ids.insert(key.id);
        }
        ReferenceRecords {
            entity_id: entity_id.into(),
            ids,
            latest,
        }
    }

    pub fn empty(entity_id: impl Into<String>) -> Self {
        Self::new(entity_id, std::iter::empty())
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Most recent persisted timestamp.
    pub fn latest(&self) -> Option<NaiveDateTime> {
        self.latest
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
