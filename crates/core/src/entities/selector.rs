use serde::{Deserialize, Serialize};

use super::Entity;

/// Filters a recorder's entity list before scheduling.
///
/// Empty lists match everything. Inactive entities are dropped unless
/// `include_inactive` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntitySelector {
    pub entity_ids: Vec<String>,
    pub codes: Vec<String>,
    pub exchanges: Vec<String>,
    pub include_inactive: bool,
}

impl EntitySelector {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.codes = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_entity_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exchanges<I, S>(mut self, exchanges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exchanges = exchanges.into_iter().map(Into::into).collect();
        self
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        if !self.include_inactive && !entity.is_active {
            return false;
        }
        if !self.entity_ids.is_empty() && !self.entity_ids.contains(&entity.id) {
            return false;
        }
        if !self.codes.is_empty() && !self.codes.contains(&entity.code) {
            return false;
        }
        if !self.exchanges.is_empty()
            && !self
                .exchanges
                .iter()
                .any(|e| e.eq_ignore_ascii_case(&entity.exchange))
        {
            return false;
        }
        true
    }

    /// Keeps matching entities, preserving order and dropping repeated ids.
    pub fn apply(&self, entities: Vec<Entity>) -> Vec<Entity> {
        let mut seen = std::collections::HashSet::new();
        entities
            .into_iter()
            .filter(|e| self.matches(e))
            .filter(|e| seen.insert(e.id.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Entity> {
        let mut delisted = Entity::new("stock", "sz", "000003", "PT金田A");
        delisted.is_active = false;
        vec![
            Entity::new("stock", "sh", "600000", "浦发银行"),
            Entity::new("stock", "sz", "000001", "平安银行"),
            delisted,
            Entity::new("stock", "sh", "600000", "浦发银行"),
        ]
    }

    #[test]
    fn test_default_selector_drops_inactive_and_duplicates() {
        let selected = EntitySelector::all().apply(sample());
        let ids: Vec<_> = selected.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["stock_sh_600000", "stock_sz_000001"]);
    }

    #[test]
    fn test_codes_and_exchanges() {
        let selector = EntitySelector::all().with_exchanges(["SZ"]);
        assert_eq!(selector.apply(sample()).len(), 1);

        let selector = EntitySelector::all().with_codes(["600000"]);
        assert_eq!(selector.apply(sample())[0].code, "600000");
    }

    #[test]
    fn test_include_inactive() {
        let selector = EntitySelector {
            include_inactive: true,
            ..Default::default()
        }
        .with_entity_ids(["stock_sz_000003"]);
        let selected = selector.apply(sample());
        assert_eq!(selected.len(), 1);
        assert!(!selected[0].is_active);
    }
}
