use std::collections::HashMap;
use std::sync::Arc;

use crate::calendar::CalendarProvider;
use crate::entities::EntityStore;
use crate::records::RecordStore;

/// Stores one provider's recorders read from and write to.
#[derive(Clone)]
pub struct StoreSet {
    pub records: Arc<dyn RecordStore>,
    pub entities: Arc<dyn EntityStore>,
    pub calendars: Arc<dyn CalendarProvider>,
}

impl StoreSet {
    pub fn new(
        records: Arc<dyn RecordStore>,
        entities: Arc<dyn EntityStore>,
        calendars: Arc<dyn CalendarProvider>,
    ) -> Self {
        StoreSet {
            records,
            entities,
            calendars,
        }
    }
}

/// Store handles, built once at process start and passed to the service.
///
/// Providers without a dedicated store set use the default one.
#[derive(Clone)]
pub struct ConnectionRegistry {
    default: StoreSet,
    providers: HashMap<String, StoreSet>,
}

impl ConnectionRegistry {
    pub fn new(default: StoreSet) -> Self {
        ConnectionRegistry {
            default,
            providers: HashMap::new(),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>, stores: StoreSet) -> Self {
        self.providers.insert(provider.into(), stores);
        self
    }

    pub fn stores_for(&self, provider: &str) -> &StoreSet {
        self.providers.get(provider).unwrap_or(&self.default)
    }

    pub fn default_stores(&self) -> &StoreSet {
        &self.default
    }
}
