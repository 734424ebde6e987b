//! Recorder registry.
//!
//! Maps a `(region, provider, dataset)` key to a recorder constructor. Lookups
//! happen once at batch start; a missing or duplicate key is a configuration
//! error, never a per-entity one.

mod connections;

pub use connections::{ConnectionRegistry, StoreSet};

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::errors::{Error, Result};
use crate::sync::{Recorder, RecorderKey};

/// Builds a recorder from the process-wide store handles.
pub type RecorderFactory =
    Box<dyn Fn(&ConnectionRegistry) -> Result<Arc<dyn Recorder>> + Send + Sync>;

#[derive(Default)]
pub struct RecorderRegistry {
    factories: HashMap<RecorderKey, RecorderFactory>,
}

impl RecorderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor. Each key may be registered once.
    pub fn register<F>(&mut self, key: RecorderKey, factory: F) -> Result<()>
    where
        F: Fn(&ConnectionRegistry) -> Result<Arc<dyn Recorder>> + Send + Sync + 'static,
    {
        if self.factories.contains_key(&key) {
            return Err(Error::Registry(format!("recorder {} already registered", key)));
        }
        debug!("Registered recorder {}", key);
        self.factories.insert(key, Box::new(factory));
        Ok(())
    }

    pub fn contains(&self, key: &RecorderKey) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<RecorderKey> {
        let mut keys: Vec<RecorderKey> = self.factories.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Builds the recorder registered under `key`.
    pub fn create(
        &self,
        key: &RecorderKey,
        connections: &ConnectionRegistry,
    ) -> Result<Arc<dyn Recorder>> {
        let factory = self
            .factories
            .get(key)
            .ok_or_else(|| Error::Registry(format!("no recorder registered for {}", key)))?;
        let recorder = factory(connections)?;
        if &recorder.descriptor().key != key {
            return Err(Error::Registry(format!(
                "recorder registered for {} describes {}",
                key,
                recorder.descriptor().key
            )));
        }
        Ok(recorder)
    }
}
