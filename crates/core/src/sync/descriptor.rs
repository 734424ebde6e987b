use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::calendar::Region;
use crate::constants::DEFAULT_FETCH_SIZE;
use crate::records::{DatasetSchema, Level};

/// Registry key of a recorder: `(region, provider, dataset)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecorderKey {
    pub region: Region,
    pub provider: String,
    pub dataset: String,
}

impl RecorderKey {
    pub fn new(region: Region, provider: impl Into<String>, dataset: impl Into<String>) -> Self {
        RecorderKey {
            region,
            provider: provider.into(),
            dataset: dataset.into(),
        }
    }
}

impl fmt::Display for RecorderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.region, self.provider, self.dataset)
    }
}

/// How the planner decides what to fetch next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanningMode {
    /// Continuous time range sampled at `level`.
    Range { level: Level },
    /// Explicit timestamps declared by the recorder (report dates).
    Discrete,
}

/// Static description of what a recorder produces.
#[derive(Debug, Clone)]
pub struct DatasetDescriptor {
    pub key: RecorderKey,
    pub schema: Arc<DatasetSchema>,
    pub planning: PlanningMode,
    /// A single pass per entity is terminal regardless of how many rows it saved.
    pub one_shot: bool,
    pub default_size: usize,
}

impl DatasetDescriptor {
    /// Range dataset fetched in one full-window request per entity.
    pub fn range(key: RecorderKey, schema: DatasetSchema, level: Level) -> Self {
        DatasetDescriptor {
            key,
            schema: Arc::new(schema),
            planning: PlanningMode::Range { level },
            one_shot: true,
            default_size: DEFAULT_FETCH_SIZE,
        }
    }

    /// Discrete-timestamp dataset drained over as many passes as it takes.
    pub fn discrete(key: RecorderKey, schema: DatasetSchema) -> Self {
        DatasetDescriptor {
            key,
            schema: Arc::new(schema),
            planning: PlanningMode::Discrete,
            one_shot: false,
            default_size: DEFAULT_FETCH_SIZE,
        }
    }

    pub fn with_one_shot(mut self, one_shot: bool) -> Self {
        self.one_shot = one_shot;
        self
    }

    pub fn with_default_size(mut self, size: usize) -> Self {
        self.default_size = size;
        self
    }

    /// Sampling level; discrete datasets are keyed by day.
    pub fn level(&self) -> Level {
        match self.planning {
            PlanningMode::Range { level } => level,
            PlanningMode::Discrete => Level::Day1,
        }
    }
}
