//! Incremental synchronization.
//!
//! # Architecture
//!
//! ```text
//! SyncEngine (worker pool, shared queue, progress)
//!       │
//!       └─► EntitySync::process_entity (per entity, until terminal)
//!               │
//!               ├─► SyncPlanner (what is still missing)
//!               ├─► Recorder::fetch / Recorder::shape (provider plugin)
//!               └─► BulkWriter::upsert (dedup + bulk load)
//! ```

mod descriptor;
mod engine;
mod options;
mod outcome;
mod planner;
mod processor;
mod progress;
mod recorder;
mod service;
mod window;

pub use descriptor::{DatasetDescriptor, PlanningMode, RecorderKey};
pub use engine::SyncEngine;
pub use options::{EngineOptions, StopSignal, SyncOptions};
pub use outcome::{BatchReport, EntityReport, EntityStatus, PassOutcome};
pub use planner::SyncPlanner;
pub use processor::EntitySync;
pub use progress::{
    BroadcastProgressSink, MockProgressSink, NoOpProgressSink, ProgressEvent, ProgressKind,
    ProgressSink,
};
pub use recorder::{FetchBatch, Recorder};
pub use service::{HarvestService, CALENDAR_LOOKBACK_DAYS};
pub use window::SyncWindow;
