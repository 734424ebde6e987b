use std::fmt;

use serde::{Deserialize, Serialize};

/// Result code of one sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PassOutcome {
    /// More work remains; run another pass.
    MoreWork,
    /// Nothing to fetch; no request was made.
    AlreadyCurrent,
    /// The fetch produced nothing usable this pass.
    Exhausted,
    /// The persist step wrote no new rows.
    NoNewRows,
}

impl PassOutcome {
    pub fn code(&self) -> u8 {
        match self {
            PassOutcome::MoreWork => 0,
            PassOutcome::AlreadyCurrent => 1,
            PassOutcome::Exhausted => 2,
            PassOutcome::NoNewRows => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self != PassOutcome::MoreWork
    }
}

impl fmt::Display for PassOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassOutcome::MoreWork => write!(f, "more work remains"),
            PassOutcome::AlreadyCurrent => write!(f, "already current"),
            PassOutcome::Exhausted => write!(f, "fetch exhausted"),
            PassOutcome::NoNewRows => write!(f, "no new rows"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityStatus {
    Succeeded,
    Failed,
}

/// What happened to one entity during a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityReport {
    pub entity_id: String,
    /// Final outcome; `None` when the entity did not finish (persistence
    /// failure), so a rerun picks it up again.
    pub outcome: Option<PassOutcome>,
    pub passes: usize,
    pub saved: usize,
    pub error: Option<String>,
}

impl EntityReport {
    pub fn new(entity_id: impl Into<String>) -> Self {
        EntityReport {
            entity_id: entity_id.into(),
            outcome: None,
            passes: 0,
            saved: 0,
            error: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn status(&self) -> EntityStatus {
        if self.error.is_some() || self.outcome.is_none() {
            EntityStatus::Failed
        } else {
            EntityStatus::Succeeded
        }
    }
}

/// Aggregate result of one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub task: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Rows written across all entities.
    pub saved: usize,
    /// Entities that did not reach a terminal outcome.
    pub unfinished: Vec<String>,
    /// Entities never handed to a worker.
    pub unscheduled: usize,
    /// True when a stop signal cut the batch short.
    pub stopped: bool,
    pub reports: Vec<EntityReport>,
}

impl BatchReport {
    pub fn new(task: impl Into<String>, total: usize) -> Self {
        BatchReport {
            task: task.into(),
            total,
            ..Default::default()
        }
    }

    pub fn add(&mut self, report: EntityReport) {
        match report.status() {
            EntityStatus::Succeeded => self.succeeded += 1,
            EntityStatus::Failed => self.failed += 1,
        }
        if !report.is_finished() {
            self.unfinished.push(report.entity_id.clone());
        }
        self.saved += report.saved;
        self.reports.push(report);
    }

    /// Records an entity that was never scheduled.
    pub fn add_unscheduled(&mut self, entity_id: impl Into<String>) {
        self.unscheduled += 1;
        self.unfinished.push(entity_id.into());
    }

    /// Every entity succeeded and finished.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.unfinished.is_empty()
    }

    /// The batch ran to its end: it was not stopped and every entity was
    /// scheduled. Individual entities may still have failed.
    pub fn is_complete(&self) -> bool {
        !self.stopped && self.unscheduled == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntityReport> {
        self.reports
            .iter()
            .filter(|r| r.status() == EntityStatus::Failed)
    }

    pub fn summary(&self) -> String {
        if self.is_success() {
            format!(
                "Saved {} rows for {} entities successfully",
                self.saved, self.succeeded
            )
        } else {
            format!(
                "Saved {} rows: {} succeeded, {} failed, {} unfinished of {}",
                self.saved,
                self.succeeded,
                self.failed,
                self.unfinished.len(),
                self.total
            )
        }
    }
}
