//! Progress reporting.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    Started,
    Advanced,
    Finished,
}

/// Progress message `{task, total, completed_delta}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub task: String,
    pub total: usize,
    pub completed_delta: usize,
    pub kind: ProgressKind,
}

impl ProgressEvent {
    pub fn started(task: &str, total: usize) -> Self {
        Self::new(task, total, 0, ProgressKind::Started)
    }

    pub fn advanced(task: &str, total: usize) -> Self {
        Self::new(task, total, 1, ProgressKind::Advanced)
    }

    pub fn finished(task: &str, total: usize) -> Self {
        Self::new(task, total, 0, ProgressKind::Finished)
    }

    fn new(task: &str, total: usize, completed_delta: usize, kind: ProgressKind) -> Self {
        ProgressEvent {
            task: task.to_string(),
            total,
            completed_delta,
            kind,
        }
    }
}

/// Receives progress events.
///
/// `emit()` must not block and must not fail the batch; delivery is best-effort.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Clone, Default)]
pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Publishes events on a broadcast channel. Slow subscribers lag and lose
/// events; the publisher never waits.
#[derive(Clone)]
pub struct BroadcastProgressSink {
    sender: broadcast::Sender<ProgressEvent>,
}

impl BroadcastProgressSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        BroadcastProgressSink { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl ProgressSink for BroadcastProgressSink {
    fn emit(&self, event: ProgressEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }
}

/// Collects emitted events.
#[derive(Clone, Default)]
pub struct MockProgressSink {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl MockProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Sum of completed deltas.
    pub fn completed(&self) -> usize {
        self.events().iter().map(|e| e.completed_delta).sum()
    }
}

impl ProgressSink for MockProgressSink {
    fn emit(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_without_subscribers_does_not_fail() {
        let sink = BroadcastProgressSink::new(4);
        sink.emit(ProgressEvent::started("task", 3));
    }

    #[tokio::test]
    async fn test_broadcast_delivers_and_lags() {
        let sink = BroadcastProgressSink::new(2);
        let mut rx = sink.subscribe();
        sink.emit(ProgressEvent::started("task", 3));
        sink.emit(ProgressEvent::advanced("task", 3));
        sink.emit(ProgressEvent::advanced("task", 3));

        // capacity 2: the oldest event was dropped
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.unwrap().kind, ProgressKind::Advanced);
    }

    #[test]
    fn test_mock_sink_collects() {
        let sink = MockProgressSink::new();
        sink.emit(ProgressEvent::started("task", 2));
        sink.emit(ProgressEvent::advanced("task", 2));
        sink.emit(ProgressEvent::advanced("task", 2));
        sink.emit(ProgressEvent::finished("task", 2));
        assert_eq!(sink.events().len(), 4);
        assert_eq!(sink.completed(), 2);
    }
}
