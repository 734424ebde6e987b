use chrono::NaiveDateTime;

/// Result of planning one sync pass for one entity.
///
/// Either a continuous `[start, end)` range or an explicit list of timestamps,
/// in which case `start` and `end` are the first and last of them.
/// `expected_size == 0` means nothing is left to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncWindow {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub expected_size: usize,
    pub timestamps: Vec<NaiveDateTime>,
}

impl SyncWindow {
    /// The entity is already current.
    pub fn current() -> Self {
        Self::default()
    }

    pub fn range(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>, size: usize) -> Self {
        SyncWindow {
            start,
            end,
            expected_size: size,
            timestamps: Vec::new(),
        }
    }

    /// Window over explicit timestamps; `timestamps` must be sorted.
    pub fn discrete(timestamps: Vec<NaiveDateTime>) -> Self {
        SyncWindow {
            start: timestamps.first().copied(),
            end: timestamps.last().copied(),
            expected_size: timestamps.len(),
            timestamps,
        }
    }

    pub fn is_current(&self) -> bool {
        self.expected_size == 0
    }

    pub fn is_discrete(&self) -> bool {
        !self.timestamps.is_empty()
    }
}
