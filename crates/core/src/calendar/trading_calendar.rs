use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::Region;

/// Descending sequence of valid session dates for a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingCalendar {
    region: Region,
    sessions: Vec<NaiveDate>,
}

impl TradingCalendar {
    /// Builds a calendar from sessions in any order; duplicates are removed.
    pub fn new(region: Region, sessions: impl IntoIterator<Item = NaiveDate>) -> Self {
        let mut sessions: Vec<NaiveDate> = sessions.into_iter().collect();
        sessions.sort_unstable_by(|a, b| b.cmp(a));
        sessions.dedup();
        TradingCalendar { region, sessions }
    }

    pub fn empty(region: Region) -> Self {
        TradingCalendar {
            region,
            sessions: Vec::new(),
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Sessions, most recent first.
    pub fn sessions(&self) -> &[NaiveDate] {
        &self.sessions
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.sessions
            .binary_search_by(|probe| date.cmp(probe))
            .is_ok()
    }

    /// Most recent session that is complete at `now` (region-local wall clock).
    ///
    /// Today's session only qualifies once `now` has reached `close`; sessions
    /// after today never qualify.
    pub fn most_recent_eligible(&self, now: NaiveDateTime, close: NaiveTime) -> Option<NaiveDate> {
        let today = now.date();
        self.sessions.iter().copied().find(|session| {
            *session < today || (*session == today && now.time() >= close)
        })
    }

    /// Number of sessions in `[start, end]`.
    pub fn sessions_between(&self, start: NaiveDate, end: NaiveDate) -> usize {
        if start > end {
            return 0;
        }
        self.sessions
            .iter()
            .filter(|s| **s >= start && **s <= end)
            .count()
    }
}
