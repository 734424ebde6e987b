//! Sync window planning.
//!
//! Works out what an entity still needs from the latest persisted timestamp,
//! the trading calendar and the configured bounds.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, warn};

use super::SyncWindow;
use crate::calendar::{Region, TradingCalendar};
use crate::entities::Entity;
use crate::records::{Level, ReferenceRecords};

/// Plans sync windows for one dataset.
#[derive(Debug, Clone)]
pub struct SyncPlanner {
    level: Level,
    close_time: NaiveTime,
    trading_minutes: u32,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    default_size: usize,
}

impl SyncPlanner {
    pub fn new(region: Region, level: Level, default_size: usize) -> Self {
        SyncPlanner {
            level,
            close_time: region.close_time(),
            trading_minutes: region.trading_minutes(),
            start: None,
            end: None,
            default_size,
        }
    }

    /// Restricts plans to `[start, end]`, both inclusive.
    pub fn with_bounds(mut self, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Overrides the session close cutoff of the region.
    pub fn with_close_time(mut self, close_time: NaiveTime) -> Self {
        self.close_time = close_time;
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Plans the next continuous range for `entity`.
    ///
    /// `now` is the region-local wall clock. The returned range is half-open,
    /// `[start, end)`, and always starts after the latest persisted timestamp.
    pub fn plan(
        &self,
        entity: &Entity,
        reference: &ReferenceRecords,
        calendar: &TradingCalendar,
        now: NaiveDateTime,
    ) -> SyncWindow {
        let persisted = reference.latest();
        let Some(origin) = persisted.or(entity.timestamp).or(self.start) else {
            warn!(
                "No resume point for {}: no persisted rows, origin or configured start",
                entity.id
            );
            return SyncWindow::range(self.start, self.end_bound(), self.default_size);
        };

        let resume_from = match persisted {
            Some(latest) => self.level.next_instant(latest),
            None => origin,
        };
        let start = self.start.map_or(resume_from, |s| s.max(resume_from));

        if calendar.is_empty() {
            warn!(
                "Trading calendar for {} is empty; planning {} from {} with default size",
                calendar.region(),
                entity.id,
                start
            );
            return SyncWindow::range(Some(start), self.end_bound(), self.default_size);
        }

        let Some(session) = calendar.most_recent_eligible(now, self.close_time) else {
            debug!("No completed session before {} for {}", now, entity.id);
            return SyncWindow::current();
        };
        let (last_bar, session_end) = self.session_bounds(session);

        if let Some(latest) = persisted {
            if latest >= self.level.floor(now) || latest >= last_bar {
                debug!("{} is current at {}", entity.id, latest);
                return SyncWindow::current();
            }
        }

        let end = self.end_bound().map_or(session_end, |e| e.min(session_end));
        if start >= end {
            return SyncWindow::current();
        }
        SyncWindow::range(Some(start), Some(end), self.expected_size(start, end, calendar))
    }

    /// Plans the next discrete pass from timestamps declared by the recorder.
    ///
    /// Keeps declared timestamps inside the configured bounds and not in the
    /// future, then those after the latest persisted timestamp (or at or after
    /// the entity origin when nothing is persisted).
    pub fn plan_discrete(
        &self,
        entity: &Entity,
        reference: &ReferenceRecords,
        declared: &[NaiveDateTime],
        now: NaiveDateTime,
    ) -> SyncWindow {
        let mut timestamps: Vec<NaiveDateTime> = declared
            .iter()
            .copied()
            .filter(|ts| self.start.map_or(true, |s| *ts >= s))
            .filter(|ts| self.end.map_or(true, |e| *ts <= e))
            .filter(|ts| *ts <= now)
            .collect();
        timestamps.sort_unstable();
        timestamps.dedup();

        match (reference.latest(), entity.timestamp) {
            (Some(latest), _) => timestamps.retain(|ts| *ts > latest),
            (None, Some(origin)) => timestamps.retain(|ts| *ts >= origin),
            (None, None) => {}
        }

        if timestamps.is_empty() {
            SyncWindow::current()
        } else {
            SyncWindow::discrete(timestamps)
        }
    }

    /// Label of the last complete bar of `session`, and the exclusive end of
    /// that session at this level.
    fn session_bounds(&self, session: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        if self.level.is_intraday() {
            let close = session.and_time(self.close_time);
            (close - Duration::seconds(self.level.to_seconds()), close)
        } else {
            let label = self.level.floor(session.and_time(NaiveTime::MIN));
            (label, self.level.next_instant(label))
        }
    }

    /// The configured end as an exclusive bound.
    fn end_bound(&self) -> Option<NaiveDateTime> {
        self.end.map(|e| self.level.next_instant(self.level.floor(e)))
    }

    /// Number of samples expected in `[start, end)`.
    ///
    /// Calendar days for daily and coarser levels. Intraday windows spanning
    /// days count the trading sessions they touch, each a full session.
    fn expected_size(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        calendar: &TradingCalendar,
    ) -> usize {
        let days = (end - start).num_days().max(0);
        let size = match self.level {
            Level::Day1 => days,
            Level::Week1 => ceil_div(days, 7),
            Level::Month1 => {
                let months = |ts: NaiveDateTime| i64::from(ts.year()) * 12 + i64::from(ts.month0());
                months(end) - months(start)
            }
            _ => {
                let interval = self.level.to_seconds();
                let session_secs = i64::from(self.trading_minutes) * 60;
                let last_day = (end - Duration::seconds(1)).date();
                if start.date() == last_day {
                    let secs = (end - start).num_seconds().max(0);
                    ceil_div(secs, interval).min(session_secs / interval)
                } else {
                    let sessions = calendar.sessions_between(start.date(), last_day) as i64;
                    ceil_div(sessions * session_secs, interval)
                }
            }
        };
        size.max(1) as usize
    }
}

fn ceil_div(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}
