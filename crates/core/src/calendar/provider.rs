use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use super::{Region, TradingCalendar};
use crate::errors::{Error, Result};

/// Source of trading calendars.
pub trait CalendarProvider: Send + Sync {
    /// Loads the sessions of `region` between `from` and `to` (inclusive).
    fn load_calendar(&self, region: Region, from: NaiveDate, to: NaiveDate)
        -> Result<TradingCalendar>;
}

/// Generates Monday-to-Friday sessions minus explicit holidays.
#[derive(Debug, Clone, Default)]
pub struct WeekdayCalendar {
    holidays: HashMap<Region, HashSet<NaiveDate>>,
}

impl WeekdayCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holidays(
        mut self,
        region: Region,
        holidays: impl IntoIterator<Item = NaiveDate>,
    ) -> Self {
        self.holidays.entry(region).or_default().extend(holidays);
        self
    }
}

impl CalendarProvider for WeekdayCalendar {
    fn load_calendar(
        &self,
        region: Region,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<TradingCalendar> {
        if from > to {
            return Err(Error::Calendar(format!(
                "calendar range start {} is after end {}",
                from, to
            )));
        }
        let holidays = self.holidays.get(&region);
        let mut sessions = Vec::new();
        let mut day = from;
        while day <= to {
            let weekend = matches!(day.weekday(), Weekday::Sat | Weekday::Sun);
            let holiday = holidays.map(|h| h.contains(&day)).unwrap_or(false);
            if !weekend && !holiday {
                sessions.push(day);
            }
            day += Duration::days(1);
        }
        Ok(TradingCalendar::new(region, sessions))
    }
}
