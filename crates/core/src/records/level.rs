use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Months, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::constants::{RECORD_ID_DAY_FORMAT, RECORD_ID_INTRADAY_FORMAT};
use crate::errors::{Error, Result};

/// Sampling interval of a time-series dataset.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Level {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1wk")]
    Week1,
    #[serde(rename = "1mon")]
    Month1,
}

impl Level {
    pub fn code(&self) -> &'static str {
        match self {
            Level::Minute1 => "1m",
            Level::Minute5 => "5m",
            Level::Minute15 => "15m",
            Level::Minute30 => "30m",
            Level::Hour1 => "1h",
            Level::Hour4 => "4h",
            Level::Day1 => "1d",
            Level::Week1 => "1wk",
            Level::Month1 => "1mon",
        }
    }

    /// Nominal interval length in seconds. Months count as 30 days.
    pub fn to_seconds(&self) -> i64 {
        match self {
            Level::Minute1 => 60,
            Level::Minute5 => 5 * 60,
            Level::Minute15 => 15 * 60,
            Level::Minute30 => 30 * 60,
            Level::Hour1 => 60 * 60,
            Level::Hour4 => 4 * 60 * 60,
            Level::Day1 => 24 * 60 * 60,
            Level::Week1 => 7 * 24 * 60 * 60,
            Level::Month1 => 30 * 24 * 60 * 60,
        }
    }

    pub fn is_intraday(&self) -> bool {
        *self < Level::Day1
    }

    /// Start of the interval containing `ts`.
    pub fn floor(&self, ts: NaiveDateTime) -> NaiveDateTime {
        let midnight = ts.date().and_time(NaiveTime::MIN);
        match self {
            Level::Day1 => midnight,
            Level::Week1 => {
                midnight - Duration::days(ts.weekday().num_days_from_monday() as i64)
            }
            Level::Month1 => ts
                .date()
                .with_day(1)
                .map(|d| d.and_time(NaiveTime::MIN))
                .unwrap_or(midnight),
            _ => {
                let secs = ts.num_seconds_from_midnight() as i64;
                midnight + Duration::seconds(secs - secs % self.to_seconds())
            }
        }
    }

    /// First instant of the next interval after the one labelled `ts`.
    pub fn next_instant(&self, ts: NaiveDateTime) -> NaiveDateTime {
        match self {
            Level::Month1 => ts
                .checked_add_months(Months::new(1))
                .unwrap_or(ts + Duration::days(30)),
            _ => ts + Duration::seconds(self.to_seconds()),
        }
    }

    /// Timestamp format used inside record ids.
    pub fn id_format(&self) -> &'static str {
        if self.is_intraday() {
            RECORD_ID_INTRADAY_FORMAT
        } else {
            RECORD_ID_DAY_FORMAT
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1m" => Ok(Level::Minute1),
            "5m" => Ok(Level::Minute5),
            "15m" => Ok(Level::Minute15),
            "30m" => Ok(Level::Minute30),
            "1h" => Ok(Level::Hour1),
            "4h" => Ok(Level::Hour4),
            "1d" => Ok(Level::Day1),
            "1wk" => Ok(Level::Week1),
            "1mon" => Ok(Level::Month1),
            other => Err(Error::Config(format!("unknown level '{}'", other))),
        }
    }
}
