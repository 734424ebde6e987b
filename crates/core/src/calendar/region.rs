use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Market region. Determines the session timezone, the close cutoff used to
/// decide whether today's session is complete, and the length of a trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "CN")]
    China,
    #[serde(rename = "HK")]
    HongKong,
    #[serde(rename = "US")]
    Us,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::China, Region::HongKong, Region::Us];

    pub fn code(&self) -> &'static str {
        match self {
            Region::China => "CN",
            Region::HongKong => "HK",
            Region::Us => "US",
        }
    }

    pub fn timezone(&self) -> Tz {
        match self {
            Region::China => chrono_tz::Asia::Shanghai,
            Region::HongKong => chrono_tz::Asia::Hong_Kong,
            Region::Us => chrono_tz::America::New_York,
        }
    }

    /// Local time after which the day's session counts as complete.
    pub fn close_time(&self) -> NaiveTime {
        match self {
            Region::China => NaiveTime::from_hms_opt(15, 0, 0),
            Region::HongKong | Region::Us => NaiveTime::from_hms_opt(16, 0, 0),
        }
        .unwrap_or(NaiveTime::MIN)
    }

    /// Minutes of continuous trading in a regular session.
    pub fn trading_minutes(&self) -> u32 {
        match self {
            Region::China => 240,
            Region::HongKong => 330,
            Region::Us => 390,
        }
    }

    /// Wall-clock time in the region for a UTC instant.
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.timezone()).naive_local()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CN" | "CHINA" => Ok(Region::China),
            "HK" | "HONGKONG" => Ok(Region::HongKong),
            "US" => Ok(Region::Us),
            other => Err(Error::Config(format!("unknown region '{}'", other))),
        }
    }
}
