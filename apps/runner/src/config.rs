//! Runner configuration from `HARVEST_*` environment variables.

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use harvest_core::calendar::Region;
use harvest_core::constants::TIMESTAMP_STORAGE_FORMAT;
use harvest_core::entities::EntitySelector;
use harvest_core::sync::{EngineOptions, RecorderKey, SyncOptions};
use harvest_core::writer::WriteMode;
use harvest_core::{Error, Result};

const DEFAULT_DB_PATH: &str = "./data/harvest.db";
const DEFAULT_PROVIDER: &str = "yahoo";
const DEFAULT_DATASET: &str = "stock_1d_kdata";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: String,
    pub key: RecorderKey,
    pub workers: usize,
    pub concurrency: usize,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub codes: Vec<String>,
    pub entity_ids: Vec<String>,
    pub exchanges: Vec<String>,
    pub force_update: bool,
    pub sleep: Option<Duration>,
    pub log_format: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let region = match var("HARVEST_REGION") {
            Some(v) => v.parse::<Region>()?,
            None => Region::China,
        };
        let key = RecorderKey::new(
            region,
            var("HARVEST_PROVIDER").unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            var("HARVEST_DATASET").unwrap_or_else(|| DEFAULT_DATASET.to_string()),
        );

        let config = Config {
            db_path: var("HARVEST_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            key,
            workers: parse_number("HARVEST_WORKERS", var("HARVEST_WORKERS"), 1)?,
            concurrency: parse_number("HARVEST_CONCURRENCY", var("HARVEST_CONCURRENCY"), 10)?,
            start: var("HARVEST_START")
                .map(|v| parse_timestamp("HARVEST_START", &v))
                .transpose()?,
            end: var("HARVEST_END")
                .map(|v| parse_timestamp("HARVEST_END", &v))
                .transpose()?,
            codes: parse_list(var("HARVEST_CODES")),
            entity_ids: parse_list(var("HARVEST_ENTITY_IDS")),
            exchanges: parse_list(var("HARVEST_EXCHANGES")),
            force_update: var("HARVEST_FORCE_UPDATE")
                .map(|v| parse_bool("HARVEST_FORCE_UPDATE", &v))
                .transpose()?
                .unwrap_or(false),
            sleep: var("HARVEST_SLEEP_MS")
                .map(|v| parse_number::<u64>("HARVEST_SLEEP_MS", Some(v), 0))
                .transpose()?
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            log_format: var("HARVEST_LOG_FORMAT").unwrap_or_else(|| "text".to_string()),
        };

        config.sync_options().validate()?;
        config.engine_options().validate()?;
        Ok(config)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            start: self.start,
            end: self.end,
            write_mode: if self.force_update {
                WriteMode::ForceUpdate
            } else {
                WriteMode::Normal
            },
            selector: EntitySelector::all()
                .with_codes(self.codes.clone())
                .with_entity_ids(self.entity_ids.clone())
                .with_exchanges(self.exchanges.clone()),
            sleeping_time: self.sleep,
            ..SyncOptions::default()
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions::new(self.workers, self.concurrency)
    }
}

fn invalid(name: &str, value: &str) -> Error {
    Error::Config(format!("invalid value '{}' for {}", value, name))
}

fn parse_number<T: std::str::FromStr>(name: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(v) => v.parse::<T>().map_err(|_| invalid(name, &v)),
        None => Ok(default),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(invalid(name, value)),
    }
}

/// Accepts `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`.
fn parse_timestamp(name: &str, value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_STORAGE_FORMAT)
        .or_else(|_| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .map_err(|_| invalid(name, value))
}

fn parse_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
