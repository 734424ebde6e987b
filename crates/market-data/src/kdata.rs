//! K-line (OHLCV bar) recorder backed by the Yahoo chart API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::errors::{MarketDataError, RetryClass};
use crate::yahoo::{self, KdataRow, YahooClient, PROVIDER_ID};
use harvest_core::calendar::Region;
use harvest_core::constants::{ENTITY_TYPE_STOCK, TIMESTAMP_STORAGE_FORMAT};
use harvest_core::entities::{Entity, EntityStore};
use harvest_core::errors::{Error, Result};
use harvest_core::records::{ColumnDef, ColumnKind, DatasetSchema, Level, Record};
use harvest_core::sync::{DatasetDescriptor, FetchBatch, Recorder, RecorderKey, SyncWindow};

const DEFAULT_MAX_RETRIES: u32 = 2;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Dataset name of the bars of `level`, e.g. `stock_1d_kdata`.
pub fn kdata_dataset(level: Level) -> String {
    format!("{}_{}_kdata", ENTITY_TYPE_STOCK, level.code())
}

pub fn kdata_schema(level: Level) -> DatasetSchema {
    DatasetSchema::keyed(
        kdata_dataset(level),
        vec![
            ColumnDef::new("provider", ColumnKind::Text),
            ColumnDef::new("code", ColumnKind::Text),
            ColumnDef::new("name", ColumnKind::Text),
            ColumnDef::new("level", ColumnKind::Text),
            ColumnDef::new("open", ColumnKind::Real),
            ColumnDef::new("high", ColumnKind::Real),
            ColumnDef::new("low", ColumnKind::Real),
            ColumnDef::new("close", ColumnKind::Real),
            ColumnDef::new("volume", ColumnKind::Integer),
            ColumnDef::new("adj_close", ColumnKind::Real),
        ],
    )
}

/// Fetches a whole planned window in one request per entity.
pub struct KdataRecorder {
    descriptor: DatasetDescriptor,
    level: Level,
    interval: &'static str,
    entities: Arc<dyn EntityStore>,
    client: YahooClient,
    max_retries: u32,
}

impl KdataRecorder {
    pub fn new(
        region: Region,
        level: Level,
        entities: Arc<dyn EntityStore>,
        client: YahooClient,
    ) -> Result<Self> {
        let interval = yahoo::interval(level).ok_or_else(|| {
            Error::Config(format!("Yahoo has no {} interval", level.code()))
        })?;
        let key = RecorderKey::new(region, PROVIDER_ID, kdata_dataset(level));
        Ok(Self {
            descriptor: DatasetDescriptor::range(key, kdata_schema(level), level),
            level,
            interval,
            entities,
            client,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn region(&self) -> Region {
        self.descriptor.key.region
    }

    /// Epoch bounds of the request. Both the window end and Yahoo's `period2`
    /// are exclusive.
    fn request_bounds(&self, entity: &Entity, window: &SyncWindow) -> (i64, i64) {
        let start = window
            .start
            .or(entity.timestamp)
            .unwrap_or_else(default_origin);
        let period1 = yahoo::local_to_epoch(self.region(), start);
        let period2 = match window.end {
            Some(end) => yahoo::local_to_epoch(self.region(), end),
            None => Utc::now().timestamp(),
        };
        (period1, period2)
    }

    async fn chart_with_retry(
        &self,
        symbol: &str,
        period1: i64,
        period2: i64,
    ) -> std::result::Result<Vec<KdataRow>, MarketDataError> {
        let mut attempt = 0;
        loop {
            match self
                .client
                .chart(symbol, self.interval, period1, period2)
                .await
            {
                Ok(response) => return Ok(yahoo::bars(response, self.region(), self.level)),
                Err(e) if e.retry_class() == RetryClass::WithBackoff && attempt < self.max_retries => {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                    warn!(
                        "Yahoo request for {} failed ({}), retrying in {:?}",
                        symbol, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn default_origin() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1990, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn in_window(window: &SyncWindow, ts: NaiveDateTime) -> bool {
    window.start.map_or(true, |s| ts >= s) && window.end.map_or(true, |e| ts < e)
}

#[async_trait]
impl Recorder for KdataRecorder {
    fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    async fn init_entities(&self) -> Result<Vec<Entity>> {
        let entities = self
            .entities
            .list_entities(ENTITY_TYPE_STOCK, &yahoo::region_exchanges(self.region()))?;
        info!(
            "{} entities for {}",
            entities.len(),
            self.descriptor.key
        );
        Ok(entities)
    }

    async fn fetch(&self, entity: &Entity, window: &SyncWindow) -> Result<FetchBatch> {
        let symbol = yahoo::yahoo_symbol(entity)?;
        let (period1, period2) = self.request_bounds(entity, window);

        let rows = match self.chart_with_retry(&symbol, period1, period2).await {
            Ok(rows) => rows,
            Err(MarketDataError::SymbolNotFound(_)) => {
                info!("{} ({}) is not listed on Yahoo any more", entity.id, symbol);
                return Ok(FetchBatch::delisted());
            }
            Err(MarketDataError::NoDataForRange) => return Ok(FetchBatch::empty()),
            Err(e) => return Err(e.into()),
        };

        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            let ts = NaiveDateTime::parse_from_str(&row.timestamp, TIMESTAMP_STORAGE_FORMAT)?;
            if !in_window(window, ts) {
                continue;
            }
            values.push(serde_json::to_value(row).map_err(|e| Error::Shape(e.to_string()))?);
        }
        debug!("{} bars for {} from {}", values.len(), entity.id, symbol);

        if values.is_empty() {
            return Ok(FetchBatch::empty());
        }
        // One request covers the whole window.
        Ok(FetchBatch::new(values).exhausted())
    }

    fn shape(&self, entity: &Entity, rows: Vec<JsonValue>) -> Result<Vec<Record>> {
        rows.into_iter()
            .map(|value| {
                let row: KdataRow =
                    serde_json::from_value(value).map_err(|e| Error::Shape(e.to_string()))?;
                let ts = NaiveDateTime::parse_from_str(&row.timestamp, TIMESTAMP_STORAGE_FORMAT)?;
                if row.close.is_none() {
                    return Err(MarketDataError::ValidationFailed {
                        message: format!("bar of {} at {} has no close", entity.id, row.timestamp),
                    }
                    .into());
                }
                Ok(Record::new(&entity.id, ts, self.level)
                    .set("provider", PROVIDER_ID)
                    .set("code", entity.code.as_str())
                    .set("name", entity.name.as_str())
                    .set("level", self.level.code())
                    .set("open", row.open)
                    .set("high", row.high)
                    .set("low", row.low)
                    .set("close", row.close)
                    .set("volume", row.volume)
                    .set("adj_close", row.adj_close))
            })
            .collect()
    }
}
