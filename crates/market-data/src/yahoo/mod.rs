//! Yahoo Finance chart API client.
//!
//! Only the `v8/finance/chart` endpoint is used: it serves daily, weekly,
//! monthly and intraday OHLCV bars for a `[period1, period2)` epoch range.

mod models;

pub use models::KdataRow;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::{header, StatusCode};
use tracing::debug;
use urlencoding::encode;

use crate::errors::MarketDataError;
use crate::rate_limiter::RateLimiter;
use harvest_core::calendar::Region;
use harvest_core::constants::TIMESTAMP_STORAGE_FORMAT;
use harvest_core::entities::Entity;
use harvest_core::records::Level;

use models::{ChartError, ChartResponse};

pub const PROVIDER_ID: &str = "yahoo";

const BASE_URL: &str = "https://query1.finance.yahoo.com";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Chart API interval for `level`; `None` when Yahoo has no such interval.
pub fn interval(level: Level) -> Option<&'static str> {
    match level {
        Level::Minute1 => Some("1m"),
        Level::Minute5 => Some("5m"),
        Level::Minute15 => Some("15m"),
        Level::Minute30 => Some("30m"),
        Level::Hour1 => Some("60m"),
        Level::Hour4 => None,
        Level::Day1 => Some("1d"),
        Level::Week1 => Some("1wk"),
        Level::Month1 => Some("1mo"),
    }
}

/// Yahoo ticker of an entity: Shanghai `.SS`, Shenzhen `.SZ`, Hong Kong `.HK`
/// (four digit code), US tickers unchanged.
pub fn yahoo_symbol(entity: &Entity) -> Result<String, MarketDataError> {
    let code = entity.code.trim();
    let unresolved = || MarketDataError::ResolutionFailed {
        provider: PROVIDER_ID.to_string(),
        message: format!("cannot map {} to a Yahoo symbol", entity.id),
    };
    if code.is_empty() {
        return Err(unresolved());
    }
    match entity.exchange.to_ascii_lowercase().as_str() {
        "sh" => Ok(format!("{}.SS", code)),
        "sz" => Ok(format!("{}.SZ", code)),
        "hk" => {
            let digits = code.trim_start_matches('0');
            Ok(format!("{:0>4}.HK", digits))
        }
        "nasdaq" | "nyse" | "amex" | "us" => Ok(code.to_ascii_uppercase()),
        _ => Err(unresolved()),
    }
}

/// Exchanges whose entities a region's recorders cover.
pub fn region_exchanges(region: Region) -> Vec<String> {
    let exchanges: &[&str] = match region {
        Region::China => &["sh", "sz"],
        Region::HongKong => &["hk"],
        Region::Us => &["nasdaq", "nyse", "amex"],
    };
    exchanges.iter().map(|e| e.to_string()).collect()
}

/// Epoch seconds of an exchange-local timestamp.
pub fn local_to_epoch(region: Region, local: NaiveDateTime) -> i64 {
    region
        .timezone()
        .from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| local.and_utc().timestamp())
}

#[derive(Clone)]
pub struct YahooClient {
    client: reqwest::Client,
    base_url: String,
    limiter: Arc<RateLimiter>,
}

impl YahooClient {
    pub fn new(limiter: Arc<RateLimiter>) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            limiter,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetches bars of `symbol` between two epoch instants.
    pub async fn chart(
        &self,
        symbol: &str,
        interval: &str,
        period1: i64,
        period2: i64,
    ) -> Result<ChartResponse, MarketDataError> {
        self.limiter.acquire(PROVIDER_ID).await;

        let url = format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval={}&events=history",
            self.base_url,
            encode(symbol),
            period1,
            period2,
            interval
        );
        debug!("Fetching Yahoo chart {}", url);

        let response = self
            .client
            .get(&url)
            .header(header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MarketDataError::Timeout {
                        provider: PROVIDER_ID.to_string(),
                    }
                } else {
                    MarketDataError::Network(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        let body = response.text().await?;
        parse_chart(symbol, status, &body)
    }
}

/// Interprets a chart response body. Split out of [`YahooClient::chart`] so the
/// status handling is testable without a server.
pub(crate) fn parse_chart(
    symbol: &str,
    status: StatusCode,
    body: &str,
) -> Result<ChartResponse, MarketDataError> {
    let parsed = serde_json::from_str::<ChartResponse>(body);

    if let Some(error) = parsed.as_ref().ok().and_then(|r| r.chart.error.as_ref()) {
        return Err(chart_error(symbol, error));
    }
    if status == StatusCode::NOT_FOUND {
        return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
    }
    if !status.is_success() {
        return Err(MarketDataError::ProviderError {
            provider: PROVIDER_ID.to_string(),
            message: format!("HTTP {} for {}", status, symbol),
        });
    }
    let response = parsed.map_err(|e| MarketDataError::ProviderError {
        provider: PROVIDER_ID.to_string(),
        message: format!("Failed to parse chart response for {}: {}", symbol, e),
    })?;

    // Yahoo answers a range with no trading in it with a result lacking timestamps.
    let has_bars = response
        .chart
        .result
        .as_ref()
        .and_then(|results| results.first())
        .is_some_and(|result| !result.timestamp.is_empty());
    if !has_bars {
        return Err(MarketDataError::NoDataForRange);
    }
    Ok(response)
}

fn chart_error(symbol: &str, error: &ChartError) -> MarketDataError {
    let description = error.description.clone().unwrap_or_default();
    if error.code == "Not Found" || description.contains("No data found") {
        MarketDataError::SymbolNotFound(symbol.to_string())
    } else {
        MarketDataError::ProviderError {
            provider: PROVIDER_ID.to_string(),
            message: format!("{}: {}", error.code, description),
        }
    }
}

/// Flattens a chart response into bars labelled with the exchange-local
/// start of their interval. Bars without a close are skipped.
pub fn bars(response: ChartResponse, region: Region, level: Level) -> Vec<KdataRow> {
    let Some(result) = response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
    else {
        return Vec::new();
    };
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .unwrap_or_default()
        .adjclose;
    let at = |values: &Vec<Option<f64>>, i: usize| values.get(i).copied().flatten();

    result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, epoch)| {
            let close = at(&quote.close, i)?;
            let instant: DateTime<Utc> = Utc.timestamp_opt(*epoch, 0).single()?;
            let local = level.floor(region.local_time(instant));
            Some(KdataRow {
                timestamp: local.format(TIMESTAMP_STORAGE_FORMAT).to_string(),
                open: at(&quote.open, i),
                high: at(&quote.high, i),
                low: at(&quote.low, i),
                close: Some(close),
                volume: at(&quote.volume, i).map(|v| v.round() as i64),
                adj_close: at(&adjclose, i),
            })
        })
        .collect()
}
