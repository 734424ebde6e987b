//! Reference market data recorders for the harvest engine.
//!
//! This crate provides:
//! - A Yahoo chart API client with exchange-suffix symbol mapping
//! - [`KdataRecorder`]: OHLCV bars per `(region, level)` as a range dataset
//! - [`MarketDataError`] with [`RetryClass`] classification
//! - A per-provider token bucket [`RateLimiter`]
//!
//! [`register`] adds every recorder to a [`RecorderRegistry`]; the recorders
//! share one rate limiter so concurrent batches stay within the provider budget.

pub mod errors;
pub mod kdata;
pub mod rate_limiter;
pub mod yahoo;

use std::sync::Arc;

use harvest_core::calendar::Region;
use harvest_core::records::Level;
use harvest_core::registry::RecorderRegistry;
use harvest_core::sync::{Recorder, RecorderKey};
use harvest_core::Result;

pub use errors::{MarketDataError, RetryClass};
pub use kdata::{kdata_dataset, kdata_schema, KdataRecorder};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use yahoo::{YahooClient, PROVIDER_ID};

/// Bar levels registered for every region.
pub const KDATA_LEVELS: [Level; 5] = [
    Level::Day1,
    Level::Week1,
    Level::Month1,
    Level::Hour1,
    Level::Minute30,
];

/// Registers the Yahoo K-line recorders of every region.
pub fn register(registry: &mut RecorderRegistry, limiter: Arc<RateLimiter>) -> Result<()> {
    for region in Region::ALL {
        for level in KDATA_LEVELS {
            let limiter = limiter.clone();
            registry.register(
                RecorderKey::new(region, PROVIDER_ID, kdata_dataset(level)),
                move |connections| {
                    let client = YahooClient::new(limiter.clone())?;
                    let entities = connections.stores_for(PROVIDER_ID).entities.clone();
                    let recorder: Arc<dyn Recorder> =
                        Arc::new(KdataRecorder::new(region, level, entities, client)?);
                    Ok(recorder)
                },
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_regions() {
        let mut registry = RecorderRegistry::new();
        register(&mut registry, Arc::new(RateLimiter::new())).unwrap();

        assert_eq!(registry.keys().len(), Region::ALL.len() * KDATA_LEVELS.len());
        assert!(registry.contains(&RecorderKey::new(
            Region::Us,
            "yahoo",
            "stock_1d_kdata"
        )));
        assert!(!registry.contains(&RecorderKey::new(
            Region::Us,
            "yahoo",
            "stock_4h_kdata"
        )));

        // A second registration of the same keys is rejected.
        assert!(register(&mut registry, Arc::new(RateLimiter::new())).is_err());
    }
}
