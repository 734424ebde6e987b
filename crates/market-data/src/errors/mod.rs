//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The error enum for provider requests
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur while talking to a market data provider.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The provider does not know the symbol, or reports it delisted.
    /// Recorders turn this into a delisted signal rather than a failure.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The symbol exists but has no bars in the requested period.
    #[error("No data for date range")]
    NoDataForRange,

    /// The provider rate limited the request (HTTP 429).
    #[error("Rate limited: {provider}")]
    RateLimited { provider: String },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout { provider: String },

    /// A provider-specific error occurred.
    #[error("Provider error: {provider} - {message}")]
    ProviderError { provider: String, message: String },

    /// The entity cannot be mapped to a provider symbol.
    #[error("Resolution failed for provider {provider}: {message}")]
    ResolutionFailed { provider: String, message: String },

    #[error("Circuit open: {provider}")]
    CircuitOpen { provider: String },

    /// The provider returned data that failed validation checks.
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// ```
    /// use harvest_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "yahoo".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::SymbolNotFound("INVALID".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::SymbolNotFound(_) | Self::NoDataForRange | Self::ValidationFailed { .. } => {
                RetryClass::Never
            }

            Self::RateLimited { .. } | Self::Timeout { .. } => RetryClass::WithBackoff,

            Self::ProviderError { .. } | Self::ResolutionFailed { .. } => RetryClass::NextProvider,

            Self::CircuitOpen { .. } => RetryClass::CircuitOpen,

            Self::Network(e) if e.is_timeout() || e.is_connect() => RetryClass::WithBackoff,
            Self::Network(_) => RetryClass::Never,
        }
    }

    fn provider(&self) -> &str {
        match self {
            Self::RateLimited { provider }
            | Self::Timeout { provider }
            | Self::ProviderError { provider, .. }
            | Self::ResolutionFailed { provider, .. }
            | Self::CircuitOpen { provider } => provider,
            _ => crate::yahoo::PROVIDER_ID,
        }
    }
}

impl From<MarketDataError> for harvest_core::Error {
    fn from(err: MarketDataError) -> Self {
        match err {
            MarketDataError::ValidationFailed { message } => harvest_core::Error::Shape(message),
            other => harvest_core::Error::fetch(other.provider().to_string(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_not_found_never_retries() {
        let error = MarketDataError::SymbolNotFound("600000.SS".to_string());
        assert_eq!(error.retry_class(), RetryClass::Never);
    }

    #[test]
    fn test_transient_errors_retry_with_backoff() {
        let error = MarketDataError::RateLimited {
            provider: "yahoo".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::WithBackoff);

        let error = MarketDataError::Timeout {
            provider: "yahoo".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    }

    #[test]
    fn test_provider_error_tries_next_provider() {
        let error = MarketDataError::ProviderError {
            provider: "yahoo".to_string(),
            message: "Internal server error".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::NextProvider);
    }

    #[test]
    fn test_circuit_open() {
        let error = MarketDataError::CircuitOpen {
            provider: "yahoo".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::CircuitOpen);
    }

    #[test]
    fn test_into_core_error() {
        let error: harvest_core::Error = MarketDataError::ProviderError {
            provider: "yahoo".to_string(),
            message: "HTTP 500".to_string(),
        }
        .into();
        assert!(matches!(
            error,
            harvest_core::Error::Fetch { ref provider, ref message }
                if provider == "yahoo" && message.contains("HTTP 500")
        ));

        let error: harvest_core::Error = MarketDataError::ValidationFailed {
            message: "bar without close".to_string(),
        }
        .into();
        assert!(matches!(error, harvest_core::Error::Shape(_)));
    }
}
