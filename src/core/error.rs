//! Error taxonomy for price fetching and normalization.

use crate::core::currency::CurrencyPair;
use rust_decimal::Decimal;
use thiserror::Error;

/// Failures raised by adapters, the normalizer and configuration checks.
///
/// Adapter failures never reach the caller of a refresh: the orchestrator
/// turns them into per-ticker outcomes. `Configuration` is the only variant
/// that aborts a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("{provider} unreachable: {message}")]
    AdapterUnreachable { provider: String, message: String },

    #[error("{provider} rejected {symbol}: {message}")]
    AdapterRejected {
        provider: String,
        symbol: String,
        message: String,
    },

    #[error("No exchange rate available for {pair}")]
    RateUnavailable { pair: CurrencyPair },

    #[error("Converting {amount} at {pair} is out of range")]
    ConversionOverflow { pair: CurrencyPair, amount: Decimal },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PriceError {
    pub fn unreachable(provider: &str, message: impl Into<String>) -> Self {
        PriceError::AdapterUnreachable {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn rejected(provider: &str, symbol: &str, message: impl Into<String>) -> Self {
        PriceError::AdapterRejected {
            provider: provider.to_string(),
            symbol: symbol.to_string(),
            message: message.into(),
        }
    }

    /// Transient failures are worth a retry on the next refresh.
    pub fn is_transient(&self) -> bool {
        matches!(self, PriceError::AdapterUnreachable { .. })
    }
}
