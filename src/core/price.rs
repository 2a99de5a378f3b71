//! Pricing abstractions and core types

use crate::core::currency::Currency;
use crate::core::error::PriceError;
use crate::core::ticker::{MarketKind, Ticker};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;

/// Where a quote came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuoteSource {
    /// Live reading from the named adapter.
    Provider(String),
    /// Last known value served because the live fetch failed.
    Cached,
}

impl Display for QuoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuoteSource::Provider(name) => write!(f, "{name}"),
            QuoteSource::Cached => write!(f, "cached"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub ticker: Ticker,
    pub value: Decimal,
    pub currency: Currency,
    pub fetched_at: DateTime<Utc>,
    pub source: QuoteSource,
    pub stale: bool,
}

impl PriceQuote {
    /// Same reading re-labelled as a stale fallback.
    pub fn into_stale(self) -> Self {
        Self {
            source: QuoteSource::Cached,
            stale: true,
            ..self
        }
    }
}

/// A single price reading as returned by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderPrice {
    pub value: Decimal,
    pub currency: Currency,
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider (for logs and quote sources).
    fn name(&self) -> &str;

    /// Market kind this provider serves.
    fn market_kind(&self) -> MarketKind;

    /// Largest number of tickers accepted in one request.
    fn max_batch_size(&self) -> usize;

    /// Fetches the latest price for every ticker in one request.
    ///
    /// A request-level failure is returned as `Err`. Tickers the provider
    /// does not know are reported per ticker inside the map.
    async fn fetch_prices(
        &self,
        tickers: &[Ticker],
    ) -> Result<HashMap<Ticker, Result<ProviderPrice, PriceError>>, PriceError>;

    async fn fetch_price(&self, ticker: &Ticker) -> Result<ProviderPrice, PriceError> {
        let mut prices = self.fetch_prices(std::slice::from_ref(ticker)).await?;
        prices.remove(ticker).unwrap_or_else(|| {
            Err(PriceError::rejected(
                self.name(),
                ticker.symbol(),
                "no price in response",
            ))
        })
    }
}

/// Rejects non-finite or negative readings, which no provider should report.
pub fn validate_price(
    provider: &str,
    ticker: &Ticker,
    value: f64,
    currency: Currency,
) -> Result<ProviderPrice, PriceError> {
    use rust_decimal::prelude::FromPrimitive;

    if !value.is_finite() || value < 0.0 {
        return Err(PriceError::rejected(
            provider,
            ticker.symbol(),
            format!("invalid price {value} (must be finite and non-negative)"),
        ));
    }
    let value = Decimal::from_f64(value).ok_or_else(|| {
        PriceError::rejected(provider, ticker.symbol(), "price out of decimal range")
    })?;
    Ok(ProviderPrice { value, currency })
}
