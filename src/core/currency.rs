//! Currency conversion abstractions

use crate::core::error::PriceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "USD", alias = "usd")]
    Usd,
    #[serde(rename = "EUR", alias = "eur")]
    Eur,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            _ => Err(anyhow::anyhow!("Unsupported currency: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub from: Currency,
    pub to: Currency,
}

impl CurrencyPair {
    pub fn new(from: Currency, to: Currency) -> Self {
        Self { from, to }
    }

    /// Well-known cache key for this pair's rate.
    pub fn cache_key(&self) -> String {
        format!("fx:{}{}", self.from, self.to)
    }
}

impl Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.from, self.to)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub pair: CurrencyPair,
    pub rate: Decimal,
    pub fetched_at: DateTime<Utc>,
}

#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    async fn get_rate(&self, from: Currency, to: Currency) -> Result<Decimal, PriceError>;
}

/// Exchange rates resolved for one valuation run.
///
/// Lookups are synchronous so the valuation engine stays free of I/O.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rates: HashMap<CurrencyPair, ExchangeRate>,
    stale: BTreeSet<CurrencyPair>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rate: ExchangeRate, stale: bool) {
        if stale {
            self.stale.insert(rate.pair);
        } else {
            self.stale.remove(&rate.pair);
        }
        self.rates.insert(rate.pair, rate);
    }

    pub fn get(&self, pair: &CurrencyPair) -> Option<&ExchangeRate> {
        self.rates.get(pair)
    }

    pub fn is_stale(&self, pair: &CurrencyPair) -> bool {
        self.stale.contains(pair)
    }

    /// Pairs that were served from an expired cache entry.
    pub fn stale_pairs(&self) -> impl Iterator<Item = &CurrencyPair> {
        self.stale.iter()
    }

    /// Converts `amount` from one currency to another.
    ///
    /// Same-currency conversions return the input untouched. A missing rate
    /// is an explicit failure, never an assumed parity.
    pub fn normalize(
        &self,
        amount: Decimal,
        from: Currency,
        to: Currency,
    ) -> Result<Decimal, PriceError> {
        if from == to {
            return Ok(amount);
        }

        let pair = CurrencyPair::new(from, to);
        match self.rates.get(&pair) {
            Some(rate) => {
                let converted = amount
                    .checked_mul(rate.rate)
                    .ok_or(PriceError::ConversionOverflow { pair, amount })?;
                debug!("Converted {amount} {from} to {converted} {to} at rate {}", rate.rate);
                Ok(converted)
            }
            None => Err(PriceError::RateUnavailable { pair }),
        }
    }
}
