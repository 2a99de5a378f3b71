//! Exchange-rate resolution through the shared cache, with one refetch per
//! pair at a time.

use crate::core::cache::Cache;
use crate::core::currency::{Currency, CurrencyPair, CurrencyRateProvider, ExchangeRate, RateTable};
use crate::core::error::PriceError;
use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub type RateCache = dyn Cache<String, ExchangeRate>;

/// A rate and whether it came from an expired cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRate {
    pub rate: ExchangeRate,
    pub stale: bool,
}

pub struct CurrencyNormalizer {
    provider: Arc<dyn CurrencyRateProvider>,
    cache: Arc<RateCache>,
    ttl: chrono::Duration,
    timeout: Duration,
    // Completion time of the last fetch attempt per pair.
    flights: DashMap<CurrencyPair, Arc<Mutex<Option<Instant>>>>,
}

impl CurrencyNormalizer {
    pub fn new(
        provider: Arc<dyn CurrencyRateProvider>,
        cache: Arc<RateCache>,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<Self, PriceError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| PriceError::Configuration(format!("invalid cache TTL: {e}")))?;
        Ok(Self {
            provider,
            cache,
            ttl,
            timeout,
            flights: DashMap::new(),
        })
    }

    /// Converts `amount` into `to`, fetching the rate when the cached one
    /// has expired.
    pub async fn normalize(
        &self,
        amount: Decimal,
        from: Currency,
        to: Currency,
    ) -> Result<Decimal, PriceError> {
        if from == to {
            return Ok(amount);
        }
        let resolved = self.resolve_rate(from, to).await?;
        amount
            .checked_mul(resolved.rate.rate)
            .ok_or(PriceError::ConversionOverflow {
                pair: resolved.rate.pair,
                amount,
            })
    }

    /// Returns the rate for `from`→`to`.
    ///
    /// Concurrent callers for the same pair share one fetch: whoever waits
    /// on an attempt that completes meanwhile takes its outcome instead of
    /// fetching again. On failure the last cached rate is served as stale;
    /// with nothing cached the result is `RateUnavailable`.
    pub async fn resolve_rate(
        &self,
        from: Currency,
        to: Currency,
    ) -> Result<ResolvedRate, PriceError> {
        let pair = CurrencyPair::new(from, to);
        if from == to {
            return Ok(ResolvedRate {
                rate: ExchangeRate {
                    pair,
                    rate: Decimal::ONE,
                    fetched_at: Utc::now(),
                },
                stale: false,
            });
        }

        if let Some(rate) = self.fresh_rate(&pair) {
            return Ok(ResolvedRate { rate, stale: false });
        }

        let flight = Arc::clone(self.flights.entry(pair).or_default().value());
        let waiting_since = Instant::now();
        let mut last_attempt = flight.lock().await;

        if let Some(rate) = self.fresh_rate(&pair) {
            debug!("Rate for {pair} refreshed while waiting");
            return Ok(ResolvedRate { rate, stale: false });
        }
        if last_attempt.is_some_and(|finished| finished >= waiting_since) {
            debug!("Rate fetch for {pair} already failed while waiting");
            return self.fall_back(pair, None);
        }

        info!("Fetching exchange rate for {pair}");
        let outcome = match tokio::time::timeout(self.timeout, self.provider.get_rate(from, to)).await
        {
            Ok(result) => result,
            Err(_) => Err(PriceError::unreachable(
                "fx",
                format!("timed out after {}s", self.timeout.as_secs_f64()),
            )),
        };
        *last_attempt = Some(Instant::now());

        match outcome {
            Ok(value) if value > Decimal::ZERO => {
                let rate = ExchangeRate {
                    pair,
                    rate: value,
                    fetched_at: Utc::now(),
                };
                self.cache
                    .put_at(pair.cache_key(), rate.clone(), rate.fetched_at);
                Ok(ResolvedRate { rate, stale: false })
            }
            Ok(value) => self.fall_back(
                pair,
                Some(PriceError::rejected(
                    "fx",
                    &pair.to_string(),
                    format!("non-positive rate {value}"),
                )),
            ),
            Err(e) => self.fall_back(pair, Some(e)),
        }
    }

    /// Resolves every pair once and returns a table for synchronous lookups.
    ///
    /// Pairs that cannot be resolved are left out of the table, so the
    /// holdings needing them fail individually.
    pub async fn rate_table(&self, pairs: impl IntoIterator<Item = CurrencyPair>) -> RateTable {
        let pairs: BTreeSet<CurrencyPair> = pairs.into_iter().filter(|p| p.from != p.to).collect();
        let resolved = join_all(
            pairs
                .iter()
                .map(|pair| async move { (*pair, self.resolve_rate(pair.from, pair.to).await) }),
        )
        .await;

        let mut table = RateTable::new();
        for (pair, result) in resolved {
            match result {
                Ok(ResolvedRate { rate, stale }) => table.insert(rate, stale),
                Err(e) => warn!("Leaving {pair} out of rate table: {e}"),
            }
        }
        table
    }

    fn fresh_rate(&self, pair: &CurrencyPair) -> Option<ExchangeRate> {
        self.cache
            .get(&pair.cache_key())
            .filter(|entry| entry.is_fresh_at(self.ttl, Utc::now()))
            .map(|entry| entry.value)
    }

    fn fall_back(
        &self,
        pair: CurrencyPair,
        reason: Option<PriceError>,
    ) -> Result<ResolvedRate, PriceError> {
        if let Some(reason) = &reason {
            warn!("Exchange rate fetch for {pair} failed: {reason}");
        }
        match self.cache.get(&pair.cache_key()) {
            Some(entry) => {
                warn!("Using stale exchange rate for {pair} from {}", entry.fetched_at);
                Ok(ResolvedRate {
                    rate: entry.value,
                    stale: true,
                })
            }
            None => Err(PriceError::RateUnavailable { pair }),
        }
    }
}
