//! Batched, concurrent price refresh with cache short-circuit and stale
//! fallback.

use crate::core::cache::Cache;
use crate::core::error::PriceError;
use crate::core::price::{PriceProvider, PriceQuote, ProviderPrice, QuoteSource};
use crate::core::ticker::{MarketKind, Ticker};
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub type PriceCache = dyn Cache<String, PriceQuote>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    pub ttl: Duration,
    pub timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            timeout: Duration::from_secs(10),
        }
    }
}

/// How a ticker was satisfied in one refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum TickerOutcome {
    /// Live reading from an adapter.
    Fetched,
    /// Fresh cache entry, no network call made.
    CacheHit,
    /// Live fetch failed; last known value served.
    StaleFallback { reason: PriceError },
    /// Live fetch failed and nothing was ever cached.
    Failed { reason: PriceError },
}

/// Overall freshness of a refresh, for display warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    FullyFresh,
    PartiallyStale,
    Degraded,
}

#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    pub prices: BTreeMap<Ticker, PriceQuote>,
    /// Tickers refreshed live.
    pub succeeded: usize,
    /// Tickers served from cache, fresh or stale.
    pub from_cache: usize,
    pub failed: Vec<Ticker>,
    pub outcomes: BTreeMap<Ticker, TickerOutcome>,
}

impl FetchResult {
    pub fn quote(&self, ticker: &Ticker) -> Option<&PriceQuote> {
        self.prices.get(ticker)
    }

    pub fn stale_count(&self) -> usize {
        self.prices.values().filter(|q| q.stale).count()
    }

    pub fn status(&self) -> RefreshStatus {
        if !self.failed.is_empty() {
            RefreshStatus::Degraded
        } else if self.stale_count() > 0 {
            RefreshStatus::PartiallyStale
        } else {
            RefreshStatus::FullyFresh
        }
    }

    fn record(&mut self, ticker: Ticker, quote: Option<PriceQuote>, outcome: TickerOutcome) {
        match &outcome {
            TickerOutcome::Fetched => self.succeeded += 1,
            TickerOutcome::CacheHit | TickerOutcome::StaleFallback { .. } => self.from_cache += 1,
            TickerOutcome::Failed { .. } => self.failed.push(ticker.clone()),
        }
        if let Some(quote) = quote {
            self.prices.insert(ticker.clone(), quote);
        }
        self.outcomes.insert(ticker, outcome);
    }
}

type BatchOutcome = Result<HashMap<Ticker, Result<PriceQuote, PriceError>>, PriceError>;

/// Routes tickers to the adapter for their market kind, fetching whatever the
/// cache cannot serve fresh.
pub struct FetchOrchestrator {
    providers: HashMap<MarketKind, Arc<dyn PriceProvider>>,
    cache: Arc<PriceCache>,
    settings: FetchSettings,
}

impl FetchOrchestrator {
    pub fn new(cache: Arc<PriceCache>, settings: FetchSettings) -> Result<Self, PriceError> {
        if settings.ttl.is_zero() {
            return Err(PriceError::Configuration(
                "cache TTL must be greater than zero".to_string(),
            ));
        }
        if settings.timeout.is_zero() {
            return Err(PriceError::Configuration(
                "adapter timeout must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            providers: HashMap::new(),
            cache,
            settings,
        })
    }

    /// Registers `provider` for its market kind, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn PriceProvider>) -> Result<(), PriceError> {
        if provider.max_batch_size() == 0 {
            return Err(PriceError::Configuration(format!(
                "{} max batch size must be greater than zero",
                provider.name()
            )));
        }
        self.providers.insert(provider.market_kind(), provider);
        Ok(())
    }

    pub fn settings(&self) -> FetchSettings {
        self.settings
    }

    pub fn cache(&self) -> &Arc<PriceCache> {
        &self.cache
    }

    pub async fn refresh_prices(&self, tickers: &[Ticker]) -> Result<FetchResult, PriceError> {
        self.refresh_prices_with(tickers, &|_| ()).await
    }

    /// Refreshes `tickers`, calling `on_quote` as soon as each quote is known.
    ///
    /// Adapter failures never surface as `Err`: they become per-ticker
    /// outcomes. `Err` means no adapter is registered at all.
    pub async fn refresh_prices_with(
        &self,
        tickers: &[Ticker],
        on_quote: &(dyn Fn(&PriceQuote) + Send + Sync),
    ) -> Result<FetchResult, PriceError> {
        let mut result = FetchResult::default();
        let unique: BTreeSet<Ticker> = tickers.iter().cloned().collect();
        if unique.is_empty() {
            return Ok(result);
        }
        if self.providers.is_empty() {
            return Err(PriceError::Configuration(
                "no price providers registered".to_string(),
            ));
        }

        let ttl = chrono::Duration::from_std(self.settings.ttl)
            .map_err(|e| PriceError::Configuration(format!("invalid cache TTL: {e}")))?;

        let mut pending: HashMap<MarketKind, Vec<Ticker>> = HashMap::new();
        for ticker in unique {
            if !self.providers.contains_key(&ticker.kind()) {
                warn!("No provider registered for {} ticker {}", ticker.kind(), ticker);
                let reason = PriceError::Configuration(format!(
                    "no provider registered for {} tickers",
                    ticker.kind()
                ));
                result.record(ticker, None, TickerOutcome::Failed { reason });
                continue;
            }

            let key = ticker.cache_key();
            match self.cache.get(&key) {
                Some(entry) if entry.is_fresh_at(ttl, Utc::now()) => {
                    debug!("Fresh cache entry for {}", ticker);
                    on_quote(&entry.value);
                    result.record(ticker, Some(entry.value), TickerOutcome::CacheHit);
                }
                _ => pending.entry(ticker.kind()).or_default().push(ticker),
            }
        }

        let mut batches = FuturesUnordered::new();
        for (kind, tickers) in pending {
            let Some(provider) = self.providers.get(&kind) else {
                continue;
            };
            for chunk in tickers.chunks(provider.max_batch_size()) {
                let chunk = chunk.to_vec();
                info!(
                    "Dispatching {} {} ticker(s) to {}",
                    chunk.len(),
                    kind,
                    provider.name()
                );
                // Spawned so an abandoned refresh still lets the batch finish
                // and populate the cache.
                let handle = tokio::spawn(fetch_batch(
                    Arc::clone(provider),
                    Arc::clone(&self.cache),
                    chunk.clone(),
                    self.settings.timeout,
                ));
                let provider_name = provider.name().to_string();
                batches.push(async move {
                    let outcome = handle.await.unwrap_or_else(|e| {
                        Err(PriceError::unreachable(
                            &provider_name,
                            format!("fetch task failed: {e}"),
                        ))
                    });
                    (provider_name, chunk, outcome)
                });
            }
        }

        while let Some((provider_name, chunk, outcome)) = batches.next().await {
            match outcome {
                Ok(mut quotes) => {
                    for ticker in chunk {
                        match quotes.remove(&ticker) {
                            Some(Ok(quote)) => {
                                on_quote(&quote);
                                result.record(ticker, Some(quote), TickerOutcome::Fetched);
                            }
                            Some(Err(reason)) => {
                                self.fall_back(&mut result, ticker, reason, on_quote)
                            }
                            None => {
                                let reason = PriceError::rejected(
                                    &provider_name,
                                    ticker.symbol(),
                                    "missing from batch response",
                                );
                                self.fall_back(&mut result, ticker, reason, on_quote)
                            }
                        }
                    }
                }
                Err(reason) => {
                    warn!(
                        "Batch of {} ticker(s) from {provider_name} failed: {reason}",
                        chunk.len()
                    );
                    for ticker in chunk {
                        self.fall_back(&mut result, ticker, reason.clone(), on_quote);
                    }
                }
            }
        }

        info!(
            "Refresh complete: {} fetched, {} from cache, {} failed",
            result.succeeded,
            result.from_cache,
            result.failed.len()
        );
        Ok(result)
    }

    /// Serves the last cached value regardless of age, or records a failure.
    fn fall_back(
        &self,
        result: &mut FetchResult,
        ticker: Ticker,
        reason: PriceError,
        on_quote: &(dyn Fn(&PriceQuote) + Send + Sync),
    ) {
        match self.cache.get(&ticker.cache_key()) {
            Some(entry) => {
                warn!("Using stale price for {}: {reason}", ticker);
                let quote = entry.value.into_stale();
                on_quote(&quote);
                result.record(ticker, Some(quote), TickerOutcome::StaleFallback { reason });
            }
            None => {
                warn!("No price available for {}: {reason}", ticker);
                result.record(ticker, None, TickerOutcome::Failed { reason });
            }
        }
    }
}

/// Fetches one batch under a timeout and writes successes to the cache.
async fn fetch_batch(
    provider: Arc<dyn PriceProvider>,
    cache: Arc<PriceCache>,
    tickers: Vec<Ticker>,
    timeout: Duration,
) -> BatchOutcome {
    let name = provider.name().to_string();
    let prices = match tokio::time::timeout(timeout, provider.fetch_prices(&tickers)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(PriceError::unreachable(
                &name,
                format!("timed out after {}s", timeout.as_secs_f64()),
            ));
        }
    };

    let fetched_at = Utc::now();
    Ok(prices
        .into_iter()
        .map(|(ticker, price)| {
            let quote = price.map(|ProviderPrice { value, currency }| PriceQuote {
                ticker: ticker.clone(),
                value,
                currency,
                fetched_at,
                source: QuoteSource::Provider(name.clone()),
                stale: false,
            });
            if let Ok(quote) = &quote {
                cache.put_at(ticker.cache_key(), quote.clone(), fetched_at);
            }
            (ticker, quote)
        })
        .collect())
}
