//! Entry points used by the CLI and by embedders.

use crate::core::analytics::{
    self, CategoryAmount, DateRange, TransactionFlow, ValuationSnapshot,
};
use crate::core::config::AppConfig;
use crate::core::currency::{Currency, CurrencyPair, ExchangeRate};
use crate::core::error::PriceError;
use crate::core::holding::Holding;
use crate::core::normalizer::CurrencyNormalizer;
use crate::core::orchestrator::{FetchOrchestrator, FetchResult, FetchSettings, TickerOutcome};
use crate::core::price::PriceQuote;
use crate::core::ticker::Ticker;
use crate::core::timeseries::{self, Granularity, SeriesKind, SeriesPoint};
use crate::providers::{CoinGeckoProvider, YahooCurrencyProvider, YahooFinanceProvider};
use crate::store::memory::MemoryCache;
use crate::store::{PortfolioStore, PriceUpdate, WriteBackReport, write_back};
use anyhow::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of a refresh followed by a write-back of the live prices.
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub fetch: FetchResult,
    pub write_back: WriteBackReport,
}

pub struct PortfolioService {
    store: Arc<dyn PortfolioStore>,
    orchestrator: FetchOrchestrator,
    normalizer: CurrencyNormalizer,
    reporting_currency: Currency,
}

impl PortfolioService {
    pub fn new(
        store: Arc<dyn PortfolioStore>,
        orchestrator: FetchOrchestrator,
        normalizer: CurrencyNormalizer,
        reporting_currency: Currency,
    ) -> Self {
        Self {
            store,
            orchestrator,
            normalizer,
            reporting_currency,
        }
    }

    /// Wires the configured providers to fresh in-memory caches.
    pub fn from_config(config: &AppConfig, store: Arc<dyn PortfolioStore>) -> Result<Self> {
        config.validate()?;

        let settings = FetchSettings {
            ttl: config.cache_ttl(),
            timeout: config.adapter_timeout(),
        };
        let price_cache = Arc::new(MemoryCache::<String, PriceQuote>::new());
        let rate_cache = Arc::new(MemoryCache::<String, ExchangeRate>::new());

        let coingecko = config.providers.coingecko();
        let yahoo = config.providers.yahoo();
        debug!("Using providers: coingecko={}, yahoo={}", coingecko.base_url, yahoo.base_url);

        let mut orchestrator = FetchOrchestrator::new(price_cache, settings)?;
        orchestrator.register(Arc::new(CoinGeckoProvider::new(
            &coingecko.base_url,
            coingecko.quote_currency,
            coingecko.max_batch_size,
        )?))?;
        orchestrator.register(Arc::new(YahooFinanceProvider::new(
            &yahoo.base_url,
            yahoo.max_batch_size,
        )?))?;

        let normalizer = CurrencyNormalizer::new(
            Arc::new(YahooCurrencyProvider::new(&yahoo.base_url)?),
            rate_cache,
            settings.ttl,
            settings.timeout,
        )?;

        Ok(Self::new(
            store,
            orchestrator,
            normalizer,
            config.reporting_currency,
        ))
    }

    pub fn reporting_currency(&self) -> Currency {
        self.reporting_currency
    }

    pub fn store(&self) -> &Arc<dyn PortfolioStore> {
        &self.store
    }

    /// Distinct tickers across all holdings.
    pub async fn tracked_tickers(&self) -> Result<Vec<Ticker>> {
        let holdings = self.store.holdings().await?;
        let tickers: BTreeSet<Ticker> = holdings.iter().map(Holding::ticker).collect();
        Ok(tickers.into_iter().collect())
    }

    pub async fn refresh_prices(&self, tickers: &[Ticker]) -> Result<FetchResult, PriceError> {
        self.orchestrator.refresh_prices(tickers).await
    }

    /// Refreshes every held ticker and writes the live prices back to the
    /// store, one ticker at a time.
    pub async fn refresh_and_write_back(
        &self,
        on_quote: &(dyn Fn(&PriceQuote) + Send + Sync),
    ) -> Result<RefreshReport> {
        let tickers = self.tracked_tickers().await?;
        let fetch = self.orchestrator.refresh_prices_with(&tickers, on_quote).await?;

        let updates: Vec<PriceUpdate> = fetch
            .prices
            .iter()
            .filter(|(ticker, _)| matches!(fetch.outcomes.get(*ticker), Some(TickerOutcome::Fetched)))
            .map(|(_, quote)| PriceUpdate::from(quote))
            .collect();
        let write_back = write_back(self.store.as_ref(), &updates).await;
        info!(
            "Wrote back {} price(s), {} failed",
            write_back.written.len(),
            write_back.failed.len()
        );

        Ok(RefreshReport { fetch, write_back })
    }

    /// Values every holding in `reporting`, refreshing whatever the cache
    /// cannot serve fresh.
    pub async fn valuation_snapshot(&self, reporting: Currency) -> Result<ValuationSnapshot> {
        let (snapshot, _) = self.valuation_with_fetch(reporting).await?;
        Ok(snapshot)
    }

    /// Same as [`Self::valuation_snapshot`], also returning the refresh it
    /// was computed from.
    pub async fn valuation_with_fetch(
        &self,
        reporting: Currency,
    ) -> Result<(ValuationSnapshot, FetchResult)> {
        let holdings = self.store.holdings().await?;
        let tickers: BTreeSet<Ticker> = holdings.iter().map(Holding::ticker).collect();
        let tickers: Vec<Ticker> = tickers.into_iter().collect();
        let fetch = self.orchestrator.refresh_prices(&tickers).await?;

        let pairs = holdings
            .iter()
            .map(|h| h.cost_currency)
            .chain(fetch.prices.values().map(|q| q.currency))
            .map(|from| CurrencyPair::new(from, reporting));
        let rates = self.normalizer.rate_table(pairs).await;

        let snapshot = analytics::valuation_snapshot(&holdings, &fetch.prices, &rates, reporting);
        debug!(
            "Snapshot: total {} {}, {} unpriced",
            snapshot.total_value,
            reporting,
            snapshot.unpriced.len()
        );
        Ok((snapshot, fetch))
    }

    /// Spending or income per category within `range`.
    pub async fn category_distribution(
        &self,
        range: DateRange,
        flow: TransactionFlow,
    ) -> Result<Vec<CategoryAmount>> {
        let transactions = self.store.transactions().await?;
        Ok(analytics::transaction_category_distribution(
            &transactions,
            range,
            flow,
        ))
    }

    pub async fn time_series(
        &self,
        kind: SeriesKind,
        granularity: Granularity,
    ) -> Result<Vec<SeriesPoint>> {
        match kind {
            SeriesKind::Balance => {
                let transactions = self.store.transactions().await?;
                Ok(timeseries::balance_series(&transactions, granularity))
            }
            SeriesKind::PortfolioValue => {
                let snapshot = self.valuation_snapshot(self.reporting_currency).await?;
                Ok(timeseries::portfolio_value_series(
                    &snapshot.holdings,
                    granularity,
                ))
            }
            SeriesKind::Invested => {
                let snapshot = self.valuation_snapshot(self.reporting_currency).await?;
                Ok(timeseries::invested_series(&snapshot.holdings, granularity))
            }
        }
    }
}
