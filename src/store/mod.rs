pub mod disk;
pub mod memory;

use crate::core::holding::{Holding, Transaction};
use crate::core::price::PriceQuote;
use crate::core::ticker::Ticker;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Current price written back for one ticker after a refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub ticker: Ticker,
    pub current_price: Decimal,
    pub fetched_at: DateTime<Utc>,
}

impl From<&PriceQuote> for PriceUpdate {
    fn from(quote: &PriceQuote) -> Self {
        Self {
            ticker: quote.ticker.clone(),
            current_price: quote.value,
            fetched_at: quote.fetched_at,
        }
    }
}

/// Source of holdings and transactions, and sink for refreshed prices.
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    async fn holdings(&self) -> Result<Vec<Holding>>;

    async fn transactions(&self) -> Result<Vec<Transaction>>;

    async fn write_price(&self, update: &PriceUpdate) -> Result<()>;
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct WriteBackReport {
    pub written: Vec<Ticker>,
    pub failed: Vec<(Ticker, String)>,
}

/// Writes each update independently; one failing ticker does not stop the rest.
pub async fn write_back(store: &dyn PortfolioStore, updates: &[PriceUpdate]) -> WriteBackReport {
    let mut report = WriteBackReport::default();
    for update in updates {
        match store.write_price(update).await {
            Ok(()) => {
                debug!("Wrote back price for {}", update.ticker);
                report.written.push(update.ticker.clone());
            }
            Err(e) => {
                warn!("Failed to write back price for {}: {e}", update.ticker);
                report.failed.push((update.ticker.clone(), e.to_string()));
            }
        }
    }
    report
}
