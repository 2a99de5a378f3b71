use crate::core::config::AppConfig;
use crate::core::holding::{Holding, Transaction};
use crate::core::ticker::Ticker;
use crate::store::{PortfolioStore, PriceUpdate};
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const PRICES_PARTITION: &str = "prices";

/// Holdings and transactions from the configuration file, with the last
/// written-back price per ticker kept in a fjall partition so the next run
/// can show it before any refresh.
pub struct DiskStore {
    holdings: Vec<Holding>,
    transactions: Vec<Transaction>,
    keyspace: Keyspace,
    prices: PartitionHandle,
}

impl DiskStore {
    pub fn open(config: &AppConfig, data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create directory: {}", data_dir.display()))?;

        let keyspace = Config::new(data_dir.join("fjall_db"))
            .open()
            .with_context(|| format!("Failed to open price store in {}", data_dir.display()))?;
        let prices = keyspace
            .open_partition(PRICES_PARTITION, PartitionCreateOptions::default())
            .context("Failed to open prices partition")?;
        debug!("Opened price store at {}", data_dir.display());

        Ok(Self {
            holdings: config.holdings.clone(),
            transactions: config.transactions.clone(),
            keyspace,
            prices,
        })
    }

    pub fn last_price(&self, ticker: &Ticker) -> Result<Option<PriceUpdate>> {
        match self.prices.get(ticker.cache_key())? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes)
                    .with_context(|| format!("Corrupt stored price for {ticker}"))?,
            )),
            None => Ok(None),
        }
    }

    /// Every stored price, ordered by key.
    pub fn last_prices(&self) -> Result<Vec<PriceUpdate>> {
        self.prices
            .iter()
            .map(|item| -> Result<PriceUpdate> {
                let (_, bytes) = item?;
                Ok(serde_json::from_slice(&bytes)?)
            })
            .collect()
    }
}

#[async_trait]
impl PortfolioStore for DiskStore {
    async fn holdings(&self) -> Result<Vec<Holding>> {
        Ok(self.holdings.clone())
    }

    async fn transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.transactions.clone())
    }

    async fn write_price(&self, update: &PriceUpdate) -> Result<()> {
        let bytes = serde_json::to_vec(update)?;
        self.prices
            .insert(update.ticker.cache_key(), bytes)
            .with_context(|| format!("Failed to store price for {}", update.ticker))?;
        self.keyspace
            .persist(PersistMode::SyncAll)
            .context("Failed to persist price store")?;
        debug!("Stored price for {}", update.ticker);
        Ok(())
    }
}
