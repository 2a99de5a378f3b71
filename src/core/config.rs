use crate::core::currency::Currency;
use crate::core::error::PriceError;
use crate::core::holding::{Holding, Transaction};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CoinGeckoProviderConfig {
    #[serde(default = "CoinGeckoProviderConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "CoinGeckoProviderConfig::default_max_batch_size")]
    pub max_batch_size: usize,
    /// Currency crypto prices are quoted in.
    #[serde(default = "CoinGeckoProviderConfig::default_quote_currency")]
    pub quote_currency: Currency,
}

impl CoinGeckoProviderConfig {
    fn default_base_url() -> String {
        "https://api.coingecko.com/api/v3".to_string()
    }

    fn default_max_batch_size() -> usize {
        250
    }

    fn default_quote_currency() -> Currency {
        Currency::Eur
    }
}

impl Default for CoinGeckoProviderConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            max_batch_size: Self::default_max_batch_size(),
            quote_currency: Self::default_quote_currency(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct YahooProviderConfig {
    #[serde(default = "YahooProviderConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "YahooProviderConfig::default_max_batch_size")]
    pub max_batch_size: usize,
}

impl YahooProviderConfig {
    fn default_base_url() -> String {
        "https://query1.finance.yahoo.com".to_string()
    }

    fn default_max_batch_size() -> usize {
        50
    }
}

impl Default for YahooProviderConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            max_batch_size: Self::default_max_batch_size(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub coingecko: Option<CoinGeckoProviderConfig>,
    #[serde(default)]
    pub yahoo: Option<YahooProviderConfig>,
}

impl ProvidersConfig {
    pub fn coingecko(&self) -> CoinGeckoProviderConfig {
        self.coingecko.clone().unwrap_or_default()
    }

    pub fn yahoo(&self) -> YahooProviderConfig {
        self.yahoo.clone().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub holdings: Vec<Holding>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default = "AppConfig::default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    #[serde(default = "AppConfig::default_adapter_timeout_seconds")]
    pub adapter_timeout_seconds: u64,
    #[serde(default = "AppConfig::default_reporting_currency")]
    pub reporting_currency: Currency,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            holdings: Vec::new(),
            transactions: Vec::new(),
            providers: ProvidersConfig::default(),
            cache_ttl_seconds: Self::default_cache_ttl_seconds(),
            adapter_timeout_seconds: Self::default_adapter_timeout_seconds(),
            reporting_currency: Self::default_reporting_currency(),
            data_path: None,
        }
    }
}

impl AppConfig {
    fn default_cache_ttl_seconds() -> u64 {
        300
    }

    fn default_adapter_timeout_seconds() -> u64 {
        10
    }

    fn default_reporting_currency() -> Currency {
        Currency::Eur
    }

    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "prism", "prism")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "prism", "prism")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_seconds)
    }

    /// Rejects settings that would make refreshes meaningless.
    pub fn validate(&self) -> Result<(), PriceError> {
        if self.cache_ttl_seconds == 0 {
            return Err(PriceError::Configuration(
                "cache_ttl_seconds must be greater than zero".to_string(),
            ));
        }
        if self.adapter_timeout_seconds == 0 {
            return Err(PriceError::Configuration(
                "adapter_timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if self.providers.coingecko().max_batch_size == 0 {
            return Err(PriceError::Configuration(
                "providers.coingecko.max_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.providers.yahoo().max_batch_size == 0 {
            return Err(PriceError::Configuration(
                "providers.yahoo.max_batch_size must be greater than zero".to_string(),
            ));
        }
        if let Some(h) = self.holdings.iter().find(|h| h.quantity.is_sign_negative()) {
            return Err(PriceError::Configuration(format!(
                "holding {} has a negative quantity",
                h.ticker
            )));
        }
        Ok(())
    }
}
