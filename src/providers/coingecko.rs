use crate::core::currency::Currency;
use crate::core::error::PriceError;
use crate::core::price::{PriceProvider, ProviderPrice, validate_price};
use crate::core::ticker::{MarketKind, Ticker};
use crate::providers::util::{redact_query, with_retry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, instrument};

const PROVIDER_NAME: &str = "coingecko";

/// Common ticker symbols and their CoinGecko coin ids. Unknown tickers fall
/// back to their lowercase symbol.
const COIN_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("USDT", "tether"),
    ("BNB", "binancecoin"),
    ("SOL", "solana"),
    ("XRP", "ripple"),
    ("USDC", "usd-coin"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
    ("TRX", "tron"),
    ("AVAX", "avalanche-2"),
    ("DOT", "polkadot"),
    ("MATIC", "matic-network"),
    ("LINK", "chainlink"),
    ("UNI", "uniswap"),
    ("LTC", "litecoin"),
    ("ATOM", "cosmos"),
    ("XLM", "stellar"),
    ("ALGO", "algorand"),
    ("VET", "vechain"),
    ("ARB", "arbitrum"),
];

pub struct CoinGeckoProvider {
    base_url: String,
    quote_currency: Currency,
    max_batch_size: usize,
    custom_ids: RwLock<HashMap<String, String>>,
    client: reqwest::Client,
}

impl CoinGeckoProvider {
    pub fn new(
        base_url: &str,
        quote_currency: Currency,
        max_batch_size: usize,
    ) -> Result<Self, PriceError> {
        let client = reqwest::Client::builder()
            .user_agent("prism/0.1")
            .build()
            .map_err(|e| PriceError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            quote_currency,
            max_batch_size,
            custom_ids: RwLock::new(HashMap::new()),
            client,
        })
    }

    /// Maps an additional ticker to its CoinGecko coin id.
    pub fn add_mapping(&self, symbol: &str, coin_id: &str) {
        if let Ok(mut ids) = self.custom_ids.write() {
            ids.insert(symbol.trim().to_uppercase(), coin_id.to_string());
        }
    }

    pub fn coin_id(&self, ticker: &Ticker) -> String {
        let symbol = ticker.symbol();
        if let Some(id) = self
            .custom_ids
            .read()
            .ok()
            .and_then(|ids| ids.get(symbol).cloned())
        {
            return id;
        }
        COIN_IDS
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, id)| id.to_string())
            .unwrap_or_else(|| symbol.to_lowercase())
    }
}

// Response shape: {"bitcoin": {"eur": 25000.0}, "ethereum": {"eur": 1800.0}}
type SimplePriceResponse = HashMap<String, HashMap<String, Option<f64>>>;

#[async_trait]
impl PriceProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn market_kind(&self) -> MarketKind {
        MarketKind::Crypto
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    #[instrument(name = "CoinGeckoBatchFetch", skip(self, tickers), fields(count = tickers.len()))]
    async fn fetch_prices(
        &self,
        tickers: &[Ticker],
    ) -> Result<HashMap<Ticker, Result<ProviderPrice, PriceError>>, PriceError> {
        if tickers.is_empty() {
            return Ok(HashMap::new());
        }

        let ids: Vec<(Ticker, String)> = tickers
            .iter()
            .map(|t| (t.clone(), self.coin_id(t)))
            .collect();
        let mut id_list: Vec<&str> = ids.iter().map(|(_, id)| id.as_str()).collect();
        id_list.sort_unstable();
        id_list.dedup();

        let vs_currency = self.quote_currency.code().to_lowercase();
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies={}",
            self.base_url,
            id_list.join(","),
            vs_currency
        );
        debug!("Requesting crypto prices from {}", url);

        let response = with_retry(|| async { self.client.get(&url).send().await }, 2, 500)
            .await
            .map_err(|e| PriceError::unreachable(PROVIDER_NAME, redact_query(&e.to_string())))?;

        if !response.status().is_success() {
            return Err(PriceError::unreachable(
                PROVIDER_NAME,
                format!("HTTP error: {}", response.status()),
            ));
        }

        let data: SimplePriceResponse = response.json().await.map_err(|e| {
            PriceError::unreachable(PROVIDER_NAME, format!("Failed to parse response: {e}"))
        })?;

        let results = ids
            .into_iter()
            .map(|(ticker, id)| {
                let price = match data.get(&id).and_then(|p| p.get(&vs_currency).copied().flatten())
                {
                    Some(value) => {
                        validate_price(PROVIDER_NAME, &ticker, value, self.quote_currency)
                    }
                    None => Err(PriceError::rejected(
                        PROVIDER_NAME,
                        ticker.symbol(),
                        format!("no {vs_currency} price for coin id '{id}'"),
                    )),
                };
                (ticker, price)
            })
            .collect();

        Ok(results)
    }
}
