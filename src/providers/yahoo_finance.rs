use crate::core::currency::{Currency, CurrencyRateProvider};
use crate::core::error::PriceError;
use crate::core::price::{PriceProvider, ProviderPrice, validate_price};
use crate::core::ticker::{MarketKind, Ticker};
use crate::providers::util::{redact_query, with_retry};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

const PROVIDER_NAME: &str = "yahoo";

fn http_client() -> Result<reqwest::Client, PriceError> {
    reqwest::Client::builder()
        .user_agent("prism/0.1")
        .build()
        .map_err(|e| PriceError::Configuration(format!("HTTP client: {e}")))
}

// YahooFinanceProvider implementation for PriceProvider
pub struct YahooFinanceProvider {
    base_url: String,
    max_batch_size: usize,
    client: reqwest::Client,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str, max_batch_size: usize) -> Result<Self, PriceError> {
        Ok(YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            max_batch_size,
            client: http_client()?,
        })
    }
}

#[derive(Deserialize, Debug)]
struct YahooQuoteResponse {
    #[serde(alias = "quoteResponse")]
    quote_response: QuoteResult,
}

#[derive(Deserialize, Debug)]
struct QuoteResult {
    result: Vec<QuoteItem>,
}

#[derive(Deserialize, Debug)]
struct QuoteItem {
    symbol: String,
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    #[serde(alias = "regularMarketPreviousClose")]
    previous_close: Option<f64>,
    currency: Option<String>,
}

fn to_provider_price(ticker: &Ticker, item: &QuoteItem) -> Result<ProviderPrice, PriceError> {
    let value = item
        .regular_market_price
        .or(item.previous_close)
        .ok_or_else(|| PriceError::rejected(PROVIDER_NAME, ticker.symbol(), "no market price"))?;

    let currency = item
        .currency
        .as_deref()
        .ok_or_else(|| PriceError::rejected(PROVIDER_NAME, ticker.symbol(), "no currency"))?
        .parse::<Currency>()
        .map_err(|e| PriceError::rejected(PROVIDER_NAME, ticker.symbol(), e.to_string()))?;

    validate_price(PROVIDER_NAME, ticker, value, currency)
}

#[async_trait]
impl PriceProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn market_kind(&self) -> MarketKind {
        MarketKind::Equity
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    #[instrument(name = "YahooBatchFetch", skip(self, tickers), fields(count = tickers.len()))]
    async fn fetch_prices(
        &self,
        tickers: &[Ticker],
    ) -> Result<HashMap<Ticker, Result<ProviderPrice, PriceError>>, PriceError> {
        if tickers.is_empty() {
            return Ok(HashMap::new());
        }

        let symbols: Vec<&str> = tickers.iter().map(|t| t.symbol()).collect();
        let url = format!(
            "{}/v7/finance/quote?symbols={}",
            self.base_url,
            symbols.join(",")
        );
        debug!("Requesting equity prices from {}", url);

        let response = with_retry(|| async { self.client.get(&url).send().await }, 2, 500)
            .await
            .map_err(|e| PriceError::unreachable(PROVIDER_NAME, redact_query(&e.to_string())))?;

        debug!(response = ?response, "Received Yahoo response");

        if !response.status().is_success() {
            return Err(PriceError::unreachable(
                PROVIDER_NAME,
                format!("HTTP error: {}", response.status()),
            ));
        }

        let data = response.json::<YahooQuoteResponse>().await.map_err(|e| {
            PriceError::unreachable(PROVIDER_NAME, format!("Failed to parse response: {e}"))
        })?;

        let by_symbol: HashMap<String, QuoteItem> = data
            .quote_response
            .result
            .into_iter()
            .map(|item| (item.symbol.to_uppercase(), item))
            .collect();

        Ok(tickers
            .iter()
            .map(|ticker| {
                let price = match by_symbol.get(ticker.symbol()) {
                    Some(item) => to_provider_price(ticker, item),
                    None => Err(PriceError::rejected(
                        PROVIDER_NAME,
                        ticker.symbol(),
                        "No price data found for symbol",
                    )),
                };
                (ticker.clone(), price)
            })
            .collect())
    }
}

// YahooCurrencyProvider implementation for CurrencyRateProvider
pub struct YahooCurrencyProvider {
    base_url: String,
    client: reqwest::Client,
}

impl YahooCurrencyProvider {
    pub fn new(base_url: &str) -> Result<Self, PriceError> {
        Ok(YahooCurrencyProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct YahooCurrencyResponse {
    chart: CurrencyChartResult,
}

#[derive(Debug, Deserialize)]
struct CurrencyChartResult {
    result: Vec<CurrencyChartItem>,
}

#[derive(Debug, Deserialize)]
struct CurrencyChartItem {
    meta: CurrencyChartMeta,
}

#[derive(Debug, Deserialize)]
struct CurrencyChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: f64,
}

#[async_trait]
impl CurrencyRateProvider for YahooCurrencyProvider {
    async fn get_rate(&self, from: Currency, to: Currency) -> Result<Decimal, PriceError> {
        let symbol = format!("{from}{to}=X");
        let url = format!("{}/v8/finance/chart/{symbol}", self.base_url);
        debug!("Requesting currency rate from {}", url);

        let response = with_retry(|| async { self.client.get(&url).send().await }, 2, 500)
            .await
            .map_err(|e| {
                PriceError::unreachable(
                    PROVIDER_NAME,
                    format!("Request error: {} for currency pair: {symbol}", redact_query(&e.to_string())),
                )
            })?;

        if !response.status().is_success() {
            return Err(PriceError::unreachable(
                PROVIDER_NAME,
                format!(
                    "HTTP error: {} for currency pair: {symbol}",
                    response.status()
                ),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| PriceError::unreachable(PROVIDER_NAME, e.to_string()))?;

        let data: YahooCurrencyResponse = serde_json::from_str(&text).map_err(|e| {
            PriceError::unreachable(
                PROVIDER_NAME,
                format!("Failed to parse JSON response for {symbol}: {e}"),
            )
        })?;

        let item = data.chart.result.into_iter().next().ok_or_else(|| {
            PriceError::rejected(PROVIDER_NAME, &symbol, "No rate data found for currency pair")
        })?;

        let rate = item.meta.regular_market_price;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(PriceError::rejected(
                PROVIDER_NAME,
                &symbol,
                format!("invalid rate {rate}"),
            ));
        }
        Decimal::from_f64(rate)
            .ok_or_else(|| PriceError::rejected(PROVIDER_NAME, &symbol, "rate out of range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // Tests for YahooFinanceProvider (PriceProvider)
    pub async fn create_quote_server(symbols: &str, status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .and(query_param("symbols", symbols))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;

        mock_server
    }

    #[tokio::test]
    async fn test_successful_batch_fetch() {
        let mock_response = r#"{
            "quoteResponse": {
                "result": [
                    {"symbol": "AAPL", "regularMarketPrice": 180.5, "currency": "USD"},
                    {"symbol": "MC.PA", "regularMarketPrice": 650.25, "currency": "EUR"}
                ],
                "error": null
            }
        }"#;

        let mock_server = create_quote_server("AAPL,MC.PA", 200, mock_response).await;
        let provider = YahooFinanceProvider::new(&mock_server.uri(), 50).unwrap();

        let prices = provider
            .fetch_prices(&[Ticker::equity("aapl"), Ticker::equity("mc.pa")])
            .await
            .unwrap();

        assert_eq!(
            prices[&Ticker::equity("AAPL")].as_ref().unwrap(),
            &ProviderPrice {
                value: dec!(180.5),
                currency: Currency::Usd
            }
        );
        assert_eq!(
            prices[&Ticker::equity("MC.PA")].as_ref().unwrap(),
            &ProviderPrice {
                value: dec!(650.25),
                currency: Currency::Eur
            }
        );
    }

    #[tokio::test]
    async fn test_previous_close_fallback_and_unsupported_currency() {
        let mock_response = r#"{
            "quoteResponse": {
                "result": [
                    {"symbol": "SAP.DE", "regularMarketPreviousClose": 190.0, "currency": "EUR"},
                    {"symbol": "BP.L", "regularMarketPrice": 480.0, "currency": "GBp"}
                ]
            }
        }"#;

        let mock_server = create_quote_server("SAP.DE,BP.L,NOPE", 200, mock_response).await;
        let provider = YahooFinanceProvider::new(&mock_server.uri(), 50).unwrap();

        let prices = provider
            .fetch_prices(&[
                Ticker::equity("SAP.DE"),
                Ticker::equity("BP.L"),
                Ticker::equity("NOPE"),
            ])
            .await
            .unwrap();

        assert_eq!(
            prices[&Ticker::equity("SAP.DE")].as_ref().unwrap().value,
            dec!(190)
        );
        assert!(matches!(
            prices[&Ticker::equity("BP.L")],
            Err(PriceError::AdapterRejected { .. })
        ));
        assert_eq!(
            prices[&Ticker::equity("NOPE")].as_ref().unwrap_err().to_string(),
            "yahoo rejected NOPE: No price data found for symbol"
        );
    }

    #[tokio::test]
    async fn test_server_error_is_unreachable() {
        let mock_server = create_quote_server("AAPL", 503, "").await;
        let provider = YahooFinanceProvider::new(&mock_server.uri(), 50).unwrap();

        let result = provider.fetch_prices(&[Ticker::equity("AAPL")]).await;
        assert_eq!(
            result.unwrap_err(),
            PriceError::unreachable("yahoo", "HTTP error: 503 Service Unavailable")
        );
    }

    // Tests for YahooCurrencyProvider (CurrencyRateProvider)
    #[tokio::test]
    async fn test_successful_rate_fetch() {
        let mock_server = MockServer::start().await;
        let provider = YahooCurrencyProvider::new(&mock_server.uri()).unwrap();

        let mock_response = r#"{
            "chart": {
                "result": [
                    {
                        "meta": {
                            "regularMarketPrice": 0.875
                        }
                    }
                ]
            }
        }"#;

        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/USDEUR=X"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        let rate = provider
            .get_rate(Currency::Usd, Currency::Eur)
            .await
            .expect("Failed to get rate");
        assert_eq!(rate, dec!(0.875));
    }

    #[tokio::test]
    async fn test_no_currency_rate_found() {
        let mock_server = MockServer::start().await;
        let provider = YahooCurrencyProvider::new(&mock_server.uri()).unwrap();

        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/USDEUR=X"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"chart": {"result": []}}"#),
            )
            .mount(&mock_server)
            .await;

        let result = provider.get_rate(Currency::Usd, Currency::Eur).await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "yahoo rejected USDEUR=X: No rate data found for currency pair"
        );
    }

    #[tokio::test]
    async fn test_yahoo_currency_api_error_response() {
        let mock_server = MockServer::start().await;
        let provider = YahooCurrencyProvider::new(&mock_server.uri()).unwrap();

        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/USDEUR=X"))
            .respond_with(ResponseTemplate::new(500)) // Simulate a server error
            .mount(&mock_server)
            .await;

        let result = provider.get_rate(Currency::Usd, Currency::Eur).await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "yahoo unreachable: HTTP error: 500 Internal Server Error for currency pair: USDEUR=X"
        );
    }

    #[tokio::test]
    async fn test_yahoo_currency_api_malformed_response() {
        let mock_server = MockServer::start().await;
        let provider = YahooCurrencyProvider::new(&mock_server.uri()).unwrap();

        let mock_response = r#"{
            "chart": {
                "results": []
            }
        }"#; // "results" instead of "result"

        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/USDEUR=X"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        let result = provider.get_rate(Currency::Usd, Currency::Eur).await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse JSON response for USDEUR=X")
        );
    }
}
