pub mod coingecko;
pub mod util;
pub mod yahoo_finance;

pub use coingecko::CoinGeckoProvider;
pub use yahoo_finance::{YahooCurrencyProvider, YahooFinanceProvider};
