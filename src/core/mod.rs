//! Core business logic abstractions

pub mod analytics;
pub mod cache;
pub mod config;
pub mod currency;
pub mod error;
pub mod holding;
pub mod log;
pub mod normalizer;
pub mod orchestrator;
pub mod price;
pub mod service;
pub mod ticker;
pub mod timeseries;

// Re-export main types for cleaner imports
pub use cache::Cache;
pub use currency::{Currency, CurrencyPair, CurrencyRateProvider};
pub use error::PriceError;
pub use price::{PriceProvider, PriceQuote};
pub use ticker::{MarketKind, Ticker};
