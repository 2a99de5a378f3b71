//! Ticker identity and market kinds

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    Crypto,
    Equity,
}

impl MarketKind {
    /// Category label used when a holding has no explicit category.
    pub fn label(&self) -> &'static str {
        match self {
            MarketKind::Crypto => "Crypto",
            MarketKind::Equity => "Equity",
        }
    }
}

impl Display for MarketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                MarketKind::Crypto => "crypto",
                MarketKind::Equity => "equity",
            }
        )
    }
}

impl FromStr for MarketKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "crypto" => Ok(MarketKind::Crypto),
            "equity" | "stock" => Ok(MarketKind::Equity),
            _ => Err(anyhow::anyhow!("Invalid market kind: {}", s)),
        }
    }
}

/// A tradable symbol tagged with its market kind.
///
/// Symbols are trimmed and upper-cased on construction so that `btc`,
/// ` BTC ` and `BTC` address the same cache entry. Exchange suffixes such as
/// `.PA` are kept as part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Ticker {
    symbol: String,
    kind: MarketKind,
}

impl Ticker {
    pub fn new(symbol: &str, kind: MarketKind) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            kind,
        }
    }

    pub fn crypto(symbol: &str) -> Self {
        Self::new(symbol, MarketKind::Crypto)
    }

    pub fn equity(symbol: &str) -> Self {
        Self::new(symbol, MarketKind::Equity)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn kind(&self) -> MarketKind {
        self.kind
    }

    /// Key under which quotes for this ticker are cached.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.kind, self.symbol)
    }
}

impl Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol)
    }
}
