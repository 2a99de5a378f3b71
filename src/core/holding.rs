//! Records owned by the persistence collaborator

use crate::core::currency::Currency;
use crate::core::ticker::{MarketKind, Ticker};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One lot of an asset. Several lots of the same ticker are separate records.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Holding {
    pub ticker: String,
    pub kind: MarketKind,
    pub quantity: Decimal,
    pub cost_basis: Decimal,
    pub cost_currency: Currency,
    pub acquired_at: Option<NaiveDate>,
    pub category: Option<String>,
}

impl Holding {
    pub fn ticker(&self) -> Ticker {
        Ticker::new(&self.ticker, self.kind)
    }

    /// Category used for distributions: explicit category or the market kind.
    pub fn category(&self) -> String {
        self.category
            .clone()
            .unwrap_or_else(|| self.kind.label().to_string())
    }
}

/// A personal income (positive) or expense (negative) entry.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Transaction {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub category: Option<String>,
}

impl Transaction {
    pub fn category(&self) -> &str {
        self.category.as_deref().unwrap_or("Uncategorized")
    }
}
