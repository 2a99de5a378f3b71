//! Cumulative balance and value series over time.

use crate::core::analytics::HoldingValuation;
use crate::core::holding::Transaction;
use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    /// First day of the bucket containing `date`. Weeks start on Monday.
    pub fn bucket(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Daily => date,
            Granularity::Weekly => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            Granularity::Monthly => date.with_day(1).unwrap_or(date),
        }
    }
}

impl Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Granularity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "day" => Ok(Granularity::Daily),
            "weekly" | "week" => Ok(Granularity::Weekly),
            "monthly" | "month" => Ok(Granularity::Monthly),
            _ => Err(anyhow::anyhow!("Invalid granularity: {}", s)),
        }
    }
}

/// What a series accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeriesKind {
    /// Running sum of personal transactions.
    #[default]
    Balance,
    /// Running current value of holdings by acquisition date.
    PortfolioValue,
    /// Running cost basis of holdings by acquisition date.
    Invested,
}

impl FromStr for SeriesKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "balance" => Ok(SeriesKind::Balance),
            "value" | "portfolio-value" | "portfolio_value" => Ok(SeriesKind::PortfolioValue),
            "invested" => Ok(SeriesKind::Invested),
            _ => Err(anyhow::anyhow!("Invalid series kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: Decimal,
}

/// Sums amounts per bucket, then runs a prefix sum in date order.
///
/// Each bucket yields exactly one point, however many amounts fall in it.
pub fn cumulative_series<I>(amounts: I, granularity: Granularity) -> Vec<SeriesPoint>
where
    I: IntoIterator<Item = (NaiveDate, Decimal)>,
{
    let mut buckets: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for (date, amount) in amounts {
        *buckets.entry(granularity.bucket(date)).or_default() += amount;
    }

    let mut running = Decimal::ZERO;
    buckets
        .into_iter()
        .map(|(date, amount)| {
            running += amount;
            SeriesPoint {
                date,
                value: running,
            }
        })
        .collect()
}

pub fn balance_series(transactions: &[Transaction], granularity: Granularity) -> Vec<SeriesPoint> {
    cumulative_series(
        transactions.iter().map(|tx| (tx.date, tx.amount)),
        granularity,
    )
}

/// Current value of priced holdings, accumulated by acquisition date.
/// Holdings without an acquisition date have no place on the axis and are
/// left out.
pub fn portfolio_value_series(
    valuations: &[HoldingValuation],
    granularity: Granularity,
) -> Vec<SeriesPoint> {
    cumulative_series(
        dated(valuations, |v| v.current_value),
        granularity,
    )
}

/// Cost basis accumulated by acquisition date.
pub fn invested_series(valuations: &[HoldingValuation], granularity: Granularity) -> Vec<SeriesPoint> {
    cumulative_series(dated(valuations, |v| v.cost_basis), granularity)
}

fn dated<'a>(
    valuations: &'a [HoldingValuation],
    amount: impl Fn(&HoldingValuation) -> Option<Decimal> + 'a,
) -> impl Iterator<Item = (NaiveDate, Decimal)> + 'a {
    valuations.iter().filter_map(move |v| {
        let date = v.holding.acquired_at;
        if date.is_none() {
            debug!("Skipping {} in series: no acquisition date", v.ticker);
        }
        Some((date?, amount(v)?))
    })
}
