//! Provides functions for performing financial calculations on portfolios.
//!
//! Everything here is synchronous and pure: prices and exchange rates are
//! resolved beforehand and passed in, and missing data is reported through
//! flags on the results instead of errors.
use crate::core::currency::{Currency, CurrencyPair, RateTable};
use crate::core::error::PriceError;
use crate::core::holding::{Holding, Transaction};
use crate::core::price::PriceQuote;
use crate::core::ticker::Ticker;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_finprim::rate::cagr;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Why a holding could not be valued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValuationError {
    #[error("No price available for {0}")]
    NoPrice(Ticker),
    #[error("Amounts for {0} are out of range")]
    Overflow(Ticker),
    #[error(transparent)]
    Rate(#[from] PriceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GainLoss {
    pub absolute: Decimal,
    /// Percent of cost basis; 0 when the cost basis is 0.
    pub percent: Decimal,
}

/// Valuation of a single lot in the reporting currency.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingValuation {
    pub holding: Holding,
    pub ticker: Ticker,
    pub category: String,
    /// Unit price in the reporting currency.
    pub price: Option<Decimal>,
    pub current_value: Option<Decimal>,
    /// Total cost in the reporting currency.
    pub cost_basis: Option<Decimal>,
    pub gain_loss: Option<GainLoss>,
    /// The price or a rate used came from an expired cache entry.
    pub stale: bool,
    pub error: Option<ValuationError>,
}

impl HoldingValuation {
    pub fn is_priced(&self) -> bool {
        self.current_value.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryShare {
    pub category: String,
    pub value: Decimal,
    pub percent: Decimal,
}

/// Value per category over priced holdings only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CategoryDistribution {
    pub shares: Vec<CategoryShare>,
    /// Cost basis of holdings that could not be valued.
    pub unpriced_cost: Decimal,
    /// `unpriced_cost` as a percent of the total cost basis.
    pub unpriced_share: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValuationSnapshot {
    pub reporting_currency: Currency,
    pub holdings: Vec<HoldingValuation>,
    pub total_value: Decimal,
    /// Value of the priced holdings whose cost basis is known.
    pub costed_value: Decimal,
    /// Cost basis matching `costed_value`, so gain/loss compares like with like.
    pub total_cost_basis: Decimal,
    pub gain_loss: GainLoss,
    pub by_category: CategoryDistribution,
    pub diversification_score: Decimal,
    pub unpriced: Vec<Ticker>,
    pub stale_prices: Vec<Ticker>,
    pub stale_rates: Vec<CurrencyPair>,
}

impl ValuationSnapshot {
    /// True when any figure rests on stale or missing data.
    pub fn is_degraded(&self) -> bool {
        !self.unpriced.is_empty()
            || !self.stale_prices.is_empty()
            || !self.stale_rates.is_empty()
            || self.holdings.iter().any(|h| h.error.is_some())
    }
}

/// Market value of `holding` in `reporting`.
pub fn current_value(
    holding: &Holding,
    quote: Option<&PriceQuote>,
    rates: &RateTable,
    reporting: Currency,
) -> Result<Decimal, ValuationError> {
    let quote = quote.ok_or_else(|| ValuationError::NoPrice(holding.ticker()))?;
    let price = rates.normalize(quote.value, quote.currency, reporting)?;
    holding
        .quantity
        .checked_mul(price)
        .ok_or_else(|| ValuationError::Overflow(holding.ticker()))
}

/// Total cost of `holding` in `reporting`.
pub fn cost_basis(
    holding: &Holding,
    rates: &RateTable,
    reporting: Currency,
) -> Result<Decimal, ValuationError> {
    let cost = holding
        .quantity
        .checked_mul(holding.cost_basis)
        .ok_or_else(|| ValuationError::Overflow(holding.ticker()))?;
    Ok(rates.normalize(cost, holding.cost_currency, reporting)?)
}

/// `None` when the figures are out of range.
pub fn gain_loss(current_value: Decimal, cost_basis: Decimal) -> Option<GainLoss> {
    let absolute = current_value.checked_sub(cost_basis)?;
    let percent = if cost_basis.is_zero() {
        Decimal::ZERO
    } else {
        absolute.checked_div(cost_basis)?.checked_mul(HUNDRED)?
    };
    Some(GainLoss { absolute, percent })
}

/// Values one lot. Never fails: problems are recorded on the result.
///
/// Market value and cost basis resolve independently, so a missing cost
/// rate leaves the lot priced and only its gain/loss unknown.
pub fn value_holding(
    holding: &Holding,
    prices: &BTreeMap<Ticker, PriceQuote>,
    rates: &RateTable,
    reporting: Currency,
) -> HoldingValuation {
    let ticker = holding.ticker();
    let quote = prices.get(&ticker);
    let mut valuation = HoldingValuation {
        holding: holding.clone(),
        ticker: ticker.clone(),
        category: holding.category(),
        price: None,
        current_value: None,
        cost_basis: None,
        gain_loss: None,
        stale: quote.is_some_and(|q| q.stale),
        error: None,
    };

    match current_value(holding, quote, rates, reporting) {
        Ok(value) => {
            valuation.current_value = Some(value);
            if let Some(quote) = quote {
                valuation.price = rates.normalize(quote.value, quote.currency, reporting).ok();
                if quote.currency != reporting {
                    valuation.stale |=
                        rates.is_stale(&CurrencyPair::new(quote.currency, reporting));
                }
            }
        }
        Err(e) => {
            debug!("Holding {} is unpriced: {e}", ticker);
            valuation.error = Some(e);
        }
    }

    match cost_basis(holding, rates, reporting) {
        Ok(cost) => {
            valuation.cost_basis = Some(cost);
            if holding.cost_currency != reporting {
                valuation.stale |=
                    rates.is_stale(&CurrencyPair::new(holding.cost_currency, reporting));
            }
        }
        Err(e) => {
            debug!("Cost basis of {} unavailable: {e}", ticker);
            valuation.error.get_or_insert(e);
        }
    }

    if let (Some(value), Some(cost)) = (valuation.current_value, valuation.cost_basis) {
        valuation.gain_loss = gain_loss(value, cost);
        if valuation.gain_loss.is_none() {
            valuation.error.get_or_insert(ValuationError::Overflow(ticker));
        }
    }
    valuation
}

/// Builds the full snapshot from holdings, the refreshed prices and the
/// resolved rates. Recomputed as a whole on every call.
pub fn valuation_snapshot(
    holdings: &[Holding],
    prices: &BTreeMap<Ticker, PriceQuote>,
    rates: &RateTable,
    reporting: Currency,
) -> ValuationSnapshot {
    let mut valuations: Vec<HoldingValuation> = holdings
        .iter()
        .map(|h| value_holding(h, prices, rates, reporting))
        .collect();

    let mut total_value = Decimal::ZERO;
    let mut costed_value = Decimal::ZERO;
    let mut total_cost_basis = Decimal::ZERO;
    let mut unpriced = BTreeSet::new();
    let mut stale_prices = BTreeSet::new();
    for valuation in &mut valuations {
        if let Some(value) = valuation.current_value {
            match total_value.checked_add(value) {
                Some(sum) => total_value = sum,
                None => mark_overflow(valuation),
            }
        }
        if let (Some(value), Some(cost)) = (valuation.current_value, valuation.cost_basis) {
            match (costed_value.checked_add(value), total_cost_basis.checked_add(cost)) {
                (Some(value_sum), Some(cost_sum)) => {
                    costed_value = value_sum;
                    total_cost_basis = cost_sum;
                }
                _ => {
                    debug!("Leaving {} out of the gain/loss totals", valuation.ticker);
                    let ticker = valuation.ticker.clone();
                    valuation.gain_loss = None;
                    valuation.error.get_or_insert(ValuationError::Overflow(ticker));
                }
            }
        }
        if valuation.current_value.is_none() {
            unpriced.insert(valuation.ticker.clone());
        }
        if prices.get(&valuation.ticker).is_some_and(|q| q.stale) {
            stale_prices.insert(valuation.ticker.clone());
        }
    }

    let by_category = category_distribution(&valuations);
    let diversification_score = diversification_score(&by_category.shares);

    ValuationSnapshot {
        reporting_currency: reporting,
        gain_loss: gain_loss(costed_value, total_cost_basis).unwrap_or_default(),
        holdings: valuations,
        total_value,
        costed_value,
        total_cost_basis,
        by_category,
        diversification_score,
        unpriced: unpriced.into_iter().collect(),
        stale_prices: stale_prices.into_iter().collect(),
        stale_rates: rates.stale_pairs().copied().collect(),
    }
}

/// Drops a lot whose value no longer fits in the portfolio total.
fn mark_overflow(valuation: &mut HoldingValuation) {
    debug!("Value of {} is out of range for the totals", valuation.ticker);
    valuation.current_value = None;
    valuation.gain_loss = None;
    valuation.error = Some(ValuationError::Overflow(valuation.ticker.clone()));
}

/// Groups priced holdings by category. Percentages are over priced value
/// only and sorted by value, largest first.
///
/// The unpriced share only counts lots whose cost converted into the
/// reporting currency.
pub fn category_distribution(valuations: &[HoldingValuation]) -> CategoryDistribution {
    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut total_value = Decimal::ZERO;
    let mut unpriced_cost = Decimal::ZERO;
    let mut total_cost = Decimal::ZERO;

    for valuation in valuations {
        if let Some(cost) = valuation.cost_basis {
            total_cost = total_cost.saturating_add(cost);
        }
        match valuation.current_value {
            Some(value) => {
                let category = totals.entry(valuation.category.clone()).or_default();
                *category = category.saturating_add(value);
                total_value = total_value.saturating_add(value);
            }
            None => {
                if let Some(cost) = valuation.cost_basis {
                    unpriced_cost = unpriced_cost.saturating_add(cost);
                }
            }
        }
    }

    let mut shares: Vec<CategoryShare> = totals
        .into_iter()
        .map(|(category, value)| CategoryShare {
            category,
            value,
            percent: percent_of(value, total_value),
        })
        .collect();
    shares.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.category.cmp(&b.category)));

    CategoryDistribution {
        shares,
        unpriced_cost,
        unpriced_share: percent_of(unpriced_cost, total_cost),
    }
}

/// Inverse Herfindahl-Hirschman score in [0, 100].
///
/// 0 means everything sits in one category (or nothing is priced); 100 means
/// value is spread evenly over the categories present.
pub fn diversification_score(shares: &[CategoryShare]) -> Decimal {
    let total = shares
        .iter()
        .try_fold(Decimal::ZERO, |sum, s| sum.checked_add(s.value));
    let Some(total) = total.filter(|t| *t > Decimal::ZERO) else {
        return Decimal::ZERO;
    };
    if shares.len() < 2 {
        return Decimal::ZERO;
    }

    let hhi = shares.iter().try_fold(Decimal::ZERO, |hhi, s| {
        let weight = s.value.checked_div(total)?;
        hhi.checked_add(weight.checked_mul(weight)?)
    });
    let Some(hhi) = hhi else {
        return Decimal::ZERO;
    };
    let even_hhi = Decimal::ONE / Decimal::from(shares.len());
    let score = (Decimal::ONE - hhi) / (Decimal::ONE - even_hhi) * HUNDRED;
    score.clamp(Decimal::ZERO, HUNDRED).round_dp(2)
}

/// Profit and loss of all lots of one ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerProfitLoss {
    pub ticker: Ticker,
    pub quantity: Decimal,
    pub total_cost: Decimal,
    pub current_value: Decimal,
    pub profit_loss: Decimal,
    pub profit_loss_percent: Decimal,
}

/// Aggregates valued lots per ticker, largest absolute P/L first.
/// Unpriced lots are left out.
pub fn profit_loss_by_ticker(valuations: &[HoldingValuation]) -> Vec<TickerProfitLoss> {
    let mut by_ticker: BTreeMap<Ticker, (Decimal, Decimal, Decimal)> = BTreeMap::new();
    for valuation in valuations {
        let (Some(value), Some(cost)) = (valuation.current_value, valuation.cost_basis) else {
            continue;
        };
        let entry = by_ticker.entry(valuation.ticker.clone()).or_default();
        let merged = (
            entry.0.checked_add(valuation.holding.quantity),
            entry.1.checked_add(cost),
            entry.2.checked_add(value),
        );
        match merged {
            (Some(quantity), Some(cost), Some(value)) => *entry = (quantity, cost, value),
            _ => debug!("Lot of {} is out of range, left out of P/L", valuation.ticker),
        }
    }

    let mut results: Vec<TickerProfitLoss> = by_ticker
        .into_iter()
        .filter_map(|(ticker, (quantity, total_cost, current_value))| {
            let GainLoss { absolute, percent } = gain_loss(current_value, total_cost)?;
            Some(TickerProfitLoss {
                ticker,
                quantity,
                total_cost,
                current_value,
                profit_loss: absolute,
                profit_loss_percent: percent,
            })
        })
        .collect();
    results.sort_by(|a, b| b.profit_loss.abs().cmp(&a.profit_loss.abs()));
    results
}

/// Return on investment in percent. 0 for a non-positive investment or
/// figures out of range.
pub fn roi(initial: Decimal, current: Decimal) -> Decimal {
    if initial <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    gain_loss(current, initial).map_or(Decimal::ZERO, |g| g.percent)
}

/// Compound annual growth rate in percent over `days_held`.
pub fn annualized_return(initial: Decimal, current: Decimal, days_held: i64) -> Decimal {
    if initial <= Decimal::ZERO || days_held <= 0 {
        return Decimal::ZERO;
    }
    if current <= Decimal::ZERO {
        return -HUNDRED;
    }
    let years = Decimal::from(days_held) / Decimal::new(36525, 2);
    let rate = cagr(initial, current, years);
    debug!("cagr: {initial}, {current}, {years} = {rate}");
    rate * HUNDRED
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionFlow {
    Expense,
    Income,
}

impl TransactionFlow {
    fn includes(&self, amount: Decimal) -> bool {
        match self {
            TransactionFlow::Expense => amount < Decimal::ZERO,
            TransactionFlow::Income => amount >= Decimal::ZERO,
        }
    }
}

/// Inclusive date range; an open end is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryAmount {
    pub category: String,
    pub amount: Decimal,
    pub percent: Decimal,
}

/// Distribution of expenses or income by category within `range`, using
/// absolute amounts, largest first.
pub fn transaction_category_distribution(
    transactions: &[Transaction],
    range: DateRange,
    flow: TransactionFlow,
) -> Vec<CategoryAmount> {
    let mut totals: BTreeMap<&str, Decimal> = BTreeMap::new();
    for tx in transactions
        .iter()
        .filter(|tx| range.contains(tx.date) && flow.includes(tx.amount))
    {
        *totals.entry(tx.category()).or_default() += tx.amount.abs();
    }

    let total: Decimal = totals.values().copied().sum();
    let mut distribution: Vec<CategoryAmount> = totals
        .into_iter()
        .map(|(category, amount)| CategoryAmount {
            category: category.to_string(),
            amount,
            percent: percent_of(amount, total),
        })
        .collect();
    distribution.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.category.cmp(&b.category)));
    distribution
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonthlyAverage {
    pub income: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
    /// Months actually averaged over.
    pub months: Decimal,
}

/// Average monthly income and expenses, over at most `months` months.
///
/// The history's span counts as at least one month, taken at 30 days per
/// month.
pub fn monthly_average(transactions: &[Transaction], months: u32) -> MonthlyAverage {
    let Some((first, last)) = transaction_date_range(transactions) else {
        return MonthlyAverage::default();
    };
    if months == 0 {
        return MonthlyAverage::default();
    }

    let span = Decimal::from((last - first).num_days()) / Decimal::from(30);
    let months = span.max(Decimal::ONE).min(Decimal::from(months));

    let (income, expenses) =
        transactions
            .iter()
            .fold((Decimal::ZERO, Decimal::ZERO), |(inc, exp), tx| {
                if tx.amount > Decimal::ZERO {
                    (inc + tx.amount, exp)
                } else {
                    (inc, exp + tx.amount.abs())
                }
            });

    let income = income / months;
    let expenses = expenses / months;
    MonthlyAverage {
        income,
        expenses,
        net: income - expenses,
        months,
    }
}

/// Share of income saved, in percent. 0 without income.
pub fn savings_rate(income: Decimal, expenses: Decimal) -> Decimal {
    if income <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (income - expenses) / income * HUNDRED
}

/// Earliest and latest transaction dates.
pub fn transaction_date_range(transactions: &[Transaction]) -> Option<(NaiveDate, NaiveDate)> {
    let first = transactions.iter().map(|tx| tx.date).min()?;
    let last = transactions.iter().map(|tx| tx.date).max()?;
    Some((first, last))
}

fn percent_of(part: Decimal, total: Decimal) -> Decimal {
    part.checked_div(total)
        .and_then(|ratio| ratio.checked_mul(HUNDRED))
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::ExchangeRate;
    use crate::core::price::QuoteSource;
    use crate::core::ticker::MarketKind;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn holding(ticker: &str, kind: MarketKind, qty: Decimal, cost: Decimal, ccy: Currency) -> Holding {
        Holding {
            ticker: ticker.to_string(),
            kind,
            quantity: qty,
            cost_basis: cost,
            cost_currency: ccy,
            acquired_at: None,
            category: None,
        }
    }

    fn quote(ticker: Ticker, value: Decimal, currency: Currency) -> PriceQuote {
        PriceQuote {
            ticker,
            value,
            currency,
            fetched_at: Utc::now(),
            source: QuoteSource::Provider("test".to_string()),
            stale: false,
        }
    }

    fn usd_eur_table(rate: Decimal) -> RateTable {
        let mut table = RateTable::new();
        table.insert(
            ExchangeRate {
                pair: CurrencyPair::new(Currency::Usd, Currency::Eur),
                rate,
                fetched_at: Utc::now(),
            },
            false,
        );
        table
    }

    fn share(category: &str, value: Decimal) -> CategoryShare {
        CategoryShare {
            category: category.to_string(),
            value,
            percent: Decimal::ZERO,
        }
    }

    fn tx(date: &str, amount: Decimal, category: Option<&str>) -> Transaction {
        Transaction {
            date: date.parse().unwrap(),
            amount,
            category: category.map(str::to_string),
        }
    }

    #[test]
    fn test_btc_gain() {
        let btc = holding("BTC", MarketKind::Crypto, dec!(1), dec!(20000), Currency::Eur);
        let prices = BTreeMap::from([(
            Ticker::crypto("BTC"),
            quote(Ticker::crypto("BTC"), dec!(25000), Currency::Eur),
        )]);

        let snapshot = valuation_snapshot(&[btc], &prices, &RateTable::new(), Currency::Eur);

        assert_eq!(snapshot.total_value, dec!(25000));
        assert_eq!(snapshot.total_cost_basis, dec!(20000));
        assert_eq!(snapshot.gain_loss.absolute, dec!(5000));
        assert_eq!(snapshot.gain_loss.percent, dec!(25));
        assert!(!snapshot.is_degraded());
    }

    #[test]
    fn test_foreign_currency_value() {
        let aapl = holding("AAPL", MarketKind::Equity, dec!(10), dec!(150), Currency::Usd);
        let prices = BTreeMap::from([(
            Ticker::equity("AAPL"),
            quote(Ticker::equity("AAPL"), dec!(180), Currency::Usd),
        )]);
        let rates = usd_eur_table(dec!(0.92));

        let valuation = value_holding(&aapl, &prices, &rates, Currency::Eur);
        assert_eq!(valuation.current_value, Some(dec!(1656)));
        assert_eq!(valuation.price, Some(dec!(165.6)));
        assert_eq!(valuation.cost_basis, Some(dec!(1380)));
        assert_eq!(valuation.gain_loss.unwrap().absolute, dec!(276));
    }

    #[test]
    fn test_missing_rate_only_affects_that_holding() {
        let holdings = [
            holding("AAPL", MarketKind::Equity, dec!(10), dec!(150), Currency::Usd),
            holding("BTC", MarketKind::Crypto, dec!(1), dec!(20000), Currency::Eur),
        ];
        let prices = BTreeMap::from([
            (
                Ticker::equity("AAPL"),
                quote(Ticker::equity("AAPL"), dec!(180), Currency::Usd),
            ),
            (
                Ticker::crypto("BTC"),
                quote(Ticker::crypto("BTC"), dec!(25000), Currency::Eur),
            ),
        ]);

        let snapshot = valuation_snapshot(&holdings, &prices, &RateTable::new(), Currency::Eur);

        assert_eq!(snapshot.total_value, dec!(25000));
        assert_eq!(snapshot.unpriced, vec![Ticker::equity("AAPL")]);
        assert!(matches!(
            snapshot.holdings[0].error,
            Some(ValuationError::Rate(PriceError::RateUnavailable { .. }))
        ));
        assert!(snapshot.is_degraded());
    }

    #[test]
    fn test_missing_cost_rate_keeps_holding_priced() {
        let btc = holding("BTC", MarketKind::Crypto, dec!(1), dec!(20000), Currency::Usd);
        let eth = holding("ETH", MarketKind::Crypto, dec!(2), dec!(1000), Currency::Eur);
        let prices = BTreeMap::from([
            (
                Ticker::crypto("BTC"),
                quote(Ticker::crypto("BTC"), dec!(25000), Currency::Eur),
            ),
            (
                Ticker::crypto("ETH"),
                quote(Ticker::crypto("ETH"), dec!(1500), Currency::Eur),
            ),
        ]);

        let snapshot =
            valuation_snapshot(&[btc, eth], &prices, &RateTable::new(), Currency::Eur);

        assert_eq!(snapshot.total_value, dec!(28000));
        assert!(snapshot.unpriced.is_empty());
        let btc = &snapshot.holdings[0];
        assert_eq!(btc.current_value, Some(dec!(25000)));
        assert_eq!(btc.price, Some(dec!(25000)));
        assert_eq!(btc.cost_basis, None);
        assert_eq!(btc.gain_loss, None);
        assert!(matches!(
            btc.error,
            Some(ValuationError::Rate(PriceError::RateUnavailable { .. }))
        ));
        // Gain/loss only covers ETH, whose cost is known.
        assert_eq!(snapshot.costed_value, dec!(3000));
        assert_eq!(snapshot.total_cost_basis, dec!(2000));
        assert_eq!(snapshot.gain_loss.absolute, dec!(1000));
        assert_eq!(snapshot.gain_loss.percent, dec!(50));
        assert_eq!(snapshot.by_category.unpriced_share, Decimal::ZERO);
        assert!(snapshot.is_degraded());
    }

    #[test]
    fn test_unconvertible_cost_is_left_out_of_unpriced_share() {
        let holdings = [
            holding("AAPL", MarketKind::Equity, dec!(10), dec!(150), Currency::Usd),
            holding("ETH", MarketKind::Crypto, dec!(2), dec!(1000), Currency::Eur),
            holding("BTC", MarketKind::Crypto, dec!(1), dec!(18000), Currency::Eur),
        ];
        let prices = BTreeMap::from([(
            Ticker::crypto("BTC"),
            quote(Ticker::crypto("BTC"), dec!(25000), Currency::Eur),
        )]);

        let snapshot = valuation_snapshot(&holdings, &prices, &RateTable::new(), Currency::Eur);

        assert_eq!(
            snapshot.unpriced,
            vec![Ticker::equity("AAPL"), Ticker::crypto("ETH")]
        );
        // ETH's 2000 EUR of 20000 EUR; AAPL's USD cost is not counted.
        assert_eq!(snapshot.by_category.unpriced_cost, dec!(2000));
        assert_eq!(snapshot.by_category.unpriced_share, dec!(10));
    }

    #[test]
    fn test_out_of_range_value_is_flagged_not_panicking() {
        let huge = holding(
            "BTC",
            MarketKind::Crypto,
            Decimal::from_i128_with_scale(10_i128.pow(20), 0),
            dec!(1),
            Currency::Eur,
        );
        let eth = holding("ETH", MarketKind::Crypto, dec!(2), dec!(1000), Currency::Eur);
        let prices = BTreeMap::from([
            (
                Ticker::crypto("BTC"),
                quote(Ticker::crypto("BTC"), dec!(10000000000), Currency::Eur),
            ),
            (
                Ticker::crypto("ETH"),
                quote(Ticker::crypto("ETH"), dec!(1500), Currency::Eur),
            ),
        ]);

        let snapshot = valuation_snapshot(&[huge, eth], &prices, &RateTable::new(), Currency::Eur);

        assert_eq!(snapshot.total_value, dec!(3000));
        assert_eq!(snapshot.unpriced, vec![Ticker::crypto("BTC")]);
        assert_eq!(
            snapshot.holdings[0].error,
            Some(ValuationError::Overflow(Ticker::crypto("BTC")))
        );
    }

    #[test]
    fn test_total_overflow_drops_the_lot_that_overflows() {
        let lot = holding("USDT", MarketKind::Crypto, Decimal::MAX, Decimal::ZERO, Currency::Eur);
        let prices = BTreeMap::from([(
            Ticker::crypto("USDT"),
            quote(Ticker::crypto("USDT"), Decimal::ONE, Currency::Eur),
        )]);

        let snapshot = valuation_snapshot(
            &[lot.clone(), lot],
            &prices,
            &RateTable::new(),
            Currency::Eur,
        );

        assert_eq!(snapshot.total_value, Decimal::MAX);
        assert!(snapshot.holdings[0].is_priced());
        assert!(!snapshot.holdings[1].is_priced());
        assert_eq!(
            snapshot.holdings[1].error,
            Some(ValuationError::Overflow(Ticker::crypto("USDT")))
        );
    }

    #[test]
    fn test_unpriced_holdings_are_excluded_not_zero() {
        let holdings = [
            holding("BTC", MarketKind::Crypto, dec!(1), dec!(20000), Currency::Eur),
            holding("ETH", MarketKind::Crypto, dec!(2), dec!(1000), Currency::Eur),
            holding("MC.PA", MarketKind::Equity, dec!(2), dec!(650), Currency::Eur),
        ];
        let prices = BTreeMap::from([
            (
                Ticker::crypto("BTC"),
                quote(Ticker::crypto("BTC"), dec!(25000), Currency::Eur),
            ),
            (
                Ticker::equity("MC.PA"),
                quote(Ticker::equity("MC.PA"), dec!(700), Currency::Eur),
            ),
        ]);

        let snapshot = valuation_snapshot(&holdings, &prices, &RateTable::new(), Currency::Eur);

        assert_eq!(snapshot.total_value, dec!(26400));
        assert_eq!(snapshot.total_cost_basis, dec!(21300));
        assert_eq!(snapshot.unpriced, vec![Ticker::crypto("ETH")]);
        assert_eq!(snapshot.by_category.unpriced_cost, dec!(2000));
        // 2000 of 23300 total cost
        assert_eq!(
            snapshot.by_category.unpriced_share.round_dp(2),
            dec!(8.58)
        );
        let percents: Decimal = snapshot.by_category.shares.iter().map(|s| s.percent).sum();
        assert_eq!(percents.round_dp(10), dec!(100));
    }

    #[test]
    fn test_stale_quotes_are_flagged() {
        let btc = holding("BTC", MarketKind::Crypto, dec!(1), dec!(20000), Currency::Eur);
        let prices = BTreeMap::from([(
            Ticker::crypto("BTC"),
            quote(Ticker::crypto("BTC"), dec!(25000), Currency::Eur).into_stale(),
        )]);

        let snapshot = valuation_snapshot(&[btc], &prices, &RateTable::new(), Currency::Eur);
        assert_eq!(snapshot.total_value, dec!(25000));
        assert!(snapshot.holdings[0].stale);
        assert_eq!(snapshot.stale_prices, vec![Ticker::crypto("BTC")]);
        assert!(snapshot.is_degraded());
    }

    #[test]
    fn test_gain_loss_with_zero_cost() {
        assert_eq!(
            gain_loss(dec!(100), Decimal::ZERO),
            Some(GainLoss {
                absolute: dec!(100),
                percent: Decimal::ZERO
            })
        );
        assert_eq!(gain_loss(dec!(90), dec!(100)).unwrap().percent, dec!(-10));
        assert_eq!(gain_loss(Decimal::MIN, Decimal::MAX), None);
    }

    #[test]
    fn test_diversification_score() {
        assert_eq!(diversification_score(&[]), Decimal::ZERO);
        assert_eq!(
            diversification_score(&[share("Crypto", dec!(1000))]),
            Decimal::ZERO
        );
        assert_eq!(
            diversification_score(&[
                share("A", dec!(25)),
                share("B", dec!(25)),
                share("C", dec!(25)),
                share("D", dec!(25)),
            ]),
            dec!(100)
        );
        let skewed = diversification_score(&[share("A", dec!(90)), share("B", dec!(10))]);
        assert!(skewed > Decimal::ZERO && skewed < dec!(100));
        assert_eq!(skewed, dec!(36));
    }

    #[test]
    fn test_wholly_unpriced_portfolio() {
        let holdings = [holding("BTC", MarketKind::Crypto, dec!(1), dec!(20000), Currency::Eur)];
        let snapshot =
            valuation_snapshot(&holdings, &BTreeMap::new(), &RateTable::new(), Currency::Eur);
        assert_eq!(snapshot.total_value, Decimal::ZERO);
        assert_eq!(snapshot.diversification_score, Decimal::ZERO);
        assert_eq!(snapshot.by_category.unpriced_share, dec!(100));
        assert_eq!(snapshot.gain_loss, GainLoss::default());
    }

    #[test]
    fn test_profit_loss_by_ticker_merges_lots() {
        let holdings = [
            holding("BTC", MarketKind::Crypto, dec!(1), dec!(20000), Currency::Eur),
            holding("BTC", MarketKind::Crypto, dec!(0.5), dec!(30000), Currency::Eur),
            holding("ETH", MarketKind::Crypto, dec!(2), dec!(1000), Currency::Eur),
        ];
        let prices = BTreeMap::from([
            (
                Ticker::crypto("BTC"),
                quote(Ticker::crypto("BTC"), dec!(25000), Currency::Eur),
            ),
            (
                Ticker::crypto("ETH"),
                quote(Ticker::crypto("ETH"), dec!(1800), Currency::Eur),
            ),
        ]);
        let valuations: Vec<_> = holdings
            .iter()
            .map(|h| value_holding(h, &prices, &RateTable::new(), Currency::Eur))
            .collect();

        let pl = profit_loss_by_ticker(&valuations);
        assert_eq!(pl.len(), 2);
        assert_eq!(pl[0].ticker, Ticker::crypto("BTC"));
        assert_eq!(pl[0].quantity, dec!(1.5));
        assert_eq!(pl[0].total_cost, dec!(35000));
        assert_eq!(pl[0].current_value, dec!(37500));
        assert_eq!(pl[0].profit_loss, dec!(2500));
        assert_eq!(pl[1].profit_loss, dec!(1600));
        assert_eq!(pl[1].profit_loss_percent, dec!(80));
    }

    #[test]
    fn test_roi_and_annualized_return() {
        assert_eq!(roi(dec!(1000), dec!(1250)), dec!(25));
        assert_eq!(roi(Decimal::ZERO, dec!(1250)), Decimal::ZERO);

        assert_eq!(annualized_return(dec!(1000), dec!(2000), 0), Decimal::ZERO);
        assert_eq!(annualized_return(dec!(1000), Decimal::ZERO, 365), dec!(-100));
        // Two years doubling is about 41.42% a year
        let rate = annualized_return(dec!(1000), dec!(2000), 731);
        assert_eq!(rate.round_dp(1), dec!(41.4));
    }

    #[test]
    fn test_transaction_category_distribution() {
        let txs = [
            tx("2024-01-05", dec!(-100), Some("Food")),
            tx("2024-01-06", dec!(-300), Some("Rent")),
            tx("2024-01-07", dec!(-100), None),
            tx("2024-01-31", dec!(2500), Some("Salary")),
            tx("2024-02-02", dec!(-50), Some("Food")),
        ];

        let january = DateRange::new(
            Some("2024-01-01".parse().unwrap()),
            Some("2024-01-31".parse().unwrap()),
        );
        let expenses = transaction_category_distribution(&txs, january, TransactionFlow::Expense);
        assert_eq!(
            expenses
                .iter()
                .map(|c| (c.category.as_str(), c.amount, c.percent))
                .collect::<Vec<_>>(),
            vec![
                ("Rent", dec!(300), dec!(60)),
                ("Food", dec!(100), dec!(20)),
                ("Uncategorized", dec!(100), dec!(20)),
            ]
        );

        let income =
            transaction_category_distribution(&txs, DateRange::default(), TransactionFlow::Income);
        assert_eq!(income.len(), 1);
        assert_eq!(income[0].percent, dec!(100));
    }

    #[test]
    fn test_monthly_average_and_savings_rate() {
        let txs = [
            tx("2024-01-01", dec!(3000), Some("Salary")),
            tx("2024-01-15", dec!(-1200), Some("Rent")),
            tx("2024-03-01", dec!(3000), Some("Salary")),
            tx("2024-03-01", dec!(-600), Some("Food")),
        ];

        // 60 days span = 2 months
        let avg = monthly_average(&txs, 3);
        assert_eq!(avg.months, dec!(2));
        assert_eq!(avg.income, dec!(3000));
        assert_eq!(avg.expenses, dec!(900));
        assert_eq!(avg.net, dec!(2100));

        assert_eq!(monthly_average(&txs, 1).months, dec!(1));
        assert_eq!(monthly_average(&[], 3), MonthlyAverage::default());

        assert_eq!(savings_rate(dec!(3000), dec!(900)), dec!(70));
        assert_eq!(savings_rate(Decimal::ZERO, dec!(900)), Decimal::ZERO);
    }

    #[test]
    fn test_transaction_date_range() {
        let txs = [
            tx("2024-03-01", dec!(1), None),
            tx("2023-12-24", dec!(1), None),
            tx("2024-01-15", dec!(1), None),
        ];
        assert_eq!(
            transaction_date_range(&txs),
            Some(("2023-12-24".parse().unwrap(), "2024-03-01".parse().unwrap()))
        );
        assert_eq!(transaction_date_range(&[]), None);
    }
}
