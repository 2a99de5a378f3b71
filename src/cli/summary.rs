use super::ui;
use crate::core::analytics::{self, ValuationSnapshot};
use crate::core::service::PortfolioService;
use crate::core::ticker::Ticker;
use crate::store::PriceUpdate;
use anyhow::Result;
use chrono::Utc;
use comfy_table::Cell;
use rust_decimal::Decimal;

impl ValuationSnapshot {
    pub fn display_as_table(&self) -> String {
        let currency = self.reporting_currency;
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Holding"),
            ui::header_cell("Quantity"),
            ui::header_cell(&format!("Price ({currency})")),
            ui::header_cell(&format!("Value ({currency})")),
            ui::header_cell(&format!("Cost ({currency})")),
            ui::header_cell("Gain/Loss"),
            ui::header_cell("Gain/Loss (%)"),
        ]);

        for valuation in &self.holdings {
            let name = if valuation.stale {
                format!("{} *", valuation.ticker)
            } else {
                valuation.ticker.to_string()
            };
            let (gain, gain_pct) = match valuation.gain_loss {
                Some(g) => (ui::change_cell(g.absolute, ""), ui::change_cell(g.percent, "%")),
                None => (ui::na_cell(true), ui::na_cell(true)),
            };
            table.add_row(vec![
                Cell::new(name),
                Cell::new(valuation.holding.quantity.normalize().to_string()),
                ui::amount_cell(valuation.price),
                ui::amount_cell(valuation.current_value),
                ui::amount_cell(valuation.cost_basis),
                gain,
                gain_pct,
            ]);
        }

        let mut output = format!(
            "{}\n\n",
            ui::style_text("Portfolio", ui::StyleType::Title)
        );
        output.push_str(&table.to_string());

        let total_style = if self.unpriced.is_empty() {
            ui::StyleType::TotalValue
        } else {
            ui::StyleType::Warning
        };
        output.push_str(&format!(
            "\n\nTotal Value ({}): {}",
            ui::style_text(currency.code(), ui::StyleType::TotalLabel),
            ui::style_text(&ui::format_amount(self.total_value), total_style)
        ));
        output.push_str(&format!(
            "\nGain/Loss: {} ({}%)",
            ui::format_amount(self.gain_loss.absolute),
            ui::format_amount(self.gain_loss.percent)
        ));
        output.push_str(&format!(
            "\nROI: {}%   Diversification: {}/100",
            ui::format_amount(analytics::roi(self.total_cost_basis, self.costed_value)),
            ui::format_amount(self.diversification_score)
        ));

        if self.holdings.iter().any(|h| h.stale) {
            output.push_str(&format!(
                "\n{}",
                ui::style_text("* last known price or rate, refresh failed", ui::StyleType::Subtle)
            ));
        }
        for pair in &self.stale_rates {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(&format!("Exchange rate {pair} is stale"), ui::StyleType::Warning)
            ));
        }
        output
    }
}

/// Lines explaining holdings that are missing from the totals or lack a
/// gain/loss, with the last price saved for them if any.
fn unpriced_notes(snapshot: &ValuationSnapshot, saved: &dyn Fn(&Ticker) -> Option<PriceUpdate>) -> Vec<String> {
    snapshot
        .holdings
        .iter()
        .filter_map(|h| {
            let error = h.error.as_ref()?;
            let mut note = format!("{}: {error}", h.ticker);
            if let Some(update) = saved(&h.ticker) {
                note.push_str(&format!(
                    " (last saved price {} on {})",
                    ui::format_amount(update.current_price),
                    update.fetched_at.format("%Y-%m-%d")
                ));
            }
            Some(note)
        })
        .collect()
}

pub async fn run(
    service: &PortfolioService,
    saved_price: &dyn Fn(&Ticker) -> Option<PriceUpdate>,
) -> Result<()> {
    let pb = ui::new_spinner("Valuing holdings...");
    let snapshot = service.valuation_snapshot(service.reporting_currency()).await;
    pb.finish_and_clear();
    let snapshot = snapshot?;

    if snapshot.holdings.is_empty() {
        println!("No holdings configured.");
        return Ok(());
    }

    println!("{}", snapshot.display_as_table());
    for note in unpriced_notes(&snapshot, saved_price) {
        println!("{}", ui::style_text(&note, ui::StyleType::Error));
    }

    let held_since = snapshot
        .holdings
        .iter()
        .filter_map(|h| h.holding.acquired_at)
        .min();
    if let Some(since) = held_since {
        let days = (Utc::now().date_naive() - since).num_days();
        let annualized =
            analytics::annualized_return(snapshot.total_cost_basis, snapshot.costed_value, days);
        if annualized != Decimal::ZERO {
            println!("Annualized return since {since}: {}%", ui::format_amount(annualized));
        }
    }
    Ok(())
}
