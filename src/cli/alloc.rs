use super::ui;
use crate::core::analytics::{self, CategoryDistribution, TickerProfitLoss};
use crate::core::currency::Currency;
use crate::core::service::PortfolioService;
use anyhow::Result;
use comfy_table::Cell;
use rust_decimal::Decimal;

pub async fn run(service: &PortfolioService) -> Result<()> {
    let reporting = service.reporting_currency();
    let pb = ui::new_spinner("Calculating allocation...");
    let snapshot = service.valuation_snapshot(reporting).await;
    pb.finish_and_clear();
    let snapshot = snapshot?;

    if snapshot.holdings.is_empty() {
        println!("No holdings configured.");
        return Ok(());
    }

    println!(
        "{}",
        display_allocation_table(&snapshot.by_category, snapshot.total_value, reporting)
    );
    println!(
        "Diversification score: {}",
        ui::style_text(
            &format!("{}/100", ui::format_amount(snapshot.diversification_score)),
            ui::StyleType::TotalLabel
        )
    );

    let profit_loss = analytics::profit_loss_by_ticker(&snapshot.holdings);
    if !profit_loss.is_empty() {
        ui::print_separator();
        println!("{}", display_profit_loss_table(&profit_loss, reporting));
    }
    Ok(())
}

fn display_allocation_table(
    distribution: &CategoryDistribution,
    total_value: Decimal,
    currency: Currency,
) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Category"),
        ui::header_cell(&format!("Value ({currency})")),
        ui::header_cell("Allocation"),
    ]);

    for share in &distribution.shares {
        table.add_row(vec![
            Cell::new(&share.category),
            ui::amount_cell(Some(share.value)),
            ui::percent_cell(share.percent),
        ]);
    }

    let mut output = format!(
        "{}\n\n{}",
        ui::style_text("Allocation", ui::StyleType::Title),
        table
    );
    output.push_str(&format!(
        "\n\nTotal Value ({currency}): {}",
        ui::style_text(&ui::format_amount(total_value), ui::StyleType::TotalValue)
    ));
    if !distribution.unpriced_cost.is_zero() {
        output.push_str(&format!(
            "\n{}",
            ui::style_text(
                &format!(
                    "Unpriced: {}% of cost basis ({} {currency}) not included",
                    ui::format_amount(distribution.unpriced_share),
                    ui::format_amount(distribution.unpriced_cost)
                ),
                ui::StyleType::Warning
            )
        ));
    }
    output
}

fn display_profit_loss_table(rows: &[TickerProfitLoss], currency: Currency) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Quantity"),
        ui::header_cell(&format!("Cost ({currency})")),
        ui::header_cell(&format!("Value ({currency})")),
        ui::header_cell("P/L"),
        ui::header_cell("P/L (%)"),
    ]);
    for row in rows {
        table.add_row(vec![
            Cell::new(row.ticker.to_string()),
            Cell::new(row.quantity.normalize().to_string()),
            ui::amount_cell(Some(row.total_cost)),
            ui::amount_cell(Some(row.current_value)),
            ui::change_cell(row.profit_loss, ""),
            ui::change_cell(row.profit_loss_percent, "%"),
        ]);
    }
    format!(
        "{}\n\n{}",
        ui::style_text("Profit/Loss by ticker", ui::StyleType::Title),
        table
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analytics::CategoryShare;
    use rust_decimal_macros::dec;

    #[test]
    fn test_allocation_table_reports_unpriced_share() {
        let distribution = CategoryDistribution {
            shares: vec![
                CategoryShare {
                    category: "Crypto".to_string(),
                    value: dec!(750),
                    percent: dec!(75),
                },
                CategoryShare {
                    category: "Tech".to_string(),
                    value: dec!(250),
                    percent: dec!(25),
                },
            ],
            unpriced_cost: dec!(100),
            unpriced_share: dec!(10),
        };

        let output = display_allocation_table(&distribution, dec!(1000), Currency::Eur);
        assert!(output.contains("Crypto"));
        assert!(output.contains("75.00%"));
        assert!(output.contains("Total Value (EUR): 1000.00"));
        assert!(output.contains("Unpriced: 10.00% of cost basis (100.00 EUR)"));
    }
}
