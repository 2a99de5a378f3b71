use super::ui;
use crate::core::analytics::{self, CategoryAmount, DateRange, MonthlyAverage, TransactionFlow};
use crate::core::service::PortfolioService;
use anyhow::Result;
use comfy_table::Cell;

/// Months the monthly averages look back over.
const AVERAGE_MONTHS: u32 = 3;

pub async fn run(
    service: &PortfolioService,
    range: DateRange,
    flow: TransactionFlow,
) -> Result<()> {
    let distribution = service.category_distribution(range, flow).await?;
    let transactions = service.store().transactions().await?;
    let in_range: Vec<_> = transactions
        .into_iter()
        .filter(|tx| range.contains(tx.date))
        .collect();

    if in_range.is_empty() {
        println!("No transactions in the selected period.");
        return Ok(());
    }

    println!("{}", display_distribution(&distribution, flow));
    let average = analytics::monthly_average(&in_range, AVERAGE_MONTHS);
    println!("{}", display_averages(&average));

    if let Some((first, last)) = analytics::transaction_date_range(&in_range) {
        println!(
            "{}",
            ui::style_text(&format!("Period: {first} to {last}"), ui::StyleType::Subtle)
        );
    }
    Ok(())
}

fn display_distribution(distribution: &[CategoryAmount], flow: TransactionFlow) -> String {
    let title = match flow {
        TransactionFlow::Expense => "Expenses by category",
        TransactionFlow::Income => "Income by category",
    };
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Category"),
        ui::header_cell("Amount"),
        ui::header_cell("Share"),
    ]);
    for row in distribution {
        table.add_row(vec![
            Cell::new(&row.category),
            ui::amount_cell(Some(row.amount)),
            ui::percent_cell(row.percent),
        ]);
    }
    format!("{}\n\n{}", ui::style_text(title, ui::StyleType::Title), table)
}

fn display_averages(average: &MonthlyAverage) -> String {
    format!(
        "\nMonthly average over {} month(s): income {}, expenses {}, net {}\nSavings rate: {}%",
        ui::format_amount(average.months),
        ui::format_amount(average.income),
        ui::format_amount(average.expenses),
        ui::format_amount(average.net),
        ui::format_amount(analytics::savings_rate(average.income, average.expenses))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_display_averages() {
        let average = MonthlyAverage {
            income: dec!(3000),
            expenses: dec!(900),
            net: dec!(2100),
            months: dec!(2),
        };
        let output = display_averages(&average);
        assert!(output.contains("income 3000.00, expenses 900.00, net 2100.00"));
        assert!(output.contains("Savings rate: 70.00%"));
    }

    #[test]
    fn test_display_distribution_title() {
        let rows = vec![CategoryAmount {
            category: "Rent".to_string(),
            amount: dec!(900),
            percent: dec!(100),
        }];
        let output = display_distribution(&rows, TransactionFlow::Expense);
        assert!(output.contains("Expenses by category"));
        assert!(output.contains("Rent"));
        assert!(output.contains("100.00%"));
    }
}
