use super::ui;
use crate::core::orchestrator::{FetchResult, TickerOutcome};
use crate::core::service::{PortfolioService, RefreshReport};
use anyhow::Result;
use comfy_table::{Cell, Color};

pub async fn run(service: &PortfolioService) -> Result<()> {
    let tickers = service.tracked_tickers().await?;
    if tickers.is_empty() {
        println!("No holdings configured.");
        return Ok(());
    }

    let pb = ui::new_progress_bar(tickers.len() as u64, true);
    pb.set_message("Refreshing prices...");
    let report = service
        .refresh_and_write_back(&|_| pb.inc(1))
        .await;
    pb.finish_and_clear();
    let report = report?;

    println!("{}", render(&report));
    Ok(())
}

fn outcome_cell(outcome: &TickerOutcome) -> Cell {
    match outcome {
        TickerOutcome::Fetched => Cell::new("fetched").fg(Color::Green),
        TickerOutcome::CacheHit => Cell::new("cached").fg(Color::DarkGrey),
        TickerOutcome::StaleFallback { reason } => {
            Cell::new(format!("stale ({reason})")).fg(Color::Yellow)
        }
        TickerOutcome::Failed { reason } => Cell::new(format!("failed ({reason})")).fg(Color::Red),
    }
}

fn price_table(fetch: &FetchResult) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Price"),
        ui::header_cell("Source"),
        ui::header_cell("Fetched"),
        ui::header_cell("Status"),
    ]);

    for (ticker, outcome) in &fetch.outcomes {
        let quote = fetch.quote(ticker);
        table.add_row(vec![
            Cell::new(ticker.to_string()),
            ui::amount_cell(quote.map(|q| q.value)),
            Cell::new(quote.map(|q| format!("{} {}", q.source, q.currency)).unwrap_or_default()),
            Cell::new(
                quote
                    .map(|q| q.fetched_at.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default(),
            ),
            outcome_cell(outcome),
        ]);
    }
    table.to_string()
}

fn render(report: &RefreshReport) -> String {
    let fetch = &report.fetch;
    let mut output = format!("{}\n\n", ui::style_text("Price refresh", ui::StyleType::Title));
    output.push_str(&price_table(fetch));
    output.push_str(&format!(
        "\n\n{} fetched, {} from cache, {} failed\n{}",
        fetch.succeeded,
        fetch.from_cache,
        fetch.failed.len(),
        ui::status_line(fetch.status())
    ));

    for (ticker, error) in &report.write_back.failed {
        output.push_str(&format!(
            "\n{}",
            ui::style_text(
                &format!("Could not save price for {ticker}: {error}"),
                ui::StyleType::Error
            )
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::Currency;
    use crate::core::error::PriceError;
    use crate::core::price::{PriceQuote, QuoteSource};
    use crate::core::ticker::Ticker;
    use crate::store::WriteBackReport;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_render_lists_every_ticker() {
        let btc = Ticker::crypto("BTC");
        let aapl = Ticker::equity("AAPL");
        let mut fetch = FetchResult::default();
        fetch.prices.insert(
            btc.clone(),
            PriceQuote {
                ticker: btc.clone(),
                value: dec!(25000),
                currency: Currency::Eur,
                fetched_at: Utc::now(),
                source: QuoteSource::Provider("coingecko".to_string()),
                stale: false,
            },
        );
        fetch.succeeded = 1;
        fetch.outcomes.insert(btc.clone(), TickerOutcome::Fetched);
        fetch.failed.push(aapl.clone());
        fetch.outcomes.insert(
            aapl.clone(),
            TickerOutcome::Failed {
                reason: PriceError::unreachable("yahoo", "timed out after 10s"),
            },
        );
        let report = RefreshReport {
            fetch,
            write_back: WriteBackReport {
                written: vec![],
                failed: vec![(btc, "disk full".to_string())],
            },
        };

        let output = render(&report);
        assert!(output.contains("BTC"));
        assert!(output.contains("25000.00"));
        assert!(output.contains("AAPL"));
        assert!(output.contains("1 fetched, 0 from cache, 1 failed"));
        assert!(output.contains("Could not save price for BTC: disk full"));
    }
}
