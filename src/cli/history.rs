use super::ui;
use crate::core::service::PortfolioService;
use crate::core::timeseries::{Granularity, SeriesKind, SeriesPoint};
use anyhow::Result;
use comfy_table::Cell;

pub async fn run(
    service: &PortfolioService,
    kind: SeriesKind,
    granularity: Granularity,
) -> Result<()> {
    let series = service.time_series(kind, granularity).await?;
    if series.is_empty() {
        println!("Nothing to show yet.");
        return Ok(());
    }
    println!("{}", display_series(&series, kind, granularity));
    Ok(())
}

fn display_series(series: &[SeriesPoint], kind: SeriesKind, granularity: Granularity) -> String {
    let label = match kind {
        SeriesKind::Balance => "Balance",
        SeriesKind::PortfolioValue => "Portfolio value",
        SeriesKind::Invested => "Invested",
    };
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell(label),
        ui::header_cell("Change"),
    ]);

    let mut previous = None;
    for point in series {
        let change = match previous {
            Some(prev) => ui::change_cell(point.value - prev, ""),
            None => ui::na_cell(false),
        };
        table.add_row(vec![
            Cell::new(point.date.to_string()),
            ui::amount_cell(Some(point.value)),
            change,
        ]);
        previous = Some(point.value);
    }

    format!(
        "{}\n\n{}",
        ui::style_text(&format!("{label} ({granularity})"), ui::StyleType::Title),
        table
    )
}
