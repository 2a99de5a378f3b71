use crate::core::orchestrator::RefreshStatus;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use std::time::Duration;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    TotalLabel,
    TotalValue,
    Warning,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::TotalLabel => style(text).bold(),
        StyleType::TotalValue => style(text).green().bold(),
        StyleType::Warning => style(text).yellow(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Formats a monetary amount with two decimals, or "N/A".
pub fn amount_cell(value: Option<Decimal>) -> Cell {
    match value {
        Some(v) => Cell::new(format_amount(v)).set_alignment(CellAlignment::Right),
        None => na_cell(true),
    }
}

pub fn format_amount(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

pub fn percent_cell(value: Decimal) -> Cell {
    Cell::new(format!("{:.2}%", value.round_dp(2))).set_alignment(CellAlignment::Right)
}

/// Signed change, green when non-negative and red otherwise.
pub fn change_cell(change: Decimal, suffix: &str) -> Cell {
    let negative = change.is_sign_negative() && !change.is_zero();
    let sign = if negative { "" } else { "+" };
    let text = format!("{sign}{:.2}{suffix}", change.round_dp(2));
    let color = if negative { Color::Red } else { Color::Green };
    Cell::new(text)
        .fg(color)
        .set_alignment(CellAlignment::Right)
}

pub fn na_cell(has_error: bool) -> Cell {
    let color = if has_error {
        Color::Red
    } else {
        Color::DarkGrey
    };
    Cell::new("N/A")
        .fg(color)
        .set_alignment(CellAlignment::Right)
}

/// One-line freshness summary for a refresh.
pub fn status_line(status: RefreshStatus) -> String {
    match status {
        RefreshStatus::FullyFresh => style_text("All prices are fresh.", StyleType::Subtle),
        RefreshStatus::PartiallyStale => style_text(
            "Some prices could not be refreshed; showing last known values.",
            StyleType::Warning,
        ),
        RefreshStatus::Degraded => style_text(
            "Some holdings have no price and are left out of the totals.",
            StyleType::Error,
        ),
    }
}

/// Creates a new `indicatif::ProgressBar` with standard styling.
pub fn new_progress_bar(len: u64, with_message: bool) -> ProgressBar {
    let template = if with_message {
        "{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}"
    } else {
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}"
    };

    let pb = ProgressBar::new(len);
    let bar_style = ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(bar_style);
    pb
}

/// Spinner for work of unknown length.
pub fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn print_separator() {
    let term_width = console::Term::stdout()
        .size_checked()
        .map(|(_, w)| w as usize)
        .unwrap_or(80);
    println!("\n{}", "─".repeat(term_width));
}
