use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use prism::core::log::init_logging;
use prism::core::timeseries::{Granularity, SeriesKind};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for prism::AppCommand {
    fn from(cmd: Commands) -> prism::AppCommand {
        match cmd {
            Commands::Refresh => prism::AppCommand::Refresh,
            Commands::Summary => prism::AppCommand::Summary,
            Commands::Alloc => prism::AppCommand::Alloc,
            Commands::Spending { from, to, income } => {
                prism::AppCommand::Spending { from, to, income }
            }
            Commands::History { kind, granularity } => {
                prism::AppCommand::History { kind, granularity }
            }
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create an example configuration
    Setup,
    /// Fetch current prices and save them
    Refresh,
    /// Display portfolio valuation
    Summary,
    /// Display allocation by category and profit/loss by ticker
    Alloc,
    /// Display spending or income by category
    Spending {
        /// First day to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Show income instead of expenses
        #[arg(long)]
        income: bool,
    },
    /// Display a cumulative series over time
    History {
        /// balance, value or invested
        #[arg(long, default_value = "balance")]
        kind: SeriesKind,
        /// daily, weekly or monthly
        #[arg(long, default_value = "daily")]
        granularity: Granularity,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => prism::cli::setup::run(cli.config_path.as_deref()).map(|_| ()),
        Some(cmd) => prism::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
