pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::analytics::{DateRange, TransactionFlow};
use crate::core::config::AppConfig;
use crate::core::service::PortfolioService;
use crate::core::timeseries::{Granularity, SeriesKind};
use crate::core::ticker::Ticker;
use crate::store::PortfolioStore;
use crate::store::disk::DiskStore;
use anyhow::Result;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Refresh,
    Summary,
    Alloc,
    Spending {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        income: bool,
    },
    History {
        kind: SeriesKind,
        granularity: Granularity,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("prism starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let data_path = config.default_data_path()?;
    let store = Arc::new(DiskStore::open(&config, &data_path)?);
    let store_handle: Arc<dyn PortfolioStore> = store.clone();
    let service = PortfolioService::from_config(&config, store_handle)?;

    match command {
        AppCommand::Refresh => cli::refresh::run(&service).await,
        AppCommand::Summary => {
            let saved_price = |ticker: &Ticker| store.last_price(ticker).ok().flatten();
            cli::summary::run(&service, &saved_price).await
        }
        AppCommand::Alloc => cli::alloc::run(&service).await,
        AppCommand::Spending { from, to, income } => {
            let flow = if income {
                TransactionFlow::Income
            } else {
                TransactionFlow::Expense
            };
            cli::spending::run(&service, DateRange::new(from, to), flow).await
        }
        AppCommand::History { kind, granularity } => {
            cli::history::run(&service, kind, granularity).await
        }
    }
}
