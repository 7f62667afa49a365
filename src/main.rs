mod analysis;
mod chart;
mod comfy_table;
mod dashboard;
mod directional;
mod error;
mod indicators;
mod market_data;
mod period;
mod returns;
mod signals;
mod storage_utils;
mod tui;

use anyhow::Result;
use clap::Parser;
use std::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::period::Period;
use crate::storage_utils::{AsyncStorageManager, DefaultsConfig};

/// Technical-analysis dashboard for a single stock: EMA, RSI, ADX/DMI and
/// ATR with trailing returns, in the terminal.
#[derive(Parser, Debug, Default, PartialEq)]
#[command(name = "stock-dashboard", version)]
struct CliArgs {
    /// Print the report once instead of opening the interactive view
    #[arg(short, long)]
    print: bool,

    /// Include the raw data table
    #[arg(long = "data")]
    show_data: bool,

    /// Show the candlestick chart (interactive view only)
    #[arg(long = "chart")]
    show_chart: bool,

    /// Ticker symbol, e.g. AAPL
    ticker: Option<String>,

    /// Lookback period: 1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd or max
    #[arg(value_parser = parse_period)]
    period: Option<Period>,
}

fn parse_period(s: &str) -> Result<Period, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

impl CliArgs {
    fn apply(&self, defaults: &mut DefaultsConfig) {
        if let Some(ticker) = &self.ticker {
            defaults.ticker = ticker.clone();
        }
        if let Some(period) = self.period {
            defaults.period = period;
        }
        defaults.show_data |= self.show_data;
        defaults.show_chart |= self.show_chart;
    }
}

fn init_tracing(storage: &AsyncStorageManager, print_mode: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if print_mode {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        // The alternate screen owns the terminal, so logs go to a file.
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(storage.path_of("dashboard.log"))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(log_file))
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    let cli = CliArgs::parse();

    let storage = AsyncStorageManager::new_relative("storage").await?;
    init_tracing(&storage, cli.print)?;

    let mut config = storage.load_config().await;
    config.apply_overrides(|key| std::env::var(key).ok());
    cli.apply(&mut config.defaults);

    let client = market_data::build_client(&config.market_data)?;

    if !cli.print {
        info!(ticker = %config.defaults.ticker, period = %config.defaults.period, "starting dashboard");
        return tui::run_tui(client, config.market_data, config.defaults).await;
    }

    let defaults = &config.defaults;
    if defaults.show_chart {
        warn!("the candlestick chart is only available in the interactive view");
    }
    match analysis::run_analysis_pipeline(&client, &config.market_data, &defaults.ticker, defaults.period).await {
        Ok(dashboard) => {
            comfy_table::run(&dashboard, defaults.show_data);
            Ok(())
        }
        Err(e) => {
            error!(ticker = %defaults.ticker, error = %e, "analysis failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(list: &[&str]) -> Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(std::iter::once("stock-dashboard").chain(list.iter().copied()))
    }

    #[test]
    fn no_arguments_means_interactive_defaults() {
        assert_eq!(parse(&[]).unwrap(), CliArgs::default());
    }

    #[test]
    fn flags_and_positionals() {
        let cli = parse(&["--print", "tsla", "--data", "6mo"]).unwrap();
        assert!(cli.print);
        assert!(cli.show_data);
        assert!(!cli.show_chart);
        assert_eq!(cli.ticker.as_deref(), Some("tsla"));
        assert_eq!(cli.period, Some(Period::SixMonths));
    }

    #[test]
    fn short_print_flag() {
        let cli = parse(&["-p", "msft"]).unwrap();
        assert!(cli.print);
        assert_eq!(cli.ticker.as_deref(), Some("msft"));
        assert_eq!(cli.period, None);
    }

    #[test]
    fn bad_input_is_rejected() {
        assert!(parse(&["--verbose"]).is_err());
        assert!(parse(&["AAPL", "3w"]).is_err());
        assert!(parse(&["AAPL", "1y", "extra"]).is_err());
    }

    #[test]
    fn cli_overrides_config_defaults() {
        let cli = parse(&["--chart", "NVDA"]).unwrap();
        let mut defaults = DefaultsConfig::default();
        cli.apply(&mut defaults);
        assert_eq!(defaults.ticker, "NVDA");
        assert_eq!(defaults.period, Period::OneYear);
        assert!(defaults.show_chart);
        assert!(!defaults.show_data);
    }
}
