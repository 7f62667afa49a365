//! This module contains the core analysis pipeline logic.

use crate::dashboard::Dashboard;
use crate::market_data;
use crate::period::Period;
use crate::storage_utils::MarketDataConfig;
use anyhow::Result;
use reqwest::Client;
use tracing::info;

/// Runs the full analysis pipeline for one request:
/// 1. Validates the ticker.
/// 2. Fetches daily bars for the requested period.
/// 3. Assembles indicators, trailing returns and the latest snapshot.
pub async fn run_analysis_pipeline(
    client: &Client,
    config: &MarketDataConfig,
    ticker_input: &str,
    period: Period,
) -> Result<Dashboard> {
    // Step 1: Validate Input
    let ticker = market_data::normalize_ticker(ticker_input)?;

    // Step 2: Download Candles
    let rows = market_data::fetch_prices(client, config, &ticker, period).await?;

    // Step 3: Analyze Data
    let dashboard = Dashboard::build(&ticker, period, rows)?;
    info!(
        %ticker,
        %period,
        rows = dashboard.series.len(),
        returns = dashboard.returns.is_some(),
        "analysis complete"
    );

    Ok(dashboard)
}
