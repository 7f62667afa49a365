use crate::error::DashboardError;
use crate::period::Period;
use crate::storage_utils::MarketDataConfig;
use anyhow::Result;
use chrono::DateTime;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

static TICKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9.\-^=]{1,15}$").expect("ticker pattern compiles"));

/// One trading day, as delivered by the data source.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl ta::High for PriceRow {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for PriceRow {
    fn low(&self) -> f64 {
        self.low
    }
}

impl ta::Close for PriceRow {
    fn close(&self) -> f64 {
        self.close
    }
}

// --- Wire format of the v8 chart endpoint ---

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize, Debug)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Deserialize, Debug)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Deserialize, Debug)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Deserialize, Debug, Default)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<LenientF64>,
}

#[derive(Deserialize, Debug, Default)]
struct Quote {
    #[serde(default)]
    open: Vec<LenientF64>,
    #[serde(default)]
    high: Vec<LenientF64>,
    #[serde(default)]
    low: Vec<LenientF64>,
    #[serde(default)]
    close: Vec<LenientF64>,
    #[serde(default)]
    volume: Vec<LenientF64>,
}

/// A quote cell that may arrive as a number, a numeric string or `null`.
#[derive(Deserialize, Debug, Default, Clone, Copy)]
#[serde(transparent)]
struct LenientF64(#[serde(deserialize_with = "deserialize_f64_lenient")] Option<f64>);

struct LenientF64Visitor;

impl<'de> Visitor<'de> for LenientF64Visitor {
    type Value = Option<f64>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a float, an integer, a numeric string or null")
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(v).filter(|v| v.is_finite()))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        if v.trim().is_empty() {
            Ok(None)
        } else {
            v.parse::<f64>()
                .map(|v| Some(v).filter(|v| v.is_finite()))
                .map_err(E::custom)
        }
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }
}

fn deserialize_f64_lenient<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(LenientF64Visitor)
}

fn cell(column: &[LenientF64], i: usize) -> Option<f64> {
    column.get(i).and_then(|c| c.0)
}

/// Upper-cases and validates a user supplied ticker.
pub fn normalize_ticker(input: &str) -> Result<String, DashboardError> {
    let ticker = input.trim().to_ascii_uppercase();
    if TICKER_RE.is_match(&ticker) {
        Ok(ticker)
    } else {
        Err(DashboardError::InvalidTicker(input.trim().to_string()))
    }
}

pub fn build_client(config: &MarketDataConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Maps the HTTP status of a chart request. Unknown symbols come back as 404
/// with a structured error body, so 404 is left to the decoder.
pub fn check_status(status: StatusCode) -> Result<(), DashboardError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        Err(DashboardError::RateLimited)
    } else if status.is_success() || status == StatusCode::NOT_FOUND {
        Ok(())
    } else {
        Err(DashboardError::Upstream(format!("HTTP {status}")))
    }
}

/// Decodes a chart response body into chronologically ascending rows.
///
/// Prices are adjusted for dividends and splits by scaling open, high, low
/// and close with `adjclose / close`; a day without an adjusted close keeps
/// its raw prices. Days with any missing OHLC value are dropped, a missing
/// volume counts as zero. An unknown symbol or an empty result yields an
/// empty series.
pub fn parse_chart(body: &str) -> Result<Vec<PriceRow>> {
    let response: ChartResponse = serde_json::from_str(body)?;

    if let Some(err) = response.chart.error {
        if err.code == "Not Found" {
            debug!(description = %err.description, "symbol not found upstream");
            return Ok(Vec::new());
        }
        return Err(DashboardError::Upstream(format!("{}: {}", err.code, err.description)).into());
    }

    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };

    let offset = result.meta.gmtoffset;
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjusted = result.indicators.adjclose.into_iter().next().unwrap_or_default();

    let mut rows = Vec::with_capacity(result.timestamp.len());
    let mut dropped = 0usize;
    for (i, ts) in result.timestamp.iter().enumerate() {
        let date = DateTime::from_timestamp(ts + offset, 0).map(|dt| dt.format("%Y-%m-%d").to_string());
        let parts = (
            date,
            cell(&quote.open, i),
            cell(&quote.high, i),
            cell(&quote.low, i),
            cell(&quote.close, i),
        );
        match parts {
            (Some(date), Some(open), Some(high), Some(low), Some(close)) => {
                let ratio = cell(&adjusted.adjclose, i)
                    .filter(|_| close != 0.0)
                    .map_or(1.0, |adj| adj / close);
                rows.push(PriceRow {
                    date,
                    open: open * ratio,
                    high: high * ratio,
                    low: low * ratio,
                    close: close * ratio,
                    volume: cell(&quote.volume, i).unwrap_or(0.0),
                });
            }
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(dropped, "skipped incomplete rows");
    }
    Ok(rows)
}

/// Fetches daily bars for `ticker` over `period`.
pub async fn fetch_prices(
    client: &Client,
    config: &MarketDataConfig,
    ticker: &str,
    period: Period,
) -> Result<Vec<PriceRow>> {
    let url = format!(
        "{}/v8/finance/chart/{}",
        config.base_url.trim_end_matches('/'),
        ticker
    );
    let query = [
        ("range", period.as_str()),
        ("interval", "1d"),
        ("includePrePost", "false"),
        ("events", "div,splits"),
    ];

    info!(%ticker, %period, "fetching daily prices");
    let response = client.get(&url).query(&query).send().await?;
    let status = response.status();
    if let Err(e) = check_status(status) {
        warn!(%ticker, %status, "data source refused the request");
        return Err(e.into());
    }

    let body = response.text().await?;

    let rows = parse_chart(&body)?;
    info!(%ticker, rows = rows.len(), "received price rows");
    Ok(rows)
}
