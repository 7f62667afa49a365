//! Display-agnostic model of the three dashboard panels.

use crate::error::DashboardError;
use crate::indicators::{self, AnalyzedRow};
use crate::market_data::PriceRow;
use crate::period::Period;
use crate::returns::{self, ReturnMetric};
use crate::signals::{self, Signal};

pub const NOT_ENOUGH_DATA: &str = "Not enough data for return calculations.";
const MISSING: &str = "N/A";

/// Close and indicator values of the most recent row.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub date: String,
    pub close: f64,
    pub ema_20: Option<f64>,
    pub ema_200: Option<f64>,
    pub rsi_14: Option<f64>,
    pub adx_14: Option<f64>,
    pub dmp_14: Option<f64>,
    pub dmn_14: Option<f64>,
    pub atr_14: Option<f64>,
}

pub fn latest_snapshot(series: &[AnalyzedRow]) -> Option<Snapshot> {
    let last = series.last()?;
    let ind = &last.indicators;
    Some(Snapshot {
        date: last.price.date.clone(),
        close: last.price.close,
        ema_20: ind.ema_20,
        ema_200: ind.ema_200,
        rsi_14: ind.rsi_14,
        adx_14: ind.adx_14,
        dmp_14: ind.dmp_14,
        dmn_14: ind.dmn_14,
        atr_14: ind.atr_14,
    })
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// One `LABEL : value marker` line of a panel.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelLine {
    pub label: &'static str,
    pub value: Option<f64>,
    pub signal: Option<Signal>,
}

impl PanelLine {
    fn plain(label: &'static str, value: Option<f64>) -> Self {
        Self { label, value, signal: None }
    }

    fn judged(label: &'static str, value: Option<f64>, judge: impl Fn(f64) -> Signal) -> Self {
        Self {
            label,
            value,
            signal: value.map(judge),
        }
    }

    pub fn value_text(&self) -> String {
        match (self.value, self.signal) {
            (Some(v), Some(s)) => format!("{:.2} {}", v, s),
            (Some(v), None) => format!("{:.2}", v),
            (None, _) => MISSING.to_string(),
        }
    }

    pub fn text(&self) -> String {
        format!("{} : {}", self.label, self.value_text())
    }
}

/// Everything needed to render one ticker over one period.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub ticker: String,
    pub period: Period,
    pub snapshot: Snapshot,
    pub returns: Option<[ReturnMetric; 4]>,
    pub series: Vec<AnalyzedRow>,
}

impl Dashboard {
    /// Runs indicator assembly and the return calculator over `rows`.
    pub fn build(ticker: &str, period: Period, rows: Vec<PriceRow>) -> Result<Self, DashboardError> {
        let series = indicators::assemble(rows);
        let snapshot = latest_snapshot(&series).ok_or(DashboardError::NoData)?;
        let returns = returns::trailing_returns(&series);
        Ok(Self {
            ticker: ticker.to_string(),
            period,
            snapshot,
            returns,
            series,
        })
    }

    /// The single warning shown when returns are suppressed.
    pub fn warning(&self) -> Option<&'static str> {
        self.returns.is_none().then_some(NOT_ENOUGH_DATA)
    }

    pub fn returns_lines(&self) -> Vec<String> {
        let Some(metrics) = &self.returns else {
            return vec![NOT_ENOUGH_DATA.to_string()];
        };
        metrics
            .iter()
            .map(|m| {
                let pct = round2(m.percent_change);
                format!(
                    "{} : {:.2}% {} ({:+.2})",
                    m.horizon.label(),
                    pct,
                    signals::returns_signal(pct),
                    m.absolute_change
                )
            })
            .collect()
    }

    pub fn momentum_lines(&self) -> Vec<PanelLine> {
        let s = &self.snapshot;
        let ltp = s.close;
        vec![
            PanelLine::plain("LTP", Some(ltp)),
            PanelLine::judged("EMA20", s.ema_20, |ema| signals::ema_signal(ltp, ema)),
            PanelLine::judged("EMA200", s.ema_200, |ema| signals::ema_signal(ltp, ema)),
            PanelLine::judged("RSI", s.rsi_14, signals::rsi_signal),
        ]
    }

    pub fn trend_lines(&self) -> Vec<PanelLine> {
        let s = &self.snapshot;
        vec![
            PanelLine::judged("ADX", s.adx_14, signals::adx_signal),
            PanelLine::plain("DMP", s.dmp_14),
            PanelLine::plain("DMN", s.dmn_14),
            PanelLine::plain("ATR", s.atr_14),
        ]
    }

    /// Rows for the raw data table, most recent first.
    pub fn rows_latest_first(&self) -> impl Iterator<Item = &AnalyzedRow> {
        self.series.iter().rev()
    }

    pub fn chart_title(&self) -> String {
        format!("{} Historical Candlestick Chart", self.ticker)
    }
}

/// Formats an optional table cell.
pub fn cell_text(v: Option<f64>) -> String {
    v.map_or_else(|| MISSING.to_string(), |v| format!("{:.2}", v))
}

/// Column headers of the raw data table.
pub const DATA_HEADERS: [&str; 13] = [
    "time", "open", "high", "low", "close", "volume", "EMA_20", "EMA_200", "RSI_14", "ADX_14",
    "DMP_14", "DMN_14", "ATR_14",
];

/// One raw data table row, in [`DATA_HEADERS`] order.
pub fn data_row(row: &AnalyzedRow) -> Vec<String> {
    let p = &row.price;
    let ind = &row.indicators;
    let numbers = [
        Some(p.open),
        Some(p.high),
        Some(p.low),
        Some(p.close),
        Some(p.volume),
        ind.ema_20,
        ind.ema_200,
        ind.rsi_14,
        ind.adx_14,
        ind.dmp_14,
        ind.dmn_14,
        ind.atr_14,
    ];
    std::iter::once(p.date.clone())
        .chain(numbers.into_iter().map(cell_text))
        .collect()
}
