use crate::directional::{self, DirectionalColumns};
use crate::market_data::PriceRow;
use ta::Next;
use ta::indicators::TrueRange;
use tracing::{debug, warn};

pub const EMA_FAST_PERIOD: usize = 20;
pub const EMA_SLOW_PERIOD: usize = 200;
pub const RSI_PERIOD: usize = 14;
pub const ADX_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;

/// Indicator values of a single row. `None` until enough history exists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSet {
    pub ema_20: Option<f64>,
    pub ema_200: Option<f64>,
    pub rsi_14: Option<f64>,
    pub adx_14: Option<f64>,
    pub dmp_14: Option<f64>,
    pub dmn_14: Option<f64>,
    pub atr_14: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedRow {
    pub price: PriceRow,
    pub indicators: IndicatorSet,
}

pub(crate) fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// Recursive average seeded with the plain mean of its first `period`
/// inputs. Yields `None` until the seed is complete.
///
/// `alpha` is `2 / (n + 1)` for an EMA and `1 / n` for Wilder's smoothing.
#[derive(Debug, Clone)]
pub struct SeededAverage {
    period: usize,
    alpha: f64,
    seen: usize,
    sum: f64,
    value: Option<f64>,
}

impl SeededAverage {
    pub fn ema(period: usize) -> Option<Self> {
        Self::with_alpha(period, 2.0 / (period as f64 + 1.0))
    }

    pub fn wilder(period: usize) -> Option<Self> {
        Self::with_alpha(period, 1.0 / period as f64)
    }

    fn with_alpha(period: usize, alpha: f64) -> Option<Self> {
        (period > 0).then_some(Self {
            period,
            alpha,
            seen: 0,
            sum: 0.0,
            value: None,
        })
    }
}

impl Next<f64> for SeededAverage {
    type Output = Option<f64>;

    fn next(&mut self, input: f64) -> Option<f64> {
        self.value = match self.value {
            Some(prev) => Some(prev + self.alpha * (input - prev)),
            None => {
                self.seen += 1;
                self.sum += input;
                (self.seen == self.period).then(|| self.sum / self.period as f64)
            }
        };
        self.value
    }
}

/// EMA of `closes`, seeded with the mean of the first `period` closes; the
/// first `period - 1` rows are empty.
pub fn ema_column(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let Some(mut ema) = SeededAverage::ema(period) else {
        return vec![None; closes.len()];
    };
    closes.iter().map(|&close| ema.next(close).and_then(finite)).collect()
}

/// Wilder RSI of `closes`; the first `period` rows are empty.
pub fn rsi_column(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut column = vec![None; closes.len()];
    let (Some(mut gains), Some(mut losses)) = (SeededAverage::wilder(period), SeededAverage::wilder(period)) else {
        return column;
    };
    for (i, pair) in closes.windows(2).enumerate() {
        let change = pair[1] - pair[0];
        let avg_gain = gains.next(change.max(0.0));
        let avg_loss = losses.next((-change).max(0.0));
        if let (Some(gain), Some(loss)) = (avg_gain, avg_loss) {
            // No movement at all leaves RSI undefined.
            column[i + 1] = finite(100.0 * gain / (gain + loss));
        }
    }
    column
}

/// Wilder ATR of `rows`; the first `period` rows are empty.
pub fn atr_column(rows: &[PriceRow], period: usize) -> Vec<Option<f64>> {
    let Some(mut atr) = SeededAverage::wilder(period) else {
        return vec![None; rows.len()];
    };
    let mut true_range = TrueRange::new();
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let range = true_range.next(row);
            // The first bar has no previous close.
            if i == 0 { None } else { atr.next(range).and_then(finite) }
        })
        .collect()
}

/// Writes ADX, DMP and DMN into `series` as a unit.
///
/// A missing computation, or one whose columns do not line up with the
/// series, clears all three on every row.
pub fn apply_directional(series: &mut [AnalyzedRow], columns: Option<DirectionalColumns>) {
    match columns.filter(|c| c.is_aligned(series.len())) {
        Some(c) => {
            for (i, row) in series.iter_mut().enumerate() {
                row.indicators.adx_14 = c.adx[i];
                row.indicators.dmp_14 = c.dmp[i];
                row.indicators.dmn_14 = c.dmn[i];
            }
        }
        None => {
            if !series.is_empty() {
                warn!(rows = series.len(), "directional indicators unavailable for this series");
            }
            for row in series.iter_mut() {
                row.indicators.adx_14 = None;
                row.indicators.dmp_14 = None;
                row.indicators.dmn_14 = None;
            }
        }
    }
}

/// Augments a chronologically ascending series with every indicator column.
pub fn assemble(rows: Vec<PriceRow>) -> Vec<AnalyzedRow> {
    let closes: Vec<f64> = rows.iter().map(|r| r.close).collect();

    let ema_fast = ema_column(&closes, EMA_FAST_PERIOD);
    let ema_slow = ema_column(&closes, EMA_SLOW_PERIOD);
    let rsi = rsi_column(&closes, RSI_PERIOD);
    let atr = atr_column(&rows, ATR_PERIOD);
    let dmi = directional::directional_movement(&rows, ADX_PERIOD);

    let mut series: Vec<AnalyzedRow> = rows
        .into_iter()
        .enumerate()
        .map(|(i, price)| AnalyzedRow {
            price,
            indicators: IndicatorSet {
                ema_20: ema_fast[i],
                ema_200: ema_slow[i],
                rsi_14: rsi[i],
                atr_14: atr[i],
                ..IndicatorSet::default()
            },
        })
        .collect();

    apply_directional(&mut series, dmi);
    debug!(rows = series.len(), "indicator columns assembled");
    series
}
