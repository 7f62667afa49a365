use crate::indicators::AnalyzedRow;

/// Rows needed before any trailing return is reported.
pub const MIN_ROWS_FOR_RETURNS: usize = 241;

/// Trailing horizons, measured in trading days back from the latest row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    OneMonth,
    ThreeMonths,
    SixMonths,
    TwelveMonths,
}

impl Horizon {
    pub const ALL: [Horizon; 4] = [
        Horizon::OneMonth,
        Horizon::ThreeMonths,
        Horizon::SixMonths,
        Horizon::TwelveMonths,
    ];

    pub fn days(self) -> usize {
        match self {
            Horizon::OneMonth => 20,
            Horizon::ThreeMonths => 60,
            Horizon::SixMonths => 120,
            Horizon::TwelveMonths => 240,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Horizon::OneMonth => "1 MONTH",
            Horizon::ThreeMonths => "3 MONTHS",
            Horizon::SixMonths => "6 MONTHS",
            Horizon::TwelveMonths => "12 MONTHS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnMetric {
    pub horizon: Horizon,
    pub percent_change: f64,
    pub absolute_change: f64,
}

/// Close `offset` rows back from the latest row.
fn close_back(series: &[AnalyzedRow], offset: usize) -> Option<f64> {
    series.iter().rev().nth(offset).map(|r| r.price.close)
}

/// The four trailing returns, or `None` when the series is shorter than
/// [`MIN_ROWS_FOR_RETURNS`].
pub fn trailing_returns(series: &[AnalyzedRow]) -> Option<[ReturnMetric; 4]> {
    if series.len() < MIN_ROWS_FOR_RETURNS {
        return None;
    }
    let latest = close_back(series, 0)?;

    let metric = |horizon: Horizon| -> Option<ReturnMetric> {
        let past = close_back(series, horizon.days())?;
        Some(ReturnMetric {
            horizon,
            percent_change: (latest - past) / past * 100.0,
            absolute_change: latest - past,
        })
    };

    let mut metrics = Vec::with_capacity(Horizon::ALL.len());
    for horizon in Horizon::ALL {
        metrics.push(metric(horizon)?);
    }
    metrics.try_into().ok()
}
