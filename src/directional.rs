// =============================================================================
// Directional Movement Index (ADX / +DI / -DI)
// =============================================================================
//
// `ta` has no directional movement indicator, so it is computed here with
// Wilder's smoothing:
//   1. +DM, -DM and True Range for each bar-to-bar transition.
//   2. Running Wilder sums of +DM, -DM and TR over `period` transitions.
//   3. +DI = 100 * S(+DM) / S(TR), -DI = 100 * S(-DM) / S(TR).
//   4. DX  = 100 * |+DI - -DI| / (+DI + -DI).
//   5. ADX = Wilder average of DX, seeded with the mean of the first
//      `period` DX values.
//
// Row `period` is the first with +DI/-DI, row `2 * period - 1` the first
// with ADX.
// =============================================================================

use crate::indicators::finite;
use crate::market_data::PriceRow;

/// Per-row ADX, +DI (DMP) and -DI (DMN), aligned with the input rows.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalColumns {
    pub adx: Vec<Option<f64>>,
    pub dmp: Vec<Option<f64>>,
    pub dmn: Vec<Option<f64>>,
}

impl DirectionalColumns {
    /// True when all three columns line up with a series of `rows` rows.
    pub fn is_aligned(&self, rows: usize) -> bool {
        self.adx.len() == rows && self.dmp.len() == rows && self.dmn.len() == rows
    }
}

/// Computes the directional columns, or `None` when `period` is zero or the
/// series has fewer than `period + 1` rows.
pub fn directional_movement(rows: &[PriceRow], period: usize) -> Option<DirectionalColumns> {
    if period == 0 || rows.len() < period + 1 {
        return None;
    }

    let n = rows.len();
    let period_f = period as f64;
    let mut columns = DirectionalColumns {
        adx: vec![None; n],
        dmp: vec![None; n],
        dmn: vec![None; n],
    };

    let mut smooth_plus_dm = 0.0;
    let mut smooth_minus_dm = 0.0;
    let mut smooth_tr = 0.0;
    let mut dx_seed = Vec::with_capacity(period);
    let mut adx: Option<f64> = None;

    for i in 1..n {
        let (pdm, mdm, tr) = movement(&rows[i - 1], &rows[i]);

        if i <= period {
            smooth_plus_dm += pdm;
            smooth_minus_dm += mdm;
            smooth_tr += tr;
            if i < period {
                continue;
            }
        } else {
            smooth_plus_dm = smooth_plus_dm - smooth_plus_dm / period_f + pdm;
            smooth_minus_dm = smooth_minus_dm - smooth_minus_dm / period_f + mdm;
            smooth_tr = smooth_tr - smooth_tr / period_f + tr;
        }

        // A bar range of zero means no movement in either direction.
        let (plus_di, minus_di) = if smooth_tr > 0.0 {
            (
                smooth_plus_dm / smooth_tr * 100.0,
                smooth_minus_dm / smooth_tr * 100.0,
            )
        } else {
            (0.0, 0.0)
        };
        let di_sum = plus_di + minus_di;
        let dx = if di_sum > 0.0 {
            (plus_di - minus_di).abs() / di_sum * 100.0
        } else {
            0.0
        };

        columns.dmp[i] = finite(plus_di);
        columns.dmn[i] = finite(minus_di);

        adx = match adx {
            Some(prev) => Some((prev * (period_f - 1.0) + dx) / period_f),
            None => {
                dx_seed.push(dx);
                (dx_seed.len() == period).then(|| dx_seed.iter().sum::<f64>() / period_f)
            }
        };
        columns.adx[i] = adx.and_then(finite);
    }

    Some(columns)
}

/// (+DM, -DM, TR) for the transition from `prev` to `cur`.
fn movement(prev: &PriceRow, cur: &PriceRow) -> (f64, f64, f64) {
    let tr = (cur.high - cur.low)
        .max((cur.high - prev.close).abs())
        .max((cur.low - prev.close).abs());

    let up_move = cur.high - prev.high;
    let down_move = prev.low - cur.low;

    let pdm = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
    let mdm = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };

    (pdm, mdm, tr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(open: f64, high: f64, low: f64, close: f64) -> PriceRow {
        PriceRow {
            date: "2024-01-01".to_string(),
            open,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    fn uptrend(len: usize) -> Vec<PriceRow> {
        (0..len)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                row(base, base + 1.5, base - 0.5, base + 1.0)
            })
            .collect()
    }

    #[test]
    fn period_zero() {
        assert!(directional_movement(&uptrend(50), 0).is_none());
    }

    #[test]
    fn needs_period_plus_one_rows() {
        assert!(directional_movement(&uptrend(14), 14).is_none());
        assert!(directional_movement(&uptrend(15), 14).is_some());
    }

    #[test]
    fn warm_up_positions() {
        let cols = directional_movement(&uptrend(40), 14).unwrap();
        assert!(cols.is_aligned(40));

        assert!(cols.dmp[..14].iter().all(Option::is_none));
        assert!(cols.dmn[..14].iter().all(Option::is_none));
        assert!(cols.dmp[14..].iter().all(Option::is_some));

        assert!(cols.adx[..27].iter().all(Option::is_none));
        assert!(cols.adx[27..].iter().all(Option::is_some));
    }

    #[test]
    fn short_series_has_di_but_no_adx() {
        let cols = directional_movement(&uptrend(20), 14).unwrap();
        assert!(cols.dmp[19].is_some());
        assert!(cols.adx.iter().all(Option::is_none));
    }

    #[test]
    fn strong_uptrend() {
        let cols = directional_movement(&uptrend(60), 14).unwrap();
        let adx = cols.adx[59].unwrap();
        let dmp = cols.dmp[59].unwrap();
        let dmn = cols.dmn[59].unwrap();
        assert!(adx > 25.0, "expected ADX > 25 for strong trend, got {adx}");
        assert!(dmp > dmn);
    }

    #[test]
    fn flat_market() {
        let rows = vec![row(100.0, 101.0, 99.0, 100.0); 60];
        let cols = directional_movement(&rows, 14).unwrap();
        let adx = cols.adx[59].unwrap();
        assert!(adx < 1.0, "expected ADX near 0 for flat market, got {adx}");
        assert_eq!(cols.dmp[59], Some(0.0));
    }

    #[test]
    fn zero_range_bars_stay_defined() {
        let rows = vec![row(100.0, 100.0, 100.0, 100.0); 40];
        let cols = directional_movement(&rows, 14).unwrap();
        assert_eq!(cols.adx[39], Some(0.0));
        assert_eq!(cols.dmn[39], Some(0.0));
    }

    #[test]
    fn values_stay_in_range() {
        let rows: Vec<PriceRow> = (0..100)
            .map(|i| {
                let base = 50.0 + (i as f64 * 0.3).sin() * 10.0;
                row(base - 0.5, base + 1.0, base - 1.0, base + 0.5)
            })
            .collect();
        let cols = directional_movement(&rows, 14).unwrap();
        for v in cols.adx.iter().chain(&cols.dmp).chain(&cols.dmn).flatten() {
            assert!((0.0..=100.0).contains(v), "{v} out of [0,100] range");
        }
    }
}
