//! Pass/fail markers for the dashboard panels.

use std::fmt;

pub const RSI_LOWER: f64 = 30.0;
pub const RSI_UPPER: f64 = 70.0;
pub const ADX_TRENDING: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Positive,
    Negative,
}

impl Signal {
    fn from_bool(pass: bool) -> Self {
        if pass { Signal::Positive } else { Signal::Negative }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Signal::Positive => "✅",
            Signal::Negative => "🔴",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.emoji())
    }
}

pub fn returns_signal(ret: f64) -> Signal {
    Signal::from_bool(ret >= 0.0)
}

pub fn ema_signal(ltp: f64, ema: f64) -> Signal {
    Signal::from_bool(ltp >= ema)
}

pub fn rsi_signal(rsi: f64) -> Signal {
    Signal::from_bool(RSI_LOWER < rsi && rsi < RSI_UPPER)
}

pub fn adx_signal(adx: f64) -> Signal {
    Signal::from_bool(adx > ADX_TRENDING)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns() {
        assert_eq!(returns_signal(5.0), Signal::Positive);
        assert_eq!(returns_signal(0.0), Signal::Positive);
        assert_eq!(returns_signal(-0.0), Signal::Positive);
        assert_eq!(returns_signal(-5.0), Signal::Negative);
        assert_eq!(returns_signal(-0.0001), Signal::Negative);
    }

    #[test]
    fn ema() {
        assert_eq!(ema_signal(150.0, 140.0), Signal::Positive);
        assert_eq!(ema_signal(140.0, 140.0), Signal::Positive);
        assert_eq!(ema_signal(130.0, 140.0), Signal::Negative);
    }

    #[test]
    fn rsi_bounds_are_exclusive() {
        assert_eq!(rsi_signal(50.0), Signal::Positive);
        assert_eq!(rsi_signal(30.0), Signal::Negative);
        assert_eq!(rsi_signal(70.0), Signal::Negative);
        assert_eq!(rsi_signal(30.01), Signal::Positive);
        assert_eq!(rsi_signal(75.0), Signal::Negative);
        assert_eq!(rsi_signal(10.0), Signal::Negative);
    }

    #[test]
    fn adx_threshold_is_exclusive() {
        assert_eq!(adx_signal(30.0), Signal::Positive);
        assert_eq!(adx_signal(25.0), Signal::Negative);
        assert_eq!(adx_signal(20.0), Signal::Negative);
    }

    #[test]
    fn markers() {
        assert_eq!(Signal::Positive.to_string(), "✅");
        assert_eq!(Signal::Negative.to_string(), "🔴");
    }
}
