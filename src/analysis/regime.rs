//! Market regime classification.
//!
//! Labels the current market state from moving-average separation and
//! rolling volatility. Needs at least 50 candles; below that the regime is
//! reported as insufficient data with zero confidence rather than guessed.

use serde::{Deserialize, Serialize};

use super::indicators::{atr, moving_average, rolling_volatility};
use crate::models::candle::Candle;

/// Minimum candle history required for a classification.
pub const MIN_CANDLES: usize = 50;

/// Coarse market-state label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegimeKind {
    InsufficientData,
    Neutral,
    StrongUptrend,
    StrongDowntrend,
    Uptrend,
    Downtrend,
    HighVolatility,
    Consolidation,
}

impl RegimeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegimeKind::InsufficientData => "INSUFFICIENT_DATA",
            RegimeKind::Neutral => "NEUTRAL",
            RegimeKind::StrongUptrend => "STRONG_UPTREND",
            RegimeKind::StrongDowntrend => "STRONG_DOWNTREND",
            RegimeKind::Uptrend => "UPTREND",
            RegimeKind::Downtrend => "DOWNTREND",
            RegimeKind::HighVolatility => "HIGH_VOLATILITY",
            RegimeKind::Consolidation => "CONSOLIDATION",
        }
    }

    /// Strong trend in either direction.
    pub fn is_strong_trend(&self) -> bool {
        matches!(self, RegimeKind::StrongUptrend | RegimeKind::StrongDowntrend)
    }
}

/// A regime classification with its supporting measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Regime {
    pub kind: RegimeKind,
    /// Rolling volatility divided by the current price.
    pub volatility_ratio: f64,
    /// (MA20 − MA50) / MA50.
    pub trend_strength: f64,
    pub confidence: f64,
    /// Latest ATR(14), when enough history exists.
    pub atr: Option<f64>,
}

impl Regime {
    /// The placeholder regime before any candles have been seen.
    pub fn unknown() -> Self {
        Self {
            kind: RegimeKind::InsufficientData,
            volatility_ratio: 0.0,
            trend_strength: 0.0,
            confidence: 0.0,
            atr: None,
        }
    }
}

/// Classifies the market regime from the candle window.
///
/// Classification is first-match-wins: strong trend, then plain trend,
/// then the volatility extremes, then neutral.
pub fn detect_market_regime(candles: &[Candle]) -> Regime {
    if candles.len() < MIN_CANDLES {
        return Regime::unknown();
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let volatility = rolling_volatility(&closes, 20);
    let ma20 = moving_average(&closes, 20);
    let ma50 = moving_average(&closes, 50);
    let atr_series = atr(candles, 14);

    let current_price = *closes.last().expect("candle window is non-empty");
    let ma20_now = ma20.last().copied().flatten();
    let ma50_now = ma50.last().copied().flatten();
    let atr_now = atr_series.last().copied().flatten();

    let trend_strength = match (ma20_now, ma50_now) {
        (Some(fast), Some(slow)) if slow != 0.0 => (fast - slow) / slow,
        _ => 0.0,
    };

    let volatility_ratio = if current_price != 0.0 {
        volatility / current_price
    } else {
        0.0
    };
    let is_high_vol = volatility_ratio > 0.01;
    let is_low_vol = volatility_ratio < 0.003;

    let (kind, confidence) = if trend_strength.abs() > 0.02 && !is_low_vol {
        if trend_strength > 0.0 {
            (RegimeKind::StrongUptrend, 0.85)
        } else {
            (RegimeKind::StrongDowntrend, 0.85)
        }
    } else if trend_strength.abs() > 0.01 {
        if trend_strength > 0.0 {
            (RegimeKind::Uptrend, 0.7)
        } else {
            (RegimeKind::Downtrend, 0.7)
        }
    } else if is_high_vol {
        (RegimeKind::HighVolatility, 0.6)
    } else if is_low_vol {
        (RegimeKind::Consolidation, 0.65)
    } else {
        (RegimeKind::Neutral, 0.5)
    };

    Regime {
        kind,
        volatility_ratio,
        trend_strength,
        confidence,
        atr: atr_now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_candle(close: f64, epoch: i64) -> Candle {
        Candle {
            open: close,
            high: close + 0.1,
            low: close - 0.1,
            close,
            epoch,
            volume: None,
        }
    }

    #[test]
    fn under_fifty_candles_is_insufficient_data() {
        let candles: Vec<Candle> = (0..49).map(|i| flat_candle(100.0, i)).collect();
        let regime = detect_market_regime(&candles);
        assert_eq!(regime.kind, RegimeKind::InsufficientData);
        assert_eq!(regime.confidence, 0.0);
    }

    #[test]
    fn empty_window_is_insufficient_data() {
        let regime = detect_market_regime(&[]);
        assert_eq!(regime.kind, RegimeKind::InsufficientData);
    }

    #[test]
    fn steep_rise_classifies_as_uptrend_family() {
        // 1% climb per bar separates MA20 well above MA50.
        let candles: Vec<Candle> = (0..60)
            .map(|i| flat_candle(100.0 * 1.01f64.powi(i), i as i64))
            .collect();
        let regime = detect_market_regime(&candles);
        assert!(matches!(
            regime.kind,
            RegimeKind::StrongUptrend | RegimeKind::Uptrend
        ));
        assert!(regime.trend_strength > 0.0);
        assert!(regime.confidence >= 0.7);
    }

    #[test]
    fn steep_fall_classifies_as_downtrend_family() {
        let candles: Vec<Candle> = (0..60)
            .map(|i| flat_candle(100.0 * 0.99f64.powi(i), i as i64))
            .collect();
        let regime = detect_market_regime(&candles);
        assert!(matches!(
            regime.kind,
            RegimeKind::StrongDowntrend | RegimeKind::Downtrend
        ));
        assert!(regime.trend_strength < 0.0);
    }

    #[test]
    fn flat_quiet_market_is_consolidation() {
        let candles: Vec<Candle> = (0..60).map(|i| flat_candle(100.0, i)).collect();
        let regime = detect_market_regime(&candles);
        assert_eq!(regime.kind, RegimeKind::Consolidation);
        assert_eq!(regime.confidence, 0.65);
    }

    #[test]
    fn choppy_flat_market_is_high_volatility() {
        // Alternating ±2% around a flat mean: no trend, vol ratio > 1%.
        let candles: Vec<Candle> = (0..60)
            .map(|i| {
                let close = if i % 2 == 0 { 102.0 } else { 98.0 };
                flat_candle(close, i)
            })
            .collect();
        let regime = detect_market_regime(&candles);
        assert_eq!(regime.kind, RegimeKind::HighVolatility);
        assert!(regime.volatility_ratio > 0.01);
    }
}
