//! Tick-buffer micro-structure estimation.
//!
//! Looks at the most recent ticks to guess how the current candle is
//! likely to finish. The estimate is deliberately coarse: it only feeds a
//! small fixed-magnitude contribution into the composite signal.

use serde::{Deserialize, Serialize};

use crate::models::candle::{Candle, Tick};

/// Minimum ticks before any estimate is attempted.
const MIN_TICKS: usize = 10;

/// Number of recent ticks the estimate is computed over.
const TICK_WINDOW: usize = 20;

/// Predicted near-term candle development.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MicroPrediction {
    BullishContinuation,
    BearishContinuation,
    ConsolidationLikely,
    DojiForming,
    Uncertain,
}

impl MicroPrediction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MicroPrediction::BullishContinuation => "BULLISH_CONTINUATION",
            MicroPrediction::BearishContinuation => "BEARISH_CONTINUATION",
            MicroPrediction::ConsolidationLikely => "CONSOLIDATION_LIKELY",
            MicroPrediction::DojiForming => "DOJI_FORMING",
            MicroPrediction::Uncertain => "UNCERTAIN",
        }
    }
}

/// Micro-structure estimate over the tick window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MicroStructure {
    /// Relative price change across the tick window.
    pub momentum: f64,
    /// Tick-level volatility relative to the average price.
    pub volatility: f64,
    pub prediction: MicroPrediction,
    /// How full the tick window is, in [0, 1].
    pub confidence: f64,
}

impl MicroStructure {
    fn uncertain() -> Self {
        Self {
            momentum: 0.0,
            volatility: 0.0,
            prediction: MicroPrediction::Uncertain,
            confidence: 0.0,
        }
    }
}

/// Estimates the micro-structure from the tick buffer and the forming candle.
pub fn analyze_micro_structure(ticks: &[Tick], current_candle: &Candle) -> MicroStructure {
    if ticks.len() < MIN_TICKS {
        return MicroStructure::uncertain();
    }

    let recent = &ticks[ticks.len().saturating_sub(TICK_WINDOW)..];
    let prices: Vec<f64> = recent.iter().map(|t| t.price).collect();
    let avg_price = prices.iter().sum::<f64>() / prices.len() as f64;

    let first = prices[0];
    let momentum = if first != 0.0 {
        (prices[prices.len() - 1] - first) / first
    } else {
        0.0
    };

    let variance = prices.iter().map(|p| (p - avg_price).powi(2)).sum::<f64>() / prices.len() as f64;
    let micro_vol = variance.sqrt();
    let relative_vol = if avg_price != 0.0 {
        micro_vol / avg_price
    } else {
        0.0
    };

    let current_body = current_candle.body();
    let current_range = current_candle.range();

    let prediction = if relative_vol > 0.001 && momentum > 0.0005 {
        MicroPrediction::BullishContinuation
    } else if relative_vol > 0.001 && momentum < -0.0005 {
        MicroPrediction::BearishContinuation
    } else if relative_vol < 0.0003 {
        MicroPrediction::ConsolidationLikely
    } else if current_body < current_range * 0.2 {
        MicroPrediction::DojiForming
    } else {
        MicroPrediction::Uncertain
    };

    MicroStructure {
        momentum,
        volatility: relative_vol,
        prediction,
        confidence: (recent.len() as f64 / TICK_WINDOW as f64).min(1.0),
    }
}
