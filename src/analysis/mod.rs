//! Market analysis: indicator math, candlestick patterns, regime
//! classification, mood/temporal context and tick micro-structure.
//!
//! Everything in this module tree is a pure transform over candle or tick
//! slices. Nothing here mutates session state; the decision engine calls in
//! each cycle and combines the outputs.

pub mod context;
pub mod indicators;
pub mod micro;
pub mod patterns;
pub mod regime;

pub use context::{MarketMood, MoodLabel, Session, TemporalContext, market_mood, temporal_context};
pub use indicators::{
    BollingerBand, Macd, atr, bollinger, exponential_moving_average, macd, moving_average,
    rolling_volatility, rsi,
};
pub use micro::{MicroPrediction, MicroStructure, analyze_micro_structure};
pub use patterns::{PatternName, PatternResult, PatternSignal, identify_pattern};
pub use regime::{Regime, RegimeKind, detect_market_regime};
