//! Candle and tick feed models.

use serde::{Deserialize, Serialize};

/// A single OHLC bar over one granularity window.
///
/// Prices are `f64`: every analysis transform downstream (moving averages,
/// variance, Wilder smoothing) is floating-point math. Monetary amounts
/// elsewhere in the crate use `rust_decimal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Start of the candle's window, seconds since the Unix epoch.
    pub epoch: i64,
    #[serde(default)]
    pub volume: Option<f64>,
}

impl Candle {
    /// Absolute size of the candle body.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Full high-to-low range.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Wick above the body.
    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    /// Wick below the body.
    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    /// True when the candle closed above its open.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// A degenerate candle synthesized from a single tick; all four prices
    /// collapse onto the tick quote.
    pub fn from_tick(tick: &Tick) -> Self {
        Self {
            open: tick.price,
            high: tick.price,
            low: tick.price,
            close: tick.price,
            epoch: tick.epoch,
            volume: None,
        }
    }
}

/// A single spot quote from the tick stream.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Tick {
    pub epoch: i64,
    #[serde(rename = "quote")]
    pub price: f64,
}

/// Response to a `ticks_history` request in candle style.
#[derive(Debug, Clone, Deserialize)]
pub struct CandleHistoryResponse {
    pub candles: Vec<Candle>,
}

/// Streamed tick update.
#[derive(Debug, Clone, Deserialize)]
pub struct TickResponse {
    pub tick: Tick,
}

/// Requests a window of historical candles for a symbol.
#[derive(Serialize)]
pub struct CandleHistoryRequest {
    pub ticks_history: String,
    pub end: String,
    pub count: usize,
    pub style: String,
    pub granularity: u32,
}

impl CandleHistoryRequest {
    pub fn new(symbol: &str, granularity: u32, count: usize) -> Self {
        Self {
            ticks_history: symbol.to_string(),
            end: "latest".to_string(),
            count,
            style: "candles".to_string(),
            granularity,
        }
    }
}

/// Subscribes to the live tick stream for a symbol.
#[derive(Serialize)]
pub struct TickSubscribeRequest {
    pub ticks: String,
    pub subscribe: u8,
}

impl TickSubscribeRequest {
    pub fn new(symbol: &str) -> Self {
        Self {
            ticks: symbol.to_string(),
            subscribe: 1,
        }
    }
}
