//! Pure numeric indicator transforms over price series.
//!
//! Every function is deterministic and tolerant of inputs shorter than its
//! lookback: series results are index-aligned with the input and carry
//! `None` until enough history exists. Nothing here panics or divides by
//! zero on degenerate input.

use serde::{Deserialize, Serialize};

use crate::models::candle::Candle;

/// One Bollinger band triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBand {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// MACD line, signal line and histogram, index-aligned with the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub macd_line: Vec<f64>,
    pub signal_line: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// Simple moving average over a trailing window.
///
/// `result[i]` is `None` for `i < period - 1`.
pub fn moving_average(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut res = Vec::with_capacity(values.len());
    if period == 0 {
        res.resize(values.len(), None);
        return res;
    }
    let mut window_sum = 0.0;
    for (i, &value) in values.iter().enumerate() {
        window_sum += value;
        if i >= period {
            window_sum -= values[i - period];
        }
        if i + 1 >= period {
            res.push(Some(window_sum / period as f64));
        } else {
            res.push(None);
        }
    }
    res
}

/// Exponential moving average seeded with the first value.
///
/// Defined from index 0: `ema[i] = value[i]*k + ema[i-1]*(1-k)` with
/// `k = 2 / (period + 1)`.
pub fn exponential_moving_average(values: &[f64], period: usize) -> Vec<f64> {
    let mut res = Vec::with_capacity(values.len());
    let k = 2.0 / (period as f64 + 1.0);
    for (i, &value) in values.iter().enumerate() {
        if i == 0 {
            res.push(value);
        } else {
            res.push(value * k + res[i - 1] * (1.0 - k));
        }
    }
    res
}

/// Relative strength index with Wilder smoothing.
///
/// First defined value is at index `period`. A zero average loss maps to
/// RSI 100 rather than dividing by zero.
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || values.len() <= period {
        return vec![None; values.len()];
    }

    let mut gains = Vec::with_capacity(values.len() - 1);
    let mut losses = Vec::with_capacity(values.len() - 1);
    for pair in values.windows(2) {
        let delta = pair[1] - pair[0];
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    let mut res = vec![None; values.len()];
    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    res[period] = Some(rsi_value(avg_gain, avg_loss));

    for i in (period + 1)..values.len() {
        avg_gain = (avg_gain * (period as f64 - 1.0) + gains[i - 1]) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + losses[i - 1]) / period as f64;
        res[i] = Some(rsi_value(avg_gain, avg_loss));
    }
    res
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Bollinger bands: trailing mean ± `mult` population standard deviations.
///
/// `result[i]` is `None` for `i < period - 1`.
pub fn bollinger(values: &[f64], period: usize, mult: f64) -> Vec<Option<BollingerBand>> {
    let mut res = Vec::with_capacity(values.len());
    if period == 0 {
        res.resize(values.len(), None);
        return res;
    }
    for i in 0..values.len() {
        if i + 1 < period {
            res.push(None);
            continue;
        }
        let window = &values[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
        let std = variance.sqrt();
        res.push(Some(BollingerBand {
            upper: mean + mult * std,
            middle: mean,
            lower: mean - mult * std,
        }));
    }
    res
}

/// MACD: EMA(fast) − EMA(slow), with an EMA(signal) of that difference.
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let ema_fast = exponential_moving_average(values, fast);
    let ema_slow = exponential_moving_average(values, slow);
    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = exponential_moving_average(&macd_line, signal);
    let histogram: Vec<f64> = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| m - s)
        .collect();
    Macd {
        macd_line,
        signal_line,
        histogram,
    }
}

/// Average true range, Wilder-smoothed.
///
/// True range needs a previous close, so the first defined value is at
/// index `period`: the simple average of the first `period` true ranges,
/// followed by the Wilder recurrence.
pub fn atr(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    if period == 0 || candles.len() < period + 1 {
        return vec![None; candles.len()];
    }

    let tr: Vec<f64> = candles
        .windows(2)
        .map(|pair| {
            let prev_close = pair[0].close;
            let c = &pair[1];
            (c.high - c.low)
                .max((c.high - prev_close).abs())
                .max((c.low - prev_close).abs())
        })
        .collect();

    let mut res = vec![None; candles.len()];
    let mut value = tr[..period].iter().sum::<f64>() / period as f64;
    res[period] = Some(value);
    for i in (period + 1)..candles.len() {
        value = (value * (period as f64 - 1.0) + tr[i - 1]) / period as f64;
        res[i] = Some(value);
    }
    res
}

/// Population standard deviation of the trailing `period` closes.
///
/// Returns 0.0 when there is not enough history.
pub fn rolling_volatility(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period {
        return 0.0;
    }
    let window = &closes[closes.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
    variance.sqrt()
}
