//! Market mood and temporal trading context.
//!
//! Mood blends the up/down move ratio with volume-weighted candle
//! direction over the recent window. The temporal context is a static
//! lookup over hour-of-day and day-of-week (UTC) — session boundaries are
//! fixed, nothing here is learned.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::candle::Candle;

/// Directional sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoodLabel {
    Bullish,
    Bearish,
    Neutral,
}

impl MoodLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoodLabel::Bullish => "BULLISH",
            MoodLabel::Bearish => "BEARISH",
            MoodLabel::Neutral => "NEUTRAL",
        }
    }
}

/// Aggregate sentiment over the recent candle window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketMood {
    pub label: MoodLabel,
    /// Normalized strength in [0, 1].
    pub strength: f64,
    /// The raw composite ratio the label was derived from.
    pub ratio: f64,
}

impl MarketMood {
    fn neutral() -> Self {
        Self {
            label: MoodLabel::Neutral,
            strength: 0.0,
            ratio: 0.5,
        }
    }
}

/// Number of recent candles the volume-weighted sentiment looks at.
const MOOD_WINDOW: usize = 20;

/// Composite ratio above which the mood reads bullish.
const BULLISH_THRESHOLD: f64 = 0.62;

/// Composite ratio below which the mood reads bearish.
const BEARISH_THRESHOLD: f64 = 0.38;

/// Computes the market mood from the candle window.
///
/// Blends the up/down move ratio over the whole window (60% weight) with
/// volume-weighted candle direction over the last twenty candles (40%).
/// Fewer than ten candles reads as neutral with zero strength.
pub fn market_mood(candles: &[Candle]) -> MarketMood {
    if candles.len() < 10 {
        return MarketMood::neutral();
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let mut up_moves = 0usize;
    let mut down_moves = 0usize;
    for pair in closes.windows(2) {
        if pair[1] > pair[0] {
            up_moves += 1;
        } else if pair[1] < pair[0] {
            down_moves += 1;
        }
    }
    let total_moves = (up_moves + down_moves).max(1);
    let mood_ratio = up_moves as f64 / total_moves as f64;

    let recent_start = candles.len().saturating_sub(MOOD_WINDOW);
    let recent = &candles[recent_start..];
    let mut volume_weighted_sentiment = 0.0;
    for (i, candle) in recent.iter().enumerate() {
        if i == 0 {
            continue;
        }
        let direction = if candle.is_bullish() { 1.0 } else { -1.0 };
        let volume_weight = candle.volume.unwrap_or(1.0);
        volume_weighted_sentiment += direction * volume_weight;
    }
    let normalized_sentiment = volume_weighted_sentiment / recent.len() as f64;

    let composite = mood_ratio * 0.6 + (normalized_sentiment + 1.0) / 2.0 * 0.4;

    let (label, strength) = if composite > BULLISH_THRESHOLD {
        (
            MoodLabel::Bullish,
            (composite - BULLISH_THRESHOLD) / (1.0 - BULLISH_THRESHOLD),
        )
    } else if composite < BEARISH_THRESHOLD {
        (
            MoodLabel::Bearish,
            (BEARISH_THRESHOLD - composite) / BEARISH_THRESHOLD,
        )
    } else {
        (MoodLabel::Neutral, 1.0 - (composite - 0.5).abs() * 2.0)
    };

    MarketMood {
        label,
        strength: strength.min(1.0),
        ratio: composite,
    }
}

/// Trading session label derived from the UTC hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Session {
    Asian,
    London,
    Us,
}

impl Session {
    pub fn as_str(&self) -> &'static str {
        match self {
            Session::Asian => "ASIAN",
            Session::London => "LONDON",
            Session::Us => "US",
        }
    }
}

/// Liquidity and volatility expectations for the current clock time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalContext {
    pub hour: u32,
    /// 0 = Sunday … 6 = Saturday.
    pub day_of_week: u32,
    pub liquidity_score: f64,
    pub volatility_expectation: f64,
    pub confidence_modifier: f64,
    pub session: Session,
}

/// Derives the temporal context from a UTC timestamp.
///
/// Fixed boundaries: dead hours 00–03 cut liquidity, the Asian overnight
/// (23–08) lowers expected volatility, the London open (hour 8) spikes it,
/// the US session (13–21) raises both, weekends and hour transitions
/// (minute < 5 or > 55) shave confidence.
pub fn temporal_context(now: DateTime<Utc>) -> TemporalContext {
    let hour = now.hour();
    let minute = now.minute();
    let day_of_week = now.weekday().num_days_from_sunday();

    let mut liquidity_score = 1.0;
    let mut volatility_expectation = 1.0;
    let mut confidence_modifier = 1.0;

    if hour < 3 {
        liquidity_score = 0.6;
        confidence_modifier = 0.85;
    }
    if hour >= 23 || hour < 8 {
        volatility_expectation = 0.8;
    }
    if hour == 8 {
        volatility_expectation = 1.4;
    }
    if (13..=21).contains(&hour) {
        liquidity_score = 1.2;
        volatility_expectation = 1.3;
    }

    if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
        liquidity_score *= 0.7;
        confidence_modifier *= 0.9;
    }

    if minute < 5 || minute > 55 {
        confidence_modifier *= 0.95;
    }

    let session = if (13..=21).contains(&hour) {
        Session::Us
    } else if (8..13).contains(&hour) {
        Session::London
    } else {
        Session::Asian
    };

    TemporalContext {
        hour,
        day_of_week,
        liquidity_score,
        volatility_expectation,
        confidence_modifier,
        session,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle(open: f64, close: f64, volume: Option<f64>) -> Candle {
        Candle {
            open,
            high: open.max(close) + 0.1,
            low: open.min(close) - 0.1,
            close,
            epoch: 0,
            volume,
        }
    }

    fn at(hour: u32, minute: u32, day: u32) -> DateTime<Utc> {
        // June 2026: the 1st is a Monday, so day N of June falls on
        // weekday (N - 1) % 7 counting from Monday.
        Utc.with_ymd_and_hms(2026, 6, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn too_few_candles_is_neutral() {
        let candles: Vec<Candle> = (0..5).map(|_| candle(100.0, 101.0, None)).collect();
        let mood = market_mood(&candles);
        assert_eq!(mood.label, MoodLabel::Neutral);
        assert_eq!(mood.strength, 0.0);
    }

    #[test]
    fn steady_climb_reads_bullish() {
        let candles: Vec<Candle> = (0..30)
            .map(|i| candle(100.0 + i as f64, 101.0 + i as f64, Some(1.0)))
            .collect();
        let mood = market_mood(&candles);
        assert_eq!(mood.label, MoodLabel::Bullish);
        assert!(mood.strength > 0.5);
        assert!(mood.ratio > BULLISH_THRESHOLD);
    }

    #[test]
    fn steady_fall_reads_bearish() {
        let candles: Vec<Candle> = (0..30)
            .map(|i| candle(100.0 - i as f64 * 0.5, 99.5 - i as f64 * 0.5, Some(1.0)))
            .collect();
        let mood = market_mood(&candles);
        assert_eq!(mood.label, MoodLabel::Bearish);
        assert!(mood.strength > 0.5);
    }

    #[test]
    fn strength_never_exceeds_one() {
        // Heavy volume exaggerates the sentiment term; strength must clamp.
        let candles: Vec<Candle> = (0..30)
            .map(|i| candle(100.0 + i as f64, 101.0 + i as f64, Some(50.0)))
            .collect();
        let mood = market_mood(&candles);
        assert!(mood.strength <= 1.0);
    }

    #[test]
    fn us_session_hours() {
        // Tuesday 15:30 UTC.
        let ctx = temporal_context(at(15, 30, 2));
        assert_eq!(ctx.session, Session::Us);
        assert_eq!(ctx.liquidity_score, 1.2);
        assert_eq!(ctx.volatility_expectation, 1.3);
        assert_eq!(ctx.confidence_modifier, 1.0);
    }

    #[test]
    fn london_open_spikes_volatility() {
        let ctx = temporal_context(at(8, 30, 2));
        assert_eq!(ctx.session, Session::London);
        assert_eq!(ctx.volatility_expectation, 1.4);
    }

    #[test]
    fn dead_hours_cut_liquidity_and_confidence() {
        let ctx = temporal_context(at(1, 30, 2));
        assert_eq!(ctx.session, Session::Asian);
        assert_eq!(ctx.liquidity_score, 0.6);
        assert_eq!(ctx.confidence_modifier, 0.85);
        // Overnight hours also carry the Asian volatility discount.
        assert_eq!(ctx.volatility_expectation, 0.8);
    }

    #[test]
    fn weekend_penalties_stack() {
        // Saturday 6 June 2026, mid-US-session hour.
        let ctx = temporal_context(at(15, 30, 6));
        assert_eq!(ctx.day_of_week, 6);
        assert!((ctx.liquidity_score - 1.2 * 0.7).abs() < 1e-12);
        assert!((ctx.confidence_modifier - 0.9).abs() < 1e-12);
    }

    #[test]
    fn hour_transition_shaves_confidence() {
        let ctx = temporal_context(at(15, 58, 2));
        assert!((ctx.confidence_modifier - 0.95).abs() < 1e-12);
    }
}
