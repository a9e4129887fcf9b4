//! Candlestick pattern recognition.
//!
//! The classifier walks a fixed-priority cascade of predicates over the
//! last three to five candles; the first match wins and carries a fixed
//! strength constant and directional signal. The order is part of the
//! observable behavior — two candles that satisfy several predicates must
//! always classify as the earliest one — so the cascade below is never
//! reordered or "sorted by strength".

use serde::{Deserialize, Serialize};

use crate::models::candle::Candle;

/// Directional reading of a recognized pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternSignal {
    Bullish,
    Bearish,
    StrongBullish,
    StrongBearish,
    Neutral,
    ReversalPending,
}

impl PatternSignal {
    /// True for plain or strong bullish readings.
    pub fn is_bullish(&self) -> bool {
        matches!(self, PatternSignal::Bullish | PatternSignal::StrongBullish)
    }

    /// True for plain or strong bearish readings.
    pub fn is_bearish(&self) -> bool {
        matches!(self, PatternSignal::Bearish | PatternSignal::StrongBearish)
    }
}

/// Every pattern the cascade can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternName {
    None,
    Doji,
    Hammer,
    ShootingStar,
    BullishEngulfing,
    BearishEngulfing,
    ThreeWhiteSoldiers,
    ThreeBlackCrows,
    MorningStar,
    EveningStar,
    PiercingPattern,
    DarkCloudCover,
    BullishHarami,
    BearishHarami,
    TweezerBottom,
    TweezerTop,
    HangingMan,
    InvertedHammer,
    DragonflyDoji,
    GravestoneDoji,
    LongLeggedDoji,
    BullishMarubozu,
    BearishMarubozu,
    SpinningTop,
    ThreeInsideUp,
    ThreeInsideDown,
    ThreeOutsideUp,
    ThreeOutsideDown,
    RisingThreeMethods,
    FallingThreeMethods,
    AbandonedBabyBullish,
    AbandonedBabyBearish,
    UpsideGapTwoCrows,
    MatHold,
    BullishBeltHold,
    BearishBeltHold,
    BreakawayBullish,
    KickingBullish,
    KickingBearish,
    LadderBottom,
    LadderTop,
    ConcealingBabySwallow,
    StickSandwich,
    HomingPigeon,
    MatchingLow,
    Deliberation,
    AdvanceBlock,
}

impl PatternName {
    /// Display name used in decision reason strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternName::None => "NONE",
            PatternName::Doji => "DOJI",
            PatternName::Hammer => "HAMMER",
            PatternName::ShootingStar => "SHOOTING_STAR",
            PatternName::BullishEngulfing => "BULLISH_ENGULFING",
            PatternName::BearishEngulfing => "BEARISH_ENGULFING",
            PatternName::ThreeWhiteSoldiers => "THREE_WHITE_SOLDIERS",
            PatternName::ThreeBlackCrows => "THREE_BLACK_CROWS",
            PatternName::MorningStar => "MORNING_STAR",
            PatternName::EveningStar => "EVENING_STAR",
            PatternName::PiercingPattern => "PIERCING_PATTERN",
            PatternName::DarkCloudCover => "DARK_CLOUD_COVER",
            PatternName::BullishHarami => "BULLISH_HARAMI",
            PatternName::BearishHarami => "BEARISH_HARAMI",
            PatternName::TweezerBottom => "TWEEZER_BOTTOM",
            PatternName::TweezerTop => "TWEEZER_TOP",
            PatternName::HangingMan => "HANGING_MAN",
            PatternName::InvertedHammer => "INVERTED_HAMMER",
            PatternName::DragonflyDoji => "DRAGONFLY_DOJI",
            PatternName::GravestoneDoji => "GRAVESTONE_DOJI",
            PatternName::LongLeggedDoji => "LONG_LEGGED_DOJI",
            PatternName::BullishMarubozu => "BULLISH_MARUBOZU",
            PatternName::BearishMarubozu => "BEARISH_MARUBOZU",
            PatternName::SpinningTop => "SPINNING_TOP",
            PatternName::ThreeInsideUp => "THREE_INSIDE_UP",
            PatternName::ThreeInsideDown => "THREE_INSIDE_DOWN",
            PatternName::ThreeOutsideUp => "THREE_OUTSIDE_UP",
            PatternName::ThreeOutsideDown => "THREE_OUTSIDE_DOWN",
            PatternName::RisingThreeMethods => "RISING_THREE_METHODS",
            PatternName::FallingThreeMethods => "FALLING_THREE_METHODS",
            PatternName::AbandonedBabyBullish => "ABANDONED_BABY_BULLISH",
            PatternName::AbandonedBabyBearish => "ABANDONED_BABY_BEARISH",
            PatternName::UpsideGapTwoCrows => "UPSIDE_GAP_TWO_CROWS",
            PatternName::MatHold => "MAT_HOLD",
            PatternName::BullishBeltHold => "BULLISH_BELT_HOLD",
            PatternName::BearishBeltHold => "BEARISH_BELT_HOLD",
            PatternName::BreakawayBullish => "BREAKAWAY_BULLISH",
            PatternName::KickingBullish => "KICKING_BULLISH",
            PatternName::KickingBearish => "KICKING_BEARISH",
            PatternName::LadderBottom => "LADDER_BOTTOM",
            PatternName::LadderTop => "LADDER_TOP",
            PatternName::ConcealingBabySwallow => "CONCEALING_BABY_SWALLOW",
            PatternName::StickSandwich => "STICK_SANDWICH",
            PatternName::HomingPigeon => "HOMING_PIGEON",
            PatternName::MatchingLow => "MATCHING_LOW",
            PatternName::Deliberation => "DELIBERATION",
            PatternName::AdvanceBlock => "ADVANCE_BLOCK",
        }
    }
}

/// Outcome of one classification pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternResult {
    pub name: PatternName,
    pub strength: f64,
    pub signal: PatternSignal,
}

impl PatternResult {
    fn none() -> Self {
        Self {
            name: PatternName::None,
            strength: 0.0,
            signal: PatternSignal::Neutral,
        }
    }
}

fn hit(name: PatternName, strength: f64, signal: PatternSignal) -> PatternResult {
    PatternResult {
        name,
        strength,
        signal,
    }
}

/// A guard inherited from the strategy's published rule set in which the
/// negation binds to the close price alone, so the test reduces to
/// `(close == 0.0 ? 1.0 : 0.0) > open` and cannot pass for a positive
/// open. Probably a dead branch; kept literally so the cascade order and
/// the rule set stay intact.
fn negated_close_exceeds_open(c: &Candle) -> bool {
    let coerced = if c.close == 0.0 { 1.0 } else { 0.0 };
    coerced > c.open
}

/// Classifies the last up-to-five candles into a named pattern.
///
/// Fewer than three candles classifies as `NONE` with zero strength; the
/// five-candle predicates only arm once five candles exist.
pub fn identify_pattern(candles: &[Candle]) -> PatternResult {
    if candles.len() < 3 {
        return PatternResult::none();
    }

    let c1 = &candles[candles.len() - 3];
    let c2 = &candles[candles.len() - 2];
    let c3 = &candles[candles.len() - 1];
    // Oldest two bars of the five-candle formations.
    let five = if candles.len() >= 5 {
        Some((&candles[candles.len() - 5], &candles[candles.len() - 4]))
    } else {
        None
    };

    let (body1, body2, body3) = (c1.body(), c2.body(), c3.body());
    let (range2, range3) = (c2.range(), c3.range());
    let (upper1, upper2, upper3) = (c1.upper_wick(), c2.upper_wick(), c3.upper_wick());
    let lower3 = c3.lower_wick();
    let (bull1, bull2, bull3) = (c1.is_bullish(), c2.is_bullish(), c3.is_bullish());

    // Single-candle formations on the latest bar.
    if body3 < range3 * 0.1 && range3 > 0.0 {
        return hit(PatternName::Doji, 0.7, PatternSignal::ReversalPending);
    }
    if lower3 > body3 * 2.0 && upper3 < body3 * 0.3 && bull3 {
        return hit(PatternName::Hammer, 0.8, PatternSignal::Bullish);
    }
    if upper3 > body3 * 2.0 && lower3 < body3 * 0.3 && !bull3 {
        return hit(PatternName::ShootingStar, 0.8, PatternSignal::Bearish);
    }

    // Two-candle engulfing.
    if !bull2 && bull3 && c3.open < c2.close && c3.close > c2.open && body3 > body2 * 1.2 {
        return hit(PatternName::BullishEngulfing, 0.85, PatternSignal::Bullish);
    }
    if bull2 && !bull3 && c3.open > c2.close && c3.close < c2.open && body3 > body2 * 1.2 {
        return hit(PatternName::BearishEngulfing, 0.85, PatternSignal::Bearish);
    }

    // Three-candle marches.
    if bull1 && bull2 && bull3 && c2.close > c1.close && c3.close > c2.close {
        return hit(
            PatternName::ThreeWhiteSoldiers,
            0.9,
            PatternSignal::StrongBullish,
        );
    }
    if !bull1 && !bull2 && !bull3 && c2.close < c1.close && c3.close < c2.close {
        return hit(
            PatternName::ThreeBlackCrows,
            0.9,
            PatternSignal::StrongBearish,
        );
    }

    // Star reversals.
    if !bull1
        && body2 < range2 * 0.3
        && bull3
        && c2.close < c1.close
        && c3.close > (c1.open + c1.close) / 2.0
    {
        return hit(PatternName::MorningStar, 0.88, PatternSignal::StrongBullish);
    }
    if bull1
        && body2 < range2 * 0.3
        && !bull3
        && c2.close > c1.close
        && c3.close < (c1.open + c1.close) / 2.0
    {
        return hit(PatternName::EveningStar, 0.88, PatternSignal::StrongBearish);
    }

    if !bull2
        && bull3
        && c3.open < c2.low
        && c3.close > (c2.open + c2.close) / 2.0
        && c3.close < c2.open
    {
        return hit(PatternName::PiercingPattern, 0.82, PatternSignal::Bullish);
    }
    if bull2
        && !bull3
        && c3.open > c2.high
        && c3.close < (c2.open + c2.close) / 2.0
        && c3.close > c2.open
    {
        return hit(PatternName::DarkCloudCover, 0.82, PatternSignal::Bearish);
    }

    if !bull2 && bull3 && c3.open > c2.close && c3.close < c2.open && body3 < body2 * 0.5 {
        return hit(PatternName::BullishHarami, 0.75, PatternSignal::Bullish);
    }
    if bull2 && !bull3 && c3.open < c2.close && c3.close > c2.open && body3 < body2 * 0.5 {
        return hit(PatternName::BearishHarami, 0.75, PatternSignal::Bearish);
    }

    if !bull2 && bull3 && (c2.low - c3.low).abs() < range2 * 0.05 {
        return hit(PatternName::TweezerBottom, 0.78, PatternSignal::Bullish);
    }
    if bull2 && !bull3 && (c2.high - c3.high).abs() < range2 * 0.05 {
        return hit(PatternName::TweezerTop, 0.78, PatternSignal::Bearish);
    }

    if lower3 > body3 * 2.0 && upper3 < body3 * 0.5 && bull3 && c3.close > c2.close {
        return hit(PatternName::HangingMan, 0.76, PatternSignal::Bearish);
    }
    if upper3 > body3 * 2.0 && lower3 < body3 * 0.5 && bull3 && c3.close < c2.close {
        return hit(PatternName::InvertedHammer, 0.76, PatternSignal::Bullish);
    }

    // Doji refinements. The plain doji above already claims any body under
    // 10% of range, so these three are shadowed and probably dead; kept in
    // place so the cascade order stays fixed.
    if body3 < range3 * 0.1 && lower3 > range3 * 0.6 && upper3 < range3 * 0.1 {
        return hit(PatternName::DragonflyDoji, 0.77, PatternSignal::Bullish);
    }
    if body3 < range3 * 0.1 && upper3 > range3 * 0.6 && lower3 < range3 * 0.1 {
        return hit(PatternName::GravestoneDoji, 0.77, PatternSignal::Bearish);
    }
    if body3 < range3 * 0.1 && lower3 > range3 * 0.3 && upper3 > range3 * 0.3 {
        return hit(
            PatternName::LongLeggedDoji,
            0.72,
            PatternSignal::ReversalPending,
        );
    }

    if bull3 && body3 > range3 * 0.95 {
        return hit(
            PatternName::BullishMarubozu,
            0.83,
            PatternSignal::StrongBullish,
        );
    }
    if !bull3 && body3 > range3 * 0.95 {
        return hit(
            PatternName::BearishMarubozu,
            0.83,
            PatternSignal::StrongBearish,
        );
    }

    if body3 < range3 * 0.3 && upper3 > body3 && lower3 > body3 {
        return hit(PatternName::SpinningTop, 0.65, PatternSignal::Neutral);
    }

    if !bull1
        && !bull2
        && bull3
        && c2.open > c1.close
        && c2.close < c1.open
        && c3.close > c1.open
        && body2 < body1 * 0.5
    {
        return hit(
            PatternName::ThreeInsideUp,
            0.86,
            PatternSignal::StrongBullish,
        );
    }
    if bull1
        && bull2
        && !bull3
        && c2.open < c1.close
        && c2.close > c1.open
        && c3.close < c1.open
        && body2 < body1 * 0.5
    {
        return hit(
            PatternName::ThreeInsideDown,
            0.86,
            PatternSignal::StrongBearish,
        );
    }

    if !bull1
        && !bull2
        && bull3
        && c2.open < c1.close
        && c2.close > c1.open
        && c3.close > c2.close
        && body2 > body1
    {
        return hit(
            PatternName::ThreeOutsideUp,
            0.87,
            PatternSignal::StrongBullish,
        );
    }
    if bull1
        && bull2
        && !bull3
        && c2.open > c1.close
        && c2.close < c1.open
        && c3.close < c2.close
        && body2 > body1
    {
        return hit(
            PatternName::ThreeOutsideDown,
            0.87,
            PatternSignal::StrongBearish,
        );
    }

    if let Some((c0, _c4)) = five {
        if c0.is_bullish() && bull3 && !bull1 && !bull2 && c3.close > c0.close && c1.high < c0.high
        {
            return hit(
                PatternName::RisingThreeMethods,
                0.84,
                PatternSignal::Bullish,
            );
        }
    }
    if let Some((c0, _c4)) = five {
        if !c0.is_bullish() && !bull3 && bull1 && bull2 && c3.close < c0.close && c1.low > c0.low {
            return hit(
                PatternName::FallingThreeMethods,
                0.84,
                PatternSignal::Bearish,
            );
        }
    }

    if !bull1 && body2 < range2 * 0.2 && bull3 && c2.high < c1.low && c2.high < c3.low {
        return hit(
            PatternName::AbandonedBabyBullish,
            0.92,
            PatternSignal::StrongBullish,
        );
    }
    if bull1 && body2 < range2 * 0.2 && !bull3 && c2.low > c1.high && c2.low > c3.high {
        return hit(
            PatternName::AbandonedBabyBearish,
            0.92,
            PatternSignal::StrongBearish,
        );
    }

    if bull1 && !bull2 && !bull3 && c2.open > c1.close && c3.open > c2.open && c3.close < c2.close
    {
        return hit(PatternName::UpsideGapTwoCrows, 0.79, PatternSignal::Bearish);
    }

    if let Some((c0, _c4)) = five {
        if c0.is_bullish() && bull3 && !bull1 && c3.close > c0.close {
            return hit(PatternName::MatHold, 0.81, PatternSignal::Bullish);
        }
    }

    if bull3 && lower3 < body3 * 0.1 && body3 > range3 * 0.7 {
        return hit(PatternName::BullishBeltHold, 0.74, PatternSignal::Bullish);
    }
    if !bull3 && upper3 < body3 * 0.1 && body3 > range3 * 0.7 {
        return hit(PatternName::BearishBeltHold, 0.74, PatternSignal::Bearish);
    }

    if let Some((c0, _c4)) = five {
        if negated_close_exceeds_open(c0) && bull3 && c3.close > c0.open {
            return hit(PatternName::BreakawayBullish, 0.80, PatternSignal::Bullish);
        }
    }

    if !bull2 && bull3 && body2 > range2 * 0.9 && body3 > range3 * 0.9 && c3.open > c2.close {
        return hit(
            PatternName::KickingBullish,
            0.89,
            PatternSignal::StrongBullish,
        );
    }
    if bull2 && !bull3 && body2 > range2 * 0.9 && body3 > range3 * 0.9 && c3.open < c2.close {
        return hit(
            PatternName::KickingBearish,
            0.89,
            PatternSignal::StrongBearish,
        );
    }

    if let Some((c0, c4)) = five {
        if negated_close_exceeds_open(c0)
            && negated_close_exceeds_open(c4)
            && !bull1
            && !bull2
            && bull3
            && c3.close > c2.open
        {
            return hit(PatternName::LadderBottom, 0.85, PatternSignal::Bullish);
        }
    }
    if let Some((c0, c4)) = five {
        if c0.is_bullish()
            && c4.is_bullish()
            && bull1
            && bull2
            && !bull3
            && c3.close < c2.open
        {
            return hit(PatternName::LadderTop, 0.85, PatternSignal::Bearish);
        }
    }

    if !bull1 && !bull2 && !bull3 && c2.open < c1.open && c3.open > c2.close && c3.close > c2.open
    {
        return hit(
            PatternName::ConcealingBabySwallow,
            0.83,
            PatternSignal::Bullish,
        );
    }

    if !bull1 && bull2 && !bull3 && (c1.close - c3.close).abs() < body1 * 0.1 {
        return hit(PatternName::StickSandwich, 0.73, PatternSignal::Bullish);
    }

    if !bull2 && !bull3 && c3.open < c2.open && c3.close > c2.close && body3 < body2 * 0.7 {
        return hit(PatternName::HomingPigeon, 0.71, PatternSignal::Bullish);
    }

    if !bull2 && !bull3 && (c2.close - c3.close).abs() < body2 * 0.1 {
        return hit(PatternName::MatchingLow, 0.70, PatternSignal::Bullish);
    }

    if bull1 && bull2 && bull3 && body3 < body2 && body2 < body1 && c3.close > c2.close {
        return hit(PatternName::Deliberation, 0.76, PatternSignal::Bearish);
    }

    if bull1
        && bull2
        && bull3
        && body2 < body1
        && body3 < body2
        && upper2 > upper1
        && upper3 > upper2
    {
        return hit(PatternName::AdvanceBlock, 0.78, PatternSignal::Bearish);
    }

    PatternResult::none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            open,
            high,
            low,
            close,
            epoch: 0,
            volume: None,
        }
    }

    /// A featureless bar that matches nothing on its own: modest body,
    /// modest wicks on both sides.
    fn plain_bearish(level: f64) -> Candle {
        candle(level + 0.4, level + 0.6, level - 0.6, level - 0.4)
    }

    #[test]
    fn too_few_candles_is_none() {
        let candles = vec![candle(1.0, 2.0, 0.5, 1.5); 2];
        let result = identify_pattern(&candles);
        assert_eq!(result.name, PatternName::None);
        assert_eq!(result.strength, 0.0);
        assert_eq!(result.signal, PatternSignal::Neutral);
    }

    #[test]
    fn textbook_bullish_engulfing() {
        // c2 bearish, c3 bullish with a body engulfing c2's by well over 20%.
        let candles = vec![
            plain_bearish(100.0),
            candle(100.0, 100.2, 99.0, 99.2), // bearish, body 0.8
            candle(99.0, 101.6, 98.9, 101.5), // bullish, body 2.5, opens below c2 close, closes above c2 open
        ];
        let result = identify_pattern(&candles);
        assert_eq!(result.name, PatternName::BullishEngulfing);
        assert_eq!(result.strength, 0.85);
        assert_eq!(result.signal, PatternSignal::Bullish);
    }

    #[test]
    fn doji_wins_before_lower_priority_patterns() {
        // Tiny body, long symmetric wicks: matches doji first even though
        // the long-legged doji predicate would also hold further down.
        let candles = vec![
            plain_bearish(100.0),
            plain_bearish(100.0),
            candle(100.0, 101.0, 99.0, 100.05),
        ];
        let result = identify_pattern(&candles);
        assert_eq!(result.name, PatternName::Doji);
        assert_eq!(result.signal, PatternSignal::ReversalPending);
    }

    #[test]
    fn three_white_soldiers_beats_marubozu() {
        // Three full-bodied rising bulls: both predicates hold, the
        // soldiers sit earlier in the cascade.
        let candles = vec![
            candle(100.0, 101.02, 99.98, 101.0),
            candle(101.0, 102.02, 100.98, 102.0),
            candle(102.0, 103.02, 101.98, 103.0),
        ];
        let result = identify_pattern(&candles);
        assert_eq!(result.name, PatternName::ThreeWhiteSoldiers);
        assert_eq!(result.signal, PatternSignal::StrongBullish);
    }

    #[test]
    fn shooting_star_on_bearish_upper_wick() {
        let candles = vec![
            plain_bearish(100.0),
            plain_bearish(100.0),
            // Bearish, small body, long upper wick, almost no lower wick.
            candle(100.0, 101.8, 99.55, 99.6),
        ];
        let result = identify_pattern(&candles);
        assert_eq!(result.name, PatternName::ShootingStar);
        assert_eq!(result.signal, PatternSignal::Bearish);
    }

    #[test]
    fn dead_breakaway_guard_never_fires_on_positive_prices() {
        // Five bars engineered to satisfy every breakaway term except the
        // coerced-negation guard, which cannot pass for positive opens.
        let candles = vec![
            candle(100.0, 100.3, 98.9, 99.0), // c0 bearish
            plain_bearish(99.0),
            plain_bearish(99.0),
            plain_bearish(99.0),
            candle(99.0, 102.2, 98.0, 102.0), // strong bull closing above c0 open
        ];
        let result = identify_pattern(&candles);
        assert_eq!(result.name, PatternName::None);
    }

    #[test]
    fn classification_is_deterministic() {
        let candles = vec![
            candle(100.0, 100.9, 99.1, 99.4),
            candle(99.4, 99.9, 98.6, 98.8),
            candle(98.8, 100.7, 98.7, 100.5),
        ];
        assert_eq!(identify_pattern(&candles), identify_pattern(&candles));
    }
}
