//! Signal fusion and the per-cycle decision.
//!
//! Each cycle fuses the weighted indicator signals, the recognized
//! pattern, tick micro-structure and market mood into one composite
//! scalar, derives an action from adaptive thresholds, then routes it
//! through the multi-stage confirmation pipeline. The function here is
//! state-free: it consumes the session-wide weights, regime and agent and
//! returns a fully annotated [`Decision`]; the session owns all mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::context::{MarketMood, MoodLabel, TemporalContext, market_mood, temporal_context};
use crate::analysis::indicators::{
    BollingerBand, atr, bollinger, macd, moving_average, rolling_volatility, rsi,
};
use crate::analysis::micro::{MicroPrediction, MicroStructure, analyze_micro_structure};
use crate::analysis::patterns::{PatternResult, identify_pattern};
use crate::analysis::regime::{MIN_CANDLES, Regime, RegimeKind};
use crate::engine::confirm::{ConfirmInputs, confirm_decision};
use crate::engine::weights::EffectiveWeights;
use crate::history::{LastTradeSnapshot, TradeRecord, win_rate};
use crate::models::candle::{Candle, Tick};

/// Fixed weight applied to the MACD histogram signal.
const MACD_WEIGHT: f64 = 0.8;

/// Below this rolling volatility there is no edge worth trading.
const VOLATILITY_FLOOR: f64 = 0.002;

/// Base composite-signal threshold before the environment multiplier.
const BASE_THRESHOLD: f64 = 2.0;

/// Composite level at which an action escalates to its STRONG variant.
const STRONG_THRESHOLD: f64 = 4.0;

/// The action a decision cycle can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "HOLD")]
    Hold,
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "STRONG BUY")]
    StrongBuy,
    #[serde(rename = "STRONG SELL")]
    StrongSell,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Hold => "HOLD",
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::StrongBuy => "STRONG BUY",
            Action::StrongSell => "STRONG SELL",
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Action::Buy | Action::StrongBuy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, Action::Sell | Action::StrongSell)
    }

    pub fn is_strong(&self) -> bool {
        matches!(self, Action::StrongBuy | Action::StrongSell)
    }

    /// STRONG variants fall back to their plain counterpart.
    pub fn downgraded(&self) -> Action {
        match self {
            Action::StrongBuy => Action::Buy,
            Action::StrongSell => Action::Sell,
            other => *other,
        }
    }
}

/// Coarse trend read of the pre-decision environment analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentTrend {
    Undefined,
    Uptrend,
    Downtrend,
    Sideways,
}

/// Layered pre-decision environment: trend, alignment and noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub trend: EnvironmentTrend,
    pub strength: f64,
    /// How aligned the individual indicator reads are, in [0, 1].
    pub clarity: f64,
    pub noise: f64,
}

/// The indicator values the decision was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub ma14: f64,
    pub ma50: f64,
    pub rsi: f64,
    pub bollinger: BollingerBand,
    pub volatility: f64,
    pub atr: Option<f64>,
    pub macd_histogram: f64,
    pub pattern: PatternResult,
    pub micro: MicroStructure,
}

/// Active-agent identity and rolling stats carried on the decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStats {
    pub name: String,
    pub win_rate: f64,
    pub trades: u32,
}

/// One fully annotated decision-cycle output.
#[derive(Debug, Clone)]
pub struct Decision {
    pub action: Action,
    pub reason: String,
    pub confidence: f64,
    pub composite_signal: f64,
    pub indicators: Option<IndicatorSnapshot>,
    pub regime: Regime,
    pub mood: MarketMood,
    pub temporal: TemporalContext,
    pub environment: Option<Environment>,
    pub agent: AgentStats,
    pub weights: EffectiveWeights,
    pub adjustments: Vec<String>,
}

/// Everything a decision cycle reads; owned state stays in the session.
pub struct CycleContext<'a> {
    pub candles: &'a [Candle],
    pub ticks: &'a [Tick],
    pub weights: EffectiveWeights,
    pub regime: Regime,
    /// Newest-first recent trades (the engine looks at the newest 20).
    pub recent_trades: &'a [TradeRecord],
    pub last_trade: Option<&'a LastTradeSnapshot>,
    pub agent: AgentStats,
    pub now: DateTime<Utc>,
}

impl Decision {
    fn hold(reason: &str, ctx: &CycleContext<'_>) -> Self {
        Self {
            action: Action::Hold,
            reason: reason.to_string(),
            confidence: 0.0,
            composite_signal: 0.0,
            indicators: None,
            regime: ctx.regime,
            mood: market_mood(ctx.candles),
            temporal: temporal_context(ctx.now),
            environment: None,
            agent: ctx.agent.clone(),
            weights: ctx.weights,
            adjustments: Vec::new(),
        }
    }
}

/// Runs one decision cycle.
///
/// Requires at least 50 candles; anything less degrades to HOLD with zero
/// confidence rather than guessing from thin history.
pub fn evaluate_cycle(ctx: &CycleContext<'_>) -> Decision {
    if ctx.candles.len() < MIN_CANDLES {
        return Decision::hold("Insufficient data", ctx);
    }

    let closes: Vec<f64> = ctx.candles.iter().map(|c| c.close).collect();
    let ma14 = moving_average(&closes, 14);
    let ma50 = moving_average(&closes, 50);
    let rsi14 = rsi(&closes, 14);
    let bb = bollinger(&closes, 20, 2.0);
    let macd_out = macd(&closes, 12, 26, 9);
    let volatility = rolling_volatility(&closes, 20);
    let atr14 = atr(ctx.candles, 14);

    let mood = market_mood(ctx.candles);
    let temporal = temporal_context(ctx.now);
    let pattern = identify_pattern(ctx.candles);
    let last_candle = &ctx.candles[ctx.candles.len() - 1];
    let micro = analyze_micro_structure(ctx.ticks, last_candle);

    let price = closes[closes.len() - 1];
    let prev_price = closes[closes.len() - 2];
    let (Some(ma14_now), Some(ma50_now), Some(bb_now)) = (
        ma14.last().copied().flatten(),
        ma50.last().copied().flatten(),
        bb.last().copied().flatten(),
    ) else {
        return Decision::hold("Indicators not ready", ctx);
    };
    let rsi_now = rsi14.last().copied().flatten().unwrap_or(50.0);
    let macd_now = *macd_out
        .histogram
        .last()
        .expect("histogram aligned with closes");
    let atr_now = atr14.last().copied().flatten();

    let environment = pre_decision_analysis(price, ma14_now, ma50_now, rsi_now, &bb_now, volatility);

    // Weighted signal contributions.
    let trend_signal = if price > ma14_now { 1.0 } else { -1.0 } * ctx.weights.ma;
    let momentum_signal = (price - prev_price) / prev_price * 1000.0 * ctx.weights.momentum;
    let rsi_signal = if rsi_now < 30.0 {
        1.0
    } else if rsi_now > 70.0 {
        -1.0
    } else {
        0.0
    } * ctx.weights.rsi;
    let bb_signal = if price <= bb_now.lower {
        1.0
    } else if price >= bb_now.upper {
        -1.0
    } else {
        0.0
    } * ctx.weights.bb;
    let macd_signal = if macd_now > 0.0 { 1.0 } else { -1.0 } * MACD_WEIGHT;

    let pattern_signal = if pattern.signal.is_bullish() {
        pattern.strength
    } else if pattern.signal.is_bearish() {
        -pattern.strength
    } else {
        0.0
    };

    let micro_signal = match micro.prediction {
        MicroPrediction::BullishContinuation => 0.6,
        MicroPrediction::BearishContinuation => -0.6,
        _ => 0.0,
    };

    let mood_signal = match mood.label {
        MoodLabel::Bullish => mood.strength * 0.5,
        MoodLabel::Bearish => -mood.strength * 0.5,
        MoodLabel::Neutral => 0.0,
    };

    let composite_signal = trend_signal
        + momentum_signal
        + rsi_signal
        + bb_signal
        + macd_signal
        + pattern_signal
        + micro_signal
        + mood_signal;

    let recent = &ctx.recent_trades[..ctx.recent_trades.len().min(20)];
    let recent_win_rate = win_rate(recent);

    let base_confidence = adaptive_confidence(
        composite_signal,
        &pattern,
        volatility,
        &closes,
        &ctx.regime,
        &mood,
        &temporal,
        recent_win_rate,
    );

    let snapshot = IndicatorSnapshot {
        ma14: ma14_now,
        ma50: ma50_now,
        rsi: rsi_now,
        bollinger: bb_now,
        volatility,
        atr: atr_now,
        macd_histogram: macd_now,
        pattern,
        micro,
    };

    // No edge in a dead market, whatever the signals say.
    if volatility < VOLATILITY_FLOOR {
        return Decision {
            action: Action::Hold,
            reason: "Extremely low volatility - no edge".to_string(),
            confidence: 0.0,
            composite_signal,
            indicators: Some(snapshot),
            regime: ctx.regime,
            mood,
            temporal,
            environment: Some(environment),
            agent: ctx.agent.clone(),
            weights: ctx.weights,
            adjustments: Vec::new(),
        };
    }

    // Adaptive thresholds: a clear environment lowers the bar slightly.
    let environment_multiplier = if environment.clarity > 0.6 { 1.1 } else { 0.95 };
    let adjusted_threshold = BASE_THRESHOLD / environment_multiplier;
    let strong_cut = STRONG_THRESHOLD / environment_multiplier;

    let mut action = Action::Hold;
    let mut reason;
    if composite_signal > adjusted_threshold && base_confidence > 0.55 {
        action = if composite_signal > strong_cut {
            Action::StrongBuy
        } else {
            Action::Buy
        };
        reason = format!(
            "Bullish composite signal ({:.2}) | {} | {} | {}",
            composite_signal,
            ctx.regime.kind.as_str(),
            pattern.name.as_str(),
            mood.label.as_str()
        );
    } else if composite_signal < -adjusted_threshold && base_confidence > 0.55 {
        action = if composite_signal < -strong_cut {
            Action::StrongSell
        } else {
            Action::Sell
        };
        reason = format!(
            "Bearish composite signal ({:.2}) | {} | {} | {}",
            composite_signal,
            ctx.regime.kind.as_str(),
            pattern.name.as_str(),
            mood.label.as_str()
        );
    } else if composite_signal.abs() > 1.5 && base_confidence > 0.7 && environment.clarity > 0.5 {
        action = if composite_signal > 0.0 {
            Action::Buy
        } else {
            Action::Sell
        };
        reason = format!(
            "Moderate {} signal with high confidence and clarity",
            if composite_signal > 0.0 {
                "bullish"
            } else {
                "bearish"
            }
        );
    } else {
        reason = format!(
            "Insufficient signal strength ({:.2}) or confidence ({:.0}%) | Clarity: {:.2}",
            composite_signal,
            base_confidence * 100.0,
            environment.clarity
        );
    }

    // Multi-stage confirmation.
    let confirm_inputs = ConfirmInputs {
        pattern,
        volatility,
        trend: environment.trend,
        trend_strength: environment.strength,
    };
    let mut confirmed = confirm_decision(action, &confirm_inputs, recent, base_confidence, &temporal);

    // Mood conflict: acting against a strong prevailing sentiment.
    if mood.label == MoodLabel::Bullish && confirmed.action.is_sell() && mood.strength > 0.6 {
        confirmed.confidence *= 0.88;
        confirmed
            .adjustments
            .push("Mood conflict: bullish mood vs sell signal".to_string());
    } else if mood.label == MoodLabel::Bearish && confirmed.action.is_buy() && mood.strength > 0.6 {
        confirmed.confidence *= 0.88;
        confirmed
            .adjustments
            .push("Mood conflict: bearish mood vs buy signal".to_string());
    }

    // Repeating the direction that just lost.
    if let Some(last) = ctx.last_trade {
        if last.result.is_loss() && confirmed.action == last.decision {
            confirmed.confidence *= 0.82;
            confirmed
                .adjustments
                .push("Penalized: repeating last losing direction".to_string());
        }
    }

    if confirmed.adjustments.len() > 1 {
        reason = format!(
            "{reason} | Adjustments: {}",
            confirmed.adjustments.join(", ")
        );
    }

    Decision {
        action: confirmed.action,
        reason,
        confidence: confirmed.confidence,
        composite_signal,
        indicators: Some(snapshot),
        regime: ctx.regime,
        mood,
        temporal,
        environment: Some(environment),
        agent: ctx.agent.clone(),
        weights: ctx.weights,
        adjustments: confirmed.adjustments,
    }
}

/// Layered environment analysis run before signal fusion.
fn pre_decision_analysis(
    price: f64,
    ma14: f64,
    ma50: f64,
    rsi_now: f64,
    bb: &BollingerBand,
    volatility: f64,
) -> Environment {
    let (trend, strength) = if ma14 > ma50 * 1.002 {
        (EnvironmentTrend::Uptrend, ((ma14 / ma50 - 1.0) * 100.0).min(1.0))
    } else if ma14 < ma50 * 0.998 {
        (
            EnvironmentTrend::Downtrend,
            ((1.0 - ma14 / ma50) * 100.0).min(1.0),
        )
    } else {
        (EnvironmentTrend::Sideways, 0.3)
    };

    // Clarity: how well the price/RSI/band reads agree.
    let mut signals = Vec::with_capacity(3);
    signals.push(if price > ma14 { 1.0 } else { -1.0 });
    signals.push(if rsi_now < 40.0 {
        1.0
    } else if rsi_now > 60.0 {
        -1.0
    } else {
        0.0
    });
    signals.push(if price <= bb.lower {
        1.0
    } else if price >= bb.upper {
        -1.0
    } else {
        0.0
    });
    let avg_signal = signals.iter().sum::<f64>() / signals.len() as f64;

    let noise = if volatility > 0.015 {
        0.8
    } else if volatility > 0.01 {
        0.5
    } else {
        0.2
    };

    Environment {
        trend,
        strength,
        clarity: avg_signal.abs(),
        noise,
    }
}

/// Blends signal strength with regime, pattern, mood, performance and
/// temporal context into a confidence value clamped to [0.25, 0.98].
#[allow(clippy::too_many_arguments)]
fn adaptive_confidence(
    composite_signal: f64,
    pattern: &PatternResult,
    volatility: f64,
    closes: &[f64],
    regime: &Regime,
    mood: &MarketMood,
    temporal: &TemporalContext,
    recent_win_rate: f64,
) -> f64 {
    let signal_strength = composite_signal.abs();
    let mut confidence = (signal_strength / 5.0).min(1.0) * 0.5;

    // Consistency bonus for oversized signals.
    confidence += signal_strength / 10.0 * 0.15;

    confidence *= regime.confidence;

    if pattern.strength > 0.7 {
        confidence += 0.1 * pattern.strength;
    }

    confidence += mood.strength * 0.08;

    if recent_win_rate > 0.6 {
        confidence *= 1.1;
    } else if recent_win_rate < 0.4 {
        confidence *= 0.85;
    }

    confidence *= temporal.confidence_modifier;

    if volatility > 0.018 {
        confidence *= 0.9;
    }

    // Trend-efficiency bonus: clean directional movement over the last 20
    // closes (net move large relative to the summed bar-to-bar churn).
    if closes.len() >= 20 {
        let recent = &closes[closes.len() - 20..];
        let net = recent[recent.len() - 1] - recent[0];
        let avg_change =
            recent.windows(2).map(|p| (p[1] - p[0]).abs()).sum::<f64>() / (recent.len() - 1) as f64;
        let denominator = avg_change * 20.0;
        let efficiency = if denominator != 0.0 {
            net.abs() / denominator
        } else {
            net.abs()
        };
        if efficiency > 0.6 {
            confidence *= 1.08;
        }
    }

    (confidence * 1.05).clamp(0.25, 0.98)
}

/// Risk-adjusted contract duration for a decision about to trade.
#[derive(Debug, Clone)]
pub struct DurationPlan {
    pub duration_secs: u32,
    pub risk_score: f64,
    pub rationale: String,
}

/// Scales the base granularity into a contract duration.
///
/// Strong trends justify longer holds, volatile or ranging markets get cut
/// short, and conviction stretches the clock a little. Durations never
/// drop below 15 seconds.
pub fn optimize_trade_duration(
    confidence: f64,
    regime: &Regime,
    volatility: f64,
    pattern: &PatternResult,
    base_granularity_secs: u32,
) -> DurationPlan {
    let mut duration_multiplier: f64 = 1.0;
    let mut risk_score: f64 = 0.5;

    match regime.kind {
        RegimeKind::StrongUptrend | RegimeKind::StrongDowntrend => {
            duration_multiplier = 1.5;
            risk_score = 0.3;
        }
        RegimeKind::HighVolatility => {
            duration_multiplier = 0.7;
            risk_score = 0.7;
        }
        RegimeKind::Consolidation => {
            duration_multiplier = 0.8;
            risk_score = 0.6;
        }
        _ => {}
    }

    if pattern.strength > 0.8 {
        duration_multiplier *= 1.2;
        risk_score *= 0.85;
    }

    if volatility > 0.015 {
        duration_multiplier *= 0.8;
        risk_score *= 1.2;
    } else if volatility < 0.005 {
        duration_multiplier *= 1.1;
        risk_score *= 0.9;
    }

    if confidence > 0.8 {
        duration_multiplier *= 1.15;
        risk_score *= 0.9;
    } else if confidence < 0.6 {
        duration_multiplier *= 0.85;
        risk_score *= 1.1;
    }

    let optimized = (base_granularity_secs as f64 * duration_multiplier).round();
    let duration_secs = (optimized / 60.0).max(15.0).round() as u32;

    DurationPlan {
        duration_secs,
        risk_score: risk_score.min(1.0),
        rationale: format!(
            "Optimized from {}s to {}s ({}, Vol: {:.3}%)",
            base_granularity_secs,
            duration_secs,
            regime.kind.as_str(),
            volatility * 100.0
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::patterns::{PatternName, PatternSignal};
    use chrono::TimeZone;

    fn candle(close: f64, epoch: i64) -> Candle {
        Candle {
            open: close * 0.999,
            high: close * 1.002,
            low: close * 0.997,
            close,
            epoch,
            volume: Some(1.0),
        }
    }

    /// Rising closes, 0.1% per bar.
    fn uptrend_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| candle(100.0 * 1.001f64.powi(i as i32), i as i64 * 60))
            .collect()
    }

    fn ctx<'a>(
        candles: &'a [Candle],
        ticks: &'a [Tick],
        regime: Regime,
    ) -> CycleContext<'a> {
        CycleContext {
            candles,
            ticks,
            weights: EffectiveWeights::default(),
            regime,
            recent_trades: &[],
            last_trade: None,
            agent: AgentStats {
                name: "balanced".to_string(),
                win_rate: 0.5,
                trades: 0,
            },
            // Tuesday mid-US-session: neutral temporal modifiers.
            now: Utc.with_ymd_and_hms(2026, 6, 2, 15, 30, 0).unwrap(),
        }
    }

    #[test]
    fn under_fifty_candles_holds_on_insufficient_data() {
        let candles = uptrend_candles(30);
        let decision = evaluate_cycle(&ctx(&candles, &[], Regime::unknown()));
        assert_eq!(decision.action, Action::Hold);
        assert_eq!(decision.reason, "Insufficient data");
        assert_eq!(decision.confidence, 0.0);
    }

    #[test]
    fn uptrend_never_sells() {
        let candles = uptrend_candles(60);
        let regime = crate::analysis::regime::detect_market_regime(&candles);
        let decision = evaluate_cycle(&ctx(&candles, &[], regime));
        assert!(
            !decision.action.is_sell(),
            "uptrend produced {:?}",
            decision.action
        );
    }

    #[test]
    fn dead_market_holds_on_volatility_floor() {
        // Flat closes: rolling volatility is zero, below the floor.
        let candles: Vec<Candle> = (0..60).map(|i| candle(100.0, i * 60)).collect();
        let regime = crate::analysis::regime::detect_market_regime(&candles);
        let decision = evaluate_cycle(&ctx(&candles, &[], regime));
        assert_eq!(decision.action, Action::Hold);
        assert!(decision.reason.contains("low volatility"));
        assert_eq!(decision.confidence, 0.0);
        assert!(decision.indicators.is_some());
    }

    #[test]
    fn decision_carries_full_snapshot() {
        let candles = uptrend_candles(60);
        let regime = crate::analysis::regime::detect_market_regime(&candles);
        let decision = evaluate_cycle(&ctx(&candles, &[], regime));
        let snapshot = decision.indicators.expect("snapshot present");
        assert!(snapshot.ma14 > 0.0);
        assert!(snapshot.ma50 > 0.0);
        assert!((0.0..=100.0).contains(&snapshot.rsi));
        assert!(decision.environment.is_some());
        assert_eq!(decision.agent.name, "balanced");
    }

    #[test]
    fn confidence_stays_inside_clamp() {
        let candles = uptrend_candles(60);
        let regime = crate::analysis::regime::detect_market_regime(&candles);
        let decision = evaluate_cycle(&ctx(&candles, &[], regime));
        if decision.action != Action::Hold {
            assert!(decision.confidence >= 0.25);
            assert!(decision.confidence <= 0.98);
        }
    }

    #[test]
    fn environment_reads_uptrend() {
        let candles = uptrend_candles(60);
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let ma14 = moving_average(&closes, 14).last().copied().flatten().unwrap();
        let ma50 = moving_average(&closes, 50).last().copied().flatten().unwrap();
        let bb = bollinger(&closes, 20, 2.0).last().copied().flatten().unwrap();
        let env = pre_decision_analysis(*closes.last().unwrap(), ma14, ma50, 55.0, &bb, 0.01);
        assert_eq!(env.trend, EnvironmentTrend::Uptrend);
        assert!(env.strength > 0.0);
    }

    #[test]
    fn duration_stretches_in_strong_trend() {
        let strong = Regime {
            kind: RegimeKind::StrongUptrend,
            volatility_ratio: 0.012,
            trend_strength: 0.03,
            confidence: 0.85,
            atr: None,
        };
        let weak_pattern = PatternResult {
            name: PatternName::None,
            strength: 0.0,
            signal: PatternSignal::Neutral,
        };
        let plan = optimize_trade_duration(0.7, &strong, 0.01, &weak_pattern, 3600);
        // 3600 * 1.5 / 60 = 90 seconds.
        assert_eq!(plan.duration_secs, 90);
        assert!(plan.risk_score <= 0.5);
        assert!(plan.rationale.contains("STRONG_UPTREND"));
    }

    #[test]
    fn duration_never_drops_below_floor() {
        let neutral = Regime {
            kind: RegimeKind::Neutral,
            volatility_ratio: 0.005,
            trend_strength: 0.0,
            confidence: 0.5,
            atr: None,
        };
        let weak_pattern = PatternResult {
            name: PatternName::None,
            strength: 0.0,
            signal: PatternSignal::Neutral,
        };
        let plan = optimize_trade_duration(0.7, &neutral, 0.01, &weak_pattern, 60);
        assert_eq!(plan.duration_secs, 15);
    }
}
