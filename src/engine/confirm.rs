//! Multi-stage decision confirmation.
//!
//! A raw action from the fusion stage passes through an ordered pipeline
//! of penalties and vetoes before it may trade: loss streaks shave
//! confidence, hostile volatility or an opposing strong trend force HOLD,
//! and a final confidence floor catches whatever is left. Every adjustment
//! is recorded as a human-readable reason so the operator can reconstruct
//! why an action was weakened.

use crate::analysis::context::TemporalContext;
use crate::analysis::patterns::PatternResult;
use crate::engine::decision::{Action, EnvironmentTrend};
use crate::history::TradeRecord;

/// Signal-side inputs the confirmation stages consult.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmInputs {
    pub pattern: PatternResult,
    pub volatility: f64,
    pub trend: EnvironmentTrend,
    pub trend_strength: f64,
}

/// A confirmed (possibly weakened or vetoed) decision.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub action: Action,
    pub confidence: f64,
    pub adjustments: Vec<String>,
}

/// Runs the confirmation pipeline over a proposed action.
///
/// `recent` is the newest-first trade window; only the newest five records
/// feed the streak logic.
pub fn confirm_decision(
    action: Action,
    inputs: &ConfirmInputs,
    recent: &[TradeRecord],
    confidence: f64,
    temporal: &TemporalContext,
) -> Confirmation {
    let mut adjusted_action = action;
    let mut adjusted_confidence = confidence;
    let mut adjustments: Vec<String> = Vec::new();

    let last_trades = &recent[..recent.len().min(5)];
    let consecutive_losses = last_trades
        .iter()
        .take_while(|t| t.result.is_loss())
        .count();

    // Loss streak: shave confidence, and stop being aggressive while the
    // market is moving.
    if consecutive_losses >= 4 {
        adjusted_confidence *= 0.8;
        adjustments.push("Loss streak penalty".to_string());

        if adjusted_action.is_strong() && inputs.volatility > 0.015 {
            adjusted_action = adjusted_action.downgraded();
            adjustments.push("Downgraded from STRONG to regular".to_string());
        }
    }

    // Repeated losses in this same direction.
    let same_direction: Vec<&TradeRecord> = last_trades
        .iter()
        .filter(|t| t.decision == action)
        .collect();
    let same_dir_losses = same_direction
        .iter()
        .filter(|t| t.result.is_loss())
        .count();
    if same_dir_losses >= 2 && same_direction.len() >= 3 {
        adjusted_confidence *= 0.85;
        adjustments.push("Same-direction loss penalty".to_string());
    }

    // Hard override: hostile volatility on top of a loss streak.
    if inputs.volatility > 0.025 && consecutive_losses >= 3 {
        adjusted_action = Action::Hold;
        adjusted_confidence = 0.0;
        adjustments.push("High volatility + losses, forced HOLD".to_string());
    }

    // Thin liquidity is no time for aggressive entries.
    if temporal.liquidity_score < 0.7 && adjusted_action.is_strong() {
        adjusted_action = adjusted_action.downgraded();
        adjusted_confidence *= 0.9;
        adjustments.push("Low liquidity downgrade".to_string());
    }

    // Pattern contradiction.
    if inputs.pattern.signal.is_bullish() && action.is_sell() {
        adjusted_confidence *= 0.85;
        adjustments.push("Pattern-decision conflict".to_string());
    } else if inputs.pattern.signal.is_bearish() && action.is_buy() {
        adjusted_confidence *= 0.85;
        adjustments.push("Pattern-decision conflict".to_string());
    }

    // Never trade against a strong established trend.
    if inputs.trend == EnvironmentTrend::Uptrend
        && inputs.trend_strength > 0.7
        && adjusted_action.is_sell()
    {
        adjusted_action = Action::Hold;
        adjusted_confidence = 0.0;
        adjustments.push("Vetoed SELL against strong uptrend".to_string());
    } else if inputs.trend == EnvironmentTrend::Downtrend
        && inputs.trend_strength > 0.7
        && adjusted_action.is_buy()
    {
        adjusted_action = Action::Hold;
        adjusted_confidence = 0.0;
        adjustments.push("Vetoed BUY against strong downtrend".to_string());
    }

    // Whatever survived must still clear the floor.
    if adjusted_confidence < 0.45 && adjusted_action != Action::Hold {
        adjusted_action = Action::Hold;
        adjustments.push("Confidence below threshold".to_string());
    }

    if adjustments.is_empty() {
        adjustments.push("No adjustments".to_string());
    }

    Confirmation {
        action: adjusted_action,
        confidence: adjusted_confidence.clamp(0.0, 1.0),
        adjustments,
    }
}
