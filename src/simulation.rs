//! Paper-trading simulation of contract outcomes.
//!
//! When live mode is off, the session never sends a proposal: it settles
//! the trade locally against a regime-aware win-probability model and
//! feeds the synthesized record through exactly the same history,
//! performance and weight-refinement paths a live settlement would take.
//! The adaptive layers cannot tell the difference.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::analysis::context::MoodLabel;
use crate::engine::decision::Decision;
use crate::engine::quality::RiskAssessment;
use crate::history::{HistoricalContext, TradeMode, TradeRecord, TradeResult};

/// Bounds on the modelled win probability; no setup is ever a sure thing
/// and none is hopeless.
const MIN_WIN_CHANCE: f64 = 0.28;
const MAX_WIN_CHANCE: f64 = 0.83;

/// Base payout multiple for a winning binary contract.
const BASE_PAYOUT: f64 = 1.75;

/// A locally settled trade.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub record: TradeRecord,
    pub win_probability: f64,
}

/// Models the chance this decision wins under current conditions.
///
/// Pure and deterministic: starts from a coin flip, credits signal
/// strength and favorable regime/pattern/mood alignment, debits hostile
/// regimes and risk, then clamps into realistic bounds.
pub fn win_probability(
    decision: &Decision,
    historical: &HistoricalContext,
    risk: &RiskAssessment,
    agent_win_rate: f64,
) -> f64 {
    let mut chance = 0.5_f64;

    chance += decision.confidence * 0.25;
    chance += decision.composite_signal.abs() / 10.0;

    if decision.regime.kind.is_strong_trend() {
        chance += 0.12;
    } else if decision.regime.kind == crate::analysis::regime::RegimeKind::HighVolatility {
        chance -= 0.08;
    } else if decision.regime.kind == crate::analysis::regime::RegimeKind::Consolidation {
        chance -= 0.05;
    }

    if let Some(snapshot) = &decision.indicators {
        if snapshot.pattern.strength > 0.75 {
            chance += 0.1;
        } else if snapshot.pattern.strength < 0.5 {
            chance -= 0.05;
        }
    }

    let mood_aligned = (decision.mood.label == MoodLabel::Bullish && decision.action.is_buy())
        || (decision.mood.label == MoodLabel::Bearish && decision.action.is_sell());
    if mood_aligned && decision.mood.strength > 0.6 {
        chance += 0.08;
    } else if !mood_aligned && decision.mood.strength > 0.6 {
        chance -= 0.06;
    }

    chance *= decision.temporal.confidence_modifier;
    chance *= historical.context_score;

    if let Some(environment) = &decision.environment {
        if environment.clarity > 0.6 {
            chance += 0.06;
        } else if environment.clarity < 0.4 {
            chance -= 0.04;
        }
    }

    if risk.score > 0.7 {
        chance -= 0.1;
    }

    chance += (agent_win_rate - 0.5) * 0.15;

    chance.clamp(MIN_WIN_CHANCE, MAX_WIN_CHANCE)
}

/// Settles a trade locally and returns the finished record.
///
/// The payout scales slightly with volatility, mirroring the richer
/// premiums a live broker quotes on rough markets.
#[allow(clippy::too_many_arguments)]
pub fn simulate_trade(
    decision: &Decision,
    symbol: &str,
    amount: Decimal,
    duration_secs: u32,
    historical: &HistoricalContext,
    risk: &RiskAssessment,
    agent_win_rate: f64,
    rng: &mut StdRng,
    now: DateTime<Utc>,
) -> SimulationOutcome {
    let chance = win_probability(decision, historical, risk, agent_win_rate);
    let won = rng.random::<f64>() < chance;

    let volatility = decision
        .indicators
        .as_ref()
        .map(|s| s.volatility)
        .unwrap_or(0.0);
    let payout_factor = if won {
        BASE_PAYOUT + volatility * 100.0 / 10.0
    } else {
        -1.0
    };
    let profit = amount * Decimal::from_f64(payout_factor).unwrap_or(Decimal::NEGATIVE_ONE);

    let record = TradeRecord {
        time: now,
        mode: TradeMode::Simulation,
        symbol: symbol.to_string(),
        amount,
        decision: decision.action,
        result: if won { TradeResult::Win } else { TradeResult::Loss },
        profit,
        confidence: decision.confidence,
        composite_signal: decision.composite_signal,
        regime: decision.regime.kind,
        mood: decision.mood.label,
        agent: decision.agent.name.clone(),
        contract_id: None,
        duration_secs,
    };

    SimulationOutcome {
        record,
        win_probability: chance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::context::{MarketMood, temporal_context};
    use crate::analysis::regime::{Regime, RegimeKind};
    use crate::engine::decision::{Action, AgentStats, Decision, Environment, EnvironmentTrend};
    use crate::engine::quality::{RiskCategory, RiskAssessment};
    use crate::engine::weights::EffectiveWeights;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    fn decision(confidence: f64, composite: f64, kind: RegimeKind) -> Decision {
        Decision {
            action: Action::Buy,
            reason: "test".to_string(),
            confidence,
            composite_signal: composite,
            indicators: None,
            regime: Regime {
                kind,
                volatility_ratio: 0.008,
                trend_strength: 0.02,
                confidence: 0.7,
                atr: None,
            },
            mood: MarketMood {
                label: MoodLabel::Bullish,
                strength: 0.7,
                ratio: 0.7,
            },
            temporal: temporal_context(Utc.with_ymd_and_hms(2026, 6, 2, 15, 30, 0).unwrap()),
            environment: Some(Environment {
                trend: EnvironmentTrend::Uptrend,
                strength: 0.8,
                clarity: 0.7,
                noise: 0.2,
            }),
            agent: AgentStats {
                name: "balanced".to_string(),
                win_rate: 0.5,
                trades: 0,
            },
            weights: EffectiveWeights::default(),
            adjustments: Vec::new(),
        }
    }

    fn low_risk() -> RiskAssessment {
        RiskAssessment {
            score: 0.3,
            category: RiskCategory::Low,
            factors: vec![],
            recommendation: String::new(),
        }
    }

    #[test]
    fn probability_respects_bounds() {
        let strong = decision(0.95, 6.0, RegimeKind::StrongUptrend);
        let p = win_probability(&strong, &HistoricalContext::neutral(), &low_risk(), 0.9);
        assert!(p <= MAX_WIN_CHANCE);

        let mut weak = decision(0.25, 0.1, RegimeKind::HighVolatility);
        weak.mood.label = MoodLabel::Bearish; // against a BUY
        let poor_history = HistoricalContext {
            context_score: 0.5,
            insights: vec![],
        };
        let hostile = RiskAssessment {
            score: 0.9,
            ..low_risk()
        };
        let p = win_probability(&weak, &poor_history, &hostile, 0.1);
        assert!(p >= MIN_WIN_CHANCE);
    }

    #[test]
    fn strong_setup_beats_weak_setup() {
        let strong = decision(0.9, 5.0, RegimeKind::StrongUptrend);
        let weak = decision(0.4, 1.0, RegimeKind::Consolidation);
        let p_strong = win_probability(&strong, &HistoricalContext::neutral(), &low_risk(), 0.6);
        let p_weak = win_probability(&weak, &HistoricalContext::neutral(), &low_risk(), 0.4);
        assert!(p_strong > p_weak);
    }

    #[test]
    fn simulation_is_deterministic_with_seeded_rng() {
        let d = decision(0.7, 3.0, RegimeKind::Uptrend);
        let run = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            simulate_trade(
                &d,
                "R_100",
                dec!(1),
                60,
                &HistoricalContext::neutral(),
                &low_risk(),
                0.5,
                &mut rng,
                Utc.with_ymd_and_hms(2026, 6, 2, 15, 30, 0).unwrap(),
            )
        };
        let first = run(99);
        let second = run(99);
        assert_eq!(first.record.result, second.record.result);
        assert_eq!(first.record.profit, second.record.profit);
        assert_eq!(first.win_probability, second.win_probability);
    }

    #[test]
    fn loss_costs_the_stake_and_win_pays_out() {
        let d = decision(0.7, 3.0, RegimeKind::Uptrend);
        // Sweep seeds until both outcomes have been observed.
        let mut saw_win = false;
        let mut saw_loss = false;
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let outcome = simulate_trade(
                &d,
                "R_100",
                dec!(2),
                60,
                &HistoricalContext::neutral(),
                &low_risk(),
                0.5,
                &mut rng,
                Utc::now(),
            );
            match outcome.record.result {
                TradeResult::Win => {
                    saw_win = true;
                    assert!(outcome.record.profit > Decimal::ZERO);
                }
                TradeResult::Loss => {
                    saw_loss = true;
                    assert_eq!(outcome.record.profit, dec!(-2));
                }
                other => panic!("unexpected result {other:?}"),
            }
            if saw_win && saw_loss {
                break;
            }
        }
        assert!(saw_win && saw_loss);
    }

    #[test]
    fn record_carries_decision_context() {
        let d = decision(0.7, 3.0, RegimeKind::Uptrend);
        let mut rng = StdRng::seed_from_u64(1);
        let outcome = simulate_trade(
            &d,
            "R_100",
            dec!(1),
            90,
            &HistoricalContext::neutral(),
            &low_risk(),
            0.5,
            &mut rng,
            Utc::now(),
        );
        assert_eq!(outcome.record.mode, TradeMode::Simulation);
        assert_eq!(outcome.record.decision, Action::Buy);
        assert_eq!(outcome.record.regime, RegimeKind::Uptrend);
        assert_eq!(outcome.record.agent, "balanced");
        assert_eq!(outcome.record.duration_secs, 90);
        assert!(outcome.record.result.is_settled());
    }
}
