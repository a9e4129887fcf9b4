//! Post-hoc risk and decision-quality scoring.
//!
//! Neither score feeds back into the action itself; they annotate a
//! produced decision so the operator (and the trade record) can see how
//! exposed a trade is and how well-founded the decision looked when it
//! was made.

use serde::{Deserialize, Serialize};

use crate::analysis::context::{MarketMood, MoodLabel, Session, TemporalContext};
use crate::analysis::patterns::PatternResult;
use crate::analysis::regime::{Regime, RegimeKind};
use crate::engine::decision::{Action, Decision};
use crate::history::HistoricalContext;

/// Risk bucket a trade falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCategory {
    Low,
    ModerateLow,
    Moderate,
    High,
    VeryHigh,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Low => "LOW",
            RiskCategory::ModerateLow => "MODERATE-LOW",
            RiskCategory::Moderate => "MODERATE",
            RiskCategory::High => "HIGH",
            RiskCategory::VeryHigh => "VERY HIGH",
        }
    }
}

/// Signal-side inputs to the risk model.
#[derive(Debug, Clone, Copy)]
pub struct RiskInputs {
    pub volatility: f64,
    pub atr: Option<f64>,
    pub price: f64,
    pub pattern: PatternResult,
}

/// Additive risk score with its triggered factors.
#[derive(Debug, Clone)]
pub struct RiskAssessment {
    /// In [0.1, 1.0]; higher is riskier.
    pub score: f64,
    pub category: RiskCategory,
    pub factors: Vec<String>,
    pub recommendation: String,
}

/// Scores the risk of acting on a decision under current conditions.
///
/// Starts from a 0.5 baseline and adds a fixed increment per triggered
/// factor; the score is clamped to [0.1, 1.0] and bucketed by fixed
/// thresholds.
pub fn assess_trade_risk(
    action: Action,
    confidence: f64,
    inputs: &RiskInputs,
    regime: &Regime,
    mood: &MarketMood,
    temporal: &TemporalContext,
    historical: &HistoricalContext,
) -> RiskAssessment {
    let mut score = 0.5_f64;
    let mut factors: Vec<String> = Vec::new();

    if inputs.volatility > 0.02 {
        score += 0.25;
        factors.push("Extreme volatility".to_string());
    } else if inputs.volatility > 0.015 {
        score += 0.15;
        factors.push("High volatility".to_string());
    } else if inputs.volatility < 0.005 {
        score += 0.1;
        factors.push("Very low volatility (low profit potential)".to_string());
    }

    if regime.kind == RegimeKind::HighVolatility {
        score += 0.2;
        factors.push("High volatility regime".to_string());
    } else if regime.kind == RegimeKind::Consolidation {
        score += 0.15;
        factors.push("Ranging market (choppy)".to_string());
    } else if regime.confidence < 0.6 {
        score += 0.1;
        factors.push("Uncertain regime".to_string());
    }

    let against_mood = (mood.label == MoodLabel::Bullish && action.is_sell())
        || (mood.label == MoodLabel::Bearish && action.is_buy());
    if against_mood && mood.strength > 0.6 {
        score += 0.15;
        factors.push("Trading against market mood".to_string());
    }

    if temporal.liquidity_score < 0.7 {
        score += 0.1;
        factors.push("Low liquidity period".to_string());
    }
    if temporal.session == Session::Asian && inputs.volatility > 0.015 {
        score += 0.05;
        factors.push("High volatility during low-volume session".to_string());
    }

    if inputs.pattern.strength < 0.5 {
        score += 0.08;
        factors.push("Weak pattern formation".to_string());
    }

    if historical.context_score < 0.8 {
        score += 0.12;
        factors.push("Poor historical performance in similar conditions".to_string());
    }

    if let Some(atr) = inputs.atr {
        if inputs.price > 0.0 && atr / inputs.price * 100.0 > 2.0 {
            score += 0.1;
            factors.push("High ATR relative to price".to_string());
        }
    }

    if confidence < 0.65 {
        score += 0.15;
        factors.push("Low decision confidence".to_string());
    }

    let score = score.clamp(0.1, 1.0);
    let category = if score > 0.75 {
        RiskCategory::VeryHigh
    } else if score > 0.6 {
        RiskCategory::High
    } else if score < 0.35 {
        RiskCategory::Low
    } else if score < 0.5 {
        RiskCategory::ModerateLow
    } else {
        RiskCategory::Moderate
    };

    let recommendation = if score > 0.7 {
        "Consider reducing position size or avoiding trade"
    } else if score > 0.55 {
        "Use conservative position sizing"
    } else {
        "Risk acceptable for standard position"
    }
    .to_string();

    if factors.is_empty() {
        factors.push("Standard market conditions".to_string());
    }

    RiskAssessment {
        score,
        category,
        factors,
        recommendation,
    }
}

/// Letter grade for a decision's overall quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityGrade {
    APlus,
    A,
    B,
    C,
    D,
}

impl QualityGrade {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityGrade::APlus => "A+",
            QualityGrade::A => "A",
            QualityGrade::B => "B",
            QualityGrade::C => "C",
            QualityGrade::D => "D",
        }
    }
}

/// Graded quality score with its contributing factors.
#[derive(Debug, Clone)]
pub struct DecisionQuality {
    /// 0 to 100.
    pub score: i32,
    pub grade: QualityGrade,
    pub factors: Vec<String>,
}

/// Grades how well-founded a decision is: confidence tier, signal
/// strength, pattern and regime clarity, mood alignment, minus a penalty
/// when the confirmation pipeline had to intervene repeatedly.
pub fn calculate_decision_quality(decision: &Decision) -> DecisionQuality {
    let mut score = 0i32;
    let mut factors: Vec<String> = Vec::new();

    if decision.confidence > 0.75 {
        score += 30;
        factors.push("High confidence".to_string());
    } else if decision.confidence > 0.65 {
        score += 20;
        factors.push("Good confidence".to_string());
    } else {
        score += 10;
        factors.push("Moderate confidence".to_string());
    }

    let signal_strength = decision.composite_signal.abs();
    if signal_strength > 4.0 {
        score += 25;
        factors.push("Very strong signal".to_string());
    } else if signal_strength > 3.0 {
        score += 18;
        factors.push("Strong signal".to_string());
    } else {
        score += 10;
        factors.push("Moderate signal".to_string());
    }

    if let Some(snapshot) = &decision.indicators {
        if snapshot.pattern.strength > 0.75 {
            score += 15;
            factors.push("Strong pattern".to_string());
        } else if snapshot.pattern.strength > 0.5 {
            score += 8;
            factors.push("Moderate pattern".to_string());
        }
    }

    if decision.regime.confidence > 0.8 {
        score += 15;
        factors.push("Clear regime".to_string());
    } else if decision.regime.confidence > 0.65 {
        score += 8;
        factors.push("Defined regime".to_string());
    }

    if let Some(environment) = &decision.environment {
        if environment.clarity > 0.6 {
            score += 10;
            factors.push("Clear market structure".to_string());
        } else if environment.clarity > 0.4 {
            score += 5;
            factors.push("Moderate market clarity".to_string());
        }
    }

    let mood_aligned = (decision.mood.label == MoodLabel::Bullish && decision.action.is_buy())
        || (decision.mood.label == MoodLabel::Bearish && decision.action.is_sell());
    if mood_aligned && decision.mood.strength > 0.6 {
        score += 5;
        factors.push("Mood-aligned".to_string());
    }

    if decision.adjustments.len() > 2 {
        score -= 5;
        factors.push("Multiple adjustments needed".to_string());
    }

    let score = score.clamp(0, 100);
    let grade = if score >= 85 {
        QualityGrade::APlus
    } else if score >= 75 {
        QualityGrade::A
    } else if score >= 65 {
        QualityGrade::B
    } else if score >= 55 {
        QualityGrade::C
    } else {
        QualityGrade::D
    };

    DecisionQuality {
        score,
        grade,
        factors,
    }
}
