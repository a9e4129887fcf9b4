//! Adaptive indicator weighting.
//!
//! The five indicator weights live for the whole session and are adjusted
//! from two directions: regime classification resets them to presets, and
//! trailing trade performance nudges them. Repeated multiplicative nudges
//! would drift without bound, so refinement always renormalizes the sum
//! back to a fixed target and clamps each weight into a hard range.

use serde::{Deserialize, Serialize};

use crate::analysis::regime::{Regime, RegimeKind};
use crate::engine::agents::AgentProfile;
use crate::history::{TradeRecord, win_rate};

/// The weight sum is held at this target by [`IndicatorWeights::refine`].
pub const WEIGHT_SUM_TARGET: f64 = 4.0;

/// Hard per-weight bounds.
pub const WEIGHT_MIN: f64 = 0.3;
pub const WEIGHT_MAX: f64 = 2.0;

/// Minimum trade history before refinement kicks in.
const MIN_REFINE_TRADES: usize = 50;

/// Size of the trailing window refinement looks at.
const REFINE_WINDOW: usize = 200;

/// Per-indicator signal weights, session-wide and long-lived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorWeights {
    pub ma: f64,
    pub rsi: f64,
    pub bb: f64,
    pub momentum: f64,
    pub volume: f64,
}

impl Default for IndicatorWeights {
    fn default() -> Self {
        Self {
            ma: 1.0,
            rsi: 1.0,
            bb: 1.0,
            momentum: 1.0,
            volume: 1.0,
        }
    }
}

impl IndicatorWeights {
    pub fn sum(&self) -> f64 {
        self.ma + self.rsi + self.bb + self.momentum + self.volume
    }

    fn scale_all(&mut self, factor: f64) {
        self.ma *= factor;
        self.rsi *= factor;
        self.bb *= factor;
        self.momentum *= factor;
        self.volume *= factor;
    }

    fn clamp_all(&mut self) {
        self.ma = self.ma.clamp(WEIGHT_MIN, WEIGHT_MAX);
        self.rsi = self.rsi.clamp(WEIGHT_MIN, WEIGHT_MAX);
        self.bb = self.bb.clamp(WEIGHT_MIN, WEIGHT_MAX);
        self.momentum = self.momentum.clamp(WEIGHT_MIN, WEIGHT_MAX);
        self.volume = self.volume.clamp(WEIGHT_MIN, WEIGHT_MAX);
    }

    /// Resets the weights to the preset for a freshly classified regime,
    /// then scales the whole set by recent win rate (amplify what works,
    /// back off what doesn't).
    pub fn apply_regime_preset(&mut self, kind: RegimeKind, recent_win_rate: f64) {
        match kind {
            RegimeKind::StrongUptrend | RegimeKind::StrongDowntrend => {
                self.ma = 1.3;
                self.momentum = 1.4;
                self.rsi = 0.8;
                self.bb = 0.9;
            }
            RegimeKind::HighVolatility => {
                self.bb = 1.5;
                self.rsi = 1.2;
                self.ma = 0.7;
                self.momentum = 1.1;
            }
            RegimeKind::Consolidation => {
                self.bb = 1.3;
                self.rsi = 1.4;
                self.ma = 0.6;
                self.momentum = 0.5;
            }
            _ => {
                *self = Self::default();
            }
        }

        if recent_win_rate > 0.65 {
            self.scale_all(1.1);
        } else if recent_win_rate < 0.45 {
            self.scale_all(0.85);
        }
    }

    /// Nudges the weights from a larger trailing trade window, then
    /// renormalizes the sum to [`WEIGHT_SUM_TARGET`] and clamps each
    /// weight into `[WEIGHT_MIN, WEIGHT_MAX]`.
    ///
    /// Does nothing with fewer than fifty recorded trades.
    pub fn refine(&mut self, history: &[TradeRecord], regime: &Regime) {
        if history.len() < MIN_REFINE_TRADES {
            return;
        }

        let window = &history[..history.len().min(REFINE_WINDOW)];
        let rate = win_rate(window);

        if rate < 0.45 {
            self.momentum *= 1.08;
            self.ma *= 0.95;
            self.rsi *= 1.05;
        } else if rate > 0.60 {
            self.rsi *= 0.92;
            self.bb *= 1.05;
            self.momentum *= 0.97;
        }

        match regime.kind {
            RegimeKind::HighVolatility => {
                self.bb *= 1.1;
                self.momentum *= 0.9;
            }
            RegimeKind::StrongUptrend | RegimeKind::StrongDowntrend => {
                self.ma *= 1.15;
                self.momentum *= 1.1;
            }
            _ => {}
        }

        let total = self.sum();
        if total > 0.0 {
            self.scale_all(WEIGHT_SUM_TARGET / total);
        }
        self.clamp_all();
    }

    /// Combines the session weights with the active agent's multipliers
    /// into the per-cycle effective weights.
    pub fn effective(&self, agent: &AgentProfile) -> EffectiveWeights {
        EffectiveWeights {
            ma: self.ma * agent.multipliers.ma,
            momentum: self.momentum * agent.multipliers.momentum,
            rsi: self.rsi * agent.multipliers.rsi,
            bb: self.bb * agent.multipliers.bb,
        }
    }
}

/// The weights actually applied to a cycle's signals, after the active
/// agent's style multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectiveWeights {
    pub ma: f64,
    pub momentum: f64,
    pub rsi: f64,
    pub bb: f64,
}

impl Default for EffectiveWeights {
    fn default() -> Self {
        Self {
            ma: 1.0,
            momentum: 1.0,
            rsi: 1.0,
            bb: 1.0,
        }
    }
}
