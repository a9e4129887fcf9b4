//! The decision engine: adaptive weighting, agent selection, signal
//! fusion, multi-stage confirmation and post-hoc risk/quality scoring.

pub mod agents;
pub mod confirm;
pub mod decision;
pub mod quality;
pub mod weights;

pub use agents::{AgentProfile, AgentRoster};
pub use confirm::{ConfirmInputs, Confirmation, confirm_decision};
pub use decision::{
    Action, AgentStats, Decision, DurationPlan, Environment, EnvironmentTrend, IndicatorSnapshot,
    evaluate_cycle, optimize_trade_duration,
};
pub use quality::{
    DecisionQuality, QualityGrade, RiskAssessment, RiskCategory, RiskInputs, assess_trade_risk,
    calculate_decision_quality,
};
pub use weights::{EffectiveWeights, IndicatorWeights};
