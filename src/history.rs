//! Trade history, performance metrics and historical-context analytics.
//!
//! The history list is newest-first and unbounded; it is the feedback loop
//! for adaptive weighting, agent selection and the decision confirmation
//! stages, and it is what the store persists between runs.

use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::analysis::context::MoodLabel;
use crate::analysis::regime::RegimeKind;
use crate::engine::decision::Action;

/// Whether a trade was filled locally or against the real broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeMode {
    #[serde(rename = "SIMULATION")]
    Simulation,
    #[serde(rename = "LIVE")]
    Live,
}

/// Outcome of a trade.
///
/// Simulated trades settle immediately as `Win`/`Loss`; live trades start
/// `Pending`, may be observed `Open`, and settle as `Won`/`Lost`/`Sold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeResult {
    Pending,
    Open,
    Win,
    Loss,
    Won,
    Lost,
    Sold,
}

impl TradeResult {
    pub fn is_win(&self) -> bool {
        matches!(self, TradeResult::Win | TradeResult::Won)
    }

    pub fn is_loss(&self) -> bool {
        matches!(self, TradeResult::Loss | TradeResult::Lost)
    }

    /// True once the outcome can no longer change.
    pub fn is_settled(&self) -> bool {
        !matches!(self, TradeResult::Pending | TradeResult::Open)
    }
}

/// One placed trade, mutated in place as settlement events arrive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub time: DateTime<Utc>,
    pub mode: TradeMode,
    pub symbol: String,
    pub amount: Decimal,
    pub decision: Action,
    pub result: TradeResult,
    pub profit: Decimal,
    pub confidence: f64,
    pub composite_signal: f64,
    pub regime: RegimeKind,
    pub mood: MoodLabel,
    pub agent: String,
    #[serde(default)]
    pub contract_id: Option<u64>,
    pub duration_secs: u32,
}

/// Newest-first trade history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeHistory {
    records: Vec<TradeRecord>,
}

impl TradeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<TradeRecord>) -> Self {
        Self { records }
    }

    /// Prepends a new record (newest-first ordering).
    pub fn push(&mut self, record: TradeRecord) {
        self.records.insert(0, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }

    /// The newest `n` records.
    pub fn recent(&self, n: usize) -> &[TradeRecord] {
        &self.records[..n.min(self.records.len())]
    }

    /// Finds the pending/open record for a live contract.
    pub fn find_by_contract_mut(&mut self, contract_id: u64) -> Option<&mut TradeRecord> {
        self.records
            .iter_mut()
            .find(|r| r.contract_id == Some(contract_id))
    }

    /// Win rate over the newest `n` settled-or-not records; 0.5 when empty.
    pub fn recent_win_rate(&self, n: usize) -> f64 {
        win_rate(self.recent(n))
    }

    /// Number of consecutive losses counting back from the newest record.
    pub fn consecutive_losses(&self) -> usize {
        self.records
            .iter()
            .take_while(|r| r.result.is_loss())
            .count()
    }

    /// Full performance breakdown; `None` when the history is empty.
    pub fn analytics(&self) -> Option<PerformanceAnalytics> {
        performance_analytics(&self.records)
    }
}

/// Win rate over a slice of records; 0.5 when the slice is empty.
pub fn win_rate(records: &[TradeRecord]) -> f64 {
    if records.is_empty() {
        return 0.5;
    }
    let wins = records.iter().filter(|r| r.result.is_win()).count();
    wins as f64 / records.len() as f64
}

/// A regime/outcome pair kept for the rolling performance window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeOutcome {
    pub time: DateTime<Utc>,
    pub regime: RegimeKind,
    pub result: TradeResult,
    pub agent: String,
}

/// Rolling aggregate performance counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub wins: u64,
    pub losses: u64,
    pub total_profit: Decimal,
    /// Last 100 regime/outcome pairs.
    pub regime_history: VecDeque<RegimeOutcome>,
}

impl PerformanceMetrics {
    const REGIME_WINDOW: usize = 100;

    /// Folds a settled record into the counters.
    pub fn absorb(&mut self, record: &TradeRecord) {
        if record.result.is_win() {
            self.wins += 1;
        }
        if record.result.is_loss() {
            self.losses += 1;
        }
        self.total_profit += record.profit;

        self.regime_history.push_back(RegimeOutcome {
            time: record.time,
            regime: record.regime,
            result: record.result,
            agent: record.agent.clone(),
        });
        while self.regime_history.len() > Self::REGIME_WINDOW {
            self.regime_history.pop_front();
        }
    }

    pub fn total_trades(&self) -> u64 {
        self.wins + self.losses
    }

    pub fn win_rate(&self) -> f64 {
        let total = self.total_trades();
        if total == 0 {
            0.5
        } else {
            self.wins as f64 / total as f64
        }
    }
}

/// Win/loss/profit aggregate for one analytics bucket.
#[derive(Debug, Clone, Default)]
pub struct BucketStats {
    pub trades: usize,
    pub wins: usize,
    pub profit: Decimal,
}

impl BucketStats {
    fn absorb(&mut self, record: &TradeRecord) {
        self.trades += 1;
        if record.result.is_win() {
            self.wins += 1;
        }
        self.profit += record.profit;
    }

    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            0.0
        } else {
            self.wins as f64 / self.trades as f64
        }
    }
}

/// Performance over the newest twenty trades.
#[derive(Debug, Clone, Default)]
pub struct RecentTrend {
    pub trades: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub profit: Decimal,
    pub avg_confidence: f64,
}

/// Full performance breakdown across the whole history.
#[derive(Debug, Clone, Default)]
pub struct PerformanceAnalytics {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub total_profit: Decimal,
    pub by_regime: HashMap<&'static str, BucketStats>,
    pub by_agent: HashMap<String, BucketStats>,
    pub by_mood: HashMap<&'static str, BucketStats>,
    pub recent: RecentTrend,
}

/// Aggregates the history into per-regime, per-agent and per-mood
/// buckets plus a recent-trend summary. Returns `None` for an empty
/// history — there is nothing meaningful to report.
pub fn performance_analytics(records: &[TradeRecord]) -> Option<PerformanceAnalytics> {
    if records.is_empty() {
        return None;
    }

    let mut analytics = PerformanceAnalytics {
        total_trades: records.len(),
        ..PerformanceAnalytics::default()
    };

    for record in records {
        if record.result.is_win() {
            analytics.wins += 1;
        }
        if record.result.is_loss() {
            analytics.losses += 1;
        }
        analytics.total_profit += record.profit;

        analytics
            .by_regime
            .entry(record.regime.as_str())
            .or_default()
            .absorb(record);
        analytics
            .by_agent
            .entry(record.agent.clone())
            .or_default()
            .absorb(record);
        analytics
            .by_mood
            .entry(record.mood.as_str())
            .or_default()
            .absorb(record);
    }
    analytics.win_rate = analytics.wins as f64 / analytics.total_trades as f64;

    let recent20 = &records[..records.len().min(20)];
    let recent_wins = recent20.iter().filter(|r| r.result.is_win()).count();
    analytics.recent = RecentTrend {
        trades: recent20.len(),
        wins: recent_wins,
        win_rate: recent_wins as f64 / recent20.len() as f64,
        profit: recent20.iter().map(|r| r.profit).sum(),
        avg_confidence: recent20.iter().map(|r| r.confidence).sum::<f64>() / recent20.len() as f64,
    };

    Some(analytics)
}

/// Snapshot of the most recently settled trade, persisted so the repeat-
/// losing-direction penalty survives restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastTradeSnapshot {
    pub decision: Action,
    pub result: TradeResult,
    pub confidence: f64,
    pub regime: RegimeKind,
    pub time: DateTime<Utc>,
}

impl LastTradeSnapshot {
    pub fn from_record(record: &TradeRecord) -> Self {
        Self {
            decision: record.decision,
            result: record.result,
            confidence: record.confidence,
            regime: record.regime,
            time: record.time,
        }
    }
}

/// How similar past conditions have been working out.
#[derive(Debug, Clone)]
pub struct HistoricalContext {
    /// Multiplier in [0.5, 1.5] applied to win-odds and risk models.
    pub context_score: f64,
    pub insights: Vec<String>,
}

impl HistoricalContext {
    pub fn neutral() -> Self {
        Self {
            context_score: 1.0,
            insights: Vec::new(),
        }
    }
}

/// Mines the newest trades for conditions matching the current decision.
///
/// Looks for direction fatigue, hour-of-day and regime-specific win rates,
/// overconfidence, and hot/cold streaks. Fewer than three records yields a
/// neutral context.
pub fn analyze_historical_context(
    recent: &[TradeRecord],
    current_action: Action,
    current_regime: RegimeKind,
    now: DateTime<Utc>,
) -> HistoricalContext {
    if recent.len() < 3 {
        return HistoricalContext::neutral();
    }

    let mut insights = Vec::new();
    let mut context_score = 1.0_f64;

    let last10 = &recent[..recent.len().min(10)];

    // Direction fatigue: many same-direction trades with a poor win rate.
    let same_direction: Vec<&TradeRecord> = last10
        .iter()
        .filter(|t| {
            (t.decision.is_buy() && current_action.is_buy())
                || (t.decision.is_sell() && current_action.is_sell())
        })
        .collect();
    if same_direction.len() >= 5 {
        let same_wins = same_direction.iter().filter(|t| t.result.is_win()).count();
        let same_win_rate = same_wins as f64 / same_direction.len() as f64;
        if same_win_rate < 0.4 {
            context_score *= 0.75;
            insights.push(format!(
                "Direction fatigue: {} recent {} trades with {:.0}% win rate",
                same_direction.len(),
                if current_action.is_buy() { "BUY" } else { "SELL" },
                same_win_rate * 100.0
            ));
        }
    }

    // Hour-of-day performance within ±1 hour of now.
    let current_hour = now.hour() as i64;
    let same_hour: Vec<&TradeRecord> = last10
        .iter()
        .filter(|t| {
            let trade_hour = t.time.hour() as i64;
            (trade_hour - current_hour).abs() <= 1
        })
        .collect();
    if same_hour.len() >= 3 {
        let hour_wins = same_hour.iter().filter(|t| t.result.is_win()).count();
        let hour_win_rate = hour_wins as f64 / same_hour.len() as f64;
        if hour_win_rate > 0.7 {
            context_score *= 1.1;
            insights.push(format!(
                "Strong hour performance: {:.0}% win rate at this time",
                hour_win_rate * 100.0
            ));
        } else if hour_win_rate < 0.3 {
            context_score *= 0.85;
            insights.push(format!(
                "Weak hour performance: {:.0}% win rate at this time",
                hour_win_rate * 100.0
            ));
        }
    }

    // Regime consistency.
    let same_regime: Vec<&TradeRecord> = last10
        .iter()
        .filter(|t| t.regime == current_regime)
        .collect();
    if same_regime.len() >= 4 {
        let regime_wins = same_regime.iter().filter(|t| t.result.is_win()).count();
        let regime_win_rate = regime_wins as f64 / same_regime.len() as f64;
        if regime_win_rate > 0.65 {
            context_score *= 1.08;
            insights.push(format!(
                "Strong regime performance: {:.0}% win rate in {}",
                regime_win_rate * 100.0,
                current_regime.as_str()
            ));
        } else if regime_win_rate < 0.35 {
            context_score *= 0.8;
            insights.push(format!(
                "Weak regime performance: {:.0}% win rate in {}",
                regime_win_rate * 100.0,
                current_regime.as_str()
            ));
        }
    }

    // Confidence accuracy: confident trades that keep losing.
    let high_conf: Vec<&TradeRecord> = last10.iter().filter(|t| t.confidence > 0.75).collect();
    if high_conf.len() >= 3 {
        let conf_wins = high_conf.iter().filter(|t| t.result.is_win()).count();
        let conf_win_rate = conf_wins as f64 / high_conf.len() as f64;
        if conf_win_rate < 0.5 {
            context_score *= 0.85;
            insights.push(format!(
                "High confidence underperforming: {:.0}% win rate on confident trades",
                conf_win_rate * 100.0
            ));
        }
    }

    // Hot/cold streak over the newest five.
    let last5 = &recent[..recent.len().min(5)];
    let recent_wins = last5.iter().filter(|t| t.result.is_win()).count();
    if recent_wins >= 4 {
        context_score *= 1.05;
        insights.push(format!("Hot streak: {recent_wins}/5 recent wins"));
    } else if recent_wins <= 1 {
        context_score *= 0.9;
        insights.push(format!("Cold streak: {recent_wins}/5 recent wins"));
    }

    HistoricalContext {
        context_score: context_score.clamp(0.5, 1.5),
        insights,
    }
}
