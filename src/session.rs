//! The trading session: one explicit context object owning every piece of
//! process-wide state.
//!
//! The candle window, tick buffer, adaptive weights, agent roster, regime,
//! trade history, decision memory and the contract lock all live here and
//! are mutated only through the event methods below. The runner feeds
//! events in from a single consumer task, so no locking beyond the
//! contract lock's own invariant is needed.

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::analysis::context::MoodLabel;
use crate::analysis::regime::{MIN_CANDLES, Regime, RegimeKind, detect_market_regime};
use crate::config::TradeSettings;
use crate::engine::agents::AgentRoster;
use crate::engine::decision::{
    Action, AgentStats, CycleContext, Decision, evaluate_cycle, optimize_trade_duration,
};
use crate::engine::quality::{
    DecisionQuality, RiskAssessment, RiskInputs, assess_trade_risk, calculate_decision_quality,
};
use crate::engine::weights::IndicatorWeights;
use crate::history::{
    LastTradeSnapshot, PerformanceMetrics, TradeHistory, TradeMode, TradeRecord, TradeResult,
    analyze_historical_context,
};
use crate::lock::{ContractLock, LockState};
use crate::models::candle::{Candle, Tick};
use crate::models::contract::{ContractStatus, SellRequest};
use crate::models::proposal::{ContractType, ProposalRequest};
use crate::simulation::simulate_trade;
use crate::store::StoreData;

/// Maximum candles kept in the working window.
pub const CANDLE_WINDOW: usize = 200;

/// Maximum ticks kept for micro-structure analysis.
const TICK_BUFFER: usize = 50;

/// Decisions remembered for inspection.
const DECISION_MEMORY: usize = 50;

/// Minimum confidence before a decision may trade.
const TRADE_CONFIDENCE_FLOOR: f64 = 0.55;

/// One remembered decision.
#[derive(Debug, Clone)]
pub struct DecisionMemo {
    pub time: DateTime<Utc>,
    pub action: Action,
    pub confidence: f64,
    pub composite_signal: f64,
    pub mood: MoodLabel,
    pub regime: RegimeKind,
}

/// A trade the session has asked the transport to price.
///
/// Held until the purchase confirms (or fails) so the eventual trade
/// record carries the full decision context.
#[derive(Debug, Clone)]
struct PendingTrade {
    decision: Action,
    confidence: f64,
    composite_signal: f64,
    regime: RegimeKind,
    mood: MoodLabel,
    agent: String,
    duration_secs: u32,
}

/// The trade parameters handed to the transport collaborator.
#[derive(Debug, Clone)]
pub struct TradeRequest {
    pub symbol: String,
    pub contract_type: ContractType,
    pub amount: Decimal,
    pub duration_secs: u32,
    pub risk: RiskAssessment,
    pub quality: DecisionQuality,
}

impl TradeRequest {
    /// The wire-shape proposal for this request.
    pub fn to_proposal(&self) -> ProposalRequest {
        ProposalRequest::new(
            &self.symbol,
            self.contract_type,
            self.amount,
            self.duration_secs,
        )
    }
}

/// Owns all session state; see the module docs.
pub struct TradingSession {
    pub settings: TradeSettings,
    candles: Vec<Candle>,
    ticks: Vec<Tick>,
    weights: IndicatorWeights,
    roster: AgentRoster,
    regime: Regime,
    history: TradeHistory,
    performance: PerformanceMetrics,
    last_trade: Option<LastTradeSnapshot>,
    decision_memory: VecDeque<DecisionMemo>,
    lock: ContractLock,
    pending: Option<PendingTrade>,
    rng: StdRng,
    balance: Option<f64>,
    trades_made: u64,
}

impl TradingSession {
    pub fn new(settings: TradeSettings) -> Self {
        Self::with_rng(settings, StdRng::from_os_rng())
    }

    /// Session with a caller-controlled RNG (tests seed this).
    pub fn with_rng(settings: TradeSettings, rng: StdRng) -> Self {
        Self {
            settings,
            candles: Vec::new(),
            ticks: Vec::new(),
            weights: IndicatorWeights::default(),
            roster: AgentRoster::new(),
            regime: Regime::unknown(),
            history: TradeHistory::new(),
            performance: PerformanceMetrics::default(),
            last_trade: None,
            decision_memory: VecDeque::new(),
            lock: ContractLock::new(),
            pending: None,
            rng,
            balance: None,
            trades_made: 0,
        }
    }

    /// Rebuilds a session from persisted state.
    pub fn from_store(data: StoreData) -> Self {
        let mut session = Self::new(data.settings);
        session.last_trade = data.last_trade;
        session.history = TradeHistory::from_records(data.history);
        session
    }

    /// Snapshot of everything worth persisting.
    pub fn to_store(&self) -> StoreData {
        StoreData {
            history: self.history.records().to_vec(),
            last_trade: self.last_trade.clone(),
            settings: self.settings.clone(),
        }
    }

    // -- Feed events --

    /// Replaces the whole working window with a fresh snapshot.
    pub fn on_candle_snapshot(&mut self, mut candles: Vec<Candle>) {
        if candles.len() > CANDLE_WINDOW {
            candles.drain(..candles.len() - CANDLE_WINDOW);
        }
        info!(count = candles.len(), "Candle window refreshed");
        self.candles = candles;
    }

    /// Appends a tick; rolls a new synthetic candle once the tick falls
    /// past the current bar's window.
    pub fn on_tick(&mut self, tick: Tick) {
        self.ticks.push(tick);
        if self.ticks.len() > TICK_BUFFER {
            self.ticks.remove(0);
        }

        if let Some(last) = self.candles.last() {
            if tick.epoch > last.epoch + i64::from(self.settings.granularity) {
                self.candles.push(Candle::from_tick(&tick));
                if self.candles.len() > CANDLE_WINDOW {
                    self.candles.remove(0);
                }
                debug!(epoch = tick.epoch, "Rolled new candle from tick");
            }
        }
    }

    /// The broker accepted our authorization.
    pub fn on_authorized(&mut self, balance: f64) {
        info!(balance, "Authorized");
        self.balance = Some(balance);
    }

    /// An error-bearing message arrived.
    ///
    /// A pending purchase is abandoned (the buy may never have gone out);
    /// a confirmed contract stays locked until settlement, timeout or
    /// disconnect.
    pub fn on_error(&mut self, message: &str) {
        warn!(message, "Broker error");
        if self.lock.state() == LockState::PurchasePending {
            warn!("Error during purchase - releasing contract lock");
            self.lock.abort_purchase();
            self.pending = None;
        }
    }

    /// The transport dropped; in-flight contract state is unknown.
    pub fn on_disconnect(&mut self) {
        warn!("Connection lost - releasing contract lock");
        self.lock.on_disconnect();
        self.pending = None;
    }

    /// A purchase confirmation arrived: engage the lock and open a
    /// pending trade record.
    pub fn on_purchase_confirmed(&mut self, contract_id: u64, buy_price: Decimal, now: DateTime<Utc>) {
        self.lock.confirm_purchase(contract_id);

        let pending = self.pending.take();
        let record = TradeRecord {
            time: now,
            mode: TradeMode::Live,
            symbol: self.settings.symbol.clone(),
            amount: buy_price,
            decision: pending.as_ref().map(|p| p.decision).unwrap_or(Action::Hold),
            result: TradeResult::Pending,
            profit: Decimal::ZERO,
            confidence: pending.as_ref().map(|p| p.confidence).unwrap_or(0.0),
            composite_signal: pending
                .as_ref()
                .map(|p| p.composite_signal)
                .unwrap_or(0.0),
            regime: pending.as_ref().map(|p| p.regime).unwrap_or(self.regime.kind),
            mood: pending.as_ref().map(|p| p.mood).unwrap_or(MoodLabel::Neutral),
            agent: pending
                .as_ref()
                .map(|p| p.agent.clone())
                .unwrap_or_else(|| self.roster.active().name.to_string()),
            contract_id: Some(contract_id),
            duration_secs: pending.map(|p| p.duration_secs).unwrap_or(0),
        };
        info!(contract_id, "Live buy confirmed - contract locked");
        self.history.push(record);
    }

    /// A contract update arrived: settle or, for an open contract past
    /// the profit threshold, ask the transport to sell it back.
    pub fn on_contract_update(
        &mut self,
        contract_id: u64,
        status: ContractStatus,
        profit: Decimal,
        bid_price: Decimal,
    ) -> Option<SellRequest> {
        let mut sell = None;
        if status == ContractStatus::Open && profit >= self.settings.profit_threshold {
            info!(
                contract_id,
                %profit,
                threshold = %self.settings.profit_threshold,
                "Profit threshold hit - selling contract"
            );
            sell = Some(SellRequest::new(contract_id, bid_price));
        }

        let Some(record) = self.history.find_by_contract_mut(contract_id) else {
            if status.is_settled() {
                warn!(contract_id, "Settlement for unknown contract - ignoring");
            }
            return sell;
        };

        let was_open = !record.result.is_settled();
        record.profit = profit;
        record.result = match status {
            ContractStatus::Open => TradeResult::Open,
            ContractStatus::Won => TradeResult::Won,
            ContractStatus::Lost => TradeResult::Lost,
            ContractStatus::Sold => TradeResult::Sold,
        };

        if status.is_settled() && was_open {
            let settled = record.clone();
            info!(
                contract_id,
                result = ?settled.result,
                %profit,
                "Contract settled"
            );
            if let Some(balance) = self.balance.as_mut() {
                *balance += profit.to_f64().unwrap_or(0.0);
            }
            self.record_trade_outcome(&settled);
            self.lock.settle(contract_id);
        }

        sell
    }

    // -- Decision cycle --

    /// Runs one full decision cycle against the current window.
    ///
    /// Refreshes the regime (re-applying weight presets when its kind
    /// changes), refines the weights from history, re-selects the agent,
    /// and evaluates the fused signals.
    pub fn run_decision_cycle(&mut self, now: DateTime<Utc>) -> Decision {
        let regime = detect_market_regime(&self.candles);
        if regime.kind != self.regime.kind {
            info!(
                from = self.regime.kind.as_str(),
                to = regime.kind.as_str(),
                "Regime change"
            );
            self.weights
                .apply_regime_preset(regime.kind, self.history.recent_win_rate(20));
        }
        self.regime = regime;

        self.weights.refine(self.history.records(), &self.regime);
        self.roster.select_best(self.history.records(), &mut self.rng);

        let active = self.roster.active();
        let agent = AgentStats {
            name: active.name.to_string(),
            win_rate: active.win_rate,
            trades: active.trades,
        };
        let effective = self.weights.effective(active);

        let ctx = CycleContext {
            candles: &self.candles,
            ticks: &self.ticks,
            weights: effective,
            regime: self.regime,
            recent_trades: self.history.recent(20),
            last_trade: self.last_trade.as_ref(),
            agent,
            now,
        };
        let decision = evaluate_cycle(&ctx);

        info!(
            action = decision.action.as_str(),
            confidence = decision.confidence,
            composite = decision.composite_signal,
            reason = %decision.reason,
            "Decision"
        );

        self.decision_memory.push_back(DecisionMemo {
            time: now,
            action: decision.action,
            confidence: decision.confidence,
            composite_signal: decision.composite_signal,
            mood: decision.mood.label,
            regime: decision.regime.kind,
        });
        while self.decision_memory.len() > DECISION_MEMORY {
            self.decision_memory.pop_front();
        }

        decision
    }

    /// Turns a tradeable decision into trade parameters and claims the
    /// contract lock.
    ///
    /// Returns `None` (a no-op) while a contract is open or pending. Risk
    /// is assessed before anything goes out; very high risk is surfaced
    /// loudly but does not veto — the confirmation pipeline already had
    /// its chance.
    pub fn request_trade(&mut self, decision: &Decision, now: DateTime<Utc>) -> Option<TradeRequest> {
        if self.lock.is_engaged() {
            warn!("Contract lock active - cannot request new trade");
            return None;
        }
        if !decision.action.is_buy() && !decision.action.is_sell() {
            return None;
        }

        let historical = analyze_historical_context(
            self.history.recent(20),
            decision.action,
            self.regime.kind,
            now,
        );
        let price = self.candles.last().map(|c| c.close).unwrap_or(1.0);
        let snapshot = decision.indicators.as_ref();
        let risk_inputs = RiskInputs {
            volatility: snapshot.map(|s| s.volatility).unwrap_or(0.0),
            atr: snapshot.and_then(|s| s.atr),
            price,
            pattern: snapshot
                .map(|s| s.pattern)
                .unwrap_or_else(|| crate::analysis::patterns::identify_pattern(&[])),
        };
        let risk = assess_trade_risk(
            decision.action,
            decision.confidence,
            &risk_inputs,
            &decision.regime,
            &decision.mood,
            &decision.temporal,
            &historical,
        );
        if risk.score > 0.75 {
            warn!(
                category = risk.category.as_str(),
                recommendation = %risk.recommendation,
                "High risk alert"
            );
        }

        let duration = optimize_trade_duration(
            decision.confidence,
            &decision.regime,
            risk_inputs.volatility,
            &risk_inputs.pattern,
            self.settings.granularity,
        );
        let quality = calculate_decision_quality(decision);

        if !self.lock.begin_purchase() {
            return None;
        }

        let contract_type = if decision.action.is_buy() {
            ContractType::Call
        } else {
            ContractType::Put
        };

        self.pending = Some(PendingTrade {
            decision: decision.action,
            confidence: decision.confidence,
            composite_signal: decision.composite_signal,
            regime: decision.regime.kind,
            mood: decision.mood.label,
            agent: decision.agent.name.clone(),
            duration_secs: duration.duration_secs,
        });

        info!(
            contract_type = contract_type.as_str(),
            duration_secs = duration.duration_secs,
            risk = risk.category.as_str(),
            quality = quality.grade.as_str(),
            rationale = %duration.rationale,
            "Requesting trade"
        );

        Some(TradeRequest {
            symbol: self.settings.symbol.clone(),
            contract_type,
            amount: self.settings.stake,
            duration_secs: duration.duration_secs,
            risk,
            quality,
        })
    }

    /// The periodic auto-trading check.
    ///
    /// Short-circuits immediately while the lock is engaged (no decision
    /// computation), otherwise runs a cycle and either requests a live
    /// proposal or settles a simulated trade locally.
    pub fn auto_check(&mut self, now: DateTime<Utc>) -> Option<ProposalRequest> {
        if self.lock.is_engaged() {
            info!("Waiting for active contract to complete");
            return None;
        }
        if self.candles.len() < MIN_CANDLES {
            warn!(
                candles = self.candles.len(),
                "Insufficient candle data for decision"
            );
            return None;
        }

        let decision = self.run_decision_cycle(now);
        if decision.action == Action::Hold || decision.confidence < TRADE_CONFIDENCE_FLOOR {
            debug!(
                confidence = decision.confidence,
                "Holding - signal strength insufficient"
            );
            return None;
        }

        if self.settings.live_mode {
            let request = self.request_trade(&decision, now)?;
            Some(request.to_proposal())
        } else {
            self.simulate_cycle(&decision, now);
            None
        }
    }

    /// Settles a simulated trade locally and feeds it through the same
    /// performance paths a live settlement takes.
    fn simulate_cycle(&mut self, decision: &Decision, now: DateTime<Utc>) {
        let historical = analyze_historical_context(
            self.history.recent(20),
            decision.action,
            self.regime.kind,
            now,
        );
        let price = self.candles.last().map(|c| c.close).unwrap_or(1.0);
        let snapshot = decision.indicators.as_ref();
        let risk_inputs = RiskInputs {
            volatility: snapshot.map(|s| s.volatility).unwrap_or(0.0),
            atr: snapshot.and_then(|s| s.atr),
            price,
            pattern: snapshot
                .map(|s| s.pattern)
                .unwrap_or_else(|| crate::analysis::patterns::identify_pattern(&[])),
        };
        let risk = assess_trade_risk(
            decision.action,
            decision.confidence,
            &risk_inputs,
            &decision.regime,
            &decision.mood,
            &decision.temporal,
            &historical,
        );
        let duration = optimize_trade_duration(
            decision.confidence,
            &decision.regime,
            risk_inputs.volatility,
            &risk_inputs.pattern,
            self.settings.granularity,
        );

        let outcome = simulate_trade(
            decision,
            &self.settings.symbol,
            self.settings.stake,
            duration.duration_secs,
            &historical,
            &risk,
            self.roster.active().win_rate,
            &mut self.rng,
            now,
        );
        info!(
            result = ?outcome.record.result,
            profit = %outcome.record.profit,
            win_probability = outcome.win_probability,
            risk = risk.category.as_str(),
            agent = %outcome.record.agent,
            "Simulated trade settled"
        );

        let record = outcome.record;
        self.history.push(record.clone());
        self.record_trade_outcome(&record);
    }

    /// Feeds a settled trade into the adaptive loops: performance
    /// counters, agent stats, the last-trade snapshot and the periodic
    /// weight auto-tuning.
    pub fn record_trade_outcome(&mut self, record: &TradeRecord) {
        self.performance.absorb(record);
        self.roster
            .record_outcome(&record.agent, record.result.is_win());
        self.last_trade = Some(LastTradeSnapshot::from_record(record));
        self.trades_made += 1;

        let total = self.performance.total_trades();
        if total > 0 && total % 10 == 0 {
            let rate = self.performance.win_rate();
            if rate < 0.45 {
                self.weights.momentum = (self.weights.momentum * 1.08).min(1.5);
                self.weights.rsi = (self.weights.rsi * 1.05).min(1.4);
                info!(
                    win_rate = rate,
                    "Auto-tuning: increased momentum and RSI weights"
                );
            } else if rate > 0.65 {
                self.weights.bb = (self.weights.bb * 1.05).min(1.4);
                self.weights.momentum = (self.weights.momentum * 0.95).max(0.6);
                info!(win_rate = rate, "Auto-tuning: adjusted BB and momentum");
            }
        }
    }

    // -- Accessors --

    pub fn lock_state(&mut self) -> LockState {
        self.lock.state()
    }

    /// Operator override; never refuse it.
    pub fn force_unlock(&mut self) {
        warn!("Manual unlock executed");
        self.lock.force_unlock();
        self.pending = None;
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    pub fn regime(&self) -> &Regime {
        &self.regime
    }

    pub fn history(&self) -> &TradeHistory {
        &self.history
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance
    }

    pub fn decision_memory(&self) -> &VecDeque<DecisionMemo> {
        &self.decision_memory
    }

    pub fn balance(&self) -> Option<f64> {
        self.balance
    }

    pub fn trades_made(&self) -> u64 {
        self.trades_made
    }
}
