//! Strategy agents: named presets of indicator-weight multipliers.
//!
//! Four fixed agents represent trading styles; one is active per cycle.
//! Selection is explore/exploit: the best scorer by rolling win rate wins,
//! with a fixed 10% chance of picking any agent uniformly so the roster
//! keeps gathering evidence on the others.

use rand::Rng;
use rand::rngs::StdRng;

use crate::history::TradeRecord;

/// Exploration probability per selection.
const EXPLORE_PROBABILITY: f64 = 0.1;

/// Minimum history length before any re-selection happens.
const MIN_HISTORY: usize = 20;

/// Rolling trade window agent statistics are computed over.
const STATS_WINDOW: usize = 100;

/// Per-indicator multipliers describing an agent's style.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentMultipliers {
    pub ma: f64,
    pub momentum: f64,
    pub rsi: f64,
    pub bb: f64,
}

/// A named strategy preset with its rolling performance stats.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub name: &'static str,
    pub multipliers: AgentMultipliers,
    pub wins: u32,
    pub trades: u32,
    pub win_rate: f64,
}

impl AgentProfile {
    const fn new(name: &'static str, ma: f64, momentum: f64, rsi: f64, bb: f64) -> Self {
        Self {
            name,
            multipliers: AgentMultipliers { ma, momentum, rsi, bb },
            wins: 0,
            trades: 0,
            win_rate: 0.5,
        }
    }

    /// Selection score: mostly win rate, with a bonus for a proven sample.
    fn score(&self) -> f64 {
        self.win_rate * 0.7 + if self.trades > 10 { 0.3 } else { 0.0 }
    }
}

/// The fixed set of agents plus which one is currently active.
#[derive(Debug, Clone)]
pub struct AgentRoster {
    agents: Vec<AgentProfile>,
    active: usize,
}

impl AgentRoster {
    /// Builds the fixed roster; `balanced` starts active.
    pub fn new() -> Self {
        Self {
            agents: vec![
                AgentProfile::new("trend_focus", 1.3, 0.7, 0.9, 1.0),
                AgentProfile::new("momentum_focus", 0.7, 1.4, 1.1, 0.8),
                AgentProfile::new("balanced", 1.0, 1.0, 1.0, 1.0),
                AgentProfile::new("volatility_rider", 0.8, 1.2, 0.7, 1.3),
            ],
            active: 2,
        }
    }

    pub fn agents(&self) -> &[AgentProfile] {
        &self.agents
    }

    pub fn active(&self) -> &AgentProfile {
        &self.agents[self.active]
    }

    /// Recomputes each agent's rolling stats from the newest trades and
    /// switches the active agent to the top scorer — or, with 10%
    /// probability, to a uniformly random one.
    ///
    /// Keeps the current agent when there is too little history to judge.
    pub fn select_best(&mut self, history: &[TradeRecord], rng: &mut StdRng) {
        if history.len() < MIN_HISTORY {
            return;
        }

        let window = &history[..history.len().min(STATS_WINDOW)];
        for agent in &mut self.agents {
            let agent_trades: Vec<&TradeRecord> =
                window.iter().filter(|t| t.agent == agent.name).collect();
            agent.trades = agent_trades.len() as u32;
            agent.wins = agent_trades.iter().filter(|t| t.result.is_win()).count() as u32;
            agent.win_rate = if agent.trades > 0 {
                agent.wins as f64 / agent.trades as f64
            } else {
                0.5
            };
        }

        if rng.random::<f64>() < EXPLORE_PROBABILITY {
            self.active = rng.random_range(0..self.agents.len());
            return;
        }

        self.active = self
            .agents
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                a.score()
                    .partial_cmp(&b.score())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
            .unwrap_or(self.active);
    }

    /// Counts a settled trade toward the agent that placed it.
    pub fn record_outcome(&mut self, agent_name: &str, won: bool) {
        if let Some(agent) = self.agents.iter_mut().find(|a| a.name == agent_name) {
            agent.trades += 1;
            if won {
                agent.wins += 1;
            }
            agent.win_rate = agent.wins as f64 / agent.trades as f64;
        }
    }
}

impl Default for AgentRoster {
    fn default() -> Self {
        Self::new()
    }
}
