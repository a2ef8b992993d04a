//! Aggregate statistics for a match

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::game::RoundResult;
use crate::strategy::Move;

/// Fraction of moves that are [`Move::Cooperate`]; 0 for an empty history
pub fn cooperation_rate(history: &[Move]) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    let cooperations = history.iter().filter(|m| **m == Move::Cooperate).count();
    cooperations as f64 / history.len() as f64
}

/// Per-agent figures
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub name: String,
    pub total_score: u64,
    pub cooperation_rate: f64,
}

impl AgentSummary {
    pub fn from_agent(agent: &Agent) -> Self {
        Self {
            name: agent.name().to_string(),
            total_score: agent.score(),
            cooperation_rate: agent.cooperation_rate(),
        }
    }
}

/// Snapshot of a match, recomputed from agent state on demand
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    /// Configured number of rounds
    pub iterations: u32,
    pub rounds_played: u32,
    pub first: AgentSummary,
    pub second: AgentSummary,
}

impl MatchSummary {
    pub fn from_agents(iterations: u32, first: &Agent, second: &Agent) -> Self {
        Self {
            iterations,
            rounds_played: first.history().len() as u32,
            first: AgentSummary::from_agent(first),
            second: AgentSummary::from_agent(second),
        }
    }
}

/// Everything worth keeping from a finished match
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchRecord {
    pub summary: MatchSummary,
    pub rounds: Vec<RoundResult>,
}

impl MatchRecord {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
