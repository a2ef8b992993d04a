//! A player in a match

use crate::provider::{DecisionProvider, History};
use crate::strategy::Move;
use crate::summary::cooperation_rate;

/// Agent identity, decision provider and accumulated state
///
/// Only the match engine mutates histories and score, once per round.
pub struct Agent {
    name: String,
    provider: Box<dyn DecisionProvider>,
    history: Vec<Move>,
    opponent_history: Vec<Move>,
    score: u64,
}

impl Agent {
    pub fn new(name: impl Into<String>, provider: Box<dyn DecisionProvider>) -> Self {
        Self {
            name: name.into(),
            provider,
            history: Vec::new(),
            opponent_history: Vec::new(),
            score: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Label of the underlying decision provider
    pub fn provider_label(&self) -> String {
        self.provider.label()
    }

    pub fn history(&self) -> &[Move] {
        &self.history
    }

    pub fn opponent_history(&self) -> &[Move] {
        &self.opponent_history
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn cooperation_rate(&self) -> f64 {
        cooperation_rate(&self.history)
    }

    /// Ask the provider for the next move. Leaves history and score untouched.
    pub async fn choose_action(&mut self) -> Move {
        let history = History::new(&self.history, &self.opponent_history);
        self.provider.choose(history).await
    }

    /// Record one round from this agent's perspective
    pub fn update_history(&mut self, own: Move, opponent: Move) {
        self.history.push(own);
        self.opponent_history.push(opponent);
    }

    pub fn update_score(&mut self, delta: u64) {
        self.score += delta;
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("provider", &self.provider.label())
            .field("rounds", &self.history.len())
            .field("score", &self.score)
            .finish()
    }
}
