//! Match Logic for LLM Prisoner's Arena
//!
//! Core game logic for iterated Prisoner's Dilemma matches between two
//! agents. An agent's move comes from a decision provider: a random coin,
//! a classic fixed strategy, a script, or an external language-model
//! service with a random fallback.

mod agent;
mod delegate;
mod game;
mod provider;
mod strategy;
mod summary;

pub use agent::Agent;
pub use delegate::{
    default_behavior, Credential, DecisionRequest, DecisionService, DelegateProvider, Fallback,
    DEFAULT_TIMEOUT,
};
pub use game::{Match, MatchError, MatchObserver, RoundResult};
pub use provider::{DecisionProvider, FixedProvider, History, RandomProvider, ScriptedProvider};
pub use strategy::{Move, Strategy};
pub use summary::{cooperation_rate, AgentSummary, MatchRecord, MatchSummary};

/// Payoff matrix for the Prisoner's Dilemma
/// Returns (score_a, score_b)
pub fn payoff(a: Move, b: Move) -> (u8, u8) {
    match (a, b) {
        (Move::Cooperate, Move::Cooperate) => (3, 3),
        (Move::Cooperate, Move::Defect) => (0, 5),
        (Move::Defect, Move::Cooperate) => (5, 0),
        (Move::Defect, Move::Defect) => (1, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payoff_matrix() {
        assert_eq!(payoff(Move::Cooperate, Move::Cooperate), (3, 3));
        assert_eq!(payoff(Move::Cooperate, Move::Defect), (0, 5));
        assert_eq!(payoff(Move::Defect, Move::Cooperate), (5, 0));
        assert_eq!(payoff(Move::Defect, Move::Defect), (1, 1));
    }

    #[test]
    fn test_payoff_is_symmetric() {
        for a in [Move::Cooperate, Move::Defect] {
            for b in [Move::Cooperate, Move::Defect] {
                let (x, y) = payoff(a, b);
                assert_eq!(payoff(b, a), (y, x));
            }
        }
    }
}
