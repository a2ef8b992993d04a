//! Decision providers
//!
//! A provider turns one agent's observed history into that agent's next move.
//! Providers are infallible: whatever happens internally, they always answer
//! with a valid [`Move`].

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;

use crate::strategy::{Move, Strategy};

/// Read-only view of one agent's history
///
/// Both slices have the same length and index `i` is round `i + 1`.
#[derive(Clone, Copy, Debug)]
pub struct History<'a> {
    pub own: &'a [Move],
    pub opponent: &'a [Move],
}

impl<'a> History<'a> {
    pub fn new(own: &'a [Move], opponent: &'a [Move]) -> Self {
        debug_assert_eq!(own.len(), opponent.len());
        Self { own, opponent }
    }

    /// Number of rounds already played
    pub fn len(&self) -> usize {
        self.own.len()
    }

    pub fn is_empty(&self) -> bool {
        self.own.is_empty()
    }

    /// Past rounds as (own, opponent) pairs
    pub fn rounds(&self) -> impl Iterator<Item = (Move, Move)> + 'a {
        self.own.iter().copied().zip(self.opponent.iter().copied())
    }
}

/// Strategy object producing an agent's next move
#[async_trait]
pub trait DecisionProvider: Send {
    /// Short label for logs and reports
    fn label(&self) -> String;

    /// Choose the next move given the agent's history
    async fn choose(&mut self, history: History<'_>) -> Move;
}

/// Uniformly random choice, independent of history
#[derive(Clone, Debug)]
pub struct RandomProvider {
    rng: ChaCha12Rng,
}

impl RandomProvider {
    pub fn new(rng: ChaCha12Rng) -> Self {
        Self { rng }
    }

    /// Reproducible provider from a 64-bit seed
    pub fn seeded(seed: u64) -> Self {
        Self::new(ChaCha12Rng::seed_from_u64(seed))
    }

    /// Draw one move
    pub fn next_move(&mut self) -> Move {
        if self.rng.random_bool(0.5) {
            Move::Cooperate
        } else {
            Move::Defect
        }
    }
}

#[async_trait]
impl DecisionProvider for RandomProvider {
    fn label(&self) -> String {
        "random".into()
    }

    async fn choose(&mut self, _history: History<'_>) -> Move {
        self.next_move()
    }
}

/// One of the classic deterministic strategies
#[derive(Clone, Copy, Debug)]
pub struct FixedProvider {
    strategy: Strategy,
}

impl FixedProvider {
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }
}

#[async_trait]
impl DecisionProvider for FixedProvider {
    fn label(&self) -> String {
        format!("{:?}: {}", self.strategy, self.strategy.describe())
    }

    async fn choose(&mut self, history: History<'_>) -> Move {
        self.strategy.decide(history.own, history.opponent)
    }
}

/// Plays a fixed sequence of moves, cycling when it runs out
///
/// An empty script always cooperates.
#[derive(Clone, Debug)]
pub struct ScriptedProvider {
    script: Vec<Move>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Move>) -> Self {
        Self { script }
    }
}

#[async_trait]
impl DecisionProvider for ScriptedProvider {
    fn label(&self) -> String {
        "scripted".into()
    }

    async fn choose(&mut self, history: History<'_>) -> Move {
        if self.script.is_empty() {
            return Move::Cooperate;
        }
        self.script[history.len() % self.script.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_determinism() {
        let mut p1 = RandomProvider::seeded(42);
        let mut p2 = RandomProvider::seeded(42);

        for _ in 0..100 {
            assert_eq!(p1.next_move(), p2.next_move());
        }
    }

    #[test]
    fn test_random_different_seeds() {
        let mut p1 = RandomProvider::seeded(1);
        let mut p2 = RandomProvider::seeded(2);

        let moves1: Vec<_> = (0..64).map(|_| p1.next_move()).collect();
        let moves2: Vec<_> = (0..64).map(|_| p2.next_move()).collect();

        assert_ne!(moves1, moves2);
    }

    #[test]
    fn test_random_produces_both_moves() {
        let mut p = RandomProvider::seeded(7);
        let moves: Vec<_> = (0..200).map(|_| p.next_move()).collect();

        assert!(moves.contains(&Move::Cooperate));
        assert!(moves.contains(&Move::Defect));
    }

    #[tokio::test]
    async fn test_fixed_provider_reads_history() {
        let mut p = FixedProvider::new(Strategy::TitForTat);
        let own = [Move::Cooperate];
        let opp = [Move::Defect];

        assert_eq!(p.choose(History::new(&[], &[])).await, Move::Cooperate);
        assert_eq!(p.choose(History::new(&own, &opp)).await, Move::Defect);
    }

    #[test]
    fn test_fixed_label_describes_strategy() {
        let label = FixedProvider::new(Strategy::GrimTrigger).label();
        assert_eq!(label, "GrimTrigger: Cooperates until betrayed, then always defects.");
    }

    #[tokio::test]
    async fn test_scripted_cycles() {
        let mut p = ScriptedProvider::new(vec![Move::Defect, Move::Cooperate]);
        let played = [Move::Defect, Move::Cooperate, Move::Defect];

        assert_eq!(p.choose(History::new(&played[..0], &played[..0])).await, Move::Defect);
        assert_eq!(p.choose(History::new(&played[..1], &played[..1])).await, Move::Cooperate);
        assert_eq!(p.choose(History::new(&played[..2], &played[..2])).await, Move::Defect);
        assert_eq!(p.choose(History::new(&played, &played)).await, Move::Cooperate);
    }

    #[tokio::test]
    async fn test_empty_script_cooperates() {
        let mut p = ScriptedProvider::new(Vec::new());
        assert_eq!(p.choose(History::new(&[], &[])).await, Move::Cooperate);
    }

    #[test]
    fn test_history_rounds_pairs() {
        let own = [Move::Cooperate, Move::Defect];
        let opp = [Move::Defect, Move::Defect];
        let pairs: Vec<_> = History::new(&own, &opp).rounds().collect();

        assert_eq!(pairs, vec![(Move::Cooperate, Move::Defect), (Move::Defect, Move::Defect)]);
    }
}
