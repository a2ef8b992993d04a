//! Match execution engine

use std::{ops::ControlFlow, time::Duration};

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::payoff;
use crate::strategy::Move;
use crate::summary::MatchSummary;

/// Upper bound on rounds reserved up front; longer matches grow on demand
const RESERVED_ROUNDS: usize = 1024;

/// Result of a single round
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    /// 1-based round number
    pub round: u32,
    pub move_a: Move,
    pub move_b: Move,
    pub score_a: u8,
    pub score_b: u8,
    pub cumulative_a: u64,
    pub cumulative_b: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("both agents are named {0:?}; names must be unique within a match")]
    DuplicateName(String),
}

/// Receives round outcomes while a match runs
///
/// Returning [`ControlFlow::Break`] from [`before_round`](Self::before_round)
/// or [`on_round`](Self::on_round) stops the match before the next round
/// starts.
pub trait MatchObserver {
    fn on_start(&mut self, _first: &Agent, _second: &Agent, _iterations: u32) {}

    fn before_round(&mut self, _round: u32) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn on_round(&mut self, _round: &RoundResult, _first: &Agent, _second: &Agent) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn on_finish(&mut self, _summary: &MatchSummary) {}
}

impl MatchObserver for () {}

/// An iterated game between exactly two agents
#[derive(Debug)]
pub struct Match {
    first: Agent,
    second: Agent,
    iterations: u32,
    delay: Duration,
    results: Vec<RoundResult>,
}

impl Match {
    pub fn new(first: Agent, second: Agent, iterations: u32) -> Result<Self, MatchError> {
        if first.name() == second.name() {
            return Err(MatchError::DuplicateName(first.name().to_string()));
        }

        Ok(Self {
            first,
            second,
            iterations,
            delay: Duration::ZERO,
            results: Vec::with_capacity((iterations as usize).min(RESERVED_ROUNDS)),
        })
    }

    /// Pause between rounds, e.g. to respect service rate limits
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn first(&self) -> &Agent {
        &self.first
    }

    pub fn second(&self) -> &Agent {
        &self.second
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn rounds_played(&self) -> u32 {
        self.results.len() as u32
    }

    pub fn is_finished(&self) -> bool {
        self.rounds_played() >= self.iterations
    }

    pub fn results(&self) -> &[RoundResult] {
        &self.results
    }

    pub fn summary(&self) -> MatchSummary {
        MatchSummary::from_agents(self.iterations, &self.first, &self.second)
    }

    /// Play one round. Returns `None` once all iterations have been played.
    pub async fn play_round(&mut self) -> Option<RoundResult> {
        if self.is_finished() {
            return None;
        }

        // Simultaneous choice: neither agent can observe the other's move
        let (move_a, move_b) = tokio::join!(self.first.choose_action(), self.second.choose_action());

        // Each agent scores from its own perspective
        let (score_a, score_b) = payoff(move_a, move_b);

        self.first.update_history(move_a, move_b);
        self.second.update_history(move_b, move_a);
        self.first.update_score(score_a.into());
        self.second.update_score(score_b.into());

        let result = RoundResult {
            round: self.rounds_played() + 1,
            move_a,
            move_b,
            score_a,
            score_b,
            cumulative_a: self.first.score(),
            cumulative_b: self.second.score(),
        };
        tracing::debug!(
            round = result.round,
            %move_a,
            %move_b,
            score_a,
            score_b,
            "round complete"
        );
        self.results.push(result.clone());

        Some(result)
    }

    /// Play all remaining rounds in order
    ///
    /// The observer sees every round as it completes and the summary at the
    /// end. The configured delay is applied between rounds, never after the
    /// last one.
    pub async fn run(&mut self, observer: &mut dyn MatchObserver) -> &[RoundResult] {
        tracing::info!(
            first = self.first.name(),
            first_provider = %self.first.provider_label(),
            second = self.second.name(),
            second_provider = %self.second.provider_label(),
            iterations = self.iterations(),
            "match started"
        );
        observer.on_start(&self.first, &self.second, self.iterations());

        while !self.is_finished() {
            let next = self.rounds_played() + 1;
            if observer.before_round(next).is_break() {
                tracing::info!(round = next, "match cancelled");
                break;
            }
            let Some(result) = self.play_round().await else {
                break;
            };
            if observer.on_round(&result, &self.first, &self.second).is_break() {
                tracing::info!(round = result.round, "match cancelled");
                break;
            }
            if !self.delay.is_zero() && !self.is_finished() {
                tokio::time::sleep(self.delay).await;
            }
        }

        let summary = self.summary();
        tracing::info!(
            rounds = summary.rounds_played,
            first_score = summary.first.total_score,
            second_score = summary.second.total_score,
            "match finished"
        );
        observer.on_finish(&summary);

        &self.results
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use proptest::prelude::*;

    use super::*;
    use crate::delegate::{Credential, DecisionRequest, DecisionService, DelegateProvider};
    use crate::provider::{FixedProvider, RandomProvider, ScriptedProvider};
    use crate::strategy::Strategy;

    fn fixed(name: &str, strategy: Strategy) -> Agent {
        Agent::new(name, Box::new(FixedProvider::new(strategy)))
    }

    fn random(name: &str, seed: u64) -> Agent {
        Agent::new(name, Box::new(RandomProvider::seeded(seed)))
    }

    fn scripted(name: &str, moves: Vec<Move>) -> Agent {
        Agent::new(name, Box::new(ScriptedProvider::new(moves)))
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
    }

    fn assert_aligned(game: &Match, n: usize) {
        let (a, b) = (game.first(), game.second());
        assert_eq!(a.history().len(), n);
        assert_eq!(a.opponent_history().len(), n);
        assert_eq!(b.history().len(), n);
        assert_eq!(b.opponent_history().len(), n);
        assert_eq!(a.history(), b.opponent_history());
        assert_eq!(b.history(), a.opponent_history());
    }

    fn assert_scores_reconstruct(game: &Match) {
        let sum_a: u64 = game.results().iter().map(|r| r.score_a as u64).sum();
        let sum_b: u64 = game.results().iter().map(|r| r.score_b as u64).sum();
        assert_eq!(game.first().score(), sum_a);
        assert_eq!(game.second().score(), sum_b);

        for r in game.results() {
            let (a, b) = payoff(r.move_a, r.move_b);
            assert_eq!((r.score_a, r.score_b), (a, b));
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Match::new(
            fixed("bot", Strategy::AlwaysCooperate),
            fixed("bot", Strategy::AlwaysDefect),
            3,
        )
        .unwrap_err();
        assert!(matches!(err, MatchError::DuplicateName(ref n) if n == "bot"));
    }

    #[tokio::test]
    async fn test_cooperate_vs_defect_three_rounds() {
        let mut game = Match::new(
            fixed("A", Strategy::AlwaysCooperate),
            fixed("B", Strategy::AlwaysDefect),
            3,
        )
        .unwrap();

        let results = game.run(&mut ()).await.to_vec();
        assert_eq!(results.len(), 3);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.round, i as u32 + 1);
            assert_eq!(r.move_a, Move::Cooperate);
            assert_eq!(r.move_b, Move::Defect);
            assert_eq!(r.score_a, 0);
            assert_eq!(r.score_b, 5);
        }

        let summary = game.summary();
        assert_eq!(summary.iterations, 3);
        assert_eq!(summary.first.total_score, 0);
        assert_eq!(summary.second.total_score, 15);
        assert_eq!(summary.first.cooperation_rate, 1.0);
        assert_eq!(summary.second.cooperation_rate, 0.0);
    }

    #[tokio::test]
    async fn test_defect_vs_cooperate_from_b_perspective() {
        let mut game = Match::new(
            fixed("A", Strategy::AlwaysDefect),
            fixed("B", Strategy::AlwaysCooperate),
            4,
        )
        .unwrap();
        game.run(&mut ()).await;

        assert_eq!(game.first().score(), 20);
        assert_eq!(game.second().score(), 0);
        assert_eq!(game.second().opponent_history(), &[Move::Defect; 4]);
    }

    #[tokio::test]
    async fn test_tft_vs_always_defect() {
        let mut game = Match::new(
            fixed("tft", Strategy::TitForTat),
            fixed("ad", Strategy::AlwaysDefect),
            10,
        )
        .unwrap();
        let results = game.run(&mut ()).await;

        // Round 1: TFT cooperates, AD defects
        assert_eq!(results[0].move_a, Move::Cooperate);
        assert_eq!(results[0].move_b, Move::Defect);

        // Round 2+: TFT retaliates, both defect
        for round in results.iter().skip(1) {
            assert_eq!(round.move_a, Move::Defect);
            assert_eq!(round.move_b, Move::Defect);
        }
    }

    #[tokio::test]
    async fn test_cumulative_scores() {
        let mut game = Match::new(random("a", 1), random("b", 2), 50).unwrap();
        game.run(&mut ()).await;

        let mut expected_a = 0u64;
        let mut expected_b = 0u64;
        for round in game.results() {
            expected_a += round.score_a as u64;
            expected_b += round.score_b as u64;
            assert_eq!(round.cumulative_a, expected_a);
            assert_eq!(round.cumulative_b, expected_b);
        }
        assert_scores_reconstruct(&game);
        assert_aligned(&game, 50);
    }

    #[tokio::test]
    async fn test_play_round_stops_at_iterations() {
        let mut game = Match::new(random("a", 1), random("b", 2), 2).unwrap();

        assert!(game.play_round().await.is_some());
        assert!(game.play_round().await.is_some());
        assert!(game.is_finished());
        assert!(game.play_round().await.is_none());
        assert_eq!(game.rounds_played(), 2);
    }

    #[tokio::test]
    async fn test_zero_iterations() {
        let mut game = Match::new(random("a", 1), random("b", 2), 0).unwrap();
        assert!(game.run(&mut ()).await.is_empty());

        let summary = game.summary();
        assert_eq!(summary.first.cooperation_rate, 0.0);
        assert_eq!(summary.second.cooperation_rate, 0.0);
    }

    #[tokio::test]
    async fn test_seeded_match_is_reproducible() {
        let mut g1 = Match::new(random("a", 9), random("b", 10), 30).unwrap();
        let mut g2 = Match::new(random("a", 9), random("b", 10), 30).unwrap();

        assert_eq!(g1.run(&mut ()).await, g2.run(&mut ()).await);
    }

    #[tokio::test]
    async fn test_random_converges_to_half() {
        let mut game = Match::new(random("a", 11), random("b", 12), 10_000).unwrap();
        game.run(&mut ()).await;

        let summary = game.summary();
        for rate in [summary.first.cooperation_rate, summary.second.cooperation_rate] {
            assert!((0.45..0.55).contains(&rate), "cooperation rate {rate} not ~0.5");
        }
    }

    struct FailingService;

    #[async_trait]
    impl DecisionService for FailingService {
        async fn complete(&self, _: &Credential, _: &DecisionRequest) -> anyhow::Result<String> {
            anyhow::bail!("service unavailable")
        }
    }

    #[tokio::test]
    async fn test_failing_service_match_completes() {
        let service = Arc::new(FailingService);
        let delegate = |seed| {
            DelegateProvider::new(
                service.clone(),
                Some(Credential::new("key")),
                RandomProvider::seeded(seed),
            )
        };
        let mut game = Match::new(
            Agent::new("llm-a", Box::new(delegate(1))),
            Agent::new("llm-b", Box::new(delegate(2))),
            25,
        )
        .unwrap();

        assert_eq!(game.run(&mut ()).await.len(), 25);
        assert_aligned(&game, 25);
        assert_scores_reconstruct(&game);
    }

    /// Records rounds and stops after a fixed count
    struct StopAfter {
        limit: u32,
        seen: Vec<u32>,
        finished: Option<MatchSummary>,
    }

    impl MatchObserver for StopAfter {
        fn on_round(&mut self, round: &RoundResult, first: &Agent, _second: &Agent) -> ControlFlow<()> {
            assert_eq!(first.history().len() as u32, round.round);
            self.seen.push(round.round);
            if round.round >= self.limit {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }

        fn on_finish(&mut self, summary: &MatchSummary) {
            self.finished = Some(summary.clone());
        }
    }

    #[tokio::test]
    async fn test_observer_can_cancel() {
        let mut game = Match::new(random("a", 1), random("b", 2), 10).unwrap();
        let mut observer = StopAfter {
            limit: 4,
            seen: Vec::new(),
            finished: None,
        };

        assert_eq!(game.run(&mut observer).await.len(), 4);
        assert_eq!(observer.seen, vec![1, 2, 3, 4]);
        assert!(!game.is_finished());

        let summary = observer.finished.unwrap();
        assert_eq!(summary.iterations, 10);
        assert_eq!(summary.rounds_played, 4);
    }

    #[tokio::test]
    async fn test_huge_iteration_count_plays() {
        let mut game = Match::new(random("a", 1), random("b", 2), u32::MAX).unwrap();

        assert!(game.play_round().await.is_some());
        assert_eq!(game.rounds_played(), 1);
        assert_eq!(game.iterations(), u32::MAX);
        assert!(!game.is_finished());
    }

    /// Remembers what the engine announced at start
    #[derive(Default)]
    struct StartLog(Vec<(String, String, u32)>);

    impl MatchObserver for StartLog {
        fn on_start(&mut self, first: &Agent, second: &Agent, iterations: u32) {
            self.0.push((first.provider_label(), second.provider_label(), iterations));
        }
    }

    #[tokio::test]
    async fn test_observer_sees_start() {
        let mut game = Match::new(
            fixed("tft", Strategy::TitForTat),
            random("coin", 3),
            2,
        )
        .unwrap();
        let mut observer = StartLog::default();
        game.run(&mut observer).await;

        assert_eq!(observer.0.len(), 1);
        let (first, second, iterations) = &observer.0[0];
        assert!(first.starts_with("TitForTat"));
        assert_eq!(second, "random");
        assert_eq!(*iterations, 2);
    }

    struct CancelBefore(u32);

    impl MatchObserver for CancelBefore {
        fn before_round(&mut self, round: u32) -> ControlFlow<()> {
            if round >= self.0 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }
    }

    #[tokio::test]
    async fn test_cancel_before_round() {
        let mut game = Match::new(random("a", 1), random("b", 2), 10).unwrap();
        assert_eq!(game.run(&mut CancelBefore(3)).await.len(), 2);
        assert_eq!(game.summary().rounds_played, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_rounds_only() {
        let mut game = Match::new(
            scripted("a", vec![Move::Cooperate]),
            scripted("b", vec![Move::Defect, Move::Cooperate]),
            3,
        )
        .unwrap()
        .with_delay(Duration::from_secs(1));

        let start = tokio::time::Instant::now();
        game.run(&mut ()).await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2), "slept {elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "slept {elapsed:?}");
        assert_eq!(game.second().history(), &[Move::Defect, Move::Cooperate, Move::Defect]);
    }

    proptest! {
        #[test]
        fn prop_histories_aligned_and_scores_consistent(
            script_a in prop::collection::vec(any::<bool>(), 1..8),
            script_b in prop::collection::vec(any::<bool>(), 1..8),
            rounds in 0u32..40,
        ) {
            let to_moves = |bits: Vec<bool>| -> Vec<Move> {
                bits.into_iter()
                    .map(|b| if b { Move::Cooperate } else { Move::Defect })
                    .collect()
            };
            let mut game = Match::new(
                scripted("a", to_moves(script_a)),
                scripted("b", to_moves(script_b)),
                rounds,
            )
            .unwrap();

            runtime().block_on(game.run(&mut ()));

            prop_assert_eq!(game.results().len(), rounds as usize);
            assert_aligned(&game, rounds as usize);
            assert_scores_reconstruct(&game);
        }
    }
}
