//! Console reporting for a running match

use std::{
    ops::ControlFlow,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use match_logic::{Agent, MatchObserver, MatchSummary, RoundResult};

/// Prints rounds as they complete and the final summary.
///
/// Also carries the cancellation flag: once set, the match stops before the
/// next round.
#[derive(Debug)]
pub struct ConsoleReporter {
    verbose: bool,
    cancelled: Arc<AtomicBool>,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            cancelled: Arc::default(),
        }
    }

    /// Handle for requesting cancellation from elsewhere (e.g. a signal task)
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }
}

impl MatchObserver for ConsoleReporter {
    fn on_start(&mut self, first: &Agent, second: &Agent, iterations: u32) {
        if self.verbose {
            println!(
                "{}",
                format_header(
                    (first.name(), &first.provider_label()),
                    (second.name(), &second.provider_label()),
                    iterations,
                )
            );
        }
    }

    fn before_round(&mut self, _round: u32) -> ControlFlow<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn on_round(&mut self, round: &RoundResult, first: &Agent, second: &Agent) -> ControlFlow<()> {
        if self.verbose {
            println!("{}", format_round(round, first.name(), second.name()));
        }
        ControlFlow::Continue(())
    }

    fn on_finish(&mut self, summary: &MatchSummary) {
        println!("{}", format_summary(summary));
    }
}

/// Match banner: who plays whom, backed by which provider
pub fn format_header(first: (&str, &str), second: (&str, &str), iterations: u32) -> String {
    format!(
        "{} ({}) vs {} ({}), {iterations} rounds\n",
        first.0, first.1, second.0, second.1
    )
}

pub fn format_round(round: &RoundResult, first: &str, second: &str) -> String {
    format!(
        "Round {}: {first} {}, {second} {} → Scores: {}, {}",
        round.round, round.move_a, round.move_b, round.score_a, round.score_b
    )
}

pub fn format_summary(summary: &MatchSummary) -> String {
    let (a, b) = (&summary.first, &summary.second);
    let mut out = String::from("\nFinal Summary:\n");
    if summary.rounds_played < summary.iterations {
        out.push_str(&format!(
            "Stopped after {} of {} rounds\n",
            summary.rounds_played, summary.iterations
        ));
    }
    out.push_str(&format!("{} scored {}\n", a.name, a.total_score));
    out.push_str(&format!("{} scored {}\n", b.name, b.total_score));
    out.push_str(&format!("{} cooperation rate: {:.2}\n", a.name, a.cooperation_rate));
    out.push_str(&format!("{} cooperation rate: {:.2}", b.name, b.cooperation_rate));
    out
}
