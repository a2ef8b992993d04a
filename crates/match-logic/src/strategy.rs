//! Moves and classic fixed strategies

use std::fmt;

use serde::{Deserialize, Serialize};

/// A move in the Prisoner's Dilemma
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Cooperate,
    Defect,
}

impl Move {
    /// Canonical lowercase token, as used in transcripts and model replies
    pub fn token(self) -> &'static str {
        match self {
            Move::Cooperate => "cooperate",
            Move::Defect => "defect",
        }
    }

    /// The other move
    pub fn flip(self) -> Self {
        match self {
            Move::Cooperate => Move::Defect,
            Move::Defect => Move::Cooperate,
        }
    }

    /// Map a free-form reply onto a move.
    ///
    /// Case-insensitive containment check against both tokens. Exactly one
    /// token must appear; a reply containing both or neither is ambiguous
    /// and yields `None`.
    pub fn from_reply(reply: &str) -> Option<Self> {
        let reply = reply.to_lowercase();
        let cooperate = reply.contains(Move::Cooperate.token());
        let defect = reply.contains(Move::Defect.token());

        match (cooperate, defect) {
            (true, false) => Some(Move::Cooperate),
            (false, true) => Some(Move::Defect),
            _ => None,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Classic deterministic strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Copy opponent's last move. Start with cooperate.
    TitForTat,
    /// Always defect, never cooperate.
    AlwaysDefect,
    /// Always cooperate, never defect.
    AlwaysCooperate,
    /// Cooperate until opponent defects once, then always defect.
    GrimTrigger,
    /// Win-stay, lose-switch. Repeat move if good outcome.
    Pavlov,
    /// Tit-for-Tat but start with defect.
    SuspiciousTitForTat,
    /// Defect only if opponent defected twice in a row.
    TitForTwoTats,
    /// Retaliate with increasing defection streaks, then forgive.
    Gradual,
}

impl Strategy {
    /// Pick the next move from our own and the opponent's past moves
    pub fn decide(self, my_history: &[Move], opponent_history: &[Move]) -> Move {
        match self {
            Strategy::TitForTat => opponent_history.last().copied().unwrap_or(Move::Cooperate),
            Strategy::AlwaysDefect => Move::Defect,
            Strategy::AlwaysCooperate => Move::Cooperate,
            Strategy::GrimTrigger => execute_grim_trigger(opponent_history),
            Strategy::Pavlov => execute_pavlov(my_history, opponent_history),
            Strategy::SuspiciousTitForTat => {
                opponent_history.last().copied().unwrap_or(Move::Defect)
            }
            Strategy::TitForTwoTats => execute_tit_for_two_tats(opponent_history),
            Strategy::Gradual => execute_gradual(my_history, opponent_history),
        }
    }

    /// Human-readable description
    pub fn describe(self) -> &'static str {
        match self {
            Strategy::TitForTat => "Copies opponent's last move. Starts by cooperating.",
            Strategy::AlwaysDefect => "Never cooperates. Always defects.",
            Strategy::AlwaysCooperate => "Never defects. Always cooperates.",
            Strategy::GrimTrigger => "Cooperates until betrayed, then always defects.",
            Strategy::Pavlov => "Repeats move if outcome was good, switches if bad.",
            Strategy::SuspiciousTitForTat => "Like Tit-for-Tat, but starts with defect.",
            Strategy::TitForTwoTats => "Only retaliates after two consecutive defections.",
            Strategy::Gradual => "Retaliates with increasing severity, then forgives.",
        }
    }
}

fn execute_grim_trigger(opponent_history: &[Move]) -> Move {
    if opponent_history.contains(&Move::Defect) {
        Move::Defect
    } else {
        Move::Cooperate
    }
}

/// Pavlov: Win-stay, lose-switch
/// - If last round was good (3+ points), repeat move
/// - If last round was bad (<3 points), switch move
fn execute_pavlov(my_history: &[Move], opponent_history: &[Move]) -> Move {
    let (Some(&my_last), Some(&opp_last)) = (my_history.last(), opponent_history.last()) else {
        return Move::Cooperate;
    };

    let (my_score, _) = crate::payoff(my_last, opp_last);
    if my_score >= 3 {
        my_last
    } else {
        my_last.flip()
    }
}

fn execute_tit_for_two_tats(opponent_history: &[Move]) -> Move {
    match opponent_history {
        [.., Move::Defect, Move::Defect] => Move::Defect,
        _ => Move::Cooperate,
    }
}

/// Gradual: Escalating retaliation
/// After N opponent defections, player should have made N(N+1)/2 total defections
fn execute_gradual(my_history: &[Move], opponent_history: &[Move]) -> Move {
    let count = |history: &[Move]| history.iter().filter(|m| **m == Move::Defect).count();
    let their_defections = count(opponent_history);
    let expected = their_defections * (their_defections + 1) / 2;

    if count(my_history) < expected {
        Move::Defect
    } else {
        Move::Cooperate
    }
}
