//! Decision provider backed by an external text-generation service
//!
//! The provider renders the agent's history into a [`DecisionRequest`], hands
//! it to a [`DecisionService`] and maps the free-form reply onto a [`Move`].
//! Any failure along the way (no credential, transport error, timeout,
//! ambiguous reply) is absorbed here: that round is decided at random instead.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::payoff;
use crate::provider::{DecisionProvider, History, RandomProvider};
use crate::strategy::Move;

/// Default timeout for one service call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Opaque secret used to authenticate against the decision service
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Everything the decision service gets to see for one round
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionRequest {
    /// Behavior description, used as the system prompt
    pub behavior: String,
    /// Prior rounds as (own, opponent) pairs
    pub transcript: Vec<(Move, Move)>,
    /// 1-based number of the round being decided
    pub round: u32,
}

impl DecisionRequest {
    pub fn new(behavior: impl Into<String>, history: History<'_>) -> Self {
        Self {
            behavior: behavior.into(),
            transcript: history.rounds().collect(),
            round: history.len() as u32 + 1,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.behavior
    }

    /// One `Round i: you X, opponent Y` line per prior round
    pub fn render_transcript(&self) -> String {
        self.transcript
            .iter()
            .enumerate()
            .map(|(i, (own, opp))| format!("Round {}: you {own}, opponent {opp}\n", i + 1))
            .collect()
    }

    pub fn user_prompt(&self) -> String {
        let history = if self.transcript.is_empty() {
            String::new()
        } else {
            format!("Game history:\n{}", self.render_transcript())
        };

        format!(
            "This is round {} of the Prisoner's Dilemma game.\n\n{history}\n\
             Based on this information, should you '{}' or '{}'?\n\
             Reply with exactly one word: either '{}' or '{}'.",
            self.round,
            Move::Cooperate,
            Move::Defect,
            Move::Cooperate,
            Move::Defect,
        )
    }
}

/// Default behavior description: a plain explanation of the game
pub fn default_behavior() -> String {
    let (cc, _) = payoff(Move::Cooperate, Move::Cooperate);
    let (dd, _) = payoff(Move::Defect, Move::Defect);
    let (sucker, temptation) = payoff(Move::Cooperate, Move::Defect);

    format!(
        "You are an AI agent playing the Prisoner's Dilemma game. Choose either 'cooperate' or 'defect'.\n\
         If both players cooperate, both get {cc} points.\n\
         If both players defect, both get {dd} point.\n\
         If one cooperates and one defects, the defector gets {temptation} points and the cooperator gets {sucker} points.\n\
         Your goal is to maximize your total score."
    )
}

/// External service that suggests a move as free-form text
#[async_trait]
pub trait DecisionService: Send + Sync {
    async fn complete(
        &self,
        credential: &Credential,
        request: &DecisionRequest,
    ) -> anyhow::Result<String>;
}

/// Why a delegated decision fell back to a random move
#[derive(Debug, thiserror::Error)]
pub enum Fallback {
    #[error("no credential configured")]
    MissingCredential,

    #[error("decision service failed: {0:#}")]
    Service(anyhow::Error),

    #[error("decision service timed out after {0:?}")]
    Timeout(Duration),

    #[error("ambiguous reply {0:?}")]
    Ambiguous(String),
}

/// Provider that asks an external service, falling back to a random move
pub struct DelegateProvider {
    service: Arc<dyn DecisionService>,
    credential: Option<Credential>,
    behavior: Option<String>,
    timeout: Duration,
    fallback: RandomProvider,
}

impl DelegateProvider {
    pub fn new(
        service: Arc<dyn DecisionService>,
        credential: Option<Credential>,
        fallback: RandomProvider,
    ) -> Self {
        Self {
            service,
            credential,
            behavior: None,
            timeout: DEFAULT_TIMEOUT,
            fallback,
        }
    }

    pub fn with_behavior(mut self, behavior: impl Into<String>) -> Self {
        self.behavior = Some(behavior.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ask the service once, without fallback
    pub async fn delegate(&self, history: History<'_>) -> Result<Move, Fallback> {
        let credential = self.credential.as_ref().ok_or(Fallback::MissingCredential)?;
        let behavior = self.behavior.clone().unwrap_or_else(default_behavior);
        let request = DecisionRequest::new(behavior, history);

        let reply = tokio::time::timeout(self.timeout, self.service.complete(credential, &request))
            .await
            .map_err(|_| Fallback::Timeout(self.timeout))?
            .map_err(Fallback::Service)?;

        Move::from_reply(&reply).ok_or(Fallback::Ambiguous(reply))
    }
}

#[async_trait]
impl DecisionProvider for DelegateProvider {
    fn label(&self) -> String {
        "delegate".into()
    }

    async fn choose(&mut self, history: History<'_>) -> Move {
        match self.delegate(history).await {
            Ok(m) => m,
            Err(reason) => {
                let m = self.fallback.next_move();
                tracing::warn!(round = history.len() + 1, %reason, fallback = %m, "using random move");
                m
            }
        }
    }
}
