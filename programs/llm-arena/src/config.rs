use anyhow::{bail, Context, Result};
use match_logic::{Move, Strategy};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt::Debug, fs, ops::RangeBounds, path::Path};

use crate::openai::DEFAULT_BASE_URL;

const COOPERATIVE_BEHAVIOR: &str = "You are an AI agent playing the Prisoner's Dilemma. \
You value mutual benefit and long-term cooperation. \
Always try to build trust unless the opponent repeatedly defects.";

const COMPETITIVE_BEHAVIOR: &str = "You are an AI agent playing the Prisoner's Dilemma. \
Your sole objective is to maximize your individual score, even if it means betraying the other player. \
Use strategic defection where beneficial.";

/// Match configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`ArenaConfig::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArenaConfig {
    /// Number of rounds.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Pause between rounds in milliseconds.
    #[serde(default)]
    pub delay_ms: u64,
    /// Seed for the random providers and fallbacks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Print every round as it completes.
    #[serde(default = "default_verbose")]
    pub verbose: bool,

    #[serde(default)]
    pub service: ServiceConfig,

    /// Exactly two agents.
    pub agents: Vec<AgentConfig>,
}

/// Decision service settings.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            model: "gpt-4".into(),
            max_tokens: 50,
            temperature: 0.5,
            timeout_secs: 30,
            api_key_env: "OPENAI_API_KEY".into(),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    #[serde(flatten)]
    pub kind: AgentKind,
}

/// How an agent decides.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentKind {
    /// Ask the language model, optionally steered by a behavior description.
    Llm {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        behavior: Option<String>,
    },
    Random,
    Fixed {
        strategy: Strategy,
    },
    Scripted {
        moves: Vec<Move>,
    },
}

fn default_iterations() -> u32 {
    100
}

fn default_verbose() -> bool {
    true
}

impl Default for ArenaConfig {
    /// Two language-model agents, one cooperative and one competitive.
    fn default() -> Self {
        Self {
            iterations: 10,
            delay_ms: 1000,
            seed: None,
            verbose: true,
            service: ServiceConfig::default(),
            agents: vec![
                AgentConfig {
                    name: "CooperativeBot".into(),
                    kind: AgentKind::Llm {
                        behavior: Some(COOPERATIVE_BEHAVIOR.into()),
                    },
                },
                AgentConfig {
                    name: "CompetitiveBot".into(),
                    kind: AgentKind::Llm {
                        behavior: Some(COMPETITIVE_BEHAVIOR.into()),
                    },
                },
            ],
        }
    }
}

impl ArenaConfig {
    /// Load an [`ArenaConfig`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let text = fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: ArenaConfig = toml::from_str(&text).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_num(self.iterations, 1..=1_000_000).context("invalid number of iterations")?;
        check_num(self.delay_ms, 0..=60_000).context("invalid delay")?;

        check_num(self.service.max_tokens, 1..=4096).context("invalid max tokens")?;
        check_num(self.service.temperature, 0.0..=2.0).context("invalid temperature")?;
        check_num(self.service.timeout_secs, 1..=600).context("invalid timeout")?;
        if self.service.api_key_env.trim().is_empty() {
            bail!("api key variable name must not be empty");
        }

        let n_agents = self.agents.len();
        if n_agents != 2 {
            bail!("exactly 2 agents are required, but {n_agents} are configured");
        }
        let mut names = HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                bail!("agent names must not be empty");
            }
            if !names.insert(agent.name.as_str()) {
                bail!("agent name {:?} is used twice", agent.name);
            }
        }

        Ok(())
    }

    /// Whether any agent needs the language model.
    pub fn uses_llm(&self) -> bool {
        self.agents
            .iter()
            .any(|a| matches!(a.kind, AgentKind::Llm { .. }))
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
