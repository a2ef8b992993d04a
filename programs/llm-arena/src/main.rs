mod config;
mod logging;
mod openai;
mod report;

use crate::config::{AgentConfig, AgentKind, ArenaConfig};
use crate::openai::OpenAiClient;
use crate::report::ConsoleReporter;
use anyhow::{Context, Result};
use clap::Parser;
use match_logic::{
    Agent, Credential, DecisionService, DelegateProvider, FixedProvider, Match, MatchRecord,
    RandomProvider, ScriptedProvider,
};
use std::{
    fs,
    future::Future,
    io,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

/// Exit status for a run aborted by a second interrupt (128 + SIGINT)
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Run an iterated Prisoner's Dilemma match between two agents.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Match configuration (TOML). Without it, two language-model agents play.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the number of rounds.
    #[arg(long)]
    iterations: Option<u32>,

    /// Override the pause between rounds, in milliseconds.
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Seed for random choices and fallbacks.
    #[arg(long)]
    seed: Option<u64>,

    /// Only print the final summary.
    #[arg(long)]
    quiet: bool,

    /// Write rounds and summary as JSON to this file.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    logging::init();

    if let Err(error) = run_cli().await {
        tracing::error!("{error:#}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<()> {
    // A missing .env file is fine; the key may come from the environment.
    let _ = dotenvy::dotenv();

    let args = Cli::parse();
    tracing::debug!(?args, "parsed arguments");

    let mut cfg = match &args.config {
        Some(path) => ArenaConfig::from_file(path)?,
        None => ArenaConfig::default(),
    };
    apply_overrides(&mut cfg, &args);
    cfg.validate().context("invalid settings")?;

    let seed = cfg.seed.unwrap_or_else(rand::random);
    tracing::info!(seed, "seeding random providers");

    let credential = std::env::var(&cfg.service.api_key_env)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .map(Credential::new);
    if credential.is_none() && cfg.uses_llm() {
        tracing::warn!(
            "{} not set; language-model agents will choose at random",
            cfg.service.api_key_env
        );
    }

    let service: Arc<dyn DecisionService> =
        Arc::new(OpenAiClient::from_config(&cfg.service).context("failed to build http client")?);
    let timeout = Duration::from_secs(cfg.service.timeout_secs);

    let mut agents = cfg.agents.iter().enumerate().map(|(i, agent_cfg)| {
        let agent_seed = seed.wrapping_add(i as u64);
        build_agent(agent_cfg, agent_seed, &service, &credential, timeout)
    });
    let (Some(first), Some(second)) = (agents.next(), agents.next()) else {
        anyhow::bail!("exactly 2 agents are required");
    };

    let mut game = Match::new(first, second, cfg.iterations)?
        .with_delay(Duration::from_millis(cfg.delay_ms));

    let mut reporter = ConsoleReporter::new(cfg.verbose);
    let cancel = reporter.cancel_handle();
    tokio::spawn(async move {
        if wait_for_interrupts(tokio::signal::ctrl_c, cancel).await {
            tracing::warn!("interrupted again; exiting");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });

    let rounds = game.run(&mut reporter).await.to_vec();

    if let Some(path) = &args.output {
        let record = MatchRecord {
            summary: game.summary(),
            rounds,
        };
        let json = record.to_json_pretty().context("failed to serialize results")?;
        fs::write(path, json).with_context(|| format!("failed to write {path:?}"))?;
        tracing::info!(?path, "results written");
    }

    Ok(())
}

/// Request a graceful stop on the first interrupt, then wait for another.
///
/// Returns `true` when a second interrupt arrives, `false` if the signal
/// source fails first.
async fn wait_for_interrupts<F, Fut>(mut next_signal: F, cancel: Arc<AtomicBool>) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if next_signal().await.is_err() {
        return false;
    }
    tracing::warn!("interrupted; stopping after the current round (press Ctrl-C again to quit)");
    cancel.store(true, Ordering::SeqCst);

    next_signal().await.is_ok()
}

fn apply_overrides(cfg: &mut ArenaConfig, args: &Cli) {
    if let Some(iterations) = args.iterations {
        cfg.iterations = iterations;
    }
    if let Some(delay_ms) = args.delay_ms {
        cfg.delay_ms = delay_ms;
    }
    if args.seed.is_some() {
        cfg.seed = args.seed;
    }
    if args.quiet {
        cfg.verbose = false;
    }
}

fn build_agent(
    cfg: &AgentConfig,
    seed: u64,
    service: &Arc<dyn DecisionService>,
    credential: &Option<Credential>,
    timeout: Duration,
) -> Agent {
    let provider: Box<dyn match_logic::DecisionProvider> = match &cfg.kind {
        AgentKind::Llm { behavior } => {
            let mut delegate =
                DelegateProvider::new(service.clone(), credential.clone(), RandomProvider::seeded(seed))
                    .with_timeout(timeout);
            if let Some(behavior) = behavior {
                delegate = delegate.with_behavior(behavior.clone());
            }
            Box::new(delegate)
        }
        AgentKind::Random => Box::new(RandomProvider::seeded(seed)),
        AgentKind::Fixed { strategy } => Box::new(FixedProvider::new(*strategy)),
        AgentKind::Scripted { moves } => Box::new(ScriptedProvider::new(moves.clone())),
    };
    Agent::new(cfg.name.clone(), provider)
}
