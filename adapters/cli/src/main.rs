#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that drives scripted spawn guard sessions.

mod config;
mod report;
mod scenario;
mod session;

use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use spawn_guard_core::GuardConfig;
use spawn_guard_system_diagnostics::{certify, validate, Certification, Verdict};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    report::{CertificationSummary, SimulationSummary},
    scenario::{Params, Scenario},
    session::Session,
};

#[derive(Debug, Parser)]
#[command(name = "spawn-guard", version, about = "Spawn admission guard stress harness")]
struct Cli {
    /// Guard configuration table; built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "warn")]
    log: String,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Replay one stress scenario and print its safety report.
    Simulate {
        /// Scenario to replay.
        #[arg(long, value_enum)]
        scenario: Scenario,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Replay every scenario and print the certification level.
    Certify {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Print the effective configuration as TOML.
    PrintConfig,
    /// Validate the configuration and exit.
    CheckConfig,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Players casting in the session.
    #[arg(long, default_value_t = 4)]
    players: u8,
    /// Simulated length of the session in seconds.
    #[arg(long, default_value_t = 30)]
    seconds: u64,
    /// Simulated length of one tick in milliseconds.
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: u64,
    /// Seed for target jitter.
    #[arg(long, default_value_t = 0x00d1_ab10)]
    seed: u64,
    /// Emit JSON instead of text.
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn params(&self) -> Params {
        Params {
            players: self.players,
            duration: Duration::from_secs(self.seconds),
            tick: Duration::from_millis(self.tick_ms),
            seed: self.seed,
        }
    }
}

/// Entry point for the spawn guard command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    let config = config::load(cli.config.as_deref())?;
    match cli.command {
        Cmd::Simulate { scenario, run } => simulate(&config, scenario, &run),
        Cmd::Certify { run } => certify_all(&config, &run),
        Cmd::PrintConfig => {
            print!("{}", config::render(&config)?);
            Ok(())
        }
        Cmd::CheckConfig => {
            println!("configuration OK");
            Ok(())
        }
    }
}

fn init_logging(fallback: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_scenario(config: &GuardConfig, scenario: Scenario, params: &Params) -> SimulationSummary {
    info!(?scenario, players = params.players, "scenario started");
    let mut session = Session::new(config);
    session.run(scenario.script(params));

    let report = session.report();
    let verdict = Verdict {
        profile: scenario.profile(),
        result: validate(scenario.profile(), &report),
    };
    info!(?scenario, passed = verdict.result.is_ok(), "scenario finished");

    SimulationSummary::new(params, verdict, report, session.degradation())
}

fn simulate(config: &GuardConfig, scenario: Scenario, run: &RunArgs) -> Result<()> {
    let summary = run_scenario(config, scenario, &run.params());
    report::print(&summary, run.json)
}

fn certify_all(config: &GuardConfig, run: &RunArgs) -> Result<()> {
    let params = run.params();
    let summaries: Vec<_> = Scenario::ALL
        .iter()
        .map(|&scenario| run_scenario(config, scenario, &params))
        .collect();
    let verdicts: Vec<Verdict> = summaries.iter().map(SimulationSummary::verdict).collect();
    let level = certify(&verdicts);

    report::print(&CertificationSummary::new(level, &summaries), run.json)?;
    if level == Certification::Unstable {
        bail!("certification failed: {level}");
    }
    Ok(())
}
