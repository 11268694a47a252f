//! Text and JSON rendering of session outcomes.

use std::fmt;

use anyhow::{Context, Result};
use serde::Serialize;
use spawn_guard_system_degradation::DegradationStats;
use spawn_guard_system_diagnostics::{Certification, SafetyReport, StressProfile, Verdict};

use crate::scenario::Params;

/// Prints `value` either as pretty JSON or as its text rendering.
pub(crate) fn print<T>(value: &T, json: bool) -> Result<()>
where
    T: Serialize + fmt::Display,
{
    if json {
        let rendered =
            serde_json::to_string_pretty(value).context("failed to serialise report as json")?;
        println!("{rendered}");
    } else {
        print!("{value}");
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Serialize)]
struct Fallbacks {
    silent: u64,
    substitutes: u64,
    logged: u64,
}

impl From<DegradationStats> for Fallbacks {
    fn from(stats: DegradationStats) -> Self {
        Self {
            silent: stats.silent,
            substitutes: stats.substitutes,
            logged: stats.logged,
        }
    }
}

/// Outcome of one scripted scenario.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct SimulationSummary {
    scenario: StressProfile,
    players: u8,
    seconds: u64,
    tick_ms: u64,
    passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
    report: SafetyReport,
    fallbacks: Fallbacks,
    #[serde(skip)]
    verdict: Verdict,
}

impl SimulationSummary {
    pub(crate) fn new(
        params: &Params,
        verdict: Verdict,
        report: SafetyReport,
        stats: DegradationStats,
    ) -> Self {
        Self {
            scenario: verdict.profile,
            players: params.players,
            seconds: params.duration.as_secs(),
            tick_ms: params.tick.as_millis() as u64,
            passed: verdict.result.is_ok(),
            failure: verdict.result.err().map(|failure| failure.to_string()),
            report,
            fallbacks: stats.into(),
            verdict,
        }
    }

    pub(crate) fn verdict(&self) -> Verdict {
        self.verdict
    }
}

impl fmt::Display for SimulationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = &self.report;
        writeln!(
            f,
            "scenario {} ({} players, {} s, {} ms ticks)",
            self.scenario, self.players, self.seconds, self.tick_ms
        )?;
        writeln!(f, "  ticks               {}", report.ticks)?;
        for usage in &report.pools {
            writeln!(
                f,
                "  {:<9} now {:>4}  peak {:>4} / {:<4} danger ticks {}",
                usage.pool.name(),
                usage.current,
                usage.peak,
                usage.capacity,
                usage.danger_ticks
            )?;
        }
        writeln!(
            f,
            "  casts               {} requested, {} dropped",
            report.casts_requested, report.casts_dropped
        )?;
        writeln!(
            f,
            "  spawns              {} admitted, {} blocked",
            report.spawns_admitted, report.spawns_blocked
        )?;
        writeln!(
            f,
            "  degradations        {} ({} silent, {} substituted, {} logged)",
            report.graceful_degradations,
            self.fallbacks.silent,
            self.fallbacks.substitutes,
            self.fallbacks.logged
        )?;
        match &self.failure {
            None => writeln!(f, "  verdict             PASSED"),
            Some(failure) => writeln!(f, "  verdict             FAILED: {failure}"),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioLine {
    scenario: StressProfile,
    passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
}

/// Certification level earned by a full suite run.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct CertificationSummary {
    certification: Certification,
    scenarios: Vec<ScenarioLine>,
}

impl CertificationSummary {
    pub(crate) fn new(certification: Certification, summaries: &[SimulationSummary]) -> Self {
        Self {
            certification,
            scenarios: summaries
                .iter()
                .map(|summary| ScenarioLine {
                    scenario: summary.scenario,
                    passed: summary.passed,
                    failure: summary.failure.clone(),
                })
                .collect(),
        }
    }
}

impl fmt::Display for CertificationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.scenarios {
            let status = if line.passed { "PASSED" } else { "FAILED" };
            write!(f, "{:<22} {status}", line.scenario.name())?;
            if let Some(failure) = &line.failure {
                write!(f, ": {failure}")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "certification level: {}", self.certification)
    }
}
