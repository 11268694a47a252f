//! Stress profile validators and the certification ladder.

use std::fmt;

use serde::Serialize;
use spawn_guard_core::PoolKind;

use crate::SafetyReport;

/// Scripted stress profiles a session can be judged against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StressProfile {
    /// Repeated Inferno casts on a fixed tile amid a growing monster pack.
    InfernoStationary,
    /// Several players chaining lightning as fast as they can.
    ChainLightningStorm,
    /// Bursts of ambient multimissile volleys on top of player casts.
    MultimissileBarrage,
    /// Every player mashing Apocalypse.
    ApocalypseSpam,
    /// All of the above at once.
    CombinedChaos,
}

impl StressProfile {
    /// Every profile in deterministic order, combined chaos last.
    pub const ALL: [StressProfile; 5] = [
        StressProfile::InfernoStationary,
        StressProfile::ChainLightningStorm,
        StressProfile::MultimissileBarrage,
        StressProfile::ApocalypseSpam,
        StressProfile::CombinedChaos,
    ];

    /// Name used on the command line and in reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::InfernoStationary => "inferno-stationary",
            Self::ChainLightningStorm => "chain-lightning-storm",
            Self::MultimissileBarrage => "multimissile-barrage",
            Self::ApocalypseSpam => "apocalypse-spam",
            Self::CombinedChaos => "combined-chaos",
        }
    }

    const fn is_individual(self) -> bool {
        !matches!(self, Self::CombinedChaos)
    }
}

impl fmt::Display for StressProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reasons a session fails its stress profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationFailure {
    /// A pool held more entities than its capacity.
    #[error("{pool} pool peaked at {peak} with capacity {capacity}")]
    CapacityExceeded {
        /// Offending pool.
        pool: PoolKind,
        /// Highest occupancy observed.
        peak: usize,
        /// Capacity of the pool.
        capacity: usize,
    },
    /// No cast made it past the throttle.
    #[error("no cast was accepted")]
    NoCastAccepted,
    /// The admission guard never evaluated a spawn.
    #[error("the admission guard was never consulted")]
    GuardIdle,
    /// Every evaluated spawn was refused.
    #[error("all {blocked} spawns were blocked")]
    EverythingBlocked {
        /// Spawns refused.
        blocked: u64,
    },
    /// The session never reached a point where anything was refused.
    #[error("no graceful degradation was observed")]
    NoDegradation,
}

impl ValidationFailure {
    /// Reports whether the failure breaks the pool capacity invariant.
    #[must_use]
    pub const fn is_capacity_breach(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }
}

/// Outcome of judging one profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verdict {
    /// Profile that was run.
    pub profile: StressProfile,
    /// First failed expectation, if any.
    pub result: Result<(), ValidationFailure>,
}

/// Checks a session report against the expectations of `profile`.
pub fn validate(profile: StressProfile, report: &SafetyReport) -> Result<(), ValidationFailure> {
    within_capacity(report)?;

    match profile {
        StressProfile::InfernoStationary => {
            casts_pass(report)?;
            guard_consulted(report)
        }
        StressProfile::ChainLightningStorm => {
            casts_pass(report)?;
            some_spawns_pass(report)
        }
        StressProfile::MultimissileBarrage => degraded(report),
        StressProfile::ApocalypseSpam => {
            casts_pass(report)?;
            degraded(report)
        }
        StressProfile::CombinedChaos => {
            casts_pass(report)?;
            some_spawns_pass(report)?;
            degraded(report)
        }
    }
}

fn within_capacity(report: &SafetyReport) -> Result<(), ValidationFailure> {
    match report.pools.iter().find(|usage| usage.exceeded()) {
        Some(usage) => Err(ValidationFailure::CapacityExceeded {
            pool: usage.pool,
            peak: usage.peak,
            capacity: usage.capacity,
        }),
        None => Ok(()),
    }
}

fn casts_pass(report: &SafetyReport) -> Result<(), ValidationFailure> {
    if report.casts_accepted() == 0 {
        return Err(ValidationFailure::NoCastAccepted);
    }
    Ok(())
}

fn guard_consulted(report: &SafetyReport) -> Result<(), ValidationFailure> {
    if report.safety_checks == 0 {
        return Err(ValidationFailure::GuardIdle);
    }
    Ok(())
}

fn some_spawns_pass(report: &SafetyReport) -> Result<(), ValidationFailure> {
    guard_consulted(report)?;
    if report.spawns_blocked >= report.safety_checks {
        return Err(ValidationFailure::EverythingBlocked {
            blocked: report.spawns_blocked,
        });
    }
    Ok(())
}

fn degraded(report: &SafetyReport) -> Result<(), ValidationFailure> {
    if report.graceful_degradations == 0 {
        return Err(ValidationFailure::NoDegradation);
    }
    Ok(())
}

/// Confidence level earned by a set of stress verdicts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Certification {
    /// A pool exceeded its capacity, or nothing was run.
    Unstable,
    /// Capacity held everywhere but some profile expectations were missed.
    Stable,
    /// Every individual profile passed.
    Robust,
    /// Every individual profile and the combined profile passed.
    Bulletproof,
}

impl fmt::Display for Certification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Unstable => "UNSTABLE",
            Self::Stable => "STABLE",
            Self::Robust => "ROBUST",
            Self::Bulletproof => "BULLETPROOF",
        };
        f.write_str(text)
    }
}

/// Derives the certification level from a set of verdicts.
#[must_use]
pub fn certify(verdicts: &[Verdict]) -> Certification {
    if verdicts.is_empty()
        || verdicts
            .iter()
            .any(|verdict| matches!(verdict.result, Err(failure) if failure.is_capacity_breach()))
    {
        return Certification::Unstable;
    }

    let passed = |individual: bool| {
        let mut relevant = verdicts
            .iter()
            .filter(|verdict| verdict.profile.is_individual() == individual)
            .peekable();
        relevant.peek().is_some() && relevant.all(|verdict| verdict.result.is_ok())
    };

    match (passed(true), passed(false)) {
        (true, true) => Certification::Bulletproof,
        (true, false) => Certification::Robust,
        _ => Certification::Stable,
    }
}
