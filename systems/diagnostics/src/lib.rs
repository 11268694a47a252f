#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Safety metrics gathered from world events and pool readings.
//!
//! The [`SafetyMonitor`] observes every event batch alongside fresh ledger
//! snapshots and accumulates the counters that stress runs are judged by.
//! Judging itself lives in [`validation`].

pub mod validation;

use serde::Serialize;
use spawn_guard_core::{CapacityLedger, Event, GuardConfig, LedgerSnapshot, PoolKind};
use tracing::{info, warn};

pub use validation::{certify, validate, Certification, StressProfile, ValidationFailure, Verdict};

/// Occupancy statistics of a single pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PoolUsage {
    /// Pool the statistics describe.
    pub pool: PoolKind,
    /// Entities alive at the last observation.
    pub current: usize,
    /// Highest occupancy observed.
    pub peak: usize,
    /// Capacity at the last observation.
    pub capacity: usize,
    /// Ticks that ended with the pool above the danger threshold.
    pub danger_ticks: u64,
}

impl PoolUsage {
    fn new(pool: PoolKind) -> Self {
        Self {
            pool,
            current: 0,
            peak: 0,
            capacity: pool.default_capacity(),
            danger_ticks: 0,
        }
    }

    /// Reports whether the pool ever held more entities than it may.
    #[must_use]
    pub fn exceeded(&self) -> bool {
        self.peak > self.capacity
    }
}

/// Snapshot of everything the monitor has counted so far.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SafetyReport {
    /// Simulation ticks observed.
    pub ticks: u64,
    /// Per-pool occupancy statistics in [`PoolKind::ALL`] order.
    pub pools: Vec<PoolUsage>,
    /// Casts requested by players.
    pub casts_requested: u64,
    /// Casts refused by the throttle.
    pub casts_dropped: u64,
    /// Entities evaluated by the admission guard.
    pub safety_checks: u64,
    /// Entities constructed.
    pub spawns_admitted: u64,
    /// Entities refused by the admission guard.
    pub spawns_blocked: u64,
    /// Refusals absorbed without surfacing an error.
    pub graceful_degradations: u64,
    /// Visual stand-ins started in place of refused spawns.
    pub visual_substitutes: u64,
}

impl SafetyReport {
    /// Casts that passed the throttle.
    #[must_use]
    pub fn casts_accepted(&self) -> u64 {
        self.casts_requested.saturating_sub(self.casts_dropped)
    }

    /// Statistics of the provided pool.
    #[must_use]
    pub fn pool(&self, kind: PoolKind) -> Option<&PoolUsage> {
        self.pools.iter().find(|usage| usage.pool == kind)
    }
}

/// Accumulates safety metrics across a session.
#[derive(Debug)]
pub struct SafetyMonitor {
    danger_zone_percent: u8,
    pools: [PoolUsage; 3],
    in_danger: [bool; 3],
    ticks: u64,
    casts_requested: u64,
    casts_dropped: u64,
    spawns_admitted: u64,
    spawns_blocked: u64,
    graceful_degradations: u64,
    visual_substitutes: u64,
}

impl SafetyMonitor {
    /// Creates a monitor whose danger zone matches the admission threshold.
    #[must_use]
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            danger_zone_percent: config.admission.shed_above_percent,
            pools: PoolKind::ALL.map(PoolUsage::new),
            in_danger: [false; 3],
            ticks: 0,
            casts_requested: 0,
            casts_dropped: 0,
            spawns_admitted: 0,
            spawns_blocked: 0,
            graceful_degradations: 0,
            visual_substitutes: 0,
        }
    }

    /// Counts an event batch and refreshes occupancy from `ledgers`.
    pub fn observe(&mut self, events: &[Event], ledgers: &[LedgerSnapshot]) {
        let mut ticks = 0;
        for event in events {
            match event {
                Event::TimeAdvanced { .. } => ticks += 1,
                Event::CastRequested { .. } => self.casts_requested += 1,
                Event::CastDropped { .. } => {
                    self.casts_dropped += 1;
                    self.graceful_degradations += 1;
                }
                Event::EntitySpawned { .. } => self.spawns_admitted += 1,
                Event::SpawnDropped { count, .. } => {
                    self.spawns_blocked += u64::from(*count);
                    self.graceful_degradations += 1;
                }
                Event::VisualEffectSpawned { .. } => self.visual_substitutes += 1,
                Event::PoolsConfigured { capacities } => {
                    // Pools are rebuilt empty, so earlier peaks no longer apply.
                    for usage in &mut self.pools {
                        usage.capacity = capacities.get(usage.pool);
                        usage.current = 0;
                        usage.peak = 0;
                    }
                }
                _ => {}
            }
        }
        self.ticks += ticks;

        for ledger in ledgers {
            let Some(slot) = PoolKind::ALL.iter().position(|kind| *kind == ledger.kind) else {
                continue;
            };
            let usage = &mut self.pools[slot];
            usage.current = ledger.size();
            usage.peak = usage.peak.max(ledger.size());
            usage.capacity = ledger.capacity();

            if usage.exceeded() {
                warn!(pool = %ledger.kind, peak = usage.peak, capacity = usage.capacity, "pool exceeded capacity");
            }

            let danger = ledger.usage_percent() > self.danger_zone_percent;
            if danger {
                usage.danger_ticks += ticks;
            }
            if danger != self.in_danger[slot] {
                info!(pool = %ledger.kind, usage = ledger.usage_percent(), danger, "danger zone transition");
                self.in_danger[slot] = danger;
            }
        }
    }

    /// Current metrics.
    #[must_use]
    pub fn report(&self) -> SafetyReport {
        SafetyReport {
            ticks: self.ticks,
            pools: self.pools.to_vec(),
            casts_requested: self.casts_requested,
            casts_dropped: self.casts_dropped,
            safety_checks: self.spawns_admitted + self.spawns_blocked,
            spawns_admitted: self.spawns_admitted,
            spawns_blocked: self.spawns_blocked,
            graceful_degradations: self.graceful_degradations,
            visual_substitutes: self.visual_substitutes,
        }
    }
}

impl Default for SafetyMonitor {
    fn default() -> Self {
        Self::new(&GuardConfig::default())
    }
}
