#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Degradation policy applied to every refused spawn.
//!
//! Refusals arrive as [`Event::CastDropped`] and [`Event::SpawnDropped`]. Each
//! one is absorbed here: dropped silently, replaced by a visual-only stand-in,
//! or logged at debug level. Nothing is retried and nothing is surfaced to the
//! player.

use std::time::Duration;

use spawn_guard_core::{
    Command, Event, Fallback, GuardConfig, PoolKind, SpawnRefusal, SpellKind, Tile,
};
use tracing::debug;

/// Selects the fallback for each kind of refusal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DegradationPolicy {
    on_throttled: Fallback,
    on_missiles: Fallback,
    on_monsters: Fallback,
    on_lights: Fallback,
    substitutes_enabled: bool,
    substitute_lifetime: Duration,
}

impl DegradationPolicy {
    /// Creates the policy from the guard configuration.
    #[must_use]
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            on_throttled: config.degradation.on_throttled,
            on_missiles: config.pool_fallback(PoolKind::Missiles),
            on_monsters: config.pool_fallback(PoolKind::Monsters),
            on_lights: config.pool_fallback(PoolKind::Lights),
            substitutes_enabled: config.features.visual_substitutes,
            substitute_lifetime: config.degradation.visual_effect_lifetime(),
        }
    }

    /// Fallback in effect for the provided refusal.
    ///
    /// A configured [`Fallback::Substitute`] turns into [`Fallback::Silent`]
    /// while visual substitutes are switched off.
    #[must_use]
    pub fn fallback_for(&self, refusal: SpawnRefusal) -> Fallback {
        let configured = match refusal {
            SpawnRefusal::Throttled { .. } => self.on_throttled,
            SpawnRefusal::CapacityExceeded { pool } | SpawnRefusal::Shed { pool } => match pool {
                PoolKind::Missiles => self.on_missiles,
                PoolKind::Monsters => self.on_monsters,
                PoolKind::Lights => self.on_lights,
            },
        };

        if configured == Fallback::Substitute && !self.substitutes_enabled {
            Fallback::Silent
        } else {
            configured
        }
    }

    /// Lifetime given to visual stand-ins.
    #[must_use]
    pub const fn substitute_lifetime(&self) -> Duration {
        self.substitute_lifetime
    }
}

impl Default for DegradationPolicy {
    fn default() -> Self {
        Self::new(&GuardConfig::default())
    }
}

/// Counters describing how refusals were absorbed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DegradationStats {
    /// Casts dropped by the throttle.
    pub throttled_casts: u64,
    /// Entities refused because their pool was full.
    pub capacity_refusals: u64,
    /// Optional entities shed under pool pressure.
    pub shed_refusals: u64,
    /// Refusals absorbed without any trace.
    pub silent: u64,
    /// Visual stand-ins requested.
    pub substitutes: u64,
    /// Refusals written to the debug log.
    pub logged: u64,
}

impl DegradationStats {
    /// Refusal events absorbed by any fallback.
    #[must_use]
    pub const fn absorbed(&self) -> u64 {
        self.silent + self.substitutes + self.logged
    }
}

/// Pure system that absorbs refused spawns.
#[derive(Debug, Default)]
pub struct Degradation {
    policy: DegradationPolicy,
    stats: DegradationStats,
}

impl Degradation {
    /// Creates the system using the provided policy.
    #[must_use]
    pub fn new(policy: DegradationPolicy) -> Self {
        Self {
            policy,
            stats: DegradationStats::default(),
        }
    }

    /// Consumes refusal events and emits fallback commands.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        for event in events {
            match *event {
                Event::CastDropped {
                    cast,
                    caster,
                    spell,
                    target,
                    reason,
                } => {
                    self.stats.throttled_casts += 1;
                    let refusal = SpawnRefusal::Throttled { spell, reason };
                    if self.absorb(refusal, Some(spell), target, out) {
                        debug!(cast = cast.get(), %caster, %refusal, "cast dropped");
                    }
                }
                Event::SpawnDropped {
                    pool,
                    origin,
                    target,
                    count,
                    refusal,
                } => {
                    match refusal {
                        SpawnRefusal::Shed { .. } => self.stats.shed_refusals += u64::from(count),
                        _ => self.stats.capacity_refusals += u64::from(count),
                    }
                    if self.absorb(refusal, origin.spell(), target, out) {
                        debug!(%pool, count, %refusal, ?origin, "spawn dropped");
                    }
                }
                _ => {}
            }
        }
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> DegradationStats {
        self.stats
    }

    /// Applies the fallback and reports whether the refusal should be logged.
    fn absorb(
        &mut self,
        refusal: SpawnRefusal,
        spell: Option<SpellKind>,
        target: Tile,
        out: &mut Vec<Command>,
    ) -> bool {
        match self.policy.fallback_for(refusal) {
            Fallback::Silent => {
                self.stats.silent += 1;
                false
            }
            Fallback::Substitute => {
                self.stats.substitutes += 1;
                out.push(Command::SpawnVisualEffect {
                    spell,
                    target,
                    lifetime: self.policy.substitute_lifetime(),
                });
                false
            }
            Fallback::Verbose => {
                self.stats.logged += 1;
                true
            }
        }
    }
}
