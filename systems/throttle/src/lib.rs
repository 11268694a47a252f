#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Throttle system that turns cast requests into spawn commands.
//!
//! Each [`Event::CastRequested`] is evaluated against, in order, the spell's
//! enabled switch, the caster's active cast limit, the global pressure gate
//! and finally the [`ThrottleTracker`]. An accepted cast fans out into
//! [`Command::SpawnEntities`] batches; a refused cast becomes a
//! [`Command::DropCast`] and constructs nothing.

mod tracker;

use std::{collections::BTreeMap, time::Duration};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use spawn_guard_core::{
    BatchMode, CastId, Command, Event, GuardConfig, MissileCensus, PlayerId, PoolKind,
    PressureConfig, SpawnOrigin, SpawnPriority, SpellConfig, SpellKind, SpellTable,
    ThrottleReason, Tile,
};
use tracing::trace;

pub use tracker::{ThrottleDecision, ThrottlePhase, ThrottleState, ThrottleTracker};

/// Probabilistic gate that thins out casts while many spell missiles are alive.
#[derive(Clone, Debug)]
struct PressureGate {
    missile_threshold: usize,
    admit_one_in: u32,
    seed: u64,
    rng: ChaCha8Rng,
}

impl PressureGate {
    fn new(config: PressureConfig) -> Self {
        Self {
            missile_threshold: config.missile_threshold,
            admit_one_in: config.admit_one_in.max(1),
            seed: config.seed,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
        }
    }

    fn engaged(&self, live_missiles: usize) -> bool {
        live_missiles > self.missile_threshold
    }

    fn admits(&mut self, live_missiles: usize) -> bool {
        if !self.engaged(live_missiles) {
            return true;
        }
        self.rng.gen_range(0..self.admit_one_in) == 0
    }

    fn reseed(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
    }
}

/// Cast requests accepted earlier in the same event batch.
///
/// The census handed to [`Throttle::handle`] predates the batch, so casts
/// accepted within it are added here until the world constructs them.
#[derive(Debug, Default)]
struct PendingCasts {
    missiles: usize,
    casts: BTreeMap<(PlayerId, SpellKind), usize>,
}

impl PendingCasts {
    fn active_casts(&self, census: &MissileCensus, caster: PlayerId, spell: SpellKind) -> usize {
        census.active_casts(caster, spell) + self.casts.get(&(caster, spell)).copied().unwrap_or(0)
    }

    fn live_missiles(&self, census: &MissileCensus) -> usize {
        census.total().saturating_add(self.missiles)
    }

    fn accept(&mut self, caster: PlayerId, spell: SpellKind, config: &SpellConfig) {
        if config.missiles_per_cast == 0 {
            return;
        }
        self.missiles = self
            .missiles
            .saturating_add(config.missiles_per_cast as usize);
        *self.casts.entry((caster, spell)).or_default() += 1;
    }
}

/// Pure system enforcing per-spell cast throttling.
#[derive(Debug)]
pub struct Throttle {
    table: SpellTable,
    tracker: ThrottleTracker,
    gate: Option<PressureGate>,
    accepted: u64,
    dropped: BTreeMap<ThrottleReason, u64>,
}

impl Throttle {
    /// Creates the system from the guard configuration.
    #[must_use]
    pub fn new(config: &GuardConfig) -> Self {
        let table = config.spell_table();
        Self {
            tracker: ThrottleTracker::new(table.clone()),
            table,
            gate: config
                .features
                .global_pressure
                .then(|| PressureGate::new(config.pressure)),
            accepted: 0,
            dropped: BTreeMap::new(),
        }
    }

    /// Consumes world events and emits spawn or drop commands for each cast.
    pub fn handle(&mut self, events: &[Event], census: &MissileCensus, out: &mut Vec<Command>) {
        let mut pending = PendingCasts::default();

        for event in events {
            match *event {
                Event::CastRequested {
                    cast,
                    caster,
                    spell,
                    target,
                    at,
                } => {
                    let config = self.table.get(spell);
                    match self.evaluate(&config, caster, spell, at, census, &pending) {
                        ThrottleDecision::Accepted => {
                            pending.accept(caster, spell, &config);
                            self.accepted += 1;
                            emit_fan_out(&config, caster, spell, cast, target, out);
                        }
                        ThrottleDecision::Throttled(reason) => {
                            trace!(%caster, %spell, %reason, "cast throttled");
                            *self.dropped.entry(reason).or_default() += 1;
                            out.push(Command::DropCast {
                                cast,
                                caster,
                                spell,
                                target,
                                reason,
                            });
                        }
                    }
                }
                Event::PlayerLeft { player } => self.tracker.forget_player(player),
                Event::SessionReset => {
                    self.tracker.clear();
                    if let Some(gate) = self.gate.as_mut() {
                        gate.reseed();
                    }
                }
                _ => {}
            }
        }
    }

    /// Read-only access to the per-key tracker.
    #[must_use]
    pub fn tracker(&self) -> &ThrottleTracker {
        &self.tracker
    }

    /// Number of casts accepted so far.
    #[must_use]
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Number of casts dropped for the provided reason so far.
    #[must_use]
    pub fn dropped(&self, reason: ThrottleReason) -> u64 {
        self.dropped.get(&reason).copied().unwrap_or(0)
    }

    fn evaluate(
        &mut self,
        config: &SpellConfig,
        caster: PlayerId,
        spell: SpellKind,
        now: Duration,
        census: &MissileCensus,
        pending: &PendingCasts,
    ) -> ThrottleDecision {
        if !config.enabled {
            return ThrottleDecision::Accepted;
        }

        if let Some(limit) = config.max_active_casts {
            if pending.active_casts(census, caster, spell) >= limit as usize {
                return ThrottleDecision::Throttled(ThrottleReason::ActiveCastLimit);
            }
        }

        if let Some(gate) = self.gate.as_mut() {
            if !gate.admits(pending.live_missiles(census)) {
                return ThrottleDecision::Throttled(ThrottleReason::GlobalPressure);
            }
        }

        self.tracker.check(caster, spell, now)
    }
}

fn emit_fan_out(
    config: &SpellConfig,
    caster: PlayerId,
    spell: SpellKind,
    cast: CastId,
    target: Tile,
    out: &mut Vec<Command>,
) {
    let origin = SpawnOrigin::Spell {
        caster,
        spell,
        cast,
    };
    let batches = [
        (
            PoolKind::Missiles,
            config.missiles_per_cast,
            Some(config.missile_lifetime),
            SpawnPriority::Normal,
            if config.all_or_nothing {
                BatchMode::AllOrNothing
            } else {
                BatchMode::BestEffort
            },
        ),
        (
            PoolKind::Lights,
            config.lights_per_cast,
            Some(config.missile_lifetime),
            SpawnPriority::Optional,
            BatchMode::BestEffort,
        ),
        (
            PoolKind::Monsters,
            config.summons_per_cast,
            None,
            SpawnPriority::Critical,
            BatchMode::BestEffort,
        ),
    ];

    for (pool, count, lifetime, priority, batch) in batches {
        if count == 0 {
            continue;
        }
        out.push(Command::SpawnEntities {
            pool,
            origin,
            target,
            count,
            lifetime,
            priority,
            batch,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(cast: u64, caster: u8, spell: SpellKind, at_ms: u64) -> Event {
        Event::CastRequested {
            cast: CastId::new(cast),
            caster: PlayerId::new(caster),
            spell,
            target: Tile::new(5, 5),
            at: Duration::from_millis(at_ms),
        }
    }

    #[test]
    fn accepted_apocalypse_is_an_atomic_missile_batch() {
        let mut throttle = Throttle::new(&GuardConfig::default());
        let mut out = Vec::new();
        throttle.handle(
            &[request(0, 0, SpellKind::Apocalypse, 0)],
            &MissileCensus::default(),
            &mut out,
        );

        assert_eq!(
            out,
            vec![Command::SpawnEntities {
                pool: PoolKind::Missiles,
                origin: SpawnOrigin::Spell {
                    caster: PlayerId::new(0),
                    spell: SpellKind::Apocalypse,
                    cast: CastId::new(0),
                },
                target: Tile::new(5, 5),
                count: 16,
                lifetime: Some(Duration::from_millis(700)),
                priority: SpawnPriority::Normal,
                batch: BatchMode::AllOrNothing,
            }]
        );
    }

    #[test]
    fn golem_summons_into_monster_pool() {
        let mut throttle = Throttle::new(&GuardConfig::default());
        let mut out = Vec::new();
        throttle.handle(
            &[request(0, 0, SpellKind::Golem, 0)],
            &MissileCensus::default(),
            &mut out,
        );
        assert!(matches!(
            out.as_slice(),
            [Command::SpawnEntities {
                pool: PoolKind::Monsters,
                count: 1,
                lifetime: None,
                priority: SpawnPriority::Critical,
                ..
            }]
        ));
    }

    #[test]
    fn active_cast_limit_counts_casts_within_the_batch() {
        let mut throttle = Throttle::new(&GuardConfig::default());
        let mut out = Vec::new();
        throttle.handle(
            &[
                request(0, 0, SpellKind::Apocalypse, 0),
                request(1, 0, SpellKind::Apocalypse, 400),
            ],
            &MissileCensus::default(),
            &mut out,
        );

        assert!(matches!(
            out.last(),
            Some(Command::DropCast {
                reason: ThrottleReason::ActiveCastLimit,
                ..
            })
        ));
        assert_eq!(throttle.accepted(), 1);
        assert_eq!(throttle.dropped(ThrottleReason::ActiveCastLimit), 1);
    }

    #[test]
    fn pressure_gate_only_engages_above_threshold() {
        let mut config = GuardConfig::default();
        config.pressure.missile_threshold = 10;
        config.pressure.admit_one_in = 5;
        let mut gate = PressureGate::new(config.pressure);

        assert!((0..100).all(|_| gate.admits(10)));

        let admitted = (0..1_000).filter(|_| gate.admits(11)).count();
        assert!(
            (100..300).contains(&admitted),
            "expected roughly one in five, got {admitted}"
        );
    }

    #[test]
    fn pressure_gate_is_disabled_by_feature_flag() {
        let mut config = GuardConfig::default();
        config.features.global_pressure = false;
        config.pressure.missile_threshold = 0;
        let mut throttle = Throttle::new(&config);

        let mut census = MissileCensus::default();
        census.record(PlayerId::new(7), SpellKind::Nova, CastId::new(99), 400);

        let mut out = Vec::new();
        let requests: Vec<_> = (0..6)
            .map(|player| request(u64::from(player), player, SpellKind::Firebolt, 0))
            .collect();
        throttle.handle(&requests, &census, &mut out);

        assert_eq!(throttle.accepted(), 6);
        assert_eq!(throttle.dropped(ThrottleReason::GlobalPressure), 0);
    }

    #[test]
    fn session_reset_replays_the_same_gate_decisions() {
        let mut config = GuardConfig::default();
        config.pressure.missile_threshold = 0;
        let mut census = MissileCensus::default();
        census.record(PlayerId::new(9), SpellKind::Nova, CastId::new(0), 1);

        let requests: Vec<_> = (0..20)
            .map(|player| request(u64::from(player), player, SpellKind::Firebolt, 0))
            .collect();

        let mut throttle = Throttle::new(&config);
        let mut first = Vec::new();
        throttle.handle(&requests, &census, &mut first);
        throttle.handle(&[Event::SessionReset], &census, &mut Vec::new());
        let mut second = Vec::new();
        throttle.handle(&requests, &census, &mut second);

        assert_eq!(first, second);
    }
}
