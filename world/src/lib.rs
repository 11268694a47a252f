#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative simulation context for the spawn guard engine.
//!
//! The world owns the missile, monster and light pools, the simulation clock
//! and the ring of visual stand-ins. It is mutated exclusively through
//! [`apply`], which consults the admission guard before every insertion, so no
//! sequence of commands can push a pool past its capacity.

mod effects;
mod pool;

use std::time::Duration;

use spawn_guard_core::{
    BatchMode, CastId, Command, DespawnCause, Event, GuardConfig, PoolCapacities, PoolKind,
    SpawnOrigin, SpawnPriority, SpawnRefusal, Tile,
};
use spawn_guard_system_admission::{try_admit, AdmissionGuard};
use tracing::trace;

use crate::{
    effects::EffectRing,
    pool::{Entity, Pool},
};

/// Represents the authoritative simulation state.
#[derive(Debug)]
pub struct World {
    clock: Duration,
    next_cast: CastId,
    capacities: PoolCapacities,
    missiles: Pool,
    monsters: Pool,
    lights: Pool,
    guard: AdmissionGuard,
    effects: EffectRing,
}

impl World {
    /// Creates a world using the built-in configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&GuardConfig::default())
    }

    /// Creates a world sized and guarded according to `config`.
    #[must_use]
    pub fn with_config(config: &GuardConfig) -> Self {
        let capacities = config.pools;
        Self {
            clock: Duration::ZERO,
            next_cast: CastId::new(0),
            capacities,
            missiles: Pool::new(PoolKind::Missiles, capacities.missiles),
            monsters: Pool::new(PoolKind::Monsters, capacities.monsters),
            lights: Pool::new(PoolKind::Lights, capacities.lights),
            guard: AdmissionGuard::new(config.admission),
            effects: EffectRing::new(config.degradation.max_visual_effects),
        }
    }

    fn pool(&self, kind: PoolKind) -> &Pool {
        match kind {
            PoolKind::Missiles => &self.missiles,
            PoolKind::Monsters => &self.monsters,
            PoolKind::Lights => &self.lights,
        }
    }

    fn pool_mut(&mut self, kind: PoolKind) -> &mut Pool {
        match kind {
            PoolKind::Missiles => &mut self.missiles,
            PoolKind::Monsters => &mut self.monsters,
            PoolKind::Lights => &mut self.lights,
        }
    }

    fn rebuild_pools(&mut self, capacities: PoolCapacities) {
        self.capacities = capacities;
        self.missiles = Pool::new(PoolKind::Missiles, capacities.missiles);
        self.monsters = Pool::new(PoolKind::Monsters, capacities.monsters);
        self.lights = Pool::new(PoolKind::Lights, capacities.lights);
    }

    fn advance(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        self.clock = self.clock.saturating_add(dt);
        out_events.push(Event::TimeAdvanced {
            dt,
            now: self.clock,
        });

        let now = self.clock;
        let mut expired = Vec::new();
        for kind in PoolKind::ALL {
            self.pool_mut(kind).expire(now, &mut expired);
        }
        out_events.extend(expired.into_iter().map(|entity| Event::EntityDespawned {
            entity,
            cause: DespawnCause::Expired,
        }));

        self.effects.expire(now);
    }

    fn spawn_entities(
        &mut self,
        kind: PoolKind,
        origin: SpawnOrigin,
        target: Tile,
        count: u32,
        lifetime: Option<Duration>,
        priority: SpawnPriority,
        batch: BatchMode,
        out_events: &mut Vec<Event>,
    ) {
        let guard = self.guard;
        let expires_at = lifetime.map(|lifetime| self.clock.saturating_add(lifetime));
        let pool = self.pool_mut(kind);
        let plan = guard.admit_batch(kind, &*pool, count, priority, batch);

        let mut constructed = 0;
        for _ in 0..plan.admitted {
            if !try_admit(&*pool, guard.limit(&*pool, priority)).is_ok() {
                break;
            }
            let entity = pool.insert(Entity {
                origin,
                tile: target,
                expires_at,
            });
            trace!(pool = %kind, index = entity.index(), "entity spawned");
            out_events.push(Event::EntitySpawned {
                entity,
                origin,
                tile: target,
            });
            constructed += 1;
        }

        let dropped = count - constructed;
        if dropped > 0 {
            let refusal = plan
                .refusal
                .unwrap_or(SpawnRefusal::CapacityExceeded { pool: kind });
            trace!(pool = %kind, dropped, %refusal, "spawn dropped");
            out_events.push(Event::SpawnDropped {
                pool: kind,
                origin,
                target,
                count: dropped,
                refusal,
            });
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => world.advance(dt, out_events),
        Command::RequestCast {
            caster,
            spell,
            target,
        } => {
            let cast = world.next_cast;
            world.next_cast = cast.next();
            out_events.push(Event::CastRequested {
                cast,
                caster,
                spell,
                target,
                at: world.clock,
            });
        }
        Command::DropCast {
            cast,
            caster,
            spell,
            target,
            reason,
        } => {
            trace!(cast = cast.get(), %caster, %spell, %reason, "cast dropped");
            out_events.push(Event::CastDropped {
                cast,
                caster,
                spell,
                target,
                reason,
            });
        }
        Command::SpawnEntities {
            pool,
            origin,
            target,
            count,
            lifetime,
            priority,
            batch,
        } => world.spawn_entities(
            pool, origin, target, count, lifetime, priority, batch, out_events,
        ),
        Command::DespawnEntity { entity } => {
            if world.pool_mut(entity.pool()).remove(entity).is_some() {
                out_events.push(Event::EntityDespawned {
                    entity,
                    cause: DespawnCause::Removed,
                });
            } else {
                out_events.push(Event::DespawnRejected { entity });
            }
        }
        Command::SpawnVisualEffect {
            spell,
            target,
            lifetime,
        } => {
            let expires_at = world.clock.saturating_add(lifetime);
            let evicted = world.effects.push(spell, target, expires_at);
            out_events.push(Event::VisualEffectSpawned {
                spell,
                target,
                evicted,
            });
        }
        Command::ConfigurePools { capacities } => {
            world.rebuild_pools(capacities);
            out_events.push(Event::PoolsConfigured { capacities });
        }
        Command::PlayerLeft { player } => {
            out_events.push(Event::PlayerLeft { player });
        }
        Command::ResetSession => {
            world.rebuild_pools(world.capacities);
            world.effects.clear();
            world.clock = Duration::ZERO;
            world.next_cast = CastId::new(0);
            out_events.push(Event::SessionReset);
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use super::World;
    use spawn_guard_core::{
        CapacityLedger, EntityId, LedgerSnapshot, MissileCensus, PoolKind, SpawnOrigin,
        SpellKind, Tile,
    };

    /// Current simulation time.
    #[must_use]
    pub fn clock(world: &World) -> Duration {
        world.clock
    }

    /// Occupancy reading of a single pool.
    #[must_use]
    pub fn ledger(world: &World, kind: PoolKind) -> LedgerSnapshot {
        let pool = world.pool(kind);
        LedgerSnapshot {
            kind,
            size: pool.size(),
            capacity: pool.capacity(),
        }
    }

    /// Occupancy readings of every pool in [`PoolKind::ALL`] order.
    #[must_use]
    pub fn ledgers(world: &World) -> [LedgerSnapshot; 3] {
        PoolKind::ALL.map(|kind| ledger(world, kind))
    }

    /// Counts live spell missiles, in total and per caster and spell.
    #[must_use]
    pub fn missile_census(world: &World) -> MissileCensus {
        let mut census = MissileCensus::default();
        for (_, entity) in world.missiles.iter() {
            if let SpawnOrigin::Spell {
                caster,
                spell,
                cast,
            } = entity.origin
            {
                census.record(caster, spell, cast, 1);
            }
        }
        census
    }

    /// Reports whether the handle addresses a live entity.
    #[must_use]
    pub fn is_live(world: &World, entity: EntityId) -> bool {
        world.pool(entity.pool()).contains(entity)
    }

    /// Captures the live entities of a pool in slot order.
    #[must_use]
    pub fn entities(world: &World, kind: PoolKind) -> Vec<EntitySnapshot> {
        world
            .pool(kind)
            .iter()
            .map(|(id, entity)| EntitySnapshot {
                id,
                origin: entity.origin,
                tile: entity.tile,
            })
            .collect()
    }

    /// Spell and tile of each live visual stand-in, oldest first.
    #[must_use]
    pub fn visual_effects(world: &World) -> Vec<(Option<SpellKind>, Tile)> {
        world.effects.iter().collect()
    }

    /// Number of live visual stand-ins.
    #[must_use]
    pub fn visual_effect_count(world: &World) -> usize {
        world.effects.len()
    }

    /// Immutable representation of a live entity.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EntitySnapshot {
        /// Handle of the entity.
        pub id: EntityId,
        /// Cause of the spawn.
        pub origin: SpawnOrigin,
        /// Tile the entity occupies.
        pub tile: Tile,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spawn_guard_core::{CapacityLedger, PlayerId, SpellKind};

    fn spawn(pool: PoolKind, count: u32, lifetime: Option<Duration>) -> Command {
        Command::SpawnEntities {
            pool,
            origin: SpawnOrigin::Ambient,
            target: Tile::new(4, 4),
            count,
            lifetime,
            priority: SpawnPriority::Normal,
            batch: BatchMode::BestEffort,
        }
    }

    fn small_world(missiles: usize) -> World {
        let mut config = GuardConfig::default();
        config.pools.missiles = missiles;
        World::with_config(&config)
    }

    #[test]
    fn request_cast_stamps_sequential_identifiers_and_time() {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_millis(40),
            },
            &mut events,
        );
        events.clear();

        for _ in 0..2 {
            apply(
                &mut world,
                Command::RequestCast {
                    caster: PlayerId::new(0),
                    spell: SpellKind::Fireball,
                    target: Tile::new(1, 2),
                },
                &mut events,
            );
        }

        let casts: Vec<_> = events
            .iter()
            .map(|event| match event {
                Event::CastRequested { cast, at, .. } => (cast.get(), *at),
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();
        assert_eq!(
            casts,
            vec![(0, Duration::from_millis(40)), (1, Duration::from_millis(40))]
        );
    }

    #[test]
    fn best_effort_spawn_reports_dropped_remainder() {
        let mut world = small_world(3);
        let mut events = Vec::new();
        apply(&mut world, spawn(PoolKind::Missiles, 5, None), &mut events);

        let spawned = events
            .iter()
            .filter(|event| matches!(event, Event::EntitySpawned { .. }))
            .count();
        assert_eq!(spawned, 3);
        assert_eq!(
            events.last(),
            Some(&Event::SpawnDropped {
                pool: PoolKind::Missiles,
                origin: SpawnOrigin::Ambient,
                target: Tile::new(4, 4),
                count: 2,
                refusal: SpawnRefusal::CapacityExceeded {
                    pool: PoolKind::Missiles
                },
            })
        );
        assert_eq!(query::ledger(&world, PoolKind::Missiles).size(), 3);
    }

    #[test]
    fn tick_expires_entities_and_frees_capacity() {
        let mut world = small_world(2);
        let mut events = Vec::new();
        apply(
            &mut world,
            spawn(PoolKind::Missiles, 2, Some(Duration::from_millis(100))),
            &mut events,
        );
        assert!(query::ledger(&world, PoolKind::Missiles).is_full());

        events.clear();
        apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_millis(100),
            },
            &mut events,
        );

        let expired = events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    Event::EntityDespawned {
                        cause: DespawnCause::Expired,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(expired, 2);
        assert_eq!(query::ledger(&world, PoolKind::Missiles).size(), 0);
    }

    #[test]
    fn despawning_twice_is_rejected() {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(&mut world, spawn(PoolKind::Monsters, 1, None), &mut events);
        let Some(Event::EntitySpawned { entity, .. }) = events.first().cloned() else {
            panic!("expected spawn event");
        };

        events.clear();
        apply(&mut world, Command::DespawnEntity { entity }, &mut events);
        apply(&mut world, Command::DespawnEntity { entity }, &mut events);

        assert_eq!(
            events,
            vec![
                Event::EntityDespawned {
                    entity,
                    cause: DespawnCause::Removed,
                },
                Event::DespawnRejected { entity },
            ]
        );
        assert!(!query::is_live(&world, entity));
    }

    #[test]
    fn visual_effects_never_refuse() {
        let mut config = GuardConfig::default();
        config.degradation.max_visual_effects = 2;
        let mut world = World::with_config(&config);
        let mut events = Vec::new();

        for _ in 0..3 {
            apply(
                &mut world,
                Command::SpawnVisualEffect {
                    spell: Some(SpellKind::Apocalypse),
                    target: Tile::new(0, 0),
                    lifetime: Duration::from_millis(250),
                },
                &mut events,
            );
        }

        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[2],
            Event::VisualEffectSpawned { evicted: true, .. }
        ));
        assert_eq!(query::visual_effect_count(&world), 2);
    }

    #[test]
    fn reset_session_empties_pools_and_rewinds_clock() {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(&mut world, spawn(PoolKind::Lights, 4, None), &mut events);
        apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_secs(3),
            },
            &mut events,
        );

        events.clear();
        apply(&mut world, Command::ResetSession, &mut events);

        assert_eq!(events, vec![Event::SessionReset]);
        assert_eq!(query::clock(&world), Duration::ZERO);
        assert!(query::ledgers(&world).iter().all(|ledger| ledger.size == 0));
        assert_eq!(query::ledger(&world, PoolKind::Lights).capacity, 32);
    }

    #[test]
    fn missile_census_groups_by_cast() {
        let mut world = World::new();
        let mut events = Vec::new();
        let caster = PlayerId::new(1);
        for cast in 0..2 {
            apply(
                &mut world,
                Command::SpawnEntities {
                    pool: PoolKind::Missiles,
                    origin: SpawnOrigin::Spell {
                        caster,
                        spell: SpellKind::Nova,
                        cast: CastId::new(cast),
                    },
                    target: Tile::new(0, 0),
                    count: 16,
                    lifetime: None,
                    priority: SpawnPriority::Normal,
                    batch: BatchMode::BestEffort,
                },
                &mut events,
            );
        }
        apply(&mut world, spawn(PoolKind::Missiles, 3, None), &mut events);

        let census = query::missile_census(&world);
        assert_eq!(census.total(), 32);
        assert_eq!(census.active_casts(caster, SpellKind::Nova), 2);
        assert_eq!(query::entities(&world, PoolKind::Missiles).len(), 35);
    }
}
