#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the spawn guard engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Systems consume event streams, query immutable
//! snapshots, and respond exclusively with new command batches.
//!
//! Refused spawns are ordinary values. A throttled cast or a full pool ends in
//! a [`Event::CastDropped`] or [`Event::SpawnDropped`] event and is never
//! surfaced as an error to the caller of `apply`.

pub mod config;

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    time::Duration,
};

use serde::{Deserialize, Serialize};

pub use config::{
    AdmissionConfig, ConfigError, DegradationConfig, Fallback, FeatureFlags, GuardConfig,
    PressureConfig, SpellConfig, SpellOverride, SpellTable,
};

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Player input asking to cast a spell at a tile.
    RequestCast {
        /// Player issuing the cast.
        caster: PlayerId,
        /// Spell being cast.
        spell: SpellKind,
        /// Tile the spell is aimed at.
        target: Tile,
    },
    /// Discards a cast that was refused before any entity was constructed.
    DropCast {
        /// Identifier stamped on the cast by the world.
        cast: CastId,
        /// Player that issued the cast.
        caster: PlayerId,
        /// Spell that was refused.
        spell: SpellKind,
        /// Tile the spell was aimed at.
        target: Tile,
        /// Reason the cast was throttled.
        reason: ThrottleReason,
    },
    /// Requests construction of one or more entities in a pool.
    SpawnEntities {
        /// Pool receiving the entities.
        pool: PoolKind,
        /// Cause of the spawn.
        origin: SpawnOrigin,
        /// Tile the entities appear at.
        target: Tile,
        /// Number of entities requested.
        count: u32,
        /// Simulated lifetime after which the entities expire, if any.
        lifetime: Option<Duration>,
        /// Priority used when the pool is under pressure.
        priority: SpawnPriority,
        /// Whether a partial batch may be constructed.
        batch: BatchMode,
    },
    /// Requests removal of a live entity.
    DespawnEntity {
        /// Handle of the entity to remove.
        entity: EntityId,
    },
    /// Requests a cheap, visual-only stand-in for a refused spawn.
    SpawnVisualEffect {
        /// Spell the effect imitates, if the refused spawn came from a cast.
        spell: Option<SpellKind>,
        /// Tile the effect is drawn at.
        target: Tile,
        /// How long the effect stays visible.
        lifetime: Duration,
    },
    /// Rebuilds every pool empty using the provided capacities.
    ConfigurePools {
        /// Maximum occupancy of each pool.
        capacities: PoolCapacities,
    },
    /// Announces that a player left the session.
    PlayerLeft {
        /// Player that disconnected.
        player: PlayerId,
    },
    /// Clears all session state as on a game restart.
    ResetSession,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
        /// Simulation clock after the tick.
        now: Duration,
    },
    /// A player asked to cast a spell; throttling has not been evaluated yet.
    CastRequested {
        /// Identifier assigned to the cast.
        cast: CastId,
        /// Player issuing the cast.
        caster: PlayerId,
        /// Spell being cast.
        spell: SpellKind,
        /// Tile the spell is aimed at.
        target: Tile,
        /// Simulation time of the request.
        at: Duration,
    },
    /// A cast was throttled and none of its entities were constructed.
    CastDropped {
        /// Identifier of the dropped cast.
        cast: CastId,
        /// Player that issued the cast.
        caster: PlayerId,
        /// Spell that was refused.
        spell: SpellKind,
        /// Tile the spell was aimed at.
        target: Tile,
        /// Reason the cast was throttled.
        reason: ThrottleReason,
    },
    /// Confirms that an entity was constructed.
    EntitySpawned {
        /// Handle assigned to the new entity.
        entity: EntityId,
        /// Cause of the spawn.
        origin: SpawnOrigin,
        /// Tile the entity occupies.
        tile: Tile,
    },
    /// Reports that part or all of a spawn request was refused.
    SpawnDropped {
        /// Pool that refused the request.
        pool: PoolKind,
        /// Cause of the refused spawn.
        origin: SpawnOrigin,
        /// Tile the entities would have appeared at.
        target: Tile,
        /// Number of entities that were not constructed.
        count: u32,
        /// Reason for the refusal.
        refusal: SpawnRefusal,
    },
    /// Confirms that an entity left its pool.
    EntityDespawned {
        /// Handle of the removed entity.
        entity: EntityId,
        /// Why the entity was removed.
        cause: DespawnCause,
    },
    /// Reports a despawn request for a handle that is no longer live.
    DespawnRejected {
        /// Stale or unknown handle.
        entity: EntityId,
    },
    /// Confirms that a visual-only effect was started.
    VisualEffectSpawned {
        /// Spell the effect imitates.
        spell: Option<SpellKind>,
        /// Tile the effect is drawn at.
        target: Tile,
        /// Indicates whether the oldest effect was evicted to make room.
        evicted: bool,
    },
    /// Announces that pools were rebuilt with new capacities.
    PoolsConfigured {
        /// Capacities now in effect.
        capacities: PoolCapacities,
    },
    /// Announces that a player left the session.
    PlayerLeft {
        /// Player that disconnected.
        player: PlayerId,
    },
    /// Announces that all session state was cleared.
    SessionReset,
}

/// Identifier of a player in a shared session.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PlayerId(u8);

impl PlayerId {
    /// Creates a new player identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.0)
    }
}

/// Identifier stamped on every cast request by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CastId(u64);

impl CastId {
    /// Creates a new cast identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns the identifier that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Location of a dungeon tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tile {
    x: u32,
    y: u32,
}

impl Tile {
    /// Creates a new tile coordinate.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Horizontal tile index.
    #[must_use]
    pub const fn x(&self) -> u32 {
        self.x
    }

    /// Vertical tile index.
    #[must_use]
    pub const fn y(&self) -> u32 {
        self.y
    }
}

/// Kinds of fixed-capacity entity pools owned by the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    /// Projectiles and spell effects with gameplay impact.
    Missiles,
    /// Monsters, including summoned allies.
    Monsters,
    /// Dynamic light sources.
    Lights,
}

impl PoolKind {
    /// Every pool kind in deterministic order.
    pub const ALL: [PoolKind; 3] = [PoolKind::Missiles, PoolKind::Monsters, PoolKind::Lights];

    /// Compile-time maximum occupancy used when no configuration overrides it.
    #[must_use]
    pub const fn default_capacity(self) -> usize {
        match self {
            Self::Missiles => 500,
            Self::Monsters => 200,
            Self::Lights => 32,
        }
    }

    /// Lowercase name used in logs and configuration.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Missiles => "missiles",
            Self::Monsters => "monsters",
            Self::Lights => "lights",
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Generational handle to an entity stored in a pool.
///
/// The generation changes every time a slot is reused, so a handle kept after
/// its entity despawned never aliases the slot's next occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    pool: PoolKind,
    index: u32,
    generation: u32,
}

impl EntityId {
    /// Creates a handle from its raw parts.
    #[must_use]
    pub const fn new(pool: PoolKind, index: u32, generation: u32) -> Self {
        Self {
            pool,
            index,
            generation,
        }
    }

    /// Pool that owns the entity.
    #[must_use]
    pub const fn pool(&self) -> PoolKind {
        self.pool
    }

    /// Slot index inside the pool.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot at the time the entity was spawned.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

/// Spells whose casts are subject to throttling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpellKind {
    /// Stream of fire along a line of tiles.
    Inferno,
    /// Lightning that forks between targets.
    ChainLightning,
    /// Single exploding projectile.
    Fireball,
    /// Bolt of lightning along a line of tiles.
    Lightning,
    /// Wall of flames.
    FireWall,
    /// Wave of flames advancing from the caster.
    FlameWave,
    /// Stationary turret that fires bolts.
    Guardian,
    /// Ring of lightning expanding from the caster.
    Nova,
    /// Strikes every monster in view.
    Apocalypse,
    /// Homing fire elemental.
    Elemental,
    /// Summons a golem ally.
    Golem,
    /// Several erratic sparks.
    ChargedBolt,
    /// Bolt that only harms undead.
    HolyBolt,
    /// Single small fire projectile.
    Firebolt,
}

impl SpellKind {
    /// Every spell in deterministic order.
    pub const ALL: [SpellKind; 14] = [
        SpellKind::Inferno,
        SpellKind::ChainLightning,
        SpellKind::Fireball,
        SpellKind::Lightning,
        SpellKind::FireWall,
        SpellKind::FlameWave,
        SpellKind::Guardian,
        SpellKind::Nova,
        SpellKind::Apocalypse,
        SpellKind::Elemental,
        SpellKind::Golem,
        SpellKind::ChargedBolt,
        SpellKind::HolyBolt,
        SpellKind::Firebolt,
    ];

    /// Name used in logs and configuration.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Inferno => "inferno",
            Self::ChainLightning => "chain_lightning",
            Self::Fireball => "fireball",
            Self::Lightning => "lightning",
            Self::FireWall => "fire_wall",
            Self::FlameWave => "flame_wave",
            Self::Guardian => "guardian",
            Self::Nova => "nova",
            Self::Apocalypse => "apocalypse",
            Self::Elemental => "elemental",
            Self::Golem => "golem",
            Self::ChargedBolt => "charged_bolt",
            Self::HolyBolt => "holy_bolt",
            Self::Firebolt => "firebolt",
        }
    }
}

impl fmt::Display for SpellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cause of a spawn request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpawnOrigin {
    /// Entity created on behalf of a spell cast.
    Spell {
        /// Player that cast the spell.
        caster: PlayerId,
        /// Spell that produced the entity.
        spell: SpellKind,
        /// Cast the entity belongs to.
        cast: CastId,
    },
    /// Entity created by the level itself, such as a monster pack.
    Ambient,
}

impl SpawnOrigin {
    /// Spell behind the spawn, if any.
    #[must_use]
    pub const fn spell(&self) -> Option<SpellKind> {
        match self {
            Self::Spell { spell, .. } => Some(*spell),
            Self::Ambient => None,
        }
    }
}

/// How important a spawn is when its pool is under pressure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpawnPriority {
    /// Admitted whenever a slot is free.
    Critical,
    /// Admitted whenever a slot is free.
    Normal,
    /// Shed once the pool crosses its pressure threshold.
    Optional,
}

/// Whether a multi-entity request may be partially constructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BatchMode {
    /// Construct as many entities as fit and drop the rest.
    BestEffort,
    /// Construct every entity or none of them.
    AllOrNothing,
}

/// Why an entity left its pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DespawnCause {
    /// The entity's lifetime elapsed.
    Expired,
    /// The entity was explicitly removed.
    Removed,
}

/// Answer of the admission guard for a single spawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AdmissionDecision {
    /// The caller may insert exactly one entity.
    Ok,
    /// The pool is full; the caller must not insert.
    LimitReached,
}

impl AdmissionDecision {
    /// Reports whether the spawn may proceed.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Reasons a cast may be throttled before any entity is constructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleReason {
    /// The previous accepted cast is more recent than the minimum interval.
    Cooldown,
    /// The caster used up the burst allowance of the current window.
    BurstExhausted,
    /// The caster already has the maximum number of live casts of this spell.
    ActiveCastLimit,
    /// Too many spell missiles are alive and the pressure gate refused the cast.
    GlobalPressure,
}

impl fmt::Display for ThrottleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Cooldown => "cooldown",
            Self::BurstExhausted => "burst exhausted",
            Self::ActiveCastLimit => "active cast limit",
            Self::GlobalPressure => "global pressure",
        };
        f.write_str(text)
    }
}

/// Non-fatal reasons a spawn did not happen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum SpawnRefusal {
    /// The pool is at maximum occupancy.
    #[error("{pool} pool is at capacity")]
    CapacityExceeded {
        /// Pool that refused the spawn.
        pool: PoolKind,
    },
    /// The pool is above its pressure threshold and the spawn was optional.
    #[error("{pool} pool shed an optional spawn")]
    Shed {
        /// Pool that refused the spawn.
        pool: PoolKind,
    },
    /// The cast producing the spawn arrived too soon.
    #[error("{spell} cast throttled: {reason}")]
    Throttled {
        /// Spell that was refused.
        spell: SpellKind,
        /// Specific throttle that fired.
        reason: ThrottleReason,
    },
}

/// Read access to the occupancy of a fixed-capacity pool.
pub trait CapacityLedger {
    /// Current number of entities in the pool.
    fn size(&self) -> usize;

    /// Fixed maximum number of entities the pool may hold.
    fn capacity(&self) -> usize;

    /// Reports whether no further entity fits.
    fn is_full(&self) -> bool {
        self.size() >= self.capacity()
    }

    /// Occupancy expressed as a whole percentage clamped to `0..=100`.
    fn usage_percent(&self) -> u8 {
        let capacity = self.capacity();
        if capacity == 0 {
            return 100;
        }
        let percent = self.size().saturating_mul(100) / capacity;
        percent.min(100) as u8
    }
}

/// Immutable occupancy reading of a single pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerSnapshot {
    /// Pool the reading was taken from.
    pub kind: PoolKind,
    /// Entities alive when the reading was taken.
    pub size: usize,
    /// Maximum occupancy of the pool.
    pub capacity: usize,
}

impl CapacityLedger for LedgerSnapshot {
    fn size(&self) -> usize {
        self.size
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Maximum occupancy configured for each pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolCapacities {
    /// Maximum number of live missiles.
    pub missiles: usize,
    /// Maximum number of live monsters.
    pub monsters: usize,
    /// Maximum number of live lights.
    pub lights: usize,
}

impl PoolCapacities {
    /// Returns the capacity configured for the provided pool.
    #[must_use]
    pub const fn get(&self, kind: PoolKind) -> usize {
        match kind {
            PoolKind::Missiles => self.missiles,
            PoolKind::Monsters => self.monsters,
            PoolKind::Lights => self.lights,
        }
    }
}

impl Default for PoolCapacities {
    fn default() -> Self {
        Self {
            missiles: PoolKind::Missiles.default_capacity(),
            monsters: PoolKind::Monsters.default_capacity(),
            lights: PoolKind::Lights.default_capacity(),
        }
    }
}

/// Read-only census of live spell missiles.
///
/// Casts are counted while at least one of their missiles is alive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MissileCensus {
    total: usize,
    casts: BTreeMap<(PlayerId, SpellKind), BTreeSet<CastId>>,
}

impl MissileCensus {
    /// Adds `missiles` live missiles belonging to the provided cast.
    pub fn record(&mut self, caster: PlayerId, spell: SpellKind, cast: CastId, missiles: usize) {
        if missiles == 0 {
            return;
        }
        self.total = self.total.saturating_add(missiles);
        let _ = self.casts.entry((caster, spell)).or_default().insert(cast);
    }

    /// Total number of live missiles spawned by spells.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of distinct live casts of `spell` by `caster`.
    #[must_use]
    pub fn active_casts(&self, caster: PlayerId, spell: SpellKind) -> usize {
        self.casts
            .get(&(caster, spell))
            .map_or(0, BTreeSet::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_percent_handles_empty_and_zero_capacity() {
        let empty = LedgerSnapshot {
            kind: PoolKind::Lights,
            size: 0,
            capacity: 32,
        };
        assert_eq!(empty.usage_percent(), 0);
        assert!(!empty.is_full());

        let zero = LedgerSnapshot {
            kind: PoolKind::Lights,
            size: 0,
            capacity: 0,
        };
        assert_eq!(zero.usage_percent(), 100);
        assert!(zero.is_full());
    }

    #[test]
    fn usage_percent_truncates() {
        let ledger = LedgerSnapshot {
            kind: PoolKind::Missiles,
            size: 401,
            capacity: 500,
        };
        assert_eq!(ledger.usage_percent(), 80);
    }

    #[test]
    fn default_capacities_match_pool_constants() {
        let capacities = PoolCapacities::default();
        assert_eq!(capacities.get(PoolKind::Missiles), 500);
        assert_eq!(capacities.get(PoolKind::Monsters), 200);
        assert_eq!(capacities.get(PoolKind::Lights), 32);
    }

    #[test]
    fn census_counts_distinct_casts_per_caster() {
        let first = PlayerId::new(0);
        let second = PlayerId::new(1);
        let mut census = MissileCensus::default();
        census.record(first, SpellKind::Nova, CastId::new(1), 16);
        census.record(first, SpellKind::Nova, CastId::new(1), 2);
        census.record(first, SpellKind::Nova, CastId::new(2), 16);
        census.record(second, SpellKind::Nova, CastId::new(3), 16);
        census.record(second, SpellKind::Golem, CastId::new(4), 0);

        assert_eq!(census.total(), 50);
        assert_eq!(census.active_casts(first, SpellKind::Nova), 2);
        assert_eq!(census.active_casts(second, SpellKind::Nova), 1);
        assert_eq!(census.active_casts(second, SpellKind::Golem), 0);
    }

    #[test]
    fn refusal_messages_name_the_pool_and_spell() {
        let capacity = SpawnRefusal::CapacityExceeded {
            pool: PoolKind::Missiles,
        };
        assert_eq!(capacity.to_string(), "missiles pool is at capacity");

        let throttled = SpawnRefusal::Throttled {
            spell: SpellKind::Apocalypse,
            reason: ThrottleReason::Cooldown,
        };
        assert_eq!(throttled.to_string(), "apocalypse cast throttled: cooldown");
    }
}
