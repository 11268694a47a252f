//! Typed configuration table for pools, throttles and fallbacks.
//!
//! The table is deserialised once at startup and validated with
//! [`GuardConfig::validate`]. Spell entries are sparse overrides applied on top
//! of the built-in per-spell defaults returned by [`SpellConfig::for_spell`].

use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{PoolCapacities, PoolKind, SpellKind};

/// Complete configuration consumed by the world and the guard systems.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardConfig {
    /// Maximum occupancy of every pool.
    pub pools: PoolCapacities,
    /// Pressure shedding applied by the admission guard.
    pub admission: AdmissionConfig,
    /// Global cast gate engaged when many spell missiles are alive.
    pub pressure: PressureConfig,
    /// Behaviour when a spawn is refused.
    pub degradation: DegradationConfig,
    /// Boolean switches for optional guard behaviour.
    pub features: FeatureFlags,
    /// Per-spell overrides of the built-in throttle table.
    pub spells: Vec<SpellOverride>,
}

impl GuardConfig {
    /// Checks the table for values that would make the guard unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for pool in PoolKind::ALL {
            let capacity = self.pools.get(pool);
            if capacity == 0 {
                return Err(ConfigError::ZeroCapacity { pool });
            }
            if self.admission.critical_reserve >= capacity {
                return Err(ConfigError::ReserveTooLarge {
                    pool,
                    reserve: self.admission.critical_reserve,
                    capacity,
                });
            }
        }

        if self.admission.shed_above_percent > 100 {
            return Err(ConfigError::ShedThreshold(
                self.admission.shed_above_percent,
            ));
        }

        if self.pressure.admit_one_in == 0 {
            return Err(ConfigError::ZeroPressureRatio);
        }

        if self.degradation.max_visual_effects == 0 {
            return Err(ConfigError::ZeroVisualCapacity);
        }

        let mut seen = Vec::with_capacity(self.spells.len());
        for entry in &self.spells {
            if seen.contains(&entry.kind) {
                return Err(ConfigError::DuplicateSpell { spell: entry.kind });
            }
            seen.push(entry.kind);

            if entry.max_burst == Some(0) {
                return Err(ConfigError::ZeroBurst { spell: entry.kind });
            }
        }

        Ok(())
    }

    /// Resolves the per-spell overrides into a complete lookup table.
    #[must_use]
    pub fn spell_table(&self) -> SpellTable {
        let mut entries: BTreeMap<SpellKind, SpellConfig> = SpellKind::ALL
            .iter()
            .map(|&spell| (spell, SpellConfig::for_spell(spell)))
            .collect();

        for entry in &self.spells {
            let resolved = entry.apply(SpellConfig::for_spell(entry.kind));
            let _ = entries.insert(entry.kind, resolved);
        }

        SpellTable { entries }
    }

    /// Fallback configured for refusals raised by the provided pool.
    #[must_use]
    pub const fn pool_fallback(&self, pool: PoolKind) -> Fallback {
        match pool {
            PoolKind::Missiles => self.degradation.on_missiles,
            PoolKind::Monsters => self.degradation.on_monsters,
            PoolKind::Lights => self.degradation.on_lights,
        }
    }
}

/// Errors raised while validating a [`GuardConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A pool was configured without room for a single entity.
    #[error("pool `{pool}` must have a capacity of at least one")]
    ZeroCapacity {
        /// Pool with the invalid capacity.
        pool: PoolKind,
    },
    /// The critical reserve leaves no slot for ordinary spawns.
    #[error("critical_reserve {reserve} leaves no room in pool `{pool}` of capacity {capacity}")]
    ReserveTooLarge {
        /// Pool that would be reserved entirely.
        pool: PoolKind,
        /// Configured reserve.
        reserve: usize,
        /// Capacity of the pool.
        capacity: usize,
    },
    /// The shedding threshold is not a percentage.
    #[error("shed_above_percent must be within 0..=100, got {0}")]
    ShedThreshold(u8),
    /// The pressure gate would never admit a cast.
    #[error("pressure.admit_one_in must be at least one")]
    ZeroPressureRatio,
    /// The visual substitute ring cannot hold any effect.
    #[error("degradation.max_visual_effects must be at least one")]
    ZeroVisualCapacity,
    /// A spell appears twice in the override list.
    #[error("spell `{spell}` is configured more than once")]
    DuplicateSpell {
        /// Spell listed twice.
        spell: SpellKind,
    },
    /// A spell was configured with a burst allowance of zero.
    #[error("spell `{spell}` must allow a burst of at least one cast")]
    ZeroBurst {
        /// Spell with the invalid burst allowance.
        spell: SpellKind,
    },
}

/// Settings for the priority-aware admission guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdmissionConfig {
    /// Optional spawns are shed once a pool's usage exceeds this percentage.
    pub shed_above_percent: u8,
    /// Slots at the top of every pool that only critical spawns may fill.
    pub critical_reserve: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            shed_above_percent: 80,
            critical_reserve: 0,
        }
    }
}

/// Settings for the global pressure gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PressureConfig {
    /// Gate engages when more spell missiles than this are alive.
    pub missile_threshold: usize,
    /// While engaged, one cast in this many passes.
    pub admit_one_in: u32,
    /// Seed for the gate's deterministic random stream.
    pub seed: u64,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            missile_threshold: 200,
            admit_one_in: 5,
            seed: 0x5eed_0f_a90c_a1f5,
        }
    }
}

/// Observable behaviour when a spawn is refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Drop the spawn without a trace.
    Silent,
    /// Drop the spawn and start a visual-only stand-in.
    Substitute,
    /// Drop the spawn and log it at debug level.
    Verbose,
}

/// Per-refusal fallback selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DegradationConfig {
    /// Fallback for throttled casts.
    pub on_throttled: Fallback,
    /// Fallback for refusals of the missile pool.
    pub on_missiles: Fallback,
    /// Fallback for refusals of the monster pool.
    pub on_monsters: Fallback,
    /// Fallback for refusals of the light pool.
    pub on_lights: Fallback,
    /// Lifetime of visual substitutes in milliseconds.
    pub visual_effect_lifetime_ms: u64,
    /// Maximum number of visual substitutes alive at once.
    pub max_visual_effects: usize,
}

impl DegradationConfig {
    /// Lifetime of visual substitutes.
    #[must_use]
    pub const fn visual_effect_lifetime(&self) -> Duration {
        Duration::from_millis(self.visual_effect_lifetime_ms)
    }
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            on_throttled: Fallback::Silent,
            on_missiles: Fallback::Substitute,
            on_monsters: Fallback::Verbose,
            on_lights: Fallback::Silent,
            visual_effect_lifetime_ms: 250,
            max_visual_effects: 64,
        }
    }
}

/// Boolean switches for optional guard behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureFlags {
    /// Allows [`Fallback::Substitute`] to start visual stand-ins.
    pub visual_substitutes: bool,
    /// Enables the global pressure gate.
    pub global_pressure: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            visual_substitutes: true,
            global_pressure: true,
        }
    }
}

/// Resolved throttle and fan-out parameters of a single spell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpellConfig {
    /// Minimum simulated time between two accepted casts by the same player.
    pub min_interval: Duration,
    /// Accepted casts allowed within one burst window.
    pub max_burst: u32,
    /// Length of the rolling burst window.
    pub burst_window: Duration,
    /// Maximum live casts per player, or `None` for no limit.
    pub max_active_casts: Option<u32>,
    /// Whether the spell is throttled at all.
    pub enabled: bool,
    /// Missiles spawned per accepted cast.
    pub missiles_per_cast: u32,
    /// Lifetime of each missile.
    pub missile_lifetime: Duration,
    /// Lights spawned per accepted cast.
    pub lights_per_cast: u32,
    /// Monsters summoned per accepted cast.
    pub summons_per_cast: u32,
    /// Whether the missile fan-out must be admitted as a whole.
    pub all_or_nothing: bool,
}

impl SpellConfig {
    /// Built-in parameters for the provided spell.
    #[must_use]
    pub const fn for_spell(spell: SpellKind) -> Self {
        // (interval ms, burst, window ms, active casts, missiles, lifetime ms, lights, summons)
        let (interval, burst, window, active, missiles, lifetime, lights, summons) = match spell {
            SpellKind::Inferno => (250, 4, 1_000, 2, 6, 1_500, 1, 0),
            SpellKind::ChainLightning => (200, 4, 1_000, 2, 4, 800, 1, 0),
            SpellKind::Fireball => (120, 4, 1_000, 4, 1, 1_000, 1, 0),
            SpellKind::Lightning => (150, 4, 1_000, 2, 3, 600, 1, 0),
            SpellKind::FireWall => (300, 3, 1_500, 3, 10, 4_000, 2, 0),
            SpellKind::FlameWave => (120, 4, 1_000, 4, 8, 1_200, 1, 0),
            SpellKind::Guardian => (200, 3, 1_500, 3, 1, 6_000, 1, 0),
            SpellKind::Nova => (150, 4, 1_000, 2, 16, 900, 1, 0),
            SpellKind::Apocalypse => (300, 2, 2_000, 1, 16, 700, 0, 0),
            SpellKind::Elemental => (180, 4, 1_000, 2, 1, 1_500, 1, 0),
            SpellKind::Golem => (500, 2, 5_000, 1, 0, 0, 0, 1),
            SpellKind::ChargedBolt => (60, 8, 1_000, 8, 3, 700, 0, 0),
            SpellKind::HolyBolt => (70, 8, 1_000, 6, 1, 800, 1, 0),
            SpellKind::Firebolt => (70, 8, 1_000, 6, 1, 800, 1, 0),
        };

        Self {
            min_interval: Duration::from_millis(interval),
            max_burst: burst,
            burst_window: Duration::from_millis(window),
            max_active_casts: Some(active),
            enabled: true,
            missiles_per_cast: missiles,
            missile_lifetime: Duration::from_millis(lifetime),
            lights_per_cast: lights,
            summons_per_cast: summons,
            all_or_nothing: matches!(spell, SpellKind::Apocalypse),
        }
    }
}

/// Sparse override of a spell's built-in parameters.
///
/// A `max_active_casts` of zero removes the active cast limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpellOverride {
    /// Spell being overridden.
    pub kind: SpellKind,
    /// Minimum interval between accepted casts in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_interval_ms: Option<u64>,
    /// Accepted casts allowed within one burst window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_burst: Option<u32>,
    /// Length of the burst window in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst_window_ms: Option<u64>,
    /// Maximum live casts per player; zero disables the limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_active_casts: Option<u32>,
    /// Whether the spell is throttled at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Missiles spawned per accepted cast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missiles_per_cast: Option<u32>,
    /// Missile lifetime in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missile_lifetime_ms: Option<u64>,
    /// Lights spawned per accepted cast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lights_per_cast: Option<u32>,
    /// Monsters summoned per accepted cast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summons_per_cast: Option<u32>,
    /// Whether the missile fan-out must be admitted as a whole.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_or_nothing: Option<bool>,
}

impl SpellOverride {
    /// Creates an override for `kind` that changes nothing yet.
    #[must_use]
    pub const fn new(kind: SpellKind) -> Self {
        Self {
            kind,
            min_interval_ms: None,
            max_burst: None,
            burst_window_ms: None,
            max_active_casts: None,
            enabled: None,
            missiles_per_cast: None,
            missile_lifetime_ms: None,
            lights_per_cast: None,
            summons_per_cast: None,
            all_or_nothing: None,
        }
    }

    fn apply(&self, mut base: SpellConfig) -> SpellConfig {
        if let Some(ms) = self.min_interval_ms {
            base.min_interval = Duration::from_millis(ms);
        }
        if let Some(burst) = self.max_burst {
            base.max_burst = burst;
        }
        if let Some(ms) = self.burst_window_ms {
            base.burst_window = Duration::from_millis(ms);
        }
        if let Some(active) = self.max_active_casts {
            base.max_active_casts = (active > 0).then_some(active);
        }
        if let Some(enabled) = self.enabled {
            base.enabled = enabled;
        }
        if let Some(missiles) = self.missiles_per_cast {
            base.missiles_per_cast = missiles;
        }
        if let Some(ms) = self.missile_lifetime_ms {
            base.missile_lifetime = Duration::from_millis(ms);
        }
        if let Some(lights) = self.lights_per_cast {
            base.lights_per_cast = lights;
        }
        if let Some(summons) = self.summons_per_cast {
            base.summons_per_cast = summons;
        }
        if let Some(atomic) = self.all_or_nothing {
            base.all_or_nothing = atomic;
        }
        base
    }
}

/// Complete per-spell lookup table resolved from a [`GuardConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpellTable {
    entries: BTreeMap<SpellKind, SpellConfig>,
}

impl SpellTable {
    /// Parameters in effect for the provided spell.
    #[must_use]
    pub fn get(&self, spell: SpellKind) -> SpellConfig {
        self.entries
            .get(&spell)
            .copied()
            .unwrap_or_else(|| SpellConfig::for_spell(spell))
    }

    /// Replaces the parameters of a single spell.
    pub fn set(&mut self, spell: SpellKind, config: SpellConfig) {
        let _ = self.entries.insert(spell, config);
    }
}

impl Default for SpellTable {
    fn default() -> Self {
        GuardConfig::default().spell_table()
    }
}
