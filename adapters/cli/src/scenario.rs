//! Scripted stress scenarios replayed against a session.

use std::time::Duration;

use clap::ValueEnum;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use spawn_guard_core::{
    BatchMode, Command, PlayerId, PoolKind, SpawnOrigin, SpawnPriority, SpellKind, Tile,
};
use spawn_guard_system_diagnostics::StressProfile;

const ARENA_CENTRE: Tile = Tile::new(40, 40);

/// Stress scenario selectable on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum Scenario {
    /// Inferno cast on the same tile while monster packs keep arriving.
    InfernoStationary,
    /// Chain Lightning and Lightning spammed by every player.
    ChainLightningStorm,
    /// Ambient multimissile volleys on top of Fireball and Nova casts.
    MultimissileBarrage,
    /// Every player mashing Apocalypse.
    ApocalypseSpam,
    /// All scenarios at once.
    CombinedChaos,
}

impl Scenario {
    pub(crate) const ALL: [Scenario; 5] = [
        Scenario::InfernoStationary,
        Scenario::ChainLightningStorm,
        Scenario::MultimissileBarrage,
        Scenario::ApocalypseSpam,
        Scenario::CombinedChaos,
    ];

    pub(crate) const fn profile(self) -> StressProfile {
        match self {
            Self::InfernoStationary => StressProfile::InfernoStationary,
            Self::ChainLightningStorm => StressProfile::ChainLightningStorm,
            Self::MultimissileBarrage => StressProfile::MultimissileBarrage,
            Self::ApocalypseSpam => StressProfile::ApocalypseSpam,
            Self::CombinedChaos => StressProfile::CombinedChaos,
        }
    }

    /// Initial ambient monster packs.
    fn opening(self) -> &'static [u32] {
        match self {
            Self::InfernoStationary => &[10],
            Self::CombinedChaos => &[20, 15],
            _ => &[],
        }
    }

    /// Recurring actions with their period in milliseconds.
    fn beats(self) -> Vec<(u64, Action)> {
        match self {
            Self::InfernoStationary => vec![
                (100, Action::Cast(SpellKind::Inferno)),
                (2_000, Action::MonsterPack(3)),
            ],
            Self::ChainLightningStorm => vec![
                (80, Action::Cast(SpellKind::ChainLightning)),
                (150, Action::Cast(SpellKind::Lightning)),
            ],
            Self::MultimissileBarrage => vec![
                (100, Action::Volley(60)),
                (120, Action::Cast(SpellKind::Fireball)),
                (150, Action::Cast(SpellKind::Nova)),
            ],
            Self::ApocalypseSpam => vec![(50, Action::Cast(SpellKind::Apocalypse))],
            Self::CombinedChaos => vec![
                (300, Action::Cast(SpellKind::Inferno)),
                (800, Action::Cast(SpellKind::ChainLightning)),
                (1_200, Action::Volley(60)),
                (1_500, Action::Trap(8)),
                (100, Action::Cast(SpellKind::ChargedBolt)),
                (400, Action::Cast(SpellKind::Apocalypse)),
                (100, Action::Volley(40)),
            ],
        }
    }

    /// Builds the full command script for the provided parameters.
    pub(crate) fn script(self, params: &Params) -> Vec<Command> {
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let mut script = Vec::new();

        for &size in self.opening() {
            script.push(ambient(PoolKind::Monsters, ARENA_CENTRE, size, None));
        }

        let tick_ms = params.tick.as_millis().max(1) as u64;
        let total_ms = params.duration.as_millis() as u64;
        let mut beats: Vec<(u64, u64, Action)> = self
            .beats()
            .into_iter()
            .map(|(period, action)| (period, 0, action))
            .collect();

        let mut now = 0;
        while now < total_ms {
            for (period, next_due, action) in &mut beats {
                if *next_due > now {
                    continue;
                }
                action.emit(params.players, &mut rng, &mut script);
                while *next_due <= now {
                    *next_due += *period;
                }
            }
            script.push(Command::Tick {
                dt: Duration::from_millis(tick_ms),
            });
            now += tick_ms;
        }

        script
    }
}

/// Shape of a scripted run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Params {
    pub(crate) players: u8,
    pub(crate) duration: Duration,
    pub(crate) tick: Duration,
    pub(crate) seed: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    /// Every player casts the spell near the arena centre.
    Cast(SpellKind),
    /// Ambient monsters join the fight.
    MonsterPack(u32),
    /// Ambient missiles from monster multimissile attacks.
    Volley(u32),
    /// Ambient trap missiles and their lights.
    Trap(u32),
}

impl Action {
    fn emit(self, players: u8, rng: &mut ChaCha8Rng, out: &mut Vec<Command>) {
        match self {
            Self::Cast(spell) => {
                for player in 0..players {
                    out.push(Command::RequestCast {
                        caster: PlayerId::new(player),
                        spell,
                        target: jitter(rng),
                    });
                }
            }
            Self::MonsterPack(size) => {
                out.push(ambient(PoolKind::Monsters, jitter(rng), size, None));
            }
            Self::Volley(count) => {
                out.push(ambient(
                    PoolKind::Missiles,
                    jitter(rng),
                    count,
                    Some(Duration::from_millis(1_500)),
                ));
            }
            Self::Trap(count) => {
                let target = jitter(rng);
                let lifetime = Some(Duration::from_millis(800));
                out.push(ambient(PoolKind::Missiles, target, count, lifetime));
                out.push(Command::SpawnEntities {
                    pool: PoolKind::Lights,
                    origin: SpawnOrigin::Ambient,
                    target,
                    count: count / 2,
                    lifetime,
                    priority: SpawnPriority::Optional,
                    batch: BatchMode::BestEffort,
                });
            }
        }
    }
}

fn jitter(rng: &mut ChaCha8Rng) -> Tile {
    Tile::new(
        ARENA_CENTRE.x() - 5 + rng.gen_range(0..=10),
        ARENA_CENTRE.y() - 5 + rng.gen_range(0..=10),
    )
}

fn ambient(pool: PoolKind, target: Tile, count: u32, lifetime: Option<Duration>) -> Command {
    Command::SpawnEntities {
        pool,
        origin: SpawnOrigin::Ambient,
        target,
        count,
        lifetime,
        priority: SpawnPriority::Normal,
        batch: BatchMode::BestEffort,
    }
}
