//! Wiring of the world and the guard systems into one deterministic loop.

use spawn_guard_core::{Command, GuardConfig};
use spawn_guard_system_degradation::{Degradation, DegradationPolicy, DegradationStats};
use spawn_guard_system_diagnostics::{SafetyMonitor, SafetyReport};
use spawn_guard_system_throttle::Throttle;
use spawn_guard_world::{self as world, query, World};
use tracing::debug;

/// A game session running every guard system against one world.
#[derive(Debug)]
pub(crate) struct Session {
    world: World,
    throttle: Throttle,
    degradation: Degradation,
    monitor: SafetyMonitor,
}

impl Session {
    pub(crate) fn new(config: &GuardConfig) -> Self {
        Self {
            world: World::with_config(config),
            throttle: Throttle::new(config),
            degradation: Degradation::new(DegradationPolicy::new(config)),
            monitor: SafetyMonitor::new(config),
        }
    }

    /// Applies `command` and every command the systems derive from it.
    pub(crate) fn submit(&mut self, command: Command) {
        let mut pending = vec![command];
        while !pending.is_empty() {
            let mut events = Vec::new();
            for command in pending.drain(..) {
                world::apply(&mut self.world, command, &mut events);
            }

            self.monitor.observe(&events, &query::ledgers(&self.world));

            let census = query::missile_census(&self.world);
            self.throttle.handle(&events, &census, &mut pending);
            self.degradation.handle(&events, &mut pending);
        }
    }

    /// Replays a whole script.
    pub(crate) fn run(&mut self, script: Vec<Command>) {
        let commands = script.len();
        for command in script {
            self.submit(command);
        }
        debug!(commands, clock = ?query::clock(&self.world), "script finished");
    }

    pub(crate) fn report(&self) -> SafetyReport {
        self.monitor.report()
    }

    pub(crate) fn degradation(&self) -> DegradationStats {
        self.degradation.stats()
    }
}
