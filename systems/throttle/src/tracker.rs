//! Per-player, per-spell cooldown and burst state.

use std::{
    collections::{BTreeMap, VecDeque},
    time::Duration,
};

use spawn_guard_core::{PlayerId, SpellConfig, SpellKind, SpellTable, ThrottleReason};

/// Timing state of a single `(caster, spell)` key.
///
/// Created lazily on the first accepted cast and only ever written on the
/// accepting path; a throttled attempt leaves it untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThrottleState {
    last_cast: Duration,
    recent: VecDeque<Duration>,
}

impl ThrottleState {
    fn new(now: Duration) -> Self {
        Self {
            last_cast: now,
            recent: VecDeque::from([now]),
        }
    }

    /// Simulation time of the most recent accepted cast.
    #[must_use]
    pub fn last_cast(&self) -> Duration {
        self.last_cast
    }

    /// Accepted casts less than `window` before `now`.
    #[must_use]
    pub fn casts_within(&self, window: Duration, now: Duration) -> usize {
        self.recent
            .iter()
            .filter(|&&at| now.saturating_sub(at) < window)
            .count()
    }

    fn cooling_down(&self, config: &SpellConfig, now: Duration) -> bool {
        now.saturating_sub(self.last_cast) < config.min_interval
    }

    fn accept(&mut self, config: &SpellConfig, now: Duration) {
        while self
            .recent
            .front()
            .is_some_and(|&at| now.saturating_sub(at) >= config.burst_window)
        {
            let _ = self.recent.pop_front();
        }
        self.recent.push_back(now);
        self.last_cast = now;
    }
}

/// Observable phase of a throttle key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottlePhase {
    /// No accepted cast within the minimum interval.
    Idle,
    /// The minimum interval since the last accepted cast has not elapsed.
    Active,
}

/// Verdict of the tracker for a single cast attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// The cast may proceed.
    Accepted,
    /// The cast must be dropped.
    Throttled(ThrottleReason),
}

impl ThrottleDecision {
    /// Reports whether the cast may proceed.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Cooldown and burst bookkeeping keyed by `(caster, spell)`.
///
/// Bursts are counted over a sliding window: a cast is refused while
/// `max_burst` accepted casts fall within the last `burst_window`. Keys are
/// independent, so one player's spam never blocks another player's
/// cast of the same spell.
#[derive(Clone, Debug, Default)]
pub struct ThrottleTracker {
    table: SpellTable,
    states: BTreeMap<(PlayerId, SpellKind), ThrottleState>,
}

impl ThrottleTracker {
    /// Creates an empty tracker using the provided spell table.
    #[must_use]
    pub fn new(table: SpellTable) -> Self {
        Self {
            table,
            states: BTreeMap::new(),
        }
    }

    /// Evaluates a cast attempt and records it when accepted.
    pub fn check(&mut self, caster: PlayerId, spell: SpellKind, now: Duration) -> ThrottleDecision {
        let config = self.table.get(spell);
        let decision = self.evaluate(&config, caster, spell, now);
        if decision.is_accepted() && config.enabled {
            self.record(&config, caster, spell, now);
        }
        decision
    }

    /// Evaluates a cast attempt without recording it.
    #[must_use]
    pub fn peek(&self, caster: PlayerId, spell: SpellKind, now: Duration) -> ThrottleDecision {
        let config = self.table.get(spell);
        self.evaluate(&config, caster, spell, now)
    }

    /// Phase of the key at `now`.
    #[must_use]
    pub fn phase(&self, caster: PlayerId, spell: SpellKind, now: Duration) -> ThrottlePhase {
        let config = self.table.get(spell);
        match self.states.get(&(caster, spell)) {
            Some(state) if state.cooling_down(&config, now) => ThrottlePhase::Active,
            _ => ThrottlePhase::Idle,
        }
    }

    /// Stored state of the key, if it ever accepted a cast.
    #[must_use]
    pub fn state(&self, caster: PlayerId, spell: SpellKind) -> Option<&ThrottleState> {
        self.states.get(&(caster, spell))
    }

    /// Discards every key owned by `player`.
    pub fn forget_player(&mut self, player: PlayerId) {
        self.states.retain(|(caster, _), _| *caster != player);
    }

    /// Discards all keys, as on a session restart.
    pub fn clear(&mut self) {
        self.states.clear();
    }

    fn evaluate(
        &self,
        config: &SpellConfig,
        caster: PlayerId,
        spell: SpellKind,
        now: Duration,
    ) -> ThrottleDecision {
        if !config.enabled {
            return ThrottleDecision::Accepted;
        }

        let Some(state) = self.states.get(&(caster, spell)) else {
            return ThrottleDecision::Accepted;
        };

        if state.cooling_down(config, now) {
            return ThrottleDecision::Throttled(ThrottleReason::Cooldown);
        }

        let burst = usize::try_from(config.max_burst).unwrap_or(usize::MAX);
        if state.casts_within(config.burst_window, now) >= burst {
            return ThrottleDecision::Throttled(ThrottleReason::BurstExhausted);
        }

        ThrottleDecision::Accepted
    }

    fn record(&mut self, config: &SpellConfig, caster: PlayerId, spell: SpellKind, now: Duration) {
        let _ = self
            .states
            .entry((caster, spell))
            .and_modify(|state| state.accept(config, now))
            .or_insert_with(|| ThrottleState::new(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    fn tracker_with(spell: SpellKind, config: SpellConfig) -> ThrottleTracker {
        let mut table = SpellTable::default();
        table.set(spell, config);
        ThrottleTracker::new(table)
    }

    #[test]
    fn rejected_attempt_leaves_state_untouched() {
        let player = PlayerId::new(0);
        let mut tracker = ThrottleTracker::default();
        assert!(tracker.check(player, SpellKind::Inferno, millis(0)).is_accepted());
        let before = tracker.state(player, SpellKind::Inferno).cloned();

        assert_eq!(
            tracker.check(player, SpellKind::Inferno, millis(100)),
            ThrottleDecision::Throttled(ThrottleReason::Cooldown)
        );
        assert_eq!(tracker.state(player, SpellKind::Inferno), before.as_ref());
    }

    fn burst_of_two_per_second() -> ThrottleTracker {
        let mut config = SpellConfig::for_spell(SpellKind::Firebolt);
        config.min_interval = millis(10);
        config.max_burst = 2;
        config.burst_window = millis(1_000);
        tracker_with(SpellKind::Firebolt, config)
    }

    #[test]
    fn burst_allowance_frees_up_as_casts_leave_the_window() {
        let mut tracker = burst_of_two_per_second();
        let player = PlayerId::new(2);

        assert!(tracker.check(player, SpellKind::Firebolt, millis(0)).is_accepted());
        assert!(tracker.check(player, SpellKind::Firebolt, millis(20)).is_accepted());
        assert_eq!(
            tracker.check(player, SpellKind::Firebolt, millis(40)),
            ThrottleDecision::Throttled(ThrottleReason::BurstExhausted)
        );
        assert!(tracker.check(player, SpellKind::Firebolt, millis(1_000)).is_accepted());
        assert_eq!(
            tracker.check(player, SpellKind::Firebolt, millis(1_015)),
            ThrottleDecision::Throttled(ThrottleReason::BurstExhausted)
        );

        let state = tracker.state(player, SpellKind::Firebolt).cloned();
        assert_eq!(state.as_ref().map(ThrottleState::last_cast), Some(millis(1_000)));
        assert_eq!(
            state.map(|state| state.casts_within(millis(1_000), millis(1_015))),
            Some(2)
        );
    }

    #[test]
    fn window_boundary_does_not_double_the_burst() {
        let mut tracker = burst_of_two_per_second();
        let player = PlayerId::new(0);

        assert!(tracker.check(player, SpellKind::Firebolt, millis(990)).is_accepted());
        assert!(tracker.check(player, SpellKind::Firebolt, millis(1_000)).is_accepted());
        assert_eq!(
            tracker.check(player, SpellKind::Firebolt, millis(1_010)),
            ThrottleDecision::Throttled(ThrottleReason::BurstExhausted)
        );
        assert_eq!(
            tracker.check(player, SpellKind::Firebolt, millis(1_980)),
            ThrottleDecision::Throttled(ThrottleReason::BurstExhausted)
        );
        assert!(tracker.check(player, SpellKind::Firebolt, millis(1_990)).is_accepted());
    }

    #[test]
    fn phase_follows_min_interval() {
        let player = PlayerId::new(1);
        let mut tracker = ThrottleTracker::default();
        assert_eq!(
            tracker.phase(player, SpellKind::Golem, millis(0)),
            ThrottlePhase::Idle
        );
        let _ = tracker.check(player, SpellKind::Golem, millis(0));
        assert_eq!(
            tracker.phase(player, SpellKind::Golem, millis(499)),
            ThrottlePhase::Active
        );
        assert_eq!(
            tracker.phase(player, SpellKind::Golem, millis(500)),
            ThrottlePhase::Idle
        );
    }

    #[test]
    fn disabled_spell_is_never_throttled_or_recorded() {
        let mut config = SpellConfig::for_spell(SpellKind::Nova);
        config.enabled = false;
        let mut tracker = tracker_with(SpellKind::Nova, config);
        let player = PlayerId::new(0);

        for _ in 0..5 {
            assert!(tracker.check(player, SpellKind::Nova, millis(0)).is_accepted());
        }
        assert_eq!(tracker.state(player, SpellKind::Nova), None);
    }

    #[test]
    fn forgetting_a_player_keeps_other_players() {
        let mut tracker = ThrottleTracker::default();
        let leaving = PlayerId::new(0);
        let staying = PlayerId::new(1);
        let _ = tracker.check(leaving, SpellKind::Nova, millis(0));
        let _ = tracker.check(staying, SpellKind::Nova, millis(0));

        tracker.forget_player(leaving);

        assert!(tracker.peek(leaving, SpellKind::Nova, millis(1)).is_accepted());
        assert!(!tracker.peek(staying, SpellKind::Nova, millis(1)).is_accepted());
    }
}
