//! Bounded ring of visual-only stand-ins for refused spawns.

use std::{collections::VecDeque, time::Duration};

use spawn_guard_core::{SpellKind, Tile};

#[derive(Clone, Copy, Debug)]
struct VisualEffect {
    spell: Option<SpellKind>,
    tile: Tile,
    expires_at: Duration,
}

/// Visual effects never refuse: once full, the oldest effect is evicted.
#[derive(Debug)]
pub(crate) struct EffectRing {
    effects: VecDeque<VisualEffect>,
    capacity: usize,
}

impl EffectRing {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            effects: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Starts an effect and reports whether an older one was evicted.
    pub(crate) fn push(&mut self, spell: Option<SpellKind>, tile: Tile, expires_at: Duration) -> bool {
        let evicted = self.effects.len() >= self.capacity;
        if evicted {
            let _ = self.effects.pop_front();
        }
        self.effects.push_back(VisualEffect {
            spell,
            tile,
            expires_at,
        });
        evicted
    }

    pub(crate) fn expire(&mut self, now: Duration) {
        self.effects.retain(|effect| effect.expires_at > now);
    }

    pub(crate) fn len(&self) -> usize {
        self.effects.len()
    }

    pub(crate) fn clear(&mut self) {
        self.effects.clear();
    }

    /// Spell and tile of each live effect, oldest first.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (Option<SpellKind>, Tile)> + '_ {
        self.effects.iter().map(|effect| (effect.spell, effect.tile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_ring_evicts_oldest() {
        let mut ring = EffectRing::new(2);
        let later = Duration::from_secs(1);
        assert!(!ring.push(Some(SpellKind::Nova), Tile::new(0, 0), later));
        assert!(!ring.push(Some(SpellKind::Inferno), Tile::new(1, 0), later));
        assert!(ring.push(None, Tile::new(2, 0), later));

        let spells: Vec<_> = ring.iter().map(|(spell, _)| spell).collect();
        assert_eq!(spells, vec![Some(SpellKind::Inferno), None]);
    }

    #[test]
    fn expire_drops_elapsed_effects() {
        let mut ring = EffectRing::new(4);
        let _ = ring.push(None, Tile::new(0, 0), Duration::from_millis(100));
        let _ = ring.push(None, Tile::new(0, 0), Duration::from_millis(300));
        ring.expire(Duration::from_millis(100));
        assert_eq!(ring.len(), 1);
    }
}
