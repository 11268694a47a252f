//! Capacity-bounded entity arena with generational handles.

use std::time::Duration;

use slab::Slab;
use spawn_guard_core::{CapacityLedger, EntityId, PoolKind, SpawnOrigin, Tile};

/// Entity stored inside a pool.
#[derive(Clone, Debug)]
pub(crate) struct Entity {
    /// Cause of the spawn.
    pub(crate) origin: SpawnOrigin,
    /// Tile the entity occupies.
    pub(crate) tile: Tile,
    /// Simulation time after which the entity expires.
    pub(crate) expires_at: Option<Duration>,
}

/// Fixed-capacity pool of one entity kind.
///
/// Slots are recycled by the slab; each insertion stamps a fresh generation so
/// stale handles are rejected instead of touching the slot's new occupant.
/// Generation zero is never issued.
#[derive(Debug)]
pub(crate) struct Pool {
    kind: PoolKind,
    capacity: usize,
    slots: Slab<(u32, Entity)>,
    generation: u32,
}

impl Pool {
    pub(crate) fn new(kind: PoolKind, capacity: usize) -> Self {
        Self {
            kind,
            capacity,
            slots: Slab::with_capacity(capacity),
            generation: 0,
        }
    }

    /// Stores an entity. The caller must have been admitted by the guard.
    pub(crate) fn insert(&mut self, entity: Entity) -> EntityId {
        debug_assert!(
            self.slots.len() < self.capacity,
            "insert called on a full {} pool",
            self.kind
        );
        self.generation = self.generation.wrapping_add(1).max(1);
        let index = self.slots.insert((self.generation, entity));
        EntityId::new(
            self.kind,
            u32::try_from(index).unwrap_or(u32::MAX),
            self.generation,
        )
    }

    /// Removes the entity addressed by `id` if the handle is still live.
    pub(crate) fn remove(&mut self, id: EntityId) -> Option<Entity> {
        if !self.contains(id) {
            return None;
        }
        let (_, entity) = self.slots.remove(id.index() as usize);
        Some(entity)
    }

    pub(crate) fn contains(&self, id: EntityId) -> bool {
        if id.pool() != self.kind {
            return false;
        }
        matches!(
            self.slots.get(id.index() as usize),
            Some((generation, _)) if *generation == id.generation()
        )
    }

    /// Removes every entity whose lifetime elapsed at `now`, in slot order.
    pub(crate) fn expire(&mut self, now: Duration, out: &mut Vec<EntityId>) {
        let expired: Vec<usize> = self
            .slots
            .iter()
            .filter(|(_, (_, entity))| entity.expires_at.is_some_and(|at| at <= now))
            .map(|(index, _)| index)
            .collect();

        for index in expired {
            let (generation, _) = self.slots.remove(index);
            out.push(EntityId::new(
                self.kind,
                u32::try_from(index).unwrap_or(u32::MAX),
                generation,
            ));
        }
    }

    /// Live entities with their handles, in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        self.slots.iter().map(move |(index, (generation, entity))| {
            let id = EntityId::new(
                self.kind,
                u32::try_from(index).unwrap_or(u32::MAX),
                *generation,
            );
            (id, entity)
        })
    }
}

impl CapacityLedger for Pool {
    fn size(&self) -> usize {
        self.slots.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
