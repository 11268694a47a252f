#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Admission guard consulted before any entity is inserted into a pool.
//!
//! Every check here is a pure read of a [`CapacityLedger`]. Nothing reserves a
//! slot, so the caller must insert immediately after an `Ok` answer and before
//! asking again. The simulation runs on a single thread, which makes that
//! sequencing sufficient.

use spawn_guard_core::{
    AdmissionConfig, AdmissionDecision, BatchMode, CapacityLedger, PoolKind, SpawnPriority,
    SpawnRefusal,
};

/// Decides whether one more entity fits into `pool` when at most `max` are allowed.
#[must_use]
pub fn try_admit<L>(pool: &L, max: usize) -> AdmissionDecision
where
    L: CapacityLedger + ?Sized,
{
    if pool.size() >= max {
        AdmissionDecision::LimitReached
    } else {
        AdmissionDecision::Ok
    }
}

/// Decides whether `count` more entities fit into `pool` as a whole.
#[must_use]
pub fn try_admit_many<L>(pool: &L, max: usize, count: usize) -> AdmissionDecision
where
    L: CapacityLedger + ?Sized,
{
    if pool.size().saturating_add(count) > max {
        AdmissionDecision::LimitReached
    } else {
        AdmissionDecision::Ok
    }
}

/// Number of entities that still fit into `pool`.
#[must_use]
pub fn headroom<L>(pool: &L, max: usize) -> usize
where
    L: CapacityLedger + ?Sized,
{
    max.saturating_sub(pool.size())
}

/// Outcome of evaluating a multi-entity spawn request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchPlan {
    /// Entities the caller may construct.
    pub admitted: u32,
    /// Entities the caller must drop.
    pub dropped: u32,
    /// Reason for the dropped part, present whenever `dropped > 0`.
    pub refusal: Option<SpawnRefusal>,
}

impl BatchPlan {
    const fn all(count: u32) -> Self {
        Self {
            admitted: count,
            dropped: 0,
            refusal: None,
        }
    }

    const fn none(count: u32, refusal: SpawnRefusal) -> Self {
        Self {
            admitted: 0,
            dropped: count,
            refusal: Some(refusal),
        }
    }
}

/// Priority-aware admission guard.
///
/// `Critical` spawns may fill a pool to capacity. `Normal` and `Optional`
/// spawns stop short of the configured critical reserve, and `Optional` spawns
/// are additionally shed once the pool's usage exceeds the configured
/// percentage.
#[derive(Clone, Copy, Debug)]
pub struct AdmissionGuard {
    shed_above_percent: u8,
    critical_reserve: usize,
}

impl AdmissionGuard {
    /// Creates a guard from the admission configuration.
    #[must_use]
    pub const fn new(config: AdmissionConfig) -> Self {
        Self {
            shed_above_percent: config.shed_above_percent,
            critical_reserve: config.critical_reserve,
        }
    }

    /// Occupancy a spawn of `priority` may fill `pool` up to.
    #[must_use]
    pub fn limit<L>(&self, pool: &L, priority: SpawnPriority) -> usize
    where
        L: CapacityLedger + ?Sized,
    {
        match priority {
            SpawnPriority::Critical => pool.capacity(),
            SpawnPriority::Normal | SpawnPriority::Optional => {
                pool.capacity().saturating_sub(self.critical_reserve)
            }
        }
    }

    /// Decides whether a single spawn of `priority` may enter the pool `kind`.
    pub fn admit<L>(
        &self,
        kind: PoolKind,
        pool: &L,
        priority: SpawnPriority,
    ) -> Result<(), SpawnRefusal>
    where
        L: CapacityLedger + ?Sized,
    {
        if !try_admit(pool, self.limit(pool, priority)).is_ok() {
            return Err(SpawnRefusal::CapacityExceeded { pool: kind });
        }

        if self.sheds(pool, priority) {
            return Err(SpawnRefusal::Shed { pool: kind });
        }

        Ok(())
    }

    /// Plans how much of a `count`-entity request may enter the pool `kind`.
    #[must_use]
    pub fn admit_batch<L>(
        &self,
        kind: PoolKind,
        pool: &L,
        count: u32,
        priority: SpawnPriority,
        mode: BatchMode,
    ) -> BatchPlan
    where
        L: CapacityLedger + ?Sized,
    {
        if count == 0 {
            return BatchPlan::all(0);
        }

        if self.sheds(pool, priority) {
            return BatchPlan::none(count, SpawnRefusal::Shed { pool: kind });
        }

        let limit = self.limit(pool, priority);
        let requested = usize::try_from(count).unwrap_or(usize::MAX);
        match mode {
            BatchMode::AllOrNothing => {
                if try_admit_many(pool, limit, requested).is_ok() {
                    BatchPlan::all(count)
                } else {
                    BatchPlan::none(count, SpawnRefusal::CapacityExceeded { pool: kind })
                }
            }
            BatchMode::BestEffort => {
                let room = headroom(pool, limit).min(requested);
                let admitted = u32::try_from(room).unwrap_or(count);
                let dropped = count - admitted;
                BatchPlan {
                    admitted,
                    dropped,
                    refusal: (dropped > 0)
                        .then_some(SpawnRefusal::CapacityExceeded { pool: kind }),
                }
            }
        }
    }

    fn sheds<L>(&self, pool: &L, priority: SpawnPriority) -> bool
    where
        L: CapacityLedger + ?Sized,
    {
        priority == SpawnPriority::Optional && pool.usage_percent() > self.shed_above_percent
    }
}

impl Default for AdmissionGuard {
    fn default() -> Self {
        Self::new(AdmissionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spawn_guard_core::LedgerSnapshot;

    fn ledger(size: usize, capacity: usize) -> LedgerSnapshot {
        LedgerSnapshot {
            kind: PoolKind::Missiles,
            size,
            capacity,
        }
    }

    #[test]
    fn boundary_between_last_free_slot_and_full_pool() {
        assert_eq!(try_admit(&ledger(499, 500), 500), AdmissionDecision::Ok);
        assert_eq!(
            try_admit(&ledger(500, 500), 500),
            AdmissionDecision::LimitReached
        );
    }

    #[test]
    fn admit_many_requires_room_for_every_entity() {
        assert_eq!(try_admit_many(&ledger(8, 10), 10, 2), AdmissionDecision::Ok);
        assert_eq!(
            try_admit_many(&ledger(8, 10), 10, 3),
            AdmissionDecision::LimitReached
        );
        assert_eq!(headroom(&ledger(12, 10), 10), 0);
    }

    #[test]
    fn optional_spawns_are_shed_above_threshold() {
        let guard = AdmissionGuard::default();
        let busy = ledger(81, 100);

        assert_eq!(
            guard.admit(PoolKind::Lights, &busy, SpawnPriority::Optional),
            Err(SpawnRefusal::Shed {
                pool: PoolKind::Lights
            })
        );
        assert_eq!(
            guard.admit(PoolKind::Lights, &busy, SpawnPriority::Normal),
            Ok(())
        );
        assert_eq!(
            guard.admit(PoolKind::Lights, &ledger(80, 100), SpawnPriority::Optional),
            Ok(())
        );
    }

    fn reserving(critical_reserve: usize) -> AdmissionGuard {
        AdmissionGuard::new(AdmissionConfig {
            critical_reserve,
            ..AdmissionConfig::default()
        })
    }

    #[test]
    fn critical_spawns_may_use_the_reserve() {
        let guard = reserving(5);
        let nearly_full = ledger(95, 100);

        assert_eq!(guard.limit(&nearly_full, SpawnPriority::Normal), 95);
        assert_eq!(guard.limit(&nearly_full, SpawnPriority::Critical), 100);
        assert_eq!(
            guard.admit(PoolKind::Monsters, &nearly_full, SpawnPriority::Normal),
            Err(SpawnRefusal::CapacityExceeded {
                pool: PoolKind::Monsters
            })
        );
        assert_eq!(
            guard.admit(PoolKind::Monsters, &nearly_full, SpawnPriority::Critical),
            Ok(())
        );
        assert_eq!(
            guard.admit(PoolKind::Monsters, &ledger(100, 100), SpawnPriority::Critical),
            Err(SpawnRefusal::CapacityExceeded {
                pool: PoolKind::Monsters
            })
        );
    }

    #[test]
    fn batches_respect_the_reserve_by_priority() {
        let guard = reserving(4);
        let pool = ledger(2, 10);

        let normal = guard.admit_batch(
            PoolKind::Monsters,
            &pool,
            8,
            SpawnPriority::Normal,
            BatchMode::BestEffort,
        );
        assert_eq!((normal.admitted, normal.dropped), (4, 4));

        let critical = guard.admit_batch(
            PoolKind::Monsters,
            &pool,
            8,
            SpawnPriority::Critical,
            BatchMode::AllOrNothing,
        );
        assert_eq!(critical, BatchPlan::all(8));

        let atomic_normal = guard.admit_batch(
            PoolKind::Monsters,
            &pool,
            5,
            SpawnPriority::Normal,
            BatchMode::AllOrNothing,
        );
        assert_eq!(atomic_normal.admitted, 0);
    }

    #[test]
    fn best_effort_batch_fills_remaining_slots() {
        let guard = AdmissionGuard::default();
        let plan = guard.admit_batch(
            PoolKind::Missiles,
            &ledger(6, 10),
            16,
            SpawnPriority::Normal,
            BatchMode::BestEffort,
        );
        assert_eq!(plan.admitted, 4);
        assert_eq!(plan.dropped, 12);
        assert_eq!(
            plan.refusal,
            Some(SpawnRefusal::CapacityExceeded {
                pool: PoolKind::Missiles
            })
        );
    }

    #[test]
    fn all_or_nothing_batch_refuses_partial_fit() {
        let guard = AdmissionGuard::default();
        let plan = guard.admit_batch(
            PoolKind::Missiles,
            &ledger(6, 10),
            5,
            SpawnPriority::Critical,
            BatchMode::AllOrNothing,
        );
        assert_eq!(plan.admitted, 0);
        assert_eq!(plan.dropped, 5);

        let plan = guard.admit_batch(
            PoolKind::Missiles,
            &ledger(6, 10),
            4,
            SpawnPriority::Critical,
            BatchMode::AllOrNothing,
        );
        assert_eq!(plan, BatchPlan::all(4));
    }
}
