use proptest::prelude::*;
use spawn_guard_core::{AdmissionDecision, CapacityLedger};
use spawn_guard_system_admission::{headroom, try_admit};

/// Minimal pool that only inserts after the guard admits.
#[derive(Debug)]
struct GuardedPool {
    entities: Vec<u32>,
    capacity: usize,
}

impl GuardedPool {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            entities: Vec::new(),
            capacity,
        }
    }

    fn spawn(&mut self, value: u32) -> AdmissionDecision {
        let decision = try_admit(&*self, self.capacity);
        if decision.is_ok() {
            self.entities.push(value);
        }
        decision
    }

    fn despawn(&mut self) {
        let _ = self.entities.pop();
    }
}

impl CapacityLedger for GuardedPool {
    fn size(&self) -> usize {
        self.entities.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

#[test]
fn full_pool_admits_again_after_a_removal() {
    let mut pool = GuardedPool::with_capacity(3);
    for value in 0..3 {
        assert_eq!(pool.spawn(value), AdmissionDecision::Ok);
    }

    assert_eq!(pool.size(), 3);
    assert_eq!(try_admit(&pool, 3), AdmissionDecision::LimitReached);

    pool.despawn();
    assert_eq!(pool.size(), 2);
    assert_eq!(try_admit(&pool, 3), AdmissionDecision::Ok);
}

#[test]
fn checking_without_inserting_leaves_size_untouched() {
    let mut pool = GuardedPool::with_capacity(5);
    let _ = pool.spawn(7);

    for _ in 0..10 {
        let _ = try_admit(&pool, pool.capacity());
        let _ = headroom(&pool, pool.capacity());
    }

    assert_eq!(pool.size(), 1);
}

#[derive(Clone, Debug)]
enum Step {
    Spawn,
    Despawn,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![3 => Just(Step::Spawn), 1 => Just(Step::Despawn)]
}

proptest! {
    #[test]
    fn size_never_exceeds_capacity(capacity in 0usize..16, steps in prop::collection::vec(step(), 0..200)) {
        let mut pool = GuardedPool::with_capacity(capacity);
        for (index, step) in steps.into_iter().enumerate() {
            match step {
                Step::Spawn => {
                    let full_before = pool.size() >= capacity;
                    let decision = pool.spawn(index as u32);
                    prop_assert_eq!(decision == AdmissionDecision::LimitReached, full_before);
                }
                Step::Despawn => pool.despawn(),
            }
            prop_assert!(pool.size() <= pool.capacity());
        }
    }
}
