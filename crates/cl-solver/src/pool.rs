//! Algorithm registry and availability tracking.
//!
//! The pool is a cheap-clone handle; clones share membership. Algorithms are
//! locked one at a time and never while the membership lock is held, so an
//! algorithm may report availability from inside any callback.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tracing::{debug, info};
use uuid::Uuid;

use cl_types::{AlgorithmId, AlgorithmTag, Problem};

use crate::algorithm::{AlgorithmEvent, SearchAlgorithm};

pub(crate) type SharedAlgorithm = Arc<Mutex<Box<dyn SearchAlgorithm>>>;

/// Registration-time description of a pooled algorithm.
///
/// Label, ratings and evaluation limits are sampled when the algorithm is
/// added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmProfile {
    pub id: AlgorithmId,
    pub label: String,
    pub global_rating: u8,
    pub local_rating: u8,
    pub min_evaluations_per_run: usize,
    pub max_evaluations_per_run: usize,
}

impl AlgorithmProfile {
    pub fn tag(&self) -> AlgorithmTag {
        AlgorithmTag::new(self.id, self.label.clone())
    }
}

struct Member {
    profile: AlgorithmProfile,
    algorithm: SharedAlgorithm,
}

#[derive(Default)]
struct Membership {
    registered: Vec<Member>,
    available: HashSet<AlgorithmId>,
    problem: Option<Arc<Problem>>,
}

impl Membership {
    fn is_registered(&self, id: AlgorithmId) -> bool {
        self.registered.iter().any(|m| m.profile.id == id)
    }
}

/// Capability handed to each algorithm for reporting its own availability.
///
/// Becomes inert once the algorithm is removed from the pool.
#[derive(Debug, Clone)]
pub struct AvailabilityHandle {
    id: AlgorithmId,
    membership: Weak<Mutex<Membership>>,
}

impl AvailabilityHandle {
    pub fn id(&self) -> AlgorithmId {
        self.id
    }

    pub fn set_available(&self, available: bool) {
        let Some(membership) = self.membership.upgrade() else {
            return;
        };
        let mut membership = membership.lock();
        if !membership.is_registered(self.id) {
            return;
        }
        let changed = if available {
            membership.available.insert(self.id)
        } else {
            membership.available.remove(&self.id)
        };
        if changed {
            debug!(algorithm = %self.id, available, "algorithm availability changed");
        }
    }

    pub fn is_available(&self) -> bool {
        self.membership
            .upgrade()
            .is_some_and(|m| m.lock().available.contains(&self.id))
    }
}

impl std::fmt::Debug for Membership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Membership")
            .field("registered", &self.registered.len())
            .field("available", &self.available.len())
            .finish()
    }
}

/// Registry of search algorithms and the subset currently available to run.
#[derive(Clone, Default)]
pub struct AlgorithmPool {
    inner: Arc<Mutex<Membership>>,
}

impl AlgorithmPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an algorithm and mark it available. It receives its
    /// availability handle first, then the current problem if one is set.
    pub fn add(&self, algorithm: Box<dyn SearchAlgorithm>) -> AlgorithmId {
        let id = Uuid::new_v4();
        let profile = AlgorithmProfile {
            id,
            label: algorithm.label().to_string(),
            global_rating: algorithm.global_rating().min(10),
            local_rating: algorithm.local_rating().min(10),
            min_evaluations_per_run: algorithm.min_evaluations_per_run().max(1),
            max_evaluations_per_run: algorithm.max_evaluations_per_run().max(1),
        };
        let handle = AvailabilityHandle {
            id,
            membership: Arc::downgrade(&self.inner),
        };

        let shared: SharedAlgorithm = Arc::new(Mutex::new(algorithm));
        let problem = {
            let mut membership = self.inner.lock();
            membership.registered.push(Member {
                profile: profile.clone(),
                algorithm: Arc::clone(&shared),
            });
            membership.available.insert(id);
            membership.problem.clone()
        };

        {
            let mut algorithm = shared.lock();
            algorithm.attach(handle);
            if let Some(problem) = problem {
                algorithm.set_problem(problem);
                algorithm.reset();
            }
        }

        info!(algorithm = %profile.label, id = %id, "algorithm added to pool");
        id
    }

    /// Remove an algorithm from both the registered and available sets.
    pub fn remove(&self, id: AlgorithmId) -> bool {
        let mut membership = self.inner.lock();
        let Some(index) = membership.registered.iter().position(|m| m.profile.id == id) else {
            return false;
        };
        let member = membership.registered.remove(index);
        membership.available.remove(&id);
        info!(algorithm = %member.profile.label, id = %id, "algorithm removed from pool");
        true
    }

    pub fn contains(&self, id: AlgorithmId) -> bool {
        self.inner.lock().is_registered(id)
    }

    pub fn is_available(&self, id: AlgorithmId) -> bool {
        self.inner.lock().available.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().registered.is_empty()
    }

    /// All registered algorithms, in registration order.
    pub fn algorithms(&self) -> Vec<AlgorithmProfile> {
        self.inner
            .lock()
            .registered
            .iter()
            .map(|m| m.profile.clone())
            .collect()
    }

    /// Available algorithms, in registration order.
    pub fn available_algorithms(&self) -> Vec<AlgorithmProfile> {
        let membership = self.inner.lock();
        membership
            .registered
            .iter()
            .filter(|m| membership.available.contains(&m.profile.id))
            .map(|m| m.profile.clone())
            .collect()
    }

    pub fn problem(&self) -> Option<Arc<Problem>> {
        self.inner.lock().problem.clone()
    }

    /// Hand `problem` to every algorithm, each followed by a reset.
    pub fn set_problem(&self, problem: Arc<Problem>) {
        self.inner.lock().problem = Some(Arc::clone(&problem));
        for algorithm in self.snapshot() {
            let mut algorithm = algorithm.lock();
            algorithm.set_problem(Arc::clone(&problem));
            algorithm.reset();
        }
    }

    pub fn reset(&self) {
        for algorithm in self.snapshot() {
            algorithm.lock().reset();
        }
    }

    /// Largest per-run minimum among the registered algorithms.
    pub fn max_min_evaluations_per_run(&self) -> usize {
        self.inner
            .lock()
            .registered
            .iter()
            .map(|m| m.profile.min_evaluations_per_run)
            .max()
            .unwrap_or(1)
    }

    pub(crate) fn algorithm(&self, id: AlgorithmId) -> Option<(AlgorithmProfile, SharedAlgorithm)> {
        self.inner
            .lock()
            .registered
            .iter()
            .find(|m| m.profile.id == id)
            .map(|m| (m.profile.clone(), Arc::clone(&m.algorithm)))
    }

    /// Relay `event` to every registered algorithm except `active`, whose
    /// turn is in progress. Returns whether `active` is registered and so
    /// still owes the event.
    pub(crate) fn broadcast(&self, event: &AlgorithmEvent, active: Option<AlgorithmId>) -> bool {
        let members: Vec<(AlgorithmId, SharedAlgorithm)> = {
            let membership = self.inner.lock();
            membership
                .registered
                .iter()
                .map(|m| (m.profile.id, Arc::clone(&m.algorithm)))
                .collect()
        };

        let mut owes_active = false;
        for (id, algorithm) in members {
            if Some(id) == active {
                owes_active = true;
                continue;
            }
            // Membership may change while earlier algorithms handle the event.
            if !self.contains(id) {
                continue;
            }
            let mut algorithm = algorithm.lock();
            event.deliver(&mut **algorithm);
        }
        owes_active
    }

    fn snapshot(&self) -> Vec<SharedAlgorithm> {
        self.inner
            .lock()
            .registered
            .iter()
            .map(|m| Arc::clone(&m.algorithm))
            .collect()
    }
}

impl std::fmt::Debug for AlgorithmPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgorithmPool")
            .field("membership", &*self.inner.lock())
            .finish()
    }
}
