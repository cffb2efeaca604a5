//! rps-testkit
//!
//! Shared helpers for scenario tests across the workspace. Test-only: no
//! production crate may list this in `[dependencies]`.

mod collaborators;
mod faulty_store;
pub mod fixtures;

use std::sync::Arc;

use rps_reconcile::{
    Collaborators, RootPolicyLocks, RootPolicyStatusReconciler, RootStatusWriter,
    WorstStateCompliance,
};
use rps_store::{InMemoryStore, ObjectStore};

pub use collaborators::{StaticDecisions, StaticMembership};
pub use faulty_store::{FaultyStore, StoreOp};

/// A reconciler wired to a [`FaultyStore`] over a fresh in-memory store,
/// with the store-backed collaborators.
pub struct Harness {
    pub memory: Arc<InMemoryStore>,
    pub store: Arc<FaultyStore>,
    pub locks: Arc<RootPolicyLocks>,
    pub reconciler: Arc<RootPolicyStatusReconciler>,
}

impl Harness {
    pub fn new() -> Self {
        let memory = Arc::new(InMemoryStore::new());
        let store = Arc::new(FaultyStore::new(Arc::clone(&memory)));
        let locks = Arc::new(RootPolicyLocks::new());
        let dyn_store: Arc<dyn ObjectStore> = store.clone();
        let reconciler = Arc::new(RootPolicyStatusReconciler::with_store(
            dyn_store,
            Arc::clone(&locks),
        ));
        Self {
            memory,
            store,
            locks,
            reconciler,
        }
    }

    /// Same wiring but with fixed-answer decision and membership lookups.
    pub fn with_static(decisions: Arc<StaticDecisions>, membership: StaticMembership) -> Self {
        let memory = Arc::new(InMemoryStore::new());
        let store = Arc::new(FaultyStore::new(Arc::clone(&memory)));
        let locks = Arc::new(RootPolicyLocks::new());
        let dyn_store: Arc<dyn ObjectStore> = store.clone();
        let collaborators = Collaborators {
            decisions,
            membership: Arc::new(membership),
            compliance: Arc::new(WorstStateCompliance),
        };
        let writer = RootStatusWriter::new(dyn_store, Arc::clone(&locks), collaborators);
        Self {
            memory,
            store,
            locks,
            reconciler: Arc::new(RootPolicyStatusReconciler::new(writer)),
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
