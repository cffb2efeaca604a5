//! rps-store
//!
//! Object store seam for the root-policy status controller: typed
//! get/list/status-update calls against the policy API objects, with not-found
//! kept distinguishable from every other failure.
//!
//! [`InMemoryStore`] is the in-process implementation used by the daemon, the
//! CLI dry-run path and the tests. It applies the same status-update rules the
//! API server does: status-only writes, stale `resourceVersion` rejected, and
//! no version bump when nothing changed.

mod fixtures;
mod memory;

use std::fmt;

use async_trait::async_trait;
use rps_schemas::{
    ObjectKey, Placement, PlacementBinding, PlacementDecision, PlacementRule, Policy, PolicySet,
};

pub use fixtures::{load_object_set, parse_object_set, ObjectSet};
pub use memory::InMemoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Policy,
    PlacementBinding,
    PolicySet,
    PlacementRule,
    Placement,
    PlacementDecision,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Policy => "Policy",
            ObjectKind::PlacementBinding => "PlacementBinding",
            ObjectKind::PolicySet => "PolicySet",
            ObjectKind::PlacementRule => "PlacementRule",
            ObjectKind::Placement => "Placement",
            ObjectKind::PlacementDecision => "PlacementDecision",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: ObjectKind, key: ObjectKey },

    #[error("conflict updating {kind} {key}: resourceVersion {got} is stale (current {current})")]
    Conflict {
        kind: ObjectKind,
        key: ObjectKey,
        got: u64,
        current: u64,
    },

    #[error("object store unavailable: {reason}")]
    Unavailable { reason: String },
}

impl StoreError {
    pub fn not_found(kind: ObjectKind, key: ObjectKey) -> Self {
        StoreError::NotFound { kind, key }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        StoreError::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Read/list/status-update access to the policy API objects.
///
/// Request cancellation is inherited from the calling task; implementations
/// must not hold internal locks across an await that can block indefinitely.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_policy(&self, key: &ObjectKey) -> Result<Policy, StoreError>;

    /// All policies, or only those in `namespace` when given. Sorted by key.
    async fn list_policies(&self, namespace: Option<&str>) -> Result<Vec<Policy>, StoreError>;

    /// Sorted by name.
    async fn list_placement_bindings(
        &self,
        namespace: &str,
    ) -> Result<Vec<PlacementBinding>, StoreError>;

    async fn get_policy_set(&self, key: &ObjectKey) -> Result<PolicySet, StoreError>;

    async fn get_placement_rule(&self, key: &ObjectKey) -> Result<PlacementRule, StoreError>;

    async fn get_placement(&self, key: &ObjectKey) -> Result<Placement, StoreError>;

    /// PlacementDecision objects in `namespace` labelled for `placement_name`.
    async fn list_placement_decisions(
        &self,
        namespace: &str,
        placement_name: &str,
    ) -> Result<Vec<PlacementDecision>, StoreError>;

    /// Status-only update. Spec and metadata of `policy` are ignored except
    /// for the identity and `resourceVersion`. Returns the stored object.
    async fn update_policy_status(&self, policy: &Policy) -> Result<Policy, StoreError>;
}
