//! rps-reconcile
//!
//! Root policy status reconciliation: decides which managed clusters a root
//! policy is placed on and folds each replica's compliance back into the root
//! policy's status.
//!
//! Layers, leaves first:
//! - [`RootPolicyLocks`]: per-root-policy mutual exclusion, shared by every
//!   writer of a root status
//! - [`BindingResolver`]: one binding's relevance, provenance and targets
//! - [`DecisionSetBuilder`]: all bindings merged, restricted bindings
//!   applied as filters
//! - [`ClusterStatusAggregator`]: per-cluster replica compliance
//! - [`RootStatusWriter`]: the locked read-modify-write of the root status
//! - [`RootPolicyStatusReconciler`]: request entrypoint
//!
//! Output ordering is deterministic (placements by binding name, cluster
//! statuses by cluster name) so identical inputs never produce a status diff.

mod binding;
mod cluster_status;
mod compliance;
mod decisions;
mod error;
mod locks;
mod lookup;
mod reconciler;
pub mod triggers;
mod writer;

pub use binding::{BindingResolution, BindingResolver, GroupingKind, GroupingRef, SubjectKind};
pub use cluster_status::{ClusterStatusAggregator, ClusterStatusReport};
pub use compliance::{ComplianceAggregator, WorstStateCompliance};
pub use decisions::{ClusterDecisions, DecisionSet, DecisionSetBuilder, ResolvedDecisions};
pub use error::{ResolveError, StatusError};
pub use locks::{RootPolicyGuard, RootPolicyLocks};
pub use lookup::{DecisionLookup, MembershipLookup, StoreDecisionLookup, StorePolicySetMembership};
pub use reconciler::{ReconcileOutcome, RootPolicyStatusReconciler};
pub use writer::{Collaborators, RootStatusWriter, StatusUpdate};
