//! Root Status Writer
//!
//! The whole read-modify-write of one root policy's status runs inside that
//! policy's [`RootPolicyLocks`] critical section:
//!
//! 1. load the root policy (absent: nothing to do)
//! 2. list the namespace's bindings and build the decision set (fail-fast)
//! 3. aggregate per-cluster status (best-effort, errors logged)
//! 4. re-read the root policy to narrow the conflict window (falls back to
//!    the step-1 copy)
//! 5. overwrite `status.status`, `status.compliant`, `status.placement`
//! 6. persist with a status-only update

use std::sync::Arc;

use rps_schemas::{ObjectKey, Policy};
use rps_store::ObjectStore;
use tracing::{debug, error, info, trace};

use crate::binding::BindingResolver;
use crate::cluster_status::ClusterStatusAggregator;
use crate::compliance::{ComplianceAggregator, WorstStateCompliance};
use crate::decisions::DecisionSetBuilder;
use crate::error::StatusError;
use crate::locks::RootPolicyLocks;
use crate::lookup::{
    DecisionLookup, MembershipLookup, StoreDecisionLookup, StorePolicySetMembership,
};

/// The external collaborators the writer delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub decisions: Arc<dyn DecisionLookup>,
    pub membership: Arc<dyn MembershipLookup>,
    pub compliance: Arc<dyn ComplianceAggregator>,
}

impl Collaborators {
    /// Decisions and membership read from `store`; worst-state compliance.
    pub fn store_backed(store: &Arc<dyn ObjectStore>) -> Self {
        Self {
            decisions: Arc::new(StoreDecisionLookup::new(Arc::clone(store))),
            membership: Arc::new(StorePolicySetMembership::new(Arc::clone(store))),
            compliance: Arc::new(WorstStateCompliance),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    /// The stored root policy after the status write.
    Written(Policy),
    /// The root policy no longer exists.
    RootAbsent,
}

pub struct RootStatusWriter {
    store: Arc<dyn ObjectStore>,
    locks: Arc<RootPolicyLocks>,
    builder: DecisionSetBuilder,
    aggregator: ClusterStatusAggregator,
    compliance: Arc<dyn ComplianceAggregator>,
}

impl RootStatusWriter {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        locks: Arc<RootPolicyLocks>,
        collaborators: Collaborators,
    ) -> Self {
        let resolver = BindingResolver::new(
            Arc::clone(&store),
            collaborators.decisions,
            collaborators.membership,
        );
        Self {
            builder: DecisionSetBuilder::new(resolver),
            aggregator: ClusterStatusAggregator::new(Arc::clone(&store)),
            compliance: collaborators.compliance,
            store,
            locks,
        }
    }

    pub fn locks(&self) -> &Arc<RootPolicyLocks> {
        &self.locks
    }

    pub async fn update_status(&self, key: &ObjectKey) -> Result<StatusUpdate, StatusError> {
        trace!("Acquiring the lock for the root policy");
        let _guard = self.locks.acquire(key).await;

        let root = match self.store.get_policy(key).await {
            Ok(root) => root,
            Err(e) if e.is_not_found() => {
                debug!("The root policy has been deleted. Doing nothing.");
                return Ok(StatusUpdate::RootAbsent);
            }
            Err(source) => {
                error!(error = %source, "Failed to get the root policy");
                return Err(StatusError::LoadRoot {
                    key: key.clone(),
                    source,
                });
            }
        };

        info!("Updating the root policy status");
        self.write_root_status(root).await.map(StatusUpdate::Written)
    }

    async fn write_root_status(&self, root: Policy) -> Result<Policy, StatusError> {
        let key = root.key();

        let bindings = self
            .store
            .list_placement_bindings(root.namespace())
            .await
            .map_err(|source| {
                error!(error = %source, "Could not list the placement bindings");
                StatusError::ListBindings {
                    namespace: root.namespace().to_string(),
                    source,
                }
            })?;

        let resolved = self.builder.build(&root, &bindings).await.map_err(|source| {
            info!(error = %source, "Failed to get any placement decisions. Giving up on the request.");
            StatusError::Decisions {
                key: key.clone(),
                source,
            }
        })?;

        let report = self.aggregator.aggregate(&root, &resolved.decisions).await;
        if let Some(e) = &report.lookup_error {
            // A new replica is expected to be missing until it is created.
            error!(
                error = %e,
                "Failed to get at least one replicated policy, but that may be expected. Ignoring."
            );
        }

        let mut fresh = match self.store.get_policy(&key).await {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "Failed to refresh the cached policy. Will use existing policy.");
                root
            }
        };

        fresh.status.compliant = self.compliance.aggregate(&report.statuses);
        fresh.status.status = report.statuses;
        fresh.status.placement = resolved.placements;

        self.store
            .update_policy_status(&fresh)
            .await
            .map_err(|source| StatusError::Persist { key, source })
    }
}
