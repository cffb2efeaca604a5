//! Collaborators the resolver consults, with store-backed implementations.

use std::sync::Arc;

use async_trait::async_trait;
use rps_schemas::{ObjectKey, PlacementBinding, Target};
use rps_store::{ObjectStore, StoreError};

use crate::binding::{GroupingKind, GroupingRef};
use crate::error::ResolveError;

/// Maps a binding's grouping object to the concrete clusters it selects.
#[async_trait]
pub trait DecisionLookup: Send + Sync {
    async fn decisions(&self, binding: &PlacementBinding) -> Result<Vec<Target>, ResolveError>;
}

/// Declared PolicySet membership.
#[async_trait]
pub trait MembershipLookup: Send + Sync {
    async fn is_member(&self, policy_name: &str, policy_set: &ObjectKey)
        -> Result<bool, StoreError>;
}

/// Reads decisions from the grouping objects themselves:
/// - PlacementRule: its `status.decisions`
/// - Placement: every PlacementDecision labelled for it; each selected
///   cluster is delivered to the namespace named after the cluster
///
/// A grouping object that does not exist selects nothing.
pub struct StoreDecisionLookup {
    store: Arc<dyn ObjectStore>,
}

impl StoreDecisionLookup {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DecisionLookup for StoreDecisionLookup {
    async fn decisions(&self, binding: &PlacementBinding) -> Result<Vec<Target>, ResolveError> {
        let grouping = GroupingRef::from_binding(binding)?;
        let failed = |source: StoreError| ResolveError::Decisions {
            binding: binding.metadata.key(),
            source,
        };

        match grouping.kind {
            GroupingKind::PlacementRule => {
                match self
                    .store
                    .get_placement_rule(&grouping.key(binding.namespace()))
                    .await
                {
                    Ok(rule) => Ok(rule.status.decisions),
                    Err(e) if e.is_not_found() => Ok(Vec::new()),
                    Err(e) => Err(failed(e)),
                }
            }
            GroupingKind::Placement => {
                let objects = self
                    .store
                    .list_placement_decisions(binding.namespace(), &grouping.name)
                    .await
                    .map_err(failed)?;
                Ok(objects
                    .iter()
                    .flat_map(|d| d.status.decisions.iter())
                    .map(|cd| Target::cluster(cd.cluster_name.clone()))
                    .collect())
            }
        }
    }
}

/// Membership from the PolicySet object's declared member list.
pub struct StorePolicySetMembership {
    store: Arc<dyn ObjectStore>,
}

impl StorePolicySetMembership {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MembershipLookup for StorePolicySetMembership {
    async fn is_member(
        &self,
        policy_name: &str,
        policy_set: &ObjectKey,
    ) -> Result<bool, StoreError> {
        let set = self.store.get_policy_set(policy_set).await?;
        Ok(set.spec.policies.iter().any(|p| p == policy_name))
    }
}
