use std::collections::BTreeMap;

use async_trait::async_trait;
use rps_schemas::{
    ObjectKey, ObjectMeta, Placement, PlacementBinding, PlacementDecision, PlacementRule, Policy,
    PolicySet,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{ObjectKind, ObjectSet, ObjectStore, StoreError};

#[derive(Debug, Default)]
struct Objects {
    policies: BTreeMap<ObjectKey, Policy>,
    bindings: BTreeMap<ObjectKey, PlacementBinding>,
    policy_sets: BTreeMap<ObjectKey, PolicySet>,
    placement_rules: BTreeMap<ObjectKey, PlacementRule>,
    placements: BTreeMap<ObjectKey, Placement>,
    placement_decisions: BTreeMap<ObjectKey, PlacementDecision>,
    /// Status writes that changed a stored object.
    status_writes: u64,
}

/// Upsert semantics shared by every kind: the stored copy always carries the
/// next `resourceVersion` regardless of what the caller supplied.
fn upsert<T: Clone>(
    map: &mut BTreeMap<ObjectKey, T>,
    mut obj: T,
    meta: impl Fn(&mut T) -> &mut ObjectMeta,
) -> T {
    let key = meta(&mut obj).key();
    let next = map
        .get_mut(&key)
        .map(|cur| meta(cur).resource_version + 1)
        .unwrap_or(1);
    meta(&mut obj).resource_version = next;
    map.insert(key, obj.clone());
    obj
}

fn get<T: Clone>(
    map: &BTreeMap<ObjectKey, T>,
    kind: ObjectKind,
    key: &ObjectKey,
) -> Result<T, StoreError> {
    map.get(key)
        .cloned()
        .ok_or_else(|| StoreError::not_found(kind, key.clone()))
}

fn in_namespace<'a, T>(
    map: &'a BTreeMap<ObjectKey, T>,
    namespace: &'a str,
) -> impl Iterator<Item = &'a T> + 'a {
    map.iter()
        .filter(move |(k, _)| k.namespace == namespace)
        .map(|(_, v)| v)
}

/// Thread-safe in-process object store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: RwLock<Objects>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with every object of `set`.
    pub fn from_objects(set: ObjectSet) -> Self {
        let mut o = Objects::default();
        for p in set.policies {
            upsert(&mut o.policies, p, |p| &mut p.metadata);
        }
        for b in set.placement_bindings {
            upsert(&mut o.bindings, b, |b| &mut b.metadata);
        }
        for s in set.policy_sets {
            upsert(&mut o.policy_sets, s, |s| &mut s.metadata);
        }
        for r in set.placement_rules {
            upsert(&mut o.placement_rules, r, |r| &mut r.metadata);
        }
        for p in set.placements {
            upsert(&mut o.placements, p, |p| &mut p.metadata);
        }
        for d in set.placement_decisions {
            upsert(&mut o.placement_decisions, d, |d| &mut d.metadata);
        }
        Self {
            objects: RwLock::new(o),
        }
    }

    pub async fn upsert_policy(&self, policy: Policy) -> Policy {
        let mut o = self.objects.write().await;
        upsert(&mut o.policies, policy, |p| &mut p.metadata)
    }

    pub async fn upsert_binding(&self, binding: PlacementBinding) -> PlacementBinding {
        let mut o = self.objects.write().await;
        upsert(&mut o.bindings, binding, |b| &mut b.metadata)
    }

    pub async fn upsert_policy_set(&self, set: PolicySet) -> PolicySet {
        let mut o = self.objects.write().await;
        upsert(&mut o.policy_sets, set, |s| &mut s.metadata)
    }

    pub async fn upsert_placement_rule(&self, rule: PlacementRule) -> PlacementRule {
        let mut o = self.objects.write().await;
        upsert(&mut o.placement_rules, rule, |r| &mut r.metadata)
    }

    pub async fn upsert_placement(&self, placement: Placement) -> Placement {
        let mut o = self.objects.write().await;
        upsert(&mut o.placements, placement, |p| &mut p.metadata)
    }

    pub async fn upsert_placement_decision(&self, decision: PlacementDecision) -> PlacementDecision {
        let mut o = self.objects.write().await;
        upsert(&mut o.placement_decisions, decision, |d| &mut d.metadata)
    }

    pub async fn delete_policy(&self, key: &ObjectKey) -> bool {
        self.objects.write().await.policies.remove(key).is_some()
    }

    pub async fn delete_binding(&self, key: &ObjectKey) -> bool {
        self.objects.write().await.bindings.remove(key).is_some()
    }

    pub async fn delete_placement_rule(&self, key: &ObjectKey) -> bool {
        self.objects
            .write()
            .await
            .placement_rules
            .remove(key)
            .is_some()
    }

    pub async fn delete_placement_decision(&self, key: &ObjectKey) -> bool {
        self.objects
            .write()
            .await
            .placement_decisions
            .remove(key)
            .is_some()
    }

    /// Number of status writes that actually changed a stored policy.
    pub async fn status_writes(&self) -> u64 {
        self.objects.read().await.status_writes
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get_policy(&self, key: &ObjectKey) -> Result<Policy, StoreError> {
        get(&self.objects.read().await.policies, ObjectKind::Policy, key)
    }

    async fn list_policies(&self, namespace: Option<&str>) -> Result<Vec<Policy>, StoreError> {
        let o = self.objects.read().await;
        Ok(o.policies
            .iter()
            .filter(|(k, _)| namespace.map_or(true, |ns| k.namespace == ns))
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn list_placement_bindings(
        &self,
        namespace: &str,
    ) -> Result<Vec<PlacementBinding>, StoreError> {
        let o = self.objects.read().await;
        Ok(in_namespace(&o.bindings, namespace).cloned().collect())
    }

    async fn get_policy_set(&self, key: &ObjectKey) -> Result<PolicySet, StoreError> {
        get(&self.objects.read().await.policy_sets, ObjectKind::PolicySet, key)
    }

    async fn get_placement_rule(&self, key: &ObjectKey) -> Result<PlacementRule, StoreError> {
        get(
            &self.objects.read().await.placement_rules,
            ObjectKind::PlacementRule,
            key,
        )
    }

    async fn get_placement(&self, key: &ObjectKey) -> Result<Placement, StoreError> {
        get(&self.objects.read().await.placements, ObjectKind::Placement, key)
    }

    async fn list_placement_decisions(
        &self,
        namespace: &str,
        placement_name: &str,
    ) -> Result<Vec<PlacementDecision>, StoreError> {
        let o = self.objects.read().await;
        Ok(in_namespace(&o.placement_decisions, namespace)
            .filter(|d| d.placement_name() == Some(placement_name))
            .cloned()
            .collect())
    }

    async fn update_policy_status(&self, policy: &Policy) -> Result<Policy, StoreError> {
        let key = policy.key();
        let mut o = self.objects.write().await;
        let current = o
            .policies
            .get_mut(&key)
            .ok_or_else(|| StoreError::not_found(ObjectKind::Policy, key.clone()))?;

        if policy.metadata.resource_version != current.metadata.resource_version {
            return Err(StoreError::Conflict {
                kind: ObjectKind::Policy,
                key,
                got: policy.metadata.resource_version,
                current: current.metadata.resource_version,
            });
        }

        if current.status == policy.status {
            return Ok(current.clone());
        }

        current.status = policy.status.clone();
        current.metadata.resource_version += 1;
        let stored = current.clone();
        o.status_writes += 1;
        debug!(policy = %key, resource_version = stored.metadata.resource_version, "policy status written");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rps_schemas::{ComplianceState, PLACEMENT_LABEL};

    #[tokio::test]
    async fn upsert_bumps_resource_version() {
        let store = InMemoryStore::new();
        let a = store.upsert_policy(Policy::new("ns", "p")).await;
        let b = store.upsert_policy(Policy::new("ns", "p")).await;
        assert_eq!(a.metadata.resource_version, 1);
        assert_eq!(b.metadata.resource_version, 2);
    }

    #[tokio::test]
    async fn status_update_rejects_stale_version() {
        let store = InMemoryStore::new();
        let mut stale = store.upsert_policy(Policy::new("ns", "p")).await;
        store.upsert_policy(Policy::new("ns", "p")).await;

        stale.status.compliant = Some(ComplianceState::Compliant);
        let err = store.update_policy_status(&stale).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { got: 1, current: 2, .. }));
        assert_eq!(store.status_writes().await, 0);
    }

    #[tokio::test]
    async fn unchanged_status_is_not_a_write() {
        let store = InMemoryStore::new();
        let mut p = store.upsert_policy(Policy::new("ns", "p")).await;
        p.status.compliant = Some(ComplianceState::Pending);

        let written = store.update_policy_status(&p).await.unwrap();
        assert_eq!(written.metadata.resource_version, 2);

        let again = store.update_policy_status(&written).await.unwrap();
        assert_eq!(again.metadata.resource_version, 2);
        assert_eq!(store.status_writes().await, 1);
    }

    #[tokio::test]
    async fn status_update_ignores_spec_changes() {
        let store = InMemoryStore::new();
        let mut p = store.upsert_policy(Policy::new("ns", "p")).await;
        p.spec.disabled = true;
        p.status.compliant = Some(ComplianceState::NonCompliant);

        let written = store.update_policy_status(&p).await.unwrap();
        assert!(!written.spec.disabled);
        assert_eq!(written.status.compliant, Some(ComplianceState::NonCompliant));
    }

    #[tokio::test]
    async fn decisions_filtered_by_namespace_and_label() {
        let store = InMemoryStore::new();
        let mut d1 = PlacementDecision::default();
        d1.metadata = ObjectMeta::new("ns", "pl-1-decision-1");
        d1.metadata
            .labels
            .insert(PLACEMENT_LABEL.to_string(), "pl-1".to_string());
        let mut d2 = d1.clone();
        d2.metadata.name = "other".to_string();
        d2.metadata
            .labels
            .insert(PLACEMENT_LABEL.to_string(), "pl-2".to_string());
        let mut d3 = d1.clone();
        d3.metadata.namespace = "elsewhere".to_string();

        store.upsert_placement_decision(d1).await;
        store.upsert_placement_decision(d2).await;
        store.upsert_placement_decision(d3).await;

        let got = store.list_placement_decisions("ns", "pl-1").await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].metadata.name, "pl-1-decision-1");
    }
}
