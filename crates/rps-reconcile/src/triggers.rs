//! Watch-event → root-policy mapping.
//!
//! Whatever changed, the reconcile request is keyed by the owning root
//! policy. Every function here returns a sorted, de-duplicated key list.

use std::collections::BTreeSet;

use rps_schemas::{ObjectKey, PlacementBinding, PlacementDecision, PlacementRule, Policy};
use rps_store::{ObjectStore, StoreError};
use tracing::warn;

use crate::binding::{GroupingKind, GroupingRef, SubjectKind};

/// Root policies named by `binding`, directly or through a PolicySet.
/// PolicySet lookup failures are logged and skipped.
pub async fn roots_for_binding(store: &dyn ObjectStore, binding: &PlacementBinding) -> Vec<ObjectKey> {
    let mut roots = BTreeSet::new();
    collect_binding_roots(store, binding, &mut roots).await;
    roots.into_iter().collect()
}

async fn collect_binding_roots(
    store: &dyn ObjectStore,
    binding: &PlacementBinding,
    roots: &mut BTreeSet<ObjectKey>,
) {
    let ns = binding.namespace();
    for subject in &binding.subjects {
        match SubjectKind::of(subject) {
            Some(SubjectKind::Policy) => {
                roots.insert(ObjectKey::new(ns, subject.name.clone()));
            }
            Some(SubjectKind::PolicySet) => {
                let set_key = ObjectKey::new(ns, subject.name.clone());
                match store.get_policy_set(&set_key).await {
                    Ok(set) => {
                        roots.extend(set.spec.policies.into_iter().map(|p| ObjectKey::new(ns, p)));
                    }
                    Err(e) => {
                        warn!(policy_set = %set_key, error = %e, "Failed to get the policyset");
                    }
                }
            }
            None => {}
        }
    }
}

/// Root policies placed by any binding whose placementRef is `kind`/`name`
/// in `namespace`.
pub async fn roots_for_grouping(
    store: &dyn ObjectStore,
    namespace: &str,
    kind: GroupingKind,
    name: &str,
) -> Result<Vec<ObjectKey>, StoreError> {
    let mut roots = BTreeSet::new();
    for pb in store.list_placement_bindings(namespace).await? {
        let refers = GroupingRef::from_binding(&pb)
            .map(|g| g.kind == kind && g.name == name)
            .unwrap_or(false);
        if refers {
            collect_binding_roots(store, &pb, &mut roots).await;
        }
    }
    Ok(roots.into_iter().collect())
}

pub async fn roots_for_placement_rule(
    store: &dyn ObjectStore,
    rule: &PlacementRule,
) -> Result<Vec<ObjectKey>, StoreError> {
    roots_for_grouping(
        store,
        &rule.metadata.namespace,
        GroupingKind::PlacementRule,
        &rule.metadata.name,
    )
    .await
}

/// Unlabelled decision objects belong to no Placement and map to nothing.
pub async fn roots_for_placement_decision(
    store: &dyn ObjectStore,
    decision: &PlacementDecision,
) -> Result<Vec<ObjectKey>, StoreError> {
    match decision.placement_name() {
        Some(placement) => {
            roots_for_grouping(
                store,
                &decision.metadata.namespace,
                GroupingKind::Placement,
                placement,
            )
            .await
        }
        None => Ok(Vec::new()),
    }
}

/// A replica maps to its root; any other policy is a root itself.
pub fn root_for_policy(policy: &Policy) -> ObjectKey {
    policy.replica_of().unwrap_or_else(|| policy.key())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rps_schemas::{
        ObjectMeta, PlacementRef, PolicySet, PolicySetSpec, Subject, PLACEMENT_API_GROUP,
        PLACEMENT_KIND, PLACEMENT_LABEL, PLACEMENT_RULE_API_GROUP, PLACEMENT_RULE_KIND,
        POLICY_API_GROUP, POLICY_KIND, POLICY_SET_KIND, ROOT_POLICY_LABEL,
    };
    use rps_store::InMemoryStore;

    fn subject(kind: &str, name: &str) -> Subject {
        Subject {
            api_group: POLICY_API_GROUP.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    fn binding(name: &str, kind: &str, api_group: &str, target: &str, subjects: Vec<Subject>) -> PlacementBinding {
        PlacementBinding {
            metadata: ObjectMeta::new("policies", name),
            placement_ref: PlacementRef {
                api_group: api_group.to_string(),
                kind: kind.to_string(),
                name: target.to_string(),
            },
            subjects,
            ..PlacementBinding::default()
        }
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .upsert_policy_set(PolicySet {
                metadata: ObjectMeta::new("policies", "baseline"),
                spec: PolicySetSpec {
                    policies: vec!["p2".to_string(), "p3".to_string()],
                },
            })
            .await;
        store
            .upsert_binding(binding(
                "b-rule",
                PLACEMENT_RULE_KIND,
                PLACEMENT_RULE_API_GROUP,
                "g1",
                vec![subject(POLICY_KIND, "p1"), subject(POLICY_SET_KIND, "baseline")],
            ))
            .await;
        store
            .upsert_binding(binding(
                "b-placement",
                PLACEMENT_KIND,
                PLACEMENT_API_GROUP,
                "pl",
                vec![subject(POLICY_KIND, "p4")],
            ))
            .await;
        store
    }

    #[tokio::test]
    async fn binding_maps_to_direct_and_set_members() {
        let store = seeded().await;
        let pb = binding(
            "b",
            PLACEMENT_RULE_KIND,
            PLACEMENT_RULE_API_GROUP,
            "g1",
            vec![
                subject(POLICY_SET_KIND, "baseline"),
                subject(POLICY_KIND, "p2"),
                subject(POLICY_SET_KIND, "missing"),
            ],
        );
        let roots = roots_for_binding(&store, &pb).await;
        assert_eq!(
            roots,
            vec![ObjectKey::new("policies", "p2"), ObjectKey::new("policies", "p3")]
        );
    }

    #[tokio::test]
    async fn placement_rule_maps_through_referencing_bindings() {
        let store = seeded().await;
        let rule = PlacementRule {
            metadata: ObjectMeta::new("policies", "g1"),
            ..PlacementRule::default()
        };
        let roots = roots_for_placement_rule(&store, &rule).await.unwrap();
        assert_eq!(
            roots,
            vec![
                ObjectKey::new("policies", "p1"),
                ObjectKey::new("policies", "p2"),
                ObjectKey::new("policies", "p3"),
            ]
        );
    }

    #[tokio::test]
    async fn placement_decision_maps_via_placement_label() {
        let store = seeded().await;
        let mut d = PlacementDecision {
            metadata: ObjectMeta::new("policies", "pl-decision-1"),
            ..PlacementDecision::default()
        };
        assert!(roots_for_placement_decision(&store, &d).await.unwrap().is_empty());

        d.metadata
            .labels
            .insert(PLACEMENT_LABEL.to_string(), "pl".to_string());
        let roots = roots_for_placement_decision(&store, &d).await.unwrap();
        assert_eq!(roots, vec![ObjectKey::new("policies", "p4")]);
    }

    #[test]
    fn replica_maps_to_root() {
        let mut replica = Policy::new("cluster1", "policies.p1");
        replica
            .metadata
            .labels
            .insert(ROOT_POLICY_LABEL.to_string(), "policies.p1".to_string());
        assert_eq!(root_for_policy(&replica), ObjectKey::new("policies", "p1"));

        let root = Policy::new("policies", "p1");
        assert_eq!(root_for_policy(&root), ObjectKey::new("policies", "p1"));
    }
}
