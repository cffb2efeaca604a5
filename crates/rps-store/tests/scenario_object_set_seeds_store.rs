//! Scenario: an object-set file on disk seeds the in-memory store.
//!
//! GREEN when:
//! - every object kind in the file is readable through `ObjectStore`
//! - bindings list per namespace in name order
//! - a missing policy is reported as not-found, not as a generic failure

use std::io::Write;

use rps_schemas::ObjectKey;
use rps_store::{load_object_set, InMemoryStore, ObjectStore};

const OBJECTS: &str = r#"
policies:
  - metadata: { name: require-labels, namespace: policies }
placementBindings:
  - metadata: { name: zz-binding, namespace: policies }
    placementRef: { apiGroup: cluster.open-cluster-management.io, kind: Placement, name: pl }
    subjects: [{ apiGroup: policy.open-cluster-management.io, kind: Policy, name: require-labels }]
  - metadata: { name: aa-binding, namespace: policies }
    placementRef: { apiGroup: apps.open-cluster-management.io, kind: PlacementRule, name: plr }
    subjects: [{ apiGroup: policy.open-cluster-management.io, kind: PolicySet, name: baseline }]
    subFilter: restricted
  - metadata: { name: other, namespace: elsewhere }
policySets:
  - metadata: { name: baseline, namespace: policies }
    spec: { policies: [require-labels] }
placements:
  - metadata: { name: pl, namespace: policies }
placementDecisions:
  - metadata:
      name: pl-decision-1
      namespace: policies
      labels: { cluster.open-cluster-management.io/placement: pl }
    status:
      decisions: [{ clusterName: east }, { clusterName: west }]
"#;

#[tokio::test]
async fn object_file_seeds_every_kind() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(OBJECTS.as_bytes()).unwrap();

    let set = load_object_set(f.path()).unwrap();
    let store = InMemoryStore::from_objects(set);

    let p = store
        .get_policy(&ObjectKey::new("policies", "require-labels"))
        .await
        .unwrap();
    assert_eq!(p.metadata.resource_version, 1);

    let bindings = store.list_placement_bindings("policies").await.unwrap();
    let names: Vec<&str> = bindings.iter().map(|b| b.name()).collect();
    assert_eq!(names, vec!["aa-binding", "zz-binding"]);
    assert!(bindings[0].is_restricted());

    let set = store
        .get_policy_set(&ObjectKey::new("policies", "baseline"))
        .await
        .unwrap();
    assert_eq!(set.spec.policies, vec!["require-labels".to_string()]);

    let decisions = store.list_placement_decisions("policies", "pl").await.unwrap();
    assert_eq!(decisions[0].status.decisions.len(), 2);

    store
        .get_placement(&ObjectKey::new("policies", "pl"))
        .await
        .unwrap();
}

#[tokio::test]
async fn missing_policy_is_not_found() {
    let store = InMemoryStore::new();
    let err = store
        .get_policy(&ObjectKey::new("policies", "gone"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
