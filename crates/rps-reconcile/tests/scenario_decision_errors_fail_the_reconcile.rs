use std::sync::Arc;

use rps_reconcile::*;
use rps_schemas::{ObjectKey, PLACEMENT_RULE_API_GROUP};
use rps_store::{ObjectKind, ObjectStore, StoreError};
use rps_testkit::fixtures::{self, NS};
use rps_testkit::{Harness, StaticDecisions, StaticMembership, StoreOp};

async fn seed_valid(h: &Harness) -> ObjectKey {
    let root = fixtures::root_policy("p");
    let key = root.key();
    h.memory.upsert_policy(root).await;
    h.memory
        .upsert_placement_rule(fixtures::placement_rule("g1", &["clusterA"]))
        .await;
    h.memory
        .upsert_binding(fixtures::binding("b1").placement_rule("g1").policy("p").build())
        .await;
    key
}

fn wrote_status(h: &Harness) -> bool {
    h.store
        .log()
        .iter()
        .any(|op| matches!(op, StoreOp::UpdateStatusStart(_)))
}

#[tokio::test]
async fn scenario_invalid_binding_aborts_even_when_unrelated() {
    let h = Harness::new();
    let key = seed_valid(&h).await;
    h.memory
        .upsert_binding(
            fixtures::binding("broken")
                .placement_ref(PLACEMENT_RULE_API_GROUP, "ConfigMap", "g1")
                .policy("someone-else")
                .build(),
        )
        .await;

    let err = h.reconciler.reconcile(&key).await.unwrap_err();
    match err {
        StatusError::Decisions {
            source: ResolveError::InvalidBinding { binding },
            ..
        } => assert_eq!(binding, ObjectKey::new(NS, "broken")),
        other => panic!("expected an invalid binding error, got {other:?}"),
    }
    assert!(!wrote_status(&h));
}

#[tokio::test]
async fn scenario_kind_in_the_wrong_api_group_is_invalid() {
    let h = Harness::new();
    let key = seed_valid(&h).await;
    h.memory
        .upsert_binding(
            fixtures::binding("b2")
                .placement_ref("example.io", "PlacementRule", "g1")
                .policy("p")
                .build(),
        )
        .await;

    let err = h.reconciler.reconcile(&key).await.unwrap_err();
    assert!(matches!(
        err,
        StatusError::Decisions {
            source: ResolveError::InvalidBinding { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn scenario_grouping_lookup_failure_aborts() {
    let h = Harness::new();
    let key = seed_valid(&h).await;
    h.store.fail_get(
        ObjectKind::PlacementRule,
        ObjectKey::new(NS, "g1"),
        StoreError::unavailable("apiserver unavailable"),
    );

    let err = h.reconciler.reconcile(&key).await.unwrap_err();
    match err {
        StatusError::Decisions {
            source: ResolveError::Lookup { kind, name, .. },
            ..
        } => {
            assert_eq!(kind, GroupingKind::PlacementRule);
            assert_eq!(name, "g1");
        }
        other => panic!("expected a lookup error, got {other:?}"),
    }
    assert!(!wrote_status(&h));
}

#[tokio::test]
async fn scenario_missing_grouping_object_is_not_an_error() {
    let h = Harness::new();
    let root = fixtures::root_policy("p");
    let key = root.key();
    h.memory.upsert_policy(root).await;
    h.memory
        .upsert_binding(fixtures::binding("b1").placement("not-yet").policy("p").build())
        .await;

    h.reconciler.reconcile(&key).await.unwrap();

    let written = h.memory.get_policy(&key).await.unwrap();
    assert!(written.status.status.is_empty());
    assert_eq!(written.status.placement.len(), 1);
    assert_eq!(written.status.placement[0].placement, None);
    assert_eq!(written.status.placement[0].placement_rule, None);
}

#[tokio::test]
async fn scenario_decision_lookup_failure_aborts_whole_set() {
    let decisions = Arc::new(StaticDecisions::new().with("a1", &["clusterA"]));
    decisions.fail("b1", StoreError::unavailable("decisions unavailable"));
    let h = Harness::with_static(Arc::clone(&decisions), StaticMembership::new());

    let root = fixtures::root_policy("p");
    let key = root.key();
    h.memory.upsert_policy(root).await;
    h.memory
        .upsert_binding(fixtures::binding("a1").policy("p").build())
        .await;
    h.memory
        .upsert_binding(fixtures::binding("b1").policy("p").build())
        .await;

    let err = h.reconciler.reconcile(&key).await.unwrap_err();
    assert!(matches!(
        err,
        StatusError::Decisions {
            source: ResolveError::Decisions { .. },
            ..
        }
    ));
    // a1 resolved before b1 failed; its targets are discarded all the same.
    assert_eq!(decisions.calls(), vec!["a1", "b1"]);
    assert!(!wrote_status(&h));
}

#[tokio::test]
async fn scenario_membership_failure_counts_as_not_a_member() {
    let decisions = Arc::new(StaticDecisions::new().with("b1", &["clusterA"]));
    let membership = StaticMembership::new().failing("ps", StoreError::unavailable("timeout"));
    let h = Harness::with_static(Arc::clone(&decisions), membership);

    let root = fixtures::root_policy("p");
    let key = root.key();
    h.memory.upsert_policy(root).await;
    h.memory
        .upsert_binding(fixtures::binding("b1").policy_set("ps").build())
        .await;

    h.reconciler.reconcile(&key).await.unwrap();

    let written = h.memory.get_policy(&key).await.unwrap();
    assert!(written.status.status.is_empty());
    assert!(written.status.placement.is_empty());
    assert!(decisions.calls().is_empty());
}

#[tokio::test]
async fn scenario_list_bindings_failure_is_returned() {
    let h = Harness::new();
    let key = seed_valid(&h).await;
    h.store
        .fail_list_bindings(StoreError::unavailable("list failed"));

    let err = h.reconciler.reconcile(&key).await.unwrap_err();
    match err {
        StatusError::ListBindings { namespace, .. } => assert_eq!(namespace, NS),
        other => panic!("expected a list error, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_root_load_failure_is_returned() {
    let h = Harness::new();
    let key = seed_valid(&h).await;
    h.store.fail_get(
        ObjectKind::Policy,
        key.clone(),
        StoreError::unavailable("read failed"),
    );

    let err = h.reconciler.reconcile(&key).await.unwrap_err();
    assert!(matches!(err, StatusError::LoadRoot { .. }));
    assert_eq!(h.store.log(), vec![StoreOp::GetPolicy(key)]);
}

#[tokio::test]
async fn scenario_persist_failure_is_returned_for_retry() {
    let h = Harness::new();
    let key = seed_valid(&h).await;
    h.store
        .fail_update(StoreError::unavailable("write rejected"));

    let err = h.reconciler.reconcile(&key).await.unwrap_err();
    match err {
        StatusError::Persist { key: k, source } => {
            assert_eq!(k, key);
            assert_eq!(source, StoreError::unavailable("write rejected"));
        }
        other => panic!("expected a persist error, got {other:?}"),
    }
    assert_eq!(h.memory.status_writes().await, 0);
}

#[tokio::test]
async fn scenario_refresh_failure_falls_back_to_the_loaded_copy() {
    let h = Harness::new();
    let key = seed_valid(&h).await;
    // First read passes; the pre-write refresh fails.
    h.store.script_policy_gets(
        key.clone(),
        vec![None, Some(StoreError::unavailable("refresh failed"))],
    );

    let out = h.reconciler.reconcile(&key).await.unwrap();
    assert!(matches!(out, ReconcileOutcome::StatusWritten { .. }));

    let written = h.memory.get_policy(&key).await.unwrap();
    assert_eq!(written.status.status.len(), 1);
    assert_eq!(written.status.status[0].cluster_name, "clusterA");
    assert_eq!(h.memory.status_writes().await, 1);
}

#[tokio::test]
async fn scenario_concurrent_edit_surfaces_as_conflict() {
    let h = Harness::new();
    let key = seed_valid(&h).await;
    let loaded = h.memory.get_policy(&key).await.unwrap();
    h.memory.upsert_policy(loaded.clone()).await;

    let mut stale = loaded;
    stale.status.compliant = Some(rps_schemas::ComplianceState::Compliant);
    let err = h.memory.update_policy_status(&stale).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));

    // The reconciler re-reads before writing and is unaffected.
    h.reconciler.reconcile(&key).await.unwrap();
    assert_eq!(h.memory.status_writes().await, 1);
}
