//! In-process scenario tests for rps-daemon HTTP endpoints.
//!
//! The Axum router is driven via `tower::ServiceExt::oneshot`; no socket is
//! bound and no controller runs, so queued keys stay visible in the queue.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use rps_daemon::controller::ReconcileCounters;
use rps_daemon::queue::WorkQueue;
use rps_daemon::{routes, state};
use rps_schemas::{ObjectKey, ObjectMeta, PlacementRule, PlacementRuleStatus, Target};
use rps_store::{InMemoryStore, ObjectStore};
use rps_testkit::fixtures::{self, NS};
use tower::ServiceExt; // oneshot

struct Daemon {
    store: Arc<InMemoryStore>,
    queue: Arc<WorkQueue>,
    router: axum::Router,
}

fn make_daemon() -> Daemon {
    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(WorkQueue::default());
    let st = Arc::new(state::AppState::new(
        Arc::clone(&store),
        Arc::clone(&queue),
        Arc::new(ReconcileCounters::default()),
    ));
    Daemon {
        store,
        queue,
        router: routes::build_router(st),
    }
}

async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

// ---------------------------------------------------------------------------
// GET /v1/health, GET /v1/status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let d = make_daemon();
    let (status, body) = call(d.router, get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "rps-daemon");
}

#[tokio::test]
async fn status_reports_queue_depth_and_counters() {
    let d = make_daemon();
    d.queue.add(ObjectKey::new(NS, "p"));
    d.queue.add(ObjectKey::new(NS, "q"));

    let (status, body) = call(d.router, get("/v1/status")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["queue_depth"], 2);
    assert_eq!(json["in_flight"], 0);
    assert_eq!(json["shutting_down"], false);
    assert_eq!(json["reconciles"]["written"], 0);
    assert!(json["reconciles"]["last_finished_at"].is_null());
}

// ---------------------------------------------------------------------------
// GET /v1/policies/{namespace}/{name}/status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn policy_status_returns_the_stored_status() {
    let d = make_daemon();
    let mut root = fixtures::root_policy("p");
    root.status.placement.push(rps_schemas::PlacementStatus {
        placement_binding: "b1".to_string(),
        placement_rule: Some("g1".to_string()),
        ..Default::default()
    });
    d.store.upsert_policy(root).await;

    let (status, body) = call(d.router, get("/v1/policies/policies/p/status")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["namespace"], "policies");
    assert_eq!(json["name"], "p");
    assert_eq!(json["resource_version"], 1);
    assert_eq!(json["status"]["placement"][0]["placementBinding"], "b1");
    assert_eq!(json["status"]["placement"][0]["placementRule"], "g1");
}

#[tokio::test]
async fn policy_status_for_unknown_policy_is_404() {
    let d = make_daemon();
    let (status, body) = call(d.router, get("/v1/policies/policies/nope/status")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(parse_json(body)["error"]
        .as_str()
        .unwrap()
        .contains("policies/nope"));
}

// ---------------------------------------------------------------------------
// POST /v1/reconcile/{namespace}/{name}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconcile_request_is_queued_once() {
    let d = make_daemon();

    let (status, body) = call(
        d.router.clone(),
        post_json("/v1/reconcile/policies/p", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(parse_json(body)["enqueued"], serde_json::json!(["policies/p"]));

    let (status, body) = call(
        d.router,
        post_json("/v1/reconcile/policies/p", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let json = parse_json(body);
    assert_eq!(json["enqueued"], serde_json::json!([]));
    assert_eq!(json["already_pending"], serde_json::json!(["policies/p"]));
    assert_eq!(d.queue.len(), 1);
}

#[tokio::test]
async fn reconcile_after_shutdown_is_503() {
    let d = make_daemon();
    d.queue.shut_down();

    let (status, _) = call(
        d.router,
        post_json("/v1/reconcile/policies/p", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// ---------------------------------------------------------------------------
// POST /v1/events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn placement_rule_event_queues_roots_of_referring_bindings() {
    let d = make_daemon();
    d.store
        .upsert_binding(
            fixtures::binding("b1")
                .placement_rule("g1")
                .policy("p")
                .policy("q")
                .build(),
        )
        .await;
    d.store
        .upsert_binding(fixtures::binding("b2").placement_rule("other").policy("z").build())
        .await;

    let rule = PlacementRule {
        metadata: ObjectMeta::new(NS, "g1"),
        status: PlacementRuleStatus {
            decisions: vec![Target::cluster("clusterA")],
        },
    };
    let event = serde_json::json!({
        "kind": "placementRule",
        "object": serde_json::to_value(&rule).unwrap(),
    });

    let (status, body) = call(d.router, post_json("/v1/events", event)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(
        parse_json(body)["enqueued"],
        serde_json::json!(["policies/p", "policies/q"])
    );

    // The event was applied to the store.
    let stored = d
        .store
        .get_placement_rule(&ObjectKey::new(NS, "g1"))
        .await
        .unwrap();
    assert_eq!(stored.status.decisions, vec![Target::cluster("clusterA")]);
}

#[tokio::test]
async fn replica_event_queues_its_root() {
    let d = make_daemon();
    let replica = fixtures::replica(
        &ObjectKey::new(NS, "p"),
        "clusterA",
        Some(rps_schemas::ComplianceState::NonCompliant),
    );
    let event = serde_json::json!({
        "kind": "policy",
        "object": serde_json::to_value(&replica).unwrap(),
    });

    let (status, body) = call(d.router, post_json("/v1/events", event)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(parse_json(body)["enqueued"], serde_json::json!(["policies/p"]));
}

#[tokio::test]
async fn malformed_event_is_rejected() {
    let d = make_daemon();
    let (status, _) = call(
        d.router,
        post_json("/v1/events", serde_json::json!({"kind": "configMap", "object": {}})),
    )
    .await;
    assert!(status.is_client_error());
    assert!(d.queue.is_empty());
}
