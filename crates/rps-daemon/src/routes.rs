//! Axum router and HTTP handlers for rps-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers so tests can drive the bare router.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rps_schemas::ObjectKey;
use rps_store::{ObjectStore, StoreError};
use tracing::{info, warn};

use crate::{
    api_types::{
        EnqueueResponse, ErrorResponse, HealthResponse, PolicyStatusResponse, StatusResponse,
        WatchEvent,
    },
    events::apply_event,
    state::AppState,
};

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/policies/:namespace/:name/status", get(policy_status))
        .route("/v1/reconcile/:namespace/:name", post(reconcile))
        .route("/v1/events", post(events))
        .with_state(state)
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn shutting_down() -> Response {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "controller is shutting down; not accepting work",
    )
}

fn enqueue(st: &AppState, keys: Vec<ObjectKey>) -> EnqueueResponse {
    let mut resp = EnqueueResponse::default();
    for key in keys {
        let label = key.to_string();
        if st.queue.add(key) {
            resp.enqueued.push(label);
        } else {
            resp.already_pending.push(label);
        }
    }
    resp
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(StatusResponse {
            daemon_uptime_secs: st.uptime_secs(),
            started_at: st.started_at,
            queue_depth: st.queue.len(),
            in_flight: st.queue.in_flight(),
            shutting_down: st.queue.is_shutting_down(),
            reconciles: st.counters.snapshot(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/policies/{namespace}/{name}/status
// ---------------------------------------------------------------------------

pub(crate) async fn policy_status(
    State(st): State<Arc<AppState>>,
    Path((namespace, name)): Path<(String, String)>,
) -> Response {
    let key = ObjectKey::new(namespace, name);
    match st.store.get_policy(&key).await {
        Ok(policy) => (
            StatusCode::OK,
            Json(PolicyStatusResponse {
                namespace: key.namespace,
                name: key.name,
                resource_version: policy.metadata.resource_version,
                status: policy.status,
            }),
        )
            .into_response(),
        Err(e @ StoreError::NotFound { .. }) => error_response(StatusCode::NOT_FOUND, e.to_string()),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/reconcile/{namespace}/{name}
// ---------------------------------------------------------------------------

pub(crate) async fn reconcile(
    State(st): State<Arc<AppState>>,
    Path((namespace, name)): Path<(String, String)>,
) -> Response {
    if st.queue.is_shutting_down() {
        return shutting_down();
    }
    let key = ObjectKey::new(namespace, name);
    info!(policy = %key, "reconcile requested");
    (StatusCode::ACCEPTED, Json(enqueue(&st, vec![key]))).into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/events
// ---------------------------------------------------------------------------

pub(crate) async fn events(
    State(st): State<Arc<AppState>>,
    Json(event): Json<WatchEvent>,
) -> Response {
    if st.queue.is_shutting_down() {
        return shutting_down();
    }
    match apply_event(&st.store, event).await {
        Ok(roots) => (StatusCode::ACCEPTED, Json(enqueue(&st, roots))).into_response(),
        Err(e) => {
            warn!(error = %e, "failed to map watch event to root policies");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}
