//! Request and response types for the rps-daemon HTTP endpoints.
//!
//! `Serialize + Deserialize` so Axum can encode them and tests can decode
//! them. No business logic lives here.

use chrono::{DateTime, Utc};
use rps_schemas::{PlacementBinding, PlacementDecision, PlacementRule, Policy, PolicyStatus};
use serde::{Deserialize, Serialize};

use crate::controller::CountersSnapshot;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// /v1/status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub daemon_uptime_secs: u64,
    pub started_at: DateTime<Utc>,
    /// Keys waiting for a worker.
    pub queue_depth: usize,
    /// Keys currently being reconciled.
    pub in_flight: usize,
    pub shutting_down: bool,
    pub reconciles: CountersSnapshot,
}

// ---------------------------------------------------------------------------
// /v1/policies/{namespace}/{name}/status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyStatusResponse {
    pub namespace: String,
    pub name: String,
    pub resource_version: u64,
    pub status: PolicyStatus,
}

// ---------------------------------------------------------------------------
// /v1/reconcile/{namespace}/{name}  /v1/events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnqueueResponse {
    /// Root policy keys ("namespace/name") newly queued.
    pub enqueued: Vec<String>,
    /// Keys that were already waiting.
    pub already_pending: Vec<String>,
}

/// One observed change to a watched object. The daemon applies it to its
/// store, then queues every root policy the change can affect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WatchEvent {
    Binding {
        object: PlacementBinding,
        #[serde(default)]
        deleted: bool,
    },
    PlacementRule {
        object: PlacementRule,
        #[serde(default)]
        deleted: bool,
    },
    PlacementDecision {
        object: PlacementDecision,
        #[serde(default)]
        deleted: bool,
    },
    Policy {
        object: Policy,
        #[serde(default)]
        deleted: bool,
    },
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
