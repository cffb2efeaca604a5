//! Shared runtime state for rps-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Everything here is
//! shared with the controller through `Arc`s.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rps_store::InMemoryStore;

use crate::controller::ReconcileCounters;
use crate::queue::WorkQueue;

/// Static build metadata included in health responses.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    /// Objects the controller reconciles against. Watch events land here.
    pub store: Arc<InMemoryStore>,
    pub queue: Arc<WorkQueue>,
    pub counters: Arc<ReconcileCounters>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        store: Arc<InMemoryStore>,
        queue: Arc<WorkQueue>,
        counters: Arc<ReconcileCounters>,
    ) -> Self {
        Self {
            build: BuildInfo {
                service: "rps-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            store,
            queue,
            counters,
            started_at: Utc::now(),
        }
    }

    /// Whole seconds since `started_at`. Never negative, even if the wall
    /// clock steps backwards.
    pub fn uptime_secs(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }
}
