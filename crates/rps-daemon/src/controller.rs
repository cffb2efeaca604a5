//! Worker pool driving the reconciler from the work queue.
//!
//! Exactly `workers` tasks share one [`WorkQueue`]; the queue guarantees a
//! key is never held by two of them. A resync task periodically queues every
//! root policy so missed events heal on their own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rps_config::ControllerConfig;
use rps_reconcile::{ReconcileOutcome, RootPolicyStatusReconciler};
use rps_schemas::ObjectKey;
use rps_store::{ObjectStore, StoreError};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::queue::WorkQueue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub workers: usize,
    /// `None` disables periodic resync; one initial pass always runs.
    pub resync_interval: Option<Duration>,
}

impl From<&ControllerConfig> for ControllerSettings {
    fn from(cfg: &ControllerConfig) -> Self {
        Self {
            workers: cfg.controller.max_concurrent_reconciles,
            resync_interval: cfg.resync_interval(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ReconcileCounters {
    written: AtomicU64,
    root_absent: AtomicU64,
    failed: AtomicU64,
    last_finished_at: Mutex<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountersSnapshot {
    pub written: u64,
    pub root_absent: u64,
    pub failed: u64,
    pub last_finished_at: Option<DateTime<Utc>>,
}

impl ReconcileCounters {
    pub fn record(&self, result: &Result<ReconcileOutcome, rps_reconcile::StatusError>) {
        let counter = match result {
            Ok(ReconcileOutcome::StatusWritten { .. }) => &self.written,
            Ok(ReconcileOutcome::RootAbsent) => &self.root_absent,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_finished_at.lock() {
            *last = Some(Utc::now());
        }
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            written: self.written.load(Ordering::Relaxed),
            root_absent: self.root_absent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            last_finished_at: self.last_finished_at.lock().ok().and_then(|l| *l),
        }
    }
}

pub struct Controller {
    reconciler: Arc<RootPolicyStatusReconciler>,
    store: Arc<dyn ObjectStore>,
    queue: Arc<WorkQueue>,
    counters: Arc<ReconcileCounters>,
    settings: ControllerSettings,
}

impl Controller {
    pub fn new(
        reconciler: Arc<RootPolicyStatusReconciler>,
        store: Arc<dyn ObjectStore>,
        queue: Arc<WorkQueue>,
        counters: Arc<ReconcileCounters>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            reconciler,
            store,
            queue,
            counters,
            settings,
        }
    }

    /// Run until `shutdown` turns true (or its sender is dropped). Workers
    /// finish the key they hold before returning.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let workers = self.settings.workers.max(1);
        info!(workers, resync = ?self.settings.resync_interval, "Starting the root policy status controller");

        let mut pool = JoinSet::new();
        for id in 0..workers {
            pool.spawn(worker(
                id,
                Arc::clone(&self.queue),
                Arc::clone(&self.reconciler),
                Arc::clone(&self.counters),
            ));
        }

        let resync = tokio::spawn(resync_loop(
            Arc::clone(&self.store),
            Arc::clone(&self.queue),
            self.settings.resync_interval,
        ));

        // An Err means the sender is gone, which is also a stop signal.
        let _ = shutdown.wait_for(|stop| *stop).await;

        info!("Stopping the root policy status controller");
        resync.abort();
        self.queue.shut_down();
        while let Some(res) = pool.join_next().await {
            if let Err(e) = res {
                error!(error = %e, "controller worker panicked");
            }
        }
    }
}

async fn worker(
    id: usize,
    queue: Arc<WorkQueue>,
    reconciler: Arc<RootPolicyStatusReconciler>,
    counters: Arc<ReconcileCounters>,
) {
    while let Some(key) = queue.get().await {
        process_key(&queue, &reconciler, &counters, key).await;
    }
    debug!(worker = id, "worker stopped");
}

/// Reconcile one key taken from `queue` and hand it back.
pub async fn process_key(
    queue: &Arc<WorkQueue>,
    reconciler: &RootPolicyStatusReconciler,
    counters: &ReconcileCounters,
    key: ObjectKey,
) {
    let result = reconciler.reconcile(&key).await;
    counters.record(&result);

    match result {
        Ok(_) => queue.forget(&key),
        Err(e) => {
            let delay = queue.requeue_rate_limited(key.clone());
            warn!(
                policy = %key,
                error = %e,
                retry_in_ms = delay.as_millis() as u64,
                "Reconcile failed; requeued with backoff"
            );
        }
    }
    queue.done(&key);
}

async fn resync_loop(
    store: Arc<dyn ObjectStore>,
    queue: Arc<WorkQueue>,
    interval: Option<Duration>,
) {
    let Some(interval) = interval else {
        if let Err(e) = enqueue_roots(store.as_ref(), &queue).await {
            error!(error = %e, "Initial root policy listing failed");
        }
        return;
    };

    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match enqueue_roots(store.as_ref(), &queue).await {
            Ok(n) => debug!(queued = n, "Resynced root policies"),
            Err(e) => error!(error = %e, "Root policy resync failed"),
        }
    }
}

/// Queue every root policy (policies without the root-policy label).
/// Returns how many were newly queued.
pub async fn enqueue_roots(store: &dyn ObjectStore, queue: &WorkQueue) -> Result<usize, StoreError> {
    let mut queued = 0;
    for policy in store.list_policies(None).await? {
        if policy.replica_of().is_none() && queue.add(policy.key()) {
            queued += 1;
        }
    }
    Ok(queued)
}
