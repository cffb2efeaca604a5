//! Per-Target Status Aggregator
//!
//! Best-effort by construction: a failed replica lookup still yields an entry
//! for that cluster (no compliance state) and never stops the remaining
//! lookups. Partial visibility during a topology change is expected.

use std::sync::Arc;

use rps_schemas::{replica_key, CompliancePerClusterStatus, Policy, Target};
use rps_store::{ObjectStore, StoreError};
use tracing::{debug, warn};


#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterStatusReport {
    /// Sorted by cluster name.
    pub statuses: Vec<CompliancePerClusterStatus>,
    /// First non-not-found replica lookup failure, if any.
    pub lookup_error: Option<StoreError>,
}

pub struct ClusterStatusAggregator {
    store: Arc<dyn ObjectStore>,
}

impl ClusterStatusAggregator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// `targets` may arrive in any order; the report is sorted by cluster name.
    pub async fn aggregate<'a, I>(&self, root: &Policy, targets: I) -> ClusterStatusReport
    where
        I: IntoIterator<Item = &'a Target>,
    {
        if root.spec.disabled {
            return ClusterStatusReport::default();
        }

        let root_key = root.key();
        let mut report = ClusterStatusReport {
            statuses: Vec::new(),
            lookup_error: None,
        };

        for target in targets {
            let key = replica_key(&root_key, target);
            let compliant = match self.store.get_policy(&key).await {
                Ok(replica) => replica.status.compliant,
                Err(e) if e.is_not_found() => {
                    debug!(replica = %key, "Replicated policy not created yet");
                    None
                }
                Err(e) => {
                    warn!(replica = %key, error = %e, "Failed to get the replicated policy");
                    if report.lookup_error.is_none() {
                        report.lookup_error = Some(e);
                    }
                    None
                }
            };

            report.statuses.push(CompliancePerClusterStatus {
                cluster_name: target.cluster_name.clone(),
                cluster_namespace: target.cluster_namespace.clone(),
                compliant,
            });
        }

        report
            .statuses
            .sort_by(|a, b| a.cluster_name.cmp(&b.cluster_name));
        report
    }
}
