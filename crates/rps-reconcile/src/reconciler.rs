//! Reconcile Entrypoint
//!
//! Requests are always keyed by the root policy, whatever changed, so a burst
//! of replica status events collapses into a few full recomputations. Two
//! states only: the root exists (write its status) or it does not (no-op).
//! Any returned error means "retry this key later with backoff".

use std::sync::Arc;

use rps_schemas::ObjectKey;
use rps_store::ObjectStore;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use crate::error::StatusError;
use crate::locks::RootPolicyLocks;
use crate::writer::{Collaborators, RootStatusWriter, StatusUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    StatusWritten { resource_version: u64 },
    RootAbsent,
}

pub struct RootPolicyStatusReconciler {
    writer: RootStatusWriter,
}

impl RootPolicyStatusReconciler {
    pub fn new(writer: RootStatusWriter) -> Self {
        Self { writer }
    }

    /// Reconciler over `store` with the store-backed collaborators.
    pub fn with_store(store: Arc<dyn ObjectStore>, locks: Arc<RootPolicyLocks>) -> Self {
        let collaborators = Collaborators::store_backed(&store);
        Self::new(RootStatusWriter::new(store, locks, collaborators))
    }

    pub fn locks(&self) -> &Arc<RootPolicyLocks> {
        self.writer.locks()
    }

    pub async fn reconcile(&self, request: &ObjectKey) -> Result<ReconcileOutcome, StatusError> {
        let span = info_span!(
            "reconcile",
            policy_namespace = %request.namespace,
            policy_name = %request.name,
            reconcile_id = %Uuid::new_v4(),
        );

        async move {
            debug!("Reconciling the root policy status");
            self.writer
                .update_status(request)
                .await
                .map(|update| match update {
                    StatusUpdate::Written(p) => ReconcileOutcome::StatusWritten {
                        resource_version: p.metadata.resource_version,
                    },
                    StatusUpdate::RootAbsent => ReconcileOutcome::RootAbsent,
                })
        }
        .instrument(span)
        .await
    }
}
