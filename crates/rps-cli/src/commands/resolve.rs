//! `rps resolve`: one reconcile against an in-memory copy of a fixture.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rps_reconcile::{ReconcileOutcome, RootPolicyLocks, RootPolicyStatusReconciler};
use rps_schemas::{ObjectKey, PolicyStatus};
use rps_store::{load_object_set, InMemoryStore, ObjectStore};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveReport {
    pub policy: String,
    /// Whether the computed status differs from the fixture's.
    pub changed: bool,
    pub status: PolicyStatus,
}

pub async fn run(objects: &Path, policy: &str) -> Result<ResolveReport> {
    let key = ObjectKey::parse(policy)
        .with_context(|| format!("invalid --policy '{policy}': expected namespace/name"))?;

    let set = load_object_set(objects)?;
    let store = Arc::new(InMemoryStore::from_objects(set));
    let dyn_store: Arc<dyn ObjectStore> = store.clone();

    let before = match store.get_policy(&key).await {
        Ok(p) => p,
        Err(e) if e.is_not_found() => {
            bail!("root policy {key} not found in {}", objects.display())
        }
        Err(e) => return Err(e.into()),
    };
    if before.replica_of().is_some() {
        bail!("{key} is a replicated policy; pass its root policy instead");
    }

    let reconciler =
        RootPolicyStatusReconciler::with_store(dyn_store, Arc::new(RootPolicyLocks::new()));
    let outcome = reconciler
        .reconcile(&key)
        .await
        .with_context(|| format!("failed to compute the status of {key}"))?;
    info!(?outcome, "reconciled");

    if outcome == ReconcileOutcome::RootAbsent {
        bail!("root policy {key} disappeared during the reconcile");
    }

    let after = store.get_policy(&key).await?;
    Ok(ResolveReport {
        policy: key.to_string(),
        changed: after.status != before.status,
        status: after.status,
    })
}
