//! `ObjectStore` wrapper with injectable failures, delays and a call log.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rps_schemas::{
    ObjectKey, Placement, PlacementBinding, PlacementDecision, PlacementRule, Policy, PolicySet,
};
use rps_store::{InMemoryStore, ObjectKind, ObjectStore, StoreError};

/// One recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    GetPolicy(ObjectKey),
    ListPolicies,
    ListBindings(String),
    GetPolicySet(ObjectKey),
    GetPlacementRule(ObjectKey),
    GetPlacement(ObjectKey),
    ListPlacementDecisions(String, String),
    UpdateStatusStart(ObjectKey),
    UpdateStatusEnd(ObjectKey),
}

#[derive(Default)]
struct Faults {
    /// Persistent per-object get failures.
    get: HashMap<(ObjectKind, ObjectKey), StoreError>,
    /// Scripted get_policy results, consumed front first; `None` passes through.
    policy_script: HashMap<ObjectKey, VecDeque<Option<StoreError>>>,
    list_bindings: Option<StoreError>,
    update: Option<StoreError>,
    update_delay: Option<Duration>,
    log: Vec<StoreOp>,
}

pub struct FaultyStore {
    inner: Arc<InMemoryStore>,
    faults: Mutex<Faults>,
}

impl FaultyStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            faults: Mutex::new(Faults::default()),
        }
    }

    pub fn inner(&self) -> &Arc<InMemoryStore> {
        &self.inner
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap()
    }

    pub fn fail_get(&self, kind: ObjectKind, key: ObjectKey, err: StoreError) {
        self.faults().get.insert((kind, key), err);
    }

    /// Script successive `get_policy` outcomes for `key`.
    pub fn script_policy_gets(&self, key: ObjectKey, script: Vec<Option<StoreError>>) {
        self.faults().policy_script.insert(key, script.into());
    }

    pub fn fail_list_bindings(&self, err: StoreError) {
        self.faults().list_bindings = Some(err);
    }

    pub fn fail_update(&self, err: StoreError) {
        self.faults().update = Some(err);
    }

    /// Sleep between the start and end of every status update.
    pub fn delay_updates(&self, delay: Duration) {
        self.faults().update_delay = Some(delay);
    }

    pub fn log(&self) -> Vec<StoreOp> {
        self.faults().log.clone()
    }

    pub fn clear_log(&self) {
        self.faults().log.clear();
    }

    fn record(&self, op: StoreOp) {
        self.faults().log.push(op);
    }

    fn injected(&self, kind: ObjectKind, key: &ObjectKey) -> Option<StoreError> {
        let mut f = self.faults();
        if kind == ObjectKind::Policy {
            if let Some(next) = f.policy_script.get_mut(key).and_then(|s| s.pop_front()) {
                return next;
            }
        }
        f.get.get(&(kind, key.clone())).cloned()
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn get_policy(&self, key: &ObjectKey) -> Result<Policy, StoreError> {
        self.record(StoreOp::GetPolicy(key.clone()));
        if let Some(e) = self.injected(ObjectKind::Policy, key) {
            return Err(e);
        }
        self.inner.get_policy(key).await
    }

    async fn list_policies(&self, namespace: Option<&str>) -> Result<Vec<Policy>, StoreError> {
        self.record(StoreOp::ListPolicies);
        self.inner.list_policies(namespace).await
    }

    async fn list_placement_bindings(
        &self,
        namespace: &str,
    ) -> Result<Vec<PlacementBinding>, StoreError> {
        self.record(StoreOp::ListBindings(namespace.to_string()));
        let injected = self.faults().list_bindings.clone();
        if let Some(e) = injected {
            return Err(e);
        }
        self.inner.list_placement_bindings(namespace).await
    }

    async fn get_policy_set(&self, key: &ObjectKey) -> Result<PolicySet, StoreError> {
        self.record(StoreOp::GetPolicySet(key.clone()));
        if let Some(e) = self.injected(ObjectKind::PolicySet, key) {
            return Err(e);
        }
        self.inner.get_policy_set(key).await
    }

    async fn get_placement_rule(&self, key: &ObjectKey) -> Result<PlacementRule, StoreError> {
        self.record(StoreOp::GetPlacementRule(key.clone()));
        if let Some(e) = self.injected(ObjectKind::PlacementRule, key) {
            return Err(e);
        }
        self.inner.get_placement_rule(key).await
    }

    async fn get_placement(&self, key: &ObjectKey) -> Result<Placement, StoreError> {
        self.record(StoreOp::GetPlacement(key.clone()));
        if let Some(e) = self.injected(ObjectKind::Placement, key) {
            return Err(e);
        }
        self.inner.get_placement(key).await
    }

    async fn list_placement_decisions(
        &self,
        namespace: &str,
        placement_name: &str,
    ) -> Result<Vec<PlacementDecision>, StoreError> {
        self.record(StoreOp::ListPlacementDecisions(
            namespace.to_string(),
            placement_name.to_string(),
        ));
        self.inner
            .list_placement_decisions(namespace, placement_name)
            .await
    }

    async fn update_policy_status(&self, policy: &Policy) -> Result<Policy, StoreError> {
        let key = policy.key();
        self.record(StoreOp::UpdateStatusStart(key.clone()));

        let (injected, delay) = {
            let f = self.faults();
            (f.update.clone(), f.update_delay)
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        let res = match injected {
            Some(e) => Err(e),
            None => self.inner.update_policy_status(policy).await,
        };
        self.record(StoreOp::UpdateStatusEnd(key));
        res
    }
}
