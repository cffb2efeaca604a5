//! Fixed-answer collaborators, keyed by binding / policy-set name.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rps_reconcile::{DecisionLookup, GroupingRef, MembershipLookup, ResolveError};
use rps_schemas::{ObjectKey, PlacementBinding, Target};
use rps_store::StoreError;

/// Targets per binding name. Unknown bindings select nothing.
#[derive(Default)]
pub struct StaticDecisions {
    targets: Mutex<HashMap<String, Vec<Target>>>,
    failures: Mutex<HashMap<String, StoreError>>,
    calls: Mutex<Vec<String>>,
}

impl StaticDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, binding: &str, clusters: &[&str]) -> Self {
        self.set(binding, clusters);
        self
    }

    pub fn set(&self, binding: &str, clusters: &[&str]) {
        self.targets.lock().unwrap().insert(
            binding.to_string(),
            clusters.iter().map(|c| Target::cluster(*c)).collect(),
        );
    }

    pub fn fail(&self, binding: &str, err: StoreError) {
        self.failures
            .lock()
            .unwrap()
            .insert(binding.to_string(), err);
    }

    /// Binding names looked up, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DecisionLookup for StaticDecisions {
    async fn decisions(&self, binding: &PlacementBinding) -> Result<Vec<Target>, ResolveError> {
        GroupingRef::from_binding(binding)?;
        self.calls.lock().unwrap().push(binding.name().to_string());

        if let Some(source) = self.failures.lock().unwrap().get(binding.name()).cloned() {
            return Err(ResolveError::Decisions {
                binding: binding.metadata.key(),
                source,
            });
        }
        Ok(self
            .targets
            .lock()
            .unwrap()
            .get(binding.name())
            .cloned()
            .unwrap_or_default())
    }
}

/// Members per policy-set name. Unknown sets are not found.
#[derive(Default)]
pub struct StaticMembership {
    sets: HashMap<String, Vec<String>>,
    failing: HashMap<String, StoreError>,
}

impl StaticMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, set: &str, members: &[&str]) -> Self {
        self.sets.insert(
            set.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    pub fn failing(mut self, set: &str, err: StoreError) -> Self {
        self.failing.insert(set.to_string(), err);
        self
    }
}

#[async_trait]
impl MembershipLookup for StaticMembership {
    async fn is_member(
        &self,
        policy_name: &str,
        policy_set: &ObjectKey,
    ) -> Result<bool, StoreError> {
        if let Some(e) = self.failing.get(&policy_set.name) {
            return Err(e.clone());
        }
        match self.sets.get(&policy_set.name) {
            Some(members) => Ok(members.iter().any(|m| m == policy_name)),
            None => Err(StoreError::not_found(
                rps_store::ObjectKind::PolicySet,
                policy_set.clone(),
            )),
        }
    }
}
