//! rps-schemas
//!
//! Wire model for the policy objects the root-policy status controller reads
//! and writes. Field names follow the Kubernetes JSON conventions of the
//! governance-policy APIs (camelCase, empty optionals omitted) so fixtures and
//! status documents round-trip with what the cluster serves.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const POLICY_API_GROUP: &str = "policy.open-cluster-management.io";
pub const PLACEMENT_RULE_API_GROUP: &str = "apps.open-cluster-management.io";
pub const PLACEMENT_API_GROUP: &str = "cluster.open-cluster-management.io";

pub const POLICY_KIND: &str = "Policy";
pub const POLICY_SET_KIND: &str = "PolicySet";
pub const PLACEMENT_RULE_KIND: &str = "PlacementRule";
pub const PLACEMENT_KIND: &str = "Placement";

/// Label carried by every replicated policy; value is `<rootNamespace>.<rootName>`.
pub const ROOT_POLICY_LABEL: &str = "policy.open-cluster-management.io/root-policy";
/// Label linking a PlacementDecision object to the Placement that produced it.
pub const PLACEMENT_LABEL: &str = "cluster.open-cluster-management.io/placement";

/// Lower-cased remediation action that binding overrides may upgrade to.
pub const ENFORCE: &str = "enforce";

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Namespace + name. Identifies a root policy and keys the per-policy lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse `namespace/name`. Both halves must be non-empty.
    pub fn parse(s: &str) -> Option<Self> {
        let (ns, name) = s.split_once('/')?;
        if ns.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(ns, name))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub resource_version: u64,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }
}

// ---------------------------------------------------------------------------
// Replica naming
// ---------------------------------------------------------------------------

/// Name of the replica of `root` in any cluster namespace: `<ns>.<name>`.
pub fn replica_name(root: &ObjectKey) -> String {
    format!("{}.{}", root.namespace, root.name)
}

/// Identity of the replica of `root` delivered to `target`.
pub fn replica_key(root: &ObjectKey, target: &Target) -> ObjectKey {
    ObjectKey::new(target.cluster_namespace.clone(), replica_name(root))
}

/// Inverse of [`replica_name`]. Namespaces cannot contain dots, so the split
/// is at the first one.
pub fn root_key_from_replica_name(value: &str) -> Option<ObjectKey> {
    let (ns, name) = value.split_once('.')?;
    if ns.is_empty() || name.is_empty() {
        return None;
    }
    Some(ObjectKey::new(ns, name))
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComplianceState {
    Compliant,
    NonCompliant,
    Pending,
}

impl ComplianceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceState::Compliant => "Compliant",
            ComplianceState::NonCompliant => "NonCompliant",
            ComplianceState::Pending => "Pending",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PolicySpec,
    #[serde(default)]
    pub status: PolicyStatus,
}

impl Policy {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            ..Self::default()
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// Root policy this object is a replica of, if it carries the root label.
    pub fn replica_of(&self) -> Option<ObjectKey> {
        self.metadata
            .labels
            .get(ROOT_POLICY_LABEL)
            .and_then(|v| root_key_from_replica_name(v))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remediation_action: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub placement: Vec<PlacementStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<CompliancePerClusterStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliant: Option<ComplianceState>,
}

/// Provenance of one binding (and optionally one policy set) that places the
/// root policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementStatus {
    pub placement_binding: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement_rule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_set: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompliancePerClusterStatus {
    #[serde(rename = "clustername")]
    pub cluster_name: String,
    #[serde(rename = "clusternamespace")]
    pub cluster_namespace: String,
    /// `None` while the replica does not exist yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliant: Option<ComplianceState>,
}

// ---------------------------------------------------------------------------
// Bindings and grouping objects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubFilter {
    Restricted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementRef {
    #[serde(default)]
    pub api_group: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    #[serde(default)]
    pub api_group: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingOverrides {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remediation_action: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementBinding {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub placement_ref: PlacementRef,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_filter: Option<SubFilter>,
    #[serde(default)]
    pub binding_overrides: BindingOverrides,
}

impl PlacementBinding {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn is_restricted(&self) -> bool {
        self.sub_filter == Some(SubFilter::Restricted)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySetSpec {
    #[serde(default)]
    pub policies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySet {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PolicySetSpec,
}

/// One candidate destination for a replica.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub cluster_name: String,
    pub cluster_namespace: String,
}

impl Target {
    pub fn new(cluster_name: impl Into<String>, cluster_namespace: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            cluster_namespace: cluster_namespace.into(),
        }
    }

    /// Managed clusters conventionally use a namespace named after the cluster.
    pub fn cluster(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            cluster_namespace: name.clone(),
            cluster_name: name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRuleStatus {
    #[serde(default)]
    pub decisions: Vec<Target>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRule {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: PlacementRuleStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub metadata: ObjectMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDecision {
    pub cluster_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementDecisionStatus {
    #[serde(default)]
    pub decisions: Vec<ClusterDecision>,
}

/// PlacementDecision object produced for a Placement (not to be confused
/// with [`Target`], which is one resolved cluster).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementDecision {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: PlacementDecisionStatus,
}

impl PlacementDecision {
    pub fn placement_name(&self) -> Option<&str> {
        self.metadata.labels.get(PLACEMENT_LABEL).map(String::as_str)
    }
}
