use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rps_schemas::{Placement, PlacementBinding, PlacementDecision, PlacementRule, Policy, PolicySet};
use serde::{Deserialize, Serialize};

/// A bundle of API objects used to seed an [`crate::InMemoryStore`].
///
/// JSON is valid YAML, so both encodings load through the same path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSet {
    #[serde(default)]
    pub policies: Vec<Policy>,
    #[serde(default)]
    pub placement_bindings: Vec<PlacementBinding>,
    #[serde(default)]
    pub policy_sets: Vec<PolicySet>,
    #[serde(default)]
    pub placement_rules: Vec<PlacementRule>,
    #[serde(default)]
    pub placements: Vec<Placement>,
    #[serde(default)]
    pub placement_decisions: Vec<PlacementDecision>,
}

pub fn parse_object_set(raw: &str) -> Result<ObjectSet> {
    serde_yaml::from_str(raw).context("invalid object set document")
}

pub fn load_object_set(path: impl AsRef<Path>) -> Result<ObjectSet> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read object set: {}", path.display()))?;
    parse_object_set(&raw).with_context(|| format!("in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
policies:
  - metadata: { name: p1, namespace: policies }
    spec: { disabled: false }
placementBindings:
  - metadata: { name: b1, namespace: policies }
    placementRef: { apiGroup: apps.open-cluster-management.io, kind: PlacementRule, name: g1 }
    subjects:
      - { apiGroup: policy.open-cluster-management.io, kind: Policy, name: p1 }
placementRules:
  - metadata: { name: g1, namespace: policies }
    status:
      decisions:
        - { clusterName: clusterA, clusterNamespace: clusterA }
"#;

    #[test]
    fn parses_yaml_object_set() {
        let set = parse_object_set(DOC).unwrap();
        assert_eq!(set.policies.len(), 1);
        assert_eq!(set.placement_bindings[0].placement_ref.name, "g1");
        assert_eq!(set.placement_rules[0].status.decisions[0].cluster_name, "clusterA");
        assert!(set.policy_sets.is_empty());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_object_set("/definitely/not/here.yaml").unwrap_err();
        assert!(format!("{err:#}").contains("/definitely/not/here.yaml"));
    }
}
