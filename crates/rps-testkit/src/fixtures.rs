//! Object builders for scenario tests.

use rps_schemas::{
    ComplianceState, ObjectKey, ObjectMeta, PlacementBinding, PlacementRef, PlacementRule,
    PlacementRuleStatus, Policy, PolicySet, PolicySetSpec, Subject, SubFilter, Target,
    PLACEMENT_API_GROUP, PLACEMENT_KIND, PLACEMENT_RULE_API_GROUP, PLACEMENT_RULE_KIND,
    POLICY_API_GROUP, POLICY_KIND, POLICY_SET_KIND, ROOT_POLICY_LABEL,
};

pub const NS: &str = "policies";

pub fn root_policy(name: &str) -> Policy {
    Policy::new(NS, name)
}

pub fn disabled_root_policy(name: &str) -> Policy {
    let mut p = root_policy(name);
    p.spec.disabled = true;
    p
}

/// Replica of `root` in the namespace of `cluster`.
pub fn replica(root: &ObjectKey, cluster: &str, compliant: Option<ComplianceState>) -> Policy {
    let replica_name = rps_schemas::replica_name(root);
    let mut p = Policy::new(cluster, replica_name.clone());
    p.metadata
        .labels
        .insert(ROOT_POLICY_LABEL.to_string(), replica_name);
    p.status.compliant = compliant;
    p
}

pub fn placement_rule(name: &str, clusters: &[&str]) -> PlacementRule {
    PlacementRule {
        metadata: ObjectMeta::new(NS, name),
        status: PlacementRuleStatus {
            decisions: clusters.iter().map(|c| Target::cluster(*c)).collect(),
        },
    }
}

pub fn policy_set(name: &str, members: &[&str]) -> PolicySet {
    PolicySet {
        metadata: ObjectMeta::new(NS, name),
        spec: PolicySetSpec {
            policies: members.iter().map(|m| m.to_string()).collect(),
        },
    }
}

pub fn binding(name: &str) -> BindingBuilder {
    BindingBuilder {
        pb: PlacementBinding {
            metadata: ObjectMeta::new(NS, name),
            placement_ref: PlacementRef {
                api_group: PLACEMENT_RULE_API_GROUP.to_string(),
                kind: PLACEMENT_RULE_KIND.to_string(),
                name: format!("{name}-rule"),
            },
            ..PlacementBinding::default()
        },
    }
}

pub struct BindingBuilder {
    pb: PlacementBinding,
}

impl BindingBuilder {
    pub fn placement_rule(mut self, name: &str) -> Self {
        self.pb.placement_ref = PlacementRef {
            api_group: PLACEMENT_RULE_API_GROUP.to_string(),
            kind: PLACEMENT_RULE_KIND.to_string(),
            name: name.to_string(),
        };
        self
    }

    pub fn placement(mut self, name: &str) -> Self {
        self.pb.placement_ref = PlacementRef {
            api_group: PLACEMENT_API_GROUP.to_string(),
            kind: PLACEMENT_KIND.to_string(),
            name: name.to_string(),
        };
        self
    }

    pub fn placement_ref(mut self, api_group: &str, kind: &str, name: &str) -> Self {
        self.pb.placement_ref = PlacementRef {
            api_group: api_group.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
        };
        self
    }

    pub fn policy(self, name: &str) -> Self {
        self.subject(POLICY_API_GROUP, POLICY_KIND, name)
    }

    pub fn policy_set(self, name: &str) -> Self {
        self.subject(POLICY_API_GROUP, POLICY_SET_KIND, name)
    }

    pub fn subject(mut self, api_group: &str, kind: &str, name: &str) -> Self {
        self.pb.subjects.push(Subject {
            api_group: api_group.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn restricted(mut self) -> Self {
        self.pb.sub_filter = Some(SubFilter::Restricted);
        self
    }

    pub fn remediation(mut self, action: &str) -> Self {
        self.pb.binding_overrides.remediation_action = action.to_string();
        self
    }

    pub fn build(self) -> PlacementBinding {
        self.pb
    }
}
