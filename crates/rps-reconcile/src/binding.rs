//! Binding Resolver: what one PlacementBinding contributes to one root policy.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use rps_schemas::{
    ObjectKey, PlacementBinding, PlacementStatus, Policy, Subject, Target, PLACEMENT_API_GROUP,
    PLACEMENT_KIND, PLACEMENT_RULE_API_GROUP, PLACEMENT_RULE_KIND, POLICY_API_GROUP, POLICY_KIND,
    POLICY_SET_KIND,
};
use rps_store::ObjectStore;
use tracing::error;

use crate::error::ResolveError;
use crate::lookup::{DecisionLookup, MembershipLookup};

/// Grouping object kinds a placementRef may name. Closed set: supporting a
/// new kind is a schema change, not a configuration one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupingKind {
    PlacementRule,
    Placement,
}

impl GroupingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupingKind::PlacementRule => PLACEMENT_RULE_KIND,
            GroupingKind::Placement => PLACEMENT_KIND,
        }
    }

    pub fn api_group(&self) -> &'static str {
        match self {
            GroupingKind::PlacementRule => PLACEMENT_RULE_API_GROUP,
            GroupingKind::Placement => PLACEMENT_API_GROUP,
        }
    }

    /// `None` unless `kind` is supported and `api_group` is the one it lives in.
    pub fn parse(kind: &str, api_group: &str) -> Option<Self> {
        let k = match kind {
            PLACEMENT_RULE_KIND => GroupingKind::PlacementRule,
            PLACEMENT_KIND => GroupingKind::Placement,
            _ => return None,
        };
        (k.api_group() == api_group).then_some(k)
    }
}

impl fmt::Display for GroupingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated placementRef.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupingRef {
    pub kind: GroupingKind,
    pub name: String,
}

impl GroupingRef {
    pub fn from_binding(binding: &PlacementBinding) -> Result<Self, ResolveError> {
        let r = &binding.placement_ref;
        match GroupingKind::parse(&r.kind, &r.api_group) {
            Some(kind) if !r.name.is_empty() => Ok(Self {
                kind,
                name: r.name.clone(),
            }),
            _ => Err(ResolveError::InvalidBinding {
                binding: binding.metadata.key(),
            }),
        }
    }

    /// Grouping objects always live in the binding's namespace.
    pub fn key(&self, namespace: &str) -> ObjectKey {
        ObjectKey::new(namespace, self.name.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectKind {
    Policy,
    PolicySet,
}

impl SubjectKind {
    /// Subjects outside the policy API group, or of any other kind, are not
    /// policy subjects at all.
    pub fn of(subject: &Subject) -> Option<Self> {
        if subject.api_group != POLICY_API_GROUP {
            return None;
        }
        match subject.kind.as_str() {
            POLICY_KIND => Some(SubjectKind::Policy),
            POLICY_SET_KIND => Some(SubjectKind::PolicySet),
            _ => None,
        }
    }
}

/// What one binding contributes. Both lists empty means the binding does not
/// apply to the policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingResolution {
    pub targets: Vec<Target>,
    pub placements: Vec<PlacementStatus>,
}

impl BindingResolution {
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty() && self.placements.is_empty()
    }
}

pub struct BindingResolver {
    store: Arc<dyn ObjectStore>,
    decisions: Arc<dyn DecisionLookup>,
    membership: Arc<dyn MembershipLookup>,
}

impl BindingResolver {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        decisions: Arc<dyn DecisionLookup>,
        membership: Arc<dyn MembershipLookup>,
    ) -> Self {
        Self {
            store,
            decisions,
            membership,
        }
    }

    /// Resolve `binding` for `root`.
    ///
    /// An invalid placementRef fails even when no subject matches `root`.
    pub async fn resolve(
        &self,
        root: &Policy,
        binding: &PlacementBinding,
    ) -> Result<BindingResolution, ResolveError> {
        let grouping = GroupingRef::from_binding(binding)?;

        let mut placements = self.matching_subjects(root, binding).await;
        if placements.is_empty() {
            return Ok(BindingResolution::default());
        }

        // Left empty when the grouping object does not exist (yet).
        let found = self.grouping_name(&grouping, binding.namespace()).await?;
        for p in &mut placements {
            match grouping.kind {
                GroupingKind::PlacementRule => p.placement_rule = found.clone(),
                GroupingKind::Placement => p.placement = found.clone(),
            }
        }

        // Disabled policies still report binding topology, but go nowhere.
        if root.spec.disabled {
            return Ok(BindingResolution {
                targets: Vec::new(),
                placements,
            });
        }

        let targets = self.decisions.decisions(binding).await?;
        Ok(BindingResolution {
            targets,
            placements,
        })
    }

    async fn matching_subjects(
        &self,
        root: &Policy,
        binding: &PlacementBinding,
    ) -> Vec<PlacementStatus> {
        let mut placements = Vec::new();
        let mut policy_found = false;
        let mut seen_sets: HashSet<&str> = HashSet::new();

        for subject in &binding.subjects {
            match SubjectKind::of(subject) {
                Some(SubjectKind::Policy) => {
                    if !policy_found && subject.name == root.name() {
                        policy_found = true;
                        placements.push(PlacementStatus {
                            placement_binding: binding.name().to_string(),
                            ..PlacementStatus::default()
                        });
                    }
                }
                Some(SubjectKind::PolicySet) => {
                    if seen_sets.insert(subject.name.as_str())
                        && self.in_policy_set(root, binding, &subject.name).await
                    {
                        placements.push(PlacementStatus {
                            placement_binding: binding.name().to_string(),
                            policy_set: Some(subject.name.clone()),
                            ..PlacementStatus::default()
                        });
                    }
                }
                None => {}
            }
        }

        placements
    }

    /// Lookup failures count as "not a member".
    async fn in_policy_set(&self, root: &Policy, binding: &PlacementBinding, set: &str) -> bool {
        let set_key = ObjectKey::new(binding.namespace(), set);
        match self.membership.is_member(root.name(), &set_key).await {
            Ok(member) => member,
            Err(err) => {
                error!(
                    policy_name = root.name(),
                    policy_set = %set_key,
                    error = %err,
                    "Failed to get the policyset"
                );
                false
            }
        }
    }

    async fn grouping_name(
        &self,
        grouping: &GroupingRef,
        namespace: &str,
    ) -> Result<Option<String>, ResolveError> {
        let key = grouping.key(namespace);
        let res = match grouping.kind {
            GroupingKind::PlacementRule => self
                .store
                .get_placement_rule(&key)
                .await
                .map(|r| r.metadata.name),
            GroupingKind::Placement => self
                .store
                .get_placement(&key)
                .await
                .map(|p| p.metadata.name),
        };
        match res {
            Ok(name) => Ok(Some(name)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(source) => Err(ResolveError::Lookup {
                kind: grouping.kind,
                name: grouping.name.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rps_schemas::{ObjectMeta, PlacementRef};

    fn binding_with_ref(kind: &str, api_group: &str, name: &str) -> PlacementBinding {
        PlacementBinding {
            metadata: ObjectMeta::new("ns", "b"),
            placement_ref: PlacementRef {
                api_group: api_group.to_string(),
                kind: kind.to_string(),
                name: name.to_string(),
            },
            ..PlacementBinding::default()
        }
    }

    #[test]
    fn grouping_kind_requires_matching_api_group() {
        assert_eq!(
            GroupingKind::parse(PLACEMENT_RULE_KIND, PLACEMENT_RULE_API_GROUP),
            Some(GroupingKind::PlacementRule)
        );
        assert_eq!(
            GroupingKind::parse(PLACEMENT_KIND, PLACEMENT_API_GROUP),
            Some(GroupingKind::Placement)
        );
        assert_eq!(GroupingKind::parse(PLACEMENT_KIND, PLACEMENT_RULE_API_GROUP), None);
        assert_eq!(GroupingKind::parse("ManagedClusterSet", PLACEMENT_API_GROUP), None);
    }

    #[test]
    fn grouping_ref_rejects_empty_name() {
        let pb = binding_with_ref(PLACEMENT_KIND, PLACEMENT_API_GROUP, "");
        assert!(matches!(
            GroupingRef::from_binding(&pb),
            Err(ResolveError::InvalidBinding { .. })
        ));

        let pb = binding_with_ref(PLACEMENT_KIND, PLACEMENT_API_GROUP, "pl");
        let g = GroupingRef::from_binding(&pb).unwrap();
        assert_eq!(g.key("ns"), ObjectKey::new("ns", "pl"));
    }

    #[test]
    fn subject_kind_ignores_foreign_api_groups() {
        let s = Subject {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: POLICY_KIND.to_string(),
            name: "p".to_string(),
        };
        assert_eq!(SubjectKind::of(&s), None);

        let s = Subject {
            api_group: POLICY_API_GROUP.to_string(),
            kind: POLICY_SET_KIND.to_string(),
            name: "set".to_string(),
        };
        assert_eq!(SubjectKind::of(&s), Some(SubjectKind::PolicySet));
    }
}
