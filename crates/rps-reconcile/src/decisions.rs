//! Decision-Set Builder
//!
//! Merges every binding in the root policy's namespace into one authoritative
//! target set plus the placement provenance list.
//!
//! # Two passes
//!
//! 1. **Unrestricted** bindings are independent sources: their targets are
//!    unioned.
//! 2. **Restricted** (`subFilter: restricted`) bindings are filters over the
//!    result of pass 1. They may confirm or override a target already
//!    present; they never introduce one, and a restricted binding matching no
//!    existing target contributes no provenance either.
//!
//! If pass 1 produces no targets, pass 2 cannot contribute and is skipped.
//!
//! # Overrides
//!
//! Each target carries a remediation override while merging: the first
//! contributing binding's action (lower-cased), upgraded to `enforce` by any
//! later binding declaring it, never downgraded. The override is dropped when
//! the result collapses to a membership-only [`DecisionSet`]; nothing
//! downstream consumes it.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

use rps_schemas::{BindingOverrides, PlacementBinding, PlacementStatus, Policy, Target, ENFORCE};
use tracing::info;

use crate::binding::BindingResolver;
use crate::error::ResolveError;

/// Resolved membership. Ordered, so iteration is deterministic.
pub type DecisionSet = BTreeSet<Target>;

/// Output of [`DecisionSetBuilder::build`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedDecisions {
    pub decisions: DecisionSet,
    /// Sorted by binding name.
    pub placements: Vec<PlacementStatus>,
}

/// Merge state before collapsing to membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterDecisions {
    overrides: HashMap<Target, BindingOverrides>,
    placements: Vec<PlacementStatus>,
}

impl ClusterDecisions {
    pub fn overrides(&self, target: &Target) -> Option<&BindingOverrides> {
        self.overrides.get(target)
    }

    pub fn placements(&self) -> &[PlacementStatus] {
        &self.placements
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    pub fn into_resolved(self) -> ResolvedDecisions {
        ResolvedDecisions {
            decisions: self.overrides.into_keys().collect(),
            placements: self.placements,
        }
    }

    fn sort_placements(&mut self) {
        // Stable: records of one binding keep their subject order.
        self.placements
            .sort_by(|a, b| a.placement_binding.cmp(&b.placement_binding));
    }
}

fn declares_enforce(binding: &PlacementBinding) -> bool {
    binding
        .binding_overrides
        .remediation_action
        .eq_ignore_ascii_case(ENFORCE)
}

fn upgrade(overrides: &mut BindingOverrides, binding: &PlacementBinding) {
    if declares_enforce(binding) {
        overrides.remediation_action = ENFORCE.to_string();
    }
}

pub struct DecisionSetBuilder {
    resolver: BindingResolver,
}

impl DecisionSetBuilder {
    pub fn new(resolver: BindingResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &BindingResolver {
        &self.resolver
    }

    /// Membership-only result; see the [module documentation][self].
    pub async fn build(
        &self,
        root: &Policy,
        bindings: &[PlacementBinding],
    ) -> Result<ResolvedDecisions, ResolveError> {
        Ok(self.cluster_decisions(root, bindings).await?.into_resolved())
    }

    /// Full merge including per-target overrides. Any resolver error aborts
    /// the whole merge; no partial result is returned.
    pub async fn cluster_decisions(
        &self,
        root: &Policy,
        bindings: &[PlacementBinding],
    ) -> Result<ClusterDecisions, ResolveError> {
        let mut merged = ClusterDecisions::default();

        for pb in bindings.iter().filter(|pb| !pb.is_restricted()) {
            let res = self.resolver.resolve(root, pb).await?;
            if res.targets.is_empty() {
                info!(
                    policy_name = root.name(),
                    binding_name = pb.name(),
                    "No placement decisions to process for this policy from this binding"
                );
            }

            for target in res.targets {
                match merged.overrides.entry(target) {
                    Entry::Occupied(mut e) => upgrade(e.get_mut(), pb),
                    Entry::Vacant(e) => {
                        e.insert(BindingOverrides {
                            remediation_action: pb
                                .binding_overrides
                                .remediation_action
                                .to_lowercase(),
                        });
                    }
                }
            }

            merged.placements.extend(res.placements);
        }

        if merged.overrides.is_empty() {
            merged.sort_placements();
            return Ok(merged);
        }

        for pb in bindings.iter().filter(|pb| pb.is_restricted()) {
            let res = self.resolver.resolve(root, pb).await?;
            if res.targets.is_empty() {
                info!(
                    policy_name = root.name(),
                    binding_name = pb.name(),
                    "No placement decisions to process for this policy from this binding"
                );
            }

            let mut matched = false;
            for target in &res.targets {
                if let Some(o) = merged.overrides.get_mut(target) {
                    matched = true;
                    upgrade(o, pb);
                }
            }

            if matched {
                merged.placements.extend(res.placements);
            }
        }

        merged.sort_placements();
        Ok(merged)
    }
}
