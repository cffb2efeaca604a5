use rps_schemas::{CompliancePerClusterStatus, ComplianceState};

/// Folds per-cluster compliance into the root policy's single value.
pub trait ComplianceAggregator: Send + Sync {
    fn aggregate(&self, statuses: &[CompliancePerClusterStatus]) -> Option<ComplianceState>;
}

/// Worst state wins: NonCompliant > Pending > unknown > Compliant.
///
/// No clusters, or any cluster without a reported state (and nothing worse),
/// leaves the root state unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorstStateCompliance;

impl ComplianceAggregator for WorstStateCompliance {
    fn aggregate(&self, statuses: &[CompliancePerClusterStatus]) -> Option<ComplianceState> {
        if statuses.is_empty() {
            return None;
        }

        let mut pending = false;
        let mut unknown = false;
        for s in statuses {
            match s.compliant {
                Some(ComplianceState::NonCompliant) => return Some(ComplianceState::NonCompliant),
                Some(ComplianceState::Pending) => pending = true,
                Some(ComplianceState::Compliant) => {}
                None => unknown = true,
            }
        }

        if pending {
            Some(ComplianceState::Pending)
        } else if unknown {
            None
        } else {
            Some(ComplianceState::Compliant)
        }
    }
}
