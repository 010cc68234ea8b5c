//! Run lifecycle decisions: when to confirm a run and when it is finished.
//!
//! Exactly one confirmation gate is active for a run, picked by its attributes
//! rather than its history: policy checks, then cost estimation, then the plain
//! plan-with-changes gate.

use crate::core::types::{Run, RunStatus, Workspace};

/// Statuses after which a run never changes again.
const TERMINAL_STATUSES: &[RunStatus] = &[
    RunStatus::Applied,
    RunStatus::Canceled,
    RunStatus::Discarded,
    RunStatus::Errored,
    RunStatus::PlannedAndFinished,
    RunStatus::PolicySoftFailed,
];

/// Returns true when the run is waiting for an explicit apply confirmation.
pub fn needs_confirmation(run: &Run, workspace: &Workspace) -> bool {
    if !run.is_confirmable {
        return false;
    }
    if !run.policy_checks.is_empty() {
        return run.status == RunStatus::PolicyChecked;
    }
    if workspace.cost_estimation_enabled {
        return run.status == RunStatus::CostEstimated;
    }
    run.status == RunStatus::Planned && run.has_changes
}

/// Returns true once the run has reached a final status.
pub fn is_terminal(run: &Run) -> bool {
    TERMINAL_STATUSES.contains(&run.status)
}
