//! Shared deterministic types for the resource core.
//!
//! These mirror the remote service's vocabulary (runs, workspaces, variables)
//! without carrying any transport detail. Wire (de)serialization of the
//! service's documents lives in `io::tfe`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A resource version: the id of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    #[serde(rename = "ref")]
    pub reference: String,
}

impl Version {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }
}

/// One `{name, value}` metadata pair shown next to a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataField {
    pub name: String,
    pub value: String,
}

impl MetadataField {
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// Response printed by `in` and `out`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: Version,
    pub metadata: Vec<MetadataField>,
}

/// Lifecycle tag of a remote run.
///
/// Statuses the service may add later are kept verbatim in [`RunStatus::Other`]
/// so a poll never fails on an unfamiliar value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Pending,
    Fetching,
    FetchingCompleted,
    PrePlanRunning,
    PrePlanCompleted,
    Queuing,
    PlanQueued,
    Planning,
    Planned,
    CostEstimating,
    CostEstimated,
    PolicyChecking,
    PolicyOverride,
    PolicySoftFailed,
    PolicyChecked,
    Confirmed,
    PostPlanRunning,
    PostPlanCompleted,
    ApplyQueued,
    Applying,
    Applied,
    Discarded,
    Errored,
    Canceled,
    ForceCanceled,
    PlannedAndFinished,
    Other(String),
}

const STATUS_NAMES: &[(RunStatus, &str)] = &[
    (RunStatus::Pending, "pending"),
    (RunStatus::Fetching, "fetching"),
    (RunStatus::FetchingCompleted, "fetching_completed"),
    (RunStatus::PrePlanRunning, "pre_plan_running"),
    (RunStatus::PrePlanCompleted, "pre_plan_completed"),
    (RunStatus::Queuing, "queuing"),
    (RunStatus::PlanQueued, "plan_queued"),
    (RunStatus::Planning, "planning"),
    (RunStatus::Planned, "planned"),
    (RunStatus::CostEstimating, "cost_estimating"),
    (RunStatus::CostEstimated, "cost_estimated"),
    (RunStatus::PolicyChecking, "policy_checking"),
    (RunStatus::PolicyOverride, "policy_override"),
    (RunStatus::PolicySoftFailed, "policy_soft_failed"),
    (RunStatus::PolicyChecked, "policy_checked"),
    (RunStatus::Confirmed, "confirmed"),
    (RunStatus::PostPlanRunning, "post_plan_running"),
    (RunStatus::PostPlanCompleted, "post_plan_completed"),
    (RunStatus::ApplyQueued, "apply_queued"),
    (RunStatus::Applying, "applying"),
    (RunStatus::Applied, "applied"),
    (RunStatus::Discarded, "discarded"),
    (RunStatus::Errored, "errored"),
    (RunStatus::Canceled, "canceled"),
    (RunStatus::ForceCanceled, "force_canceled"),
    (RunStatus::PlannedAndFinished, "planned_and_finished"),
];

impl RunStatus {
    pub fn as_str(&self) -> &str {
        if let RunStatus::Other(raw) = self {
            return raw;
        }
        STATUS_NAMES
            .iter()
            .find(|(status, _)| status == self)
            .map(|(_, name)| *name)
            .unwrap_or_default()
    }
}

impl From<String> for RunStatus {
    fn from(raw: String) -> Self {
        STATUS_NAMES
            .iter()
            .find(|(_, name)| *name == raw)
            .map(|(status, _)| status.clone())
            .unwrap_or(RunStatus::Other(raw))
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monthly cost figures attached to a run, as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostEstimate {
    pub proposed_monthly_cost: String,
    pub delta_monthly_cost: String,
}

/// One plan/apply execution attempt against a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub cost_estimate: Option<CostEstimate>,
    pub is_confirmable: bool,
    pub has_changes: bool,
    /// Ids of the policy checks attached to the run.
    pub policy_checks: Vec<String>,
    /// What queued the run (`tfe-api`, `tfe-ui`, `tfe-configuration-version`, ...).
    pub source: String,
}

/// Workspace attributes read once per invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workspace {
    pub id: String,
    pub cost_estimation_enabled: bool,
}

/// Variable namespace. Only these two may be declared; anything else is
/// rejected when the payload is decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableCategory {
    /// Execution-scoped input variable.
    #[default]
    Terraform,
    /// Environment variable of the execution process.
    Env,
}

impl VariableCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            VariableCategory::Terraform => "terraform",
            VariableCategory::Env => "env",
        }
    }
}

/// A variable as it exists on the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteVariable {
    pub id: String,
    pub key: String,
    /// Empty when the service withholds a sensitive value.
    pub value: String,
    pub description: String,
    pub category: VariableCategory,
    pub hcl: bool,
    pub sensitive: bool,
}

/// A declared variable from the `out` params.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VariableSpec {
    pub value: String,
    /// Path relative to the working directory; used when `value` is empty.
    pub file: String,
    pub description: String,
    /// Overrides the category of the namespace the variable is declared in.
    pub category: Option<VariableCategory>,
    pub sensitive: bool,
    pub hcl: bool,
}

/// One named output value of a state snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputValue {
    /// The value exactly as serialized JSON.
    pub raw: String,
    pub sensitive: bool,
}
