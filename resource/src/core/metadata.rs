//! Metadata projection of a run.

use crate::core::types::{MetadataField, Run};

/// Where the run can be viewed in the service UI.
pub fn run_url(address: &str, organization: &str, workspace: &str, run_id: &str) -> String {
    format!(
        "{}/app/{}/workspaces/{}/runs/{}",
        address.trim_end_matches('/'),
        organization,
        workspace,
        run_id
    )
}

/// Build the ordered metadata list for a run.
///
/// Cost fields are only present when the run carries a cost estimate.
pub fn run_metadata(run: &Run, run_url: String) -> Vec<MetadataField> {
    let mut metadata = vec![
        MetadataField::new("created_at", run.created_at.to_string()),
        MetadataField::new("final_status", run.status.as_str()),
        MetadataField::new("message", run.message.clone()),
        MetadataField::new("run_url", run_url),
    ];
    if let Some(cost) = &run.cost_estimate {
        metadata.push(MetadataField::new(
            "monthly_cost",
            cost.proposed_monthly_cost.clone(),
        ));
        metadata.push(MetadataField::new(
            "cost_delta",
            cost.delta_monthly_cost.clone(),
        ));
    }
    metadata.push(MetadataField::new("configuration_source", run.source.clone()));
    metadata
}
