//! Push declared variables to the workspace, updating by key or creating.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, instrument};

use crate::core::types::{RemoteVariable, VariableSpec};
use crate::io::input::DeclaredVariables;
use crate::io::remote::{PAGE_SIZE, PageRequest, RemoteService, VariableCreate, VariableUpdate};

/// Keys pushed by [`reconcile_variables`], in push order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub created: Vec<String>,
    pub updated: Vec<String>,
}

/// Fetch every variable of the workspace, across all pages and categories.
#[instrument(skip_all, fields(workspace_id = %workspace_id))]
pub fn fetch_remote_variables<S: RemoteService>(
    service: &S,
    workspace_id: &str,
) -> Result<Vec<RemoteVariable>> {
    let mut page = PageRequest::first(PAGE_SIZE);
    let mut variables = Vec::new();
    loop {
        let batch = service
            .list_variables(workspace_id, page)
            .context("retrieving workspace variables")?;
        let exhausted = batch.len() < page.size;
        variables.extend(batch);
        if exhausted {
            break;
        }
        page = page.next();
    }
    debug!(variables = variables.len(), "fetched workspace variables");
    Ok(variables)
}

/// Literal value if set, else the contents of `file` under `working_dir`.
pub fn resolve_value(key: &str, spec: &VariableSpec, working_dir: &Path) -> Result<String> {
    if !spec.value.is_empty() {
        return Ok(spec.value.clone());
    }
    if spec.file.is_empty() {
        bail!("no value or filename provided for variable {key:?}");
    }
    let path = working_dir.join(&spec.file);
    fs::read_to_string(&path)
        .with_context(|| format!("getting value for variable {key:?} from {}", path.display()))
}

/// Create or update every declared variable.
///
/// Existing variables are matched by key alone, whatever their category, so a
/// key declared in both namespaces updates the same remote variable. A failed
/// push aborts the reconciliation; variables pushed before it stay pushed.
#[instrument(skip_all, fields(workspace_id = %workspace_id, declared = declared.len()))]
pub fn reconcile_variables<S: RemoteService>(
    service: &S,
    workspace_id: &str,
    declared: DeclaredVariables<'_>,
    working_dir: &Path,
) -> Result<ReconcileSummary> {
    let existing = fetch_remote_variables(service, workspace_id)?;
    let mut summary = ReconcileSummary::default();

    for (key, spec, category) in declared.iter() {
        let value = resolve_value(key, spec, working_dir)?;

        match existing.iter().find(|variable| variable.key == key) {
            Some(variable) => {
                let update = VariableUpdate {
                    key: key.to_string(),
                    value,
                    description: spec.description.clone(),
                    hcl: spec.hcl,
                    sensitive: spec.sensitive,
                };
                service
                    .update_variable(workspace_id, &variable.id, &update)
                    .with_context(|| format!("updating variable {key:?}"))?;
                debug!(key, variable_id = %variable.id, "variable updated");
                summary.updated.push(key.to_string());
            }
            None => {
                let create = VariableCreate {
                    key: key.to_string(),
                    value,
                    description: spec.description.clone(),
                    category,
                    hcl: spec.hcl,
                    sensitive: spec.sensitive,
                };
                service
                    .create_variable(workspace_id, &create)
                    .with_context(|| format!("creating variable {key:?}"))?;
                debug!(key, category = category.as_str(), "variable created");
                summary.created.push(key.to_string());
            }
        }
    }

    info!(
        created = summary.created.len(),
        updated = summary.updated.len(),
        "variables reconciled"
    );
    Ok(summary)
}
