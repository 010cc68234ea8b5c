//! `out`: push declared variables, then queue a new run.

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::context::ResourceContext;
use crate::core::metadata::run_metadata;
use crate::core::types::{Version, VersionResponse};
use crate::io::input::Params;
use crate::io::remote::RemoteService;
use crate::reconcile::reconcile_variables;

/// Reconcile `params` variables and create a run with the rendered message.
///
/// Variables are resolved against `ctx.working_dir`. A failed push leaves the
/// earlier ones in place and no run is created.
#[instrument(skip_all, fields(workspace_id = %ctx.workspace.id))]
pub fn put_version<S: RemoteService>(
    ctx: &ResourceContext<S>,
    params: &Params,
) -> Result<VersionResponse> {
    let summary = reconcile_variables(
        &ctx.service,
        &ctx.workspace.id,
        params.declared_variables(),
        &ctx.working_dir,
    )?;

    let run = ctx
        .service
        .create_run(&ctx.workspace.id, &params.message)
        .context("creating run")?;
    info!(
        run_id = %run.id,
        created = summary.created.len(),
        updated = summary.updated.len(),
        "run queued"
    );

    let metadata = run_metadata(&run, ctx.run_url(&run.id));
    Ok(VersionResponse {
        version: Version::new(run.id),
        metadata,
    })
}
