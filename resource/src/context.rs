//! Per-invocation context shared by the resource commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::metadata::run_url;
use crate::core::types::Workspace;
use crate::io::input::Source;
use crate::io::remote::RemoteService;
use crate::io::tfe::TfeClient;

/// Everything a command needs: the service, the resolved workspace, the
/// source configuration and the step's working directory.
///
/// Built once per invocation; the workspace is never re-read.
#[derive(Debug)]
pub struct ResourceContext<S> {
    pub service: S,
    pub workspace: Workspace,
    pub source: Source,
    /// `in` destination or `out` source directory. `check` uses the current directory.
    pub working_dir: PathBuf,
}

impl<S: RemoteService> ResourceContext<S> {
    /// Resolve the workspace named in `source` through `service`.
    #[instrument(skip_all, fields(organization = %source.organization, workspace = %source.workspace))]
    pub fn connect(service: S, source: Source, working_dir: PathBuf) -> Result<Self> {
        let workspace = service
            .read_workspace(&source.organization, &source.workspace)
            .context("getting workspace")?;
        info!(
            workspace_id = %workspace.id,
            cost_estimation_enabled = workspace.cost_estimation_enabled,
            "workspace resolved"
        );
        Ok(Self {
            service,
            workspace,
            source,
            working_dir,
        })
    }

    /// URL of a run of this workspace in the service UI.
    pub fn run_url(&self, run_id: &str) -> String {
        run_url(
            &self.source.address,
            &self.source.organization,
            &self.source.workspace,
            run_id,
        )
    }
}

impl ResourceContext<TfeClient> {
    /// Connect to the service described by `source` over HTTP.
    pub fn from_source(source: Source, working_dir: PathBuf) -> Result<Self> {
        let client = TfeClient::new(&source.address, &source.token)?;
        Self::connect(client, source, working_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedService, source};

    #[test]
    fn connect_reads_workspace_once() {
        let service = ScriptedService::new().with_cost_estimation(true);
        let ctx = ResourceContext::connect(service, source(), PathBuf::from(".")).expect("connect");
        assert_eq!(ctx.workspace.id, "ws-foo");
        assert!(ctx.workspace.cost_estimation_enabled);
        assert_eq!(
            ctx.run_url("run-1"),
            "https://tfe.example.com/app/acme/workspaces/foo/runs/run-1"
        );
    }

    #[test]
    fn connect_failure_names_the_workspace_lookup() {
        let service = ScriptedService::new().failing(crate::test_support::Op::ReadWorkspace, "NO");
        let err = ResourceContext::connect(service, source(), PathBuf::from(".")).unwrap_err();
        assert_eq!(format!("{err:#}"), "getting workspace: NO");
    }
}
