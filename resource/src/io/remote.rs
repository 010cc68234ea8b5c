//! Remote execution service abstraction.
//!
//! The [`RemoteService`] trait decouples the resource commands from the
//! HTTP backend (`io::tfe`). Tests use a scripted service that answers from
//! in-memory runs, variables and state without any network access.

use anyhow::Result;

use crate::core::state::OutputMap;
use crate::core::types::{RemoteVariable, Run, VariableCategory, Workspace};

/// Page size used for every paginated listing.
pub const PAGE_SIZE: usize = 100;

/// One page of a paginated listing. Page numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: usize,
    pub size: usize,
}

impl PageRequest {
    pub fn first(size: usize) -> Self {
        Self { number: 1, size }
    }

    pub fn next(self) -> Self {
        Self {
            number: self.number + 1,
            size: self.size,
        }
    }
}

/// Attributes of a variable to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableCreate {
    pub key: String,
    pub value: String,
    pub description: String,
    pub category: VariableCategory,
    pub hcl: bool,
    pub sensitive: bool,
}

/// Attributes written to an existing variable. The category is never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableUpdate {
    pub key: String,
    pub value: String,
    pub description: String,
    pub hcl: bool,
    pub sensitive: bool,
}

/// The current state of a workspace, in whichever shape the backend offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateSource {
    /// Raw snapshot bytes still to be decoded.
    Snapshot(Vec<u8>),
    /// Root outputs returned directly by the service.
    Outputs(OutputMap),
}

/// Operations consumed from the remote execution service.
pub trait RemoteService {
    /// Read a workspace by organization and name.
    fn read_workspace(&self, organization: &str, name: &str) -> Result<Workspace>;

    /// List one page of a workspace's runs, newest first.
    fn list_runs(&self, workspace_id: &str, page: PageRequest) -> Result<Vec<Run>>;

    fn read_run(&self, run_id: &str) -> Result<Run>;

    /// Confirm a run so it proceeds to apply.
    fn apply_run(&self, run_id: &str, comment: Option<&str>) -> Result<()>;

    fn create_run(&self, workspace_id: &str, message: &str) -> Result<Run>;

    fn list_variables(&self, workspace_id: &str, page: PageRequest)
    -> Result<Vec<RemoteVariable>>;

    fn create_variable(&self, workspace_id: &str, create: &VariableCreate)
    -> Result<RemoteVariable>;

    fn update_variable(
        &self,
        workspace_id: &str,
        variable_id: &str,
        update: &VariableUpdate,
    ) -> Result<RemoteVariable>;

    fn current_state(&self, workspace_id: &str) -> Result<StateSource>;
}
