//! Test-only helpers: a scripted remote service and fixture builders.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;

use anyhow::{Result, anyhow, bail};
use chrono::DateTime;
use tempfile::TempDir;

use crate::core::state::OutputMap;
use crate::core::types::{
    OutputValue, RemoteVariable, Run, RunStatus, VariableCategory, VariableSpec, Workspace,
};
use crate::io::input::Source;
use crate::io::remote::{PageRequest, RemoteService, StateSource, VariableCreate, VariableUpdate};

/// Service operations, used to inject failures and filter recorded calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ReadWorkspace,
    ListRuns,
    ReadRun,
    ApplyRun,
    CreateRun,
    ListVariables,
    CreateVariable,
    UpdateVariable,
    CurrentState,
}

/// A recorded service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ReadWorkspace { organization: String, name: String },
    ListRuns { workspace_id: String, page: PageRequest },
    ReadRun { run_id: String },
    ApplyRun { run_id: String, comment: Option<String> },
    CreateRun { workspace_id: String, message: String },
    ListVariables { workspace_id: String, page: PageRequest },
    CreateVariable { workspace_id: String, create: VariableCreate },
    UpdateVariable { workspace_id: String, variable_id: String, update: VariableUpdate },
    CurrentState { workspace_id: String },
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Call::ReadWorkspace { .. } => Op::ReadWorkspace,
            Call::ListRuns { .. } => Op::ListRuns,
            Call::ReadRun { .. } => Op::ReadRun,
            Call::ApplyRun { .. } => Op::ApplyRun,
            Call::CreateRun { .. } => Op::CreateRun,
            Call::ListVariables { .. } => Op::ListVariables,
            Call::CreateVariable { .. } => Op::CreateVariable,
            Call::UpdateVariable { .. } => Op::UpdateVariable,
            Call::CurrentState { .. } => Op::CurrentState,
        }
    }
}

/// In-memory [`RemoteService`] answering from scripted data and recording every call.
///
/// `read_run` pops scripted responses in order and keeps repeating the last
/// one; without scripted reads it looks the id up among the listed runs.
#[derive(Debug)]
pub struct ScriptedService {
    workspace: Workspace,
    runs: Vec<Run>,
    run_reads: RefCell<VecDeque<Run>>,
    variables: Vec<RemoteVariable>,
    state: StateSource,
    created_run: Run,
    failures: HashMap<Op, String>,
    calls: RefCell<Vec<Call>>,
}

impl Default for ScriptedService {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedService {
    pub fn new() -> Self {
        Self {
            workspace: Workspace {
                id: "ws-foo".to_string(),
                cost_estimation_enabled: false,
            },
            runs: Vec::new(),
            run_reads: RefCell::new(VecDeque::new()),
            variables: Vec::new(),
            state: StateSource::Outputs(OutputMap::new()),
            created_run: run("run-new"),
            failures: HashMap::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Runs listed newest first.
    pub fn with_runs(mut self, ids: &[&str]) -> Self {
        self.runs = ids.iter().map(|id| run(id)).collect();
        self
    }

    /// Successive answers of `read_run`.
    pub fn with_run_reads(self, reads: Vec<Run>) -> Self {
        *self.run_reads.borrow_mut() = reads.into();
        self
    }

    pub fn with_variables(mut self, variables: Vec<RemoteVariable>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_state(mut self, state: StateSource) -> Self {
        self.state = state;
        self
    }

    pub fn with_cost_estimation(mut self, enabled: bool) -> Self {
        self.workspace.cost_estimation_enabled = enabled;
        self
    }

    pub fn with_created_run(mut self, run: Run) -> Self {
        self.created_run = run;
        self
    }

    /// Make every call of `op` fail with `message`.
    pub fn failing(mut self, op: Op, message: &str) -> Self {
        self.failures.insert(op, message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn calls_of(&self, op: Op) -> Vec<Call> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.op() == op)
            .cloned()
            .collect()
    }

    fn record(&self, call: Call) -> Result<()> {
        let op = call.op();
        self.calls.borrow_mut().push(call);
        match self.failures.get(&op) {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }
}

fn page_of<T: Clone>(items: &[T], page: PageRequest) -> Vec<T> {
    items
        .iter()
        .skip((page.number - 1) * page.size)
        .take(page.size)
        .cloned()
        .collect()
}

impl RemoteService for ScriptedService {
    fn read_workspace(&self, organization: &str, name: &str) -> Result<Workspace> {
        self.record(Call::ReadWorkspace {
            organization: organization.to_string(),
            name: name.to_string(),
        })?;
        Ok(self.workspace.clone())
    }

    fn list_runs(&self, workspace_id: &str, page: PageRequest) -> Result<Vec<Run>> {
        self.record(Call::ListRuns {
            workspace_id: workspace_id.to_string(),
            page,
        })?;
        Ok(page_of(&self.runs, page))
    }

    fn read_run(&self, run_id: &str) -> Result<Run> {
        self.record(Call::ReadRun {
            run_id: run_id.to_string(),
        })?;
        let mut reads = self.run_reads.borrow_mut();
        if reads.len() > 1 {
            return reads.pop_front().ok_or_else(|| anyhow!("no scripted read"));
        }
        if let Some(last) = reads.front() {
            return Ok(last.clone());
        }
        match self.runs.iter().find(|run| run.id == run_id) {
            Some(run) => Ok(run.clone()),
            None => bail!("run {run_id} not found"),
        }
    }

    fn apply_run(&self, run_id: &str, comment: Option<&str>) -> Result<()> {
        self.record(Call::ApplyRun {
            run_id: run_id.to_string(),
            comment: comment.map(str::to_string),
        })
    }

    fn create_run(&self, workspace_id: &str, message: &str) -> Result<Run> {
        self.record(Call::CreateRun {
            workspace_id: workspace_id.to_string(),
            message: message.to_string(),
        })?;
        let mut created = self.created_run.clone();
        created.message = message.to_string();
        Ok(created)
    }

    fn list_variables(&self, workspace_id: &str, page: PageRequest) -> Result<Vec<RemoteVariable>> {
        self.record(Call::ListVariables {
            workspace_id: workspace_id.to_string(),
            page,
        })?;
        Ok(page_of(&self.variables, page))
    }

    fn create_variable(
        &self,
        workspace_id: &str,
        create: &VariableCreate,
    ) -> Result<RemoteVariable> {
        self.record(Call::CreateVariable {
            workspace_id: workspace_id.to_string(),
            create: create.clone(),
        })?;
        Ok(RemoteVariable {
            id: format!("var-{}", create.key),
            key: create.key.clone(),
            value: create.value.clone(),
            description: create.description.clone(),
            category: create.category,
            hcl: create.hcl,
            sensitive: create.sensitive,
        })
    }

    fn update_variable(
        &self,
        workspace_id: &str,
        variable_id: &str,
        update: &VariableUpdate,
    ) -> Result<RemoteVariable> {
        self.record(Call::UpdateVariable {
            workspace_id: workspace_id.to_string(),
            variable_id: variable_id.to_string(),
            update: update.clone(),
        })?;
        let existing = self
            .variables
            .iter()
            .find(|variable| variable.id == variable_id)
            .ok_or_else(|| anyhow!("variable {variable_id} not found"))?;
        Ok(RemoteVariable {
            value: update.value.clone(),
            description: update.description.clone(),
            hcl: update.hcl,
            sensitive: update.sensitive,
            ..existing.clone()
        })
    }

    fn current_state(&self, workspace_id: &str) -> Result<StateSource> {
        self.record(Call::CurrentState {
            workspace_id: workspace_id.to_string(),
        })?;
        Ok(self.state.clone())
    }
}

/// A pending run with deterministic defaults.
pub fn run(id: &str) -> Run {
    Run {
        id: id.to_string(),
        status: RunStatus::Pending,
        message: String::new(),
        created_at: DateTime::from_timestamp(1_714_557_600, 0).expect("valid timestamp"),
        cost_estimate: None,
        is_confirmable: false,
        has_changes: false,
        policy_checks: Vec::new(),
        source: "tfe-api".to_string(),
    }
}

pub fn run_with_status(id: &str, status: RunStatus) -> Run {
    Run {
        status,
        ..run(id)
    }
}

pub fn remote_variable(id: &str, key: &str, category: VariableCategory) -> RemoteVariable {
    RemoteVariable {
        id: id.to_string(),
        key: key.to_string(),
        value: String::new(),
        description: String::new(),
        category,
        hcl: false,
        sensitive: false,
    }
}

/// A declared variable with a literal value.
pub fn spec(value: &str) -> VariableSpec {
    VariableSpec {
        value: value.to_string(),
        ..VariableSpec::default()
    }
}

pub fn output(raw: &str, sensitive: bool) -> OutputValue {
    OutputValue {
        raw: raw.to_string(),
        sensitive,
    }
}

/// Source for workspace `foo` of organization `acme`.
pub fn source() -> Source {
    Source {
        workspace: "foo".to_string(),
        organization: "acme".to_string(),
        token: "token".to_string(),
        address: "https://tfe.example.com".to_string(),
    }
}

/// Temporary step directory with read helpers.
pub struct StepDir {
    temp: TempDir,
}

impl StepDir {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Contents of a file relative to the directory, `None` if it does not exist.
    pub fn read(&self, relative: &str) -> Option<String> {
        fs::read_to_string(self.temp.path().join(relative)).ok()
    }

    pub fn write(&self, relative: &str, contents: &str) -> Result<()> {
        let path = self.temp.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }
}
