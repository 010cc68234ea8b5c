//! Resource request payload read from stdin.
//!
//! The payload is the only configuration this resource has. Every problem is
//! collected up front by [`Input::validate`] and reported together, so a
//! pipeline author sees all mistakes in one failed build.

use std::collections::BTreeMap;
use std::io::Read;

use anyhow::{Context, Result, bail};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::core::message::render_from_env;
use crate::core::types::{VariableCategory, VariableSpec, Version};

pub const DEFAULT_ADDRESS: &str = "https://app.terraform.io";
pub const DEFAULT_MESSAGE: &str = "Queued by ${pipeline}/${job} (${number})";
pub const DEFAULT_POLLING_PERIOD_SECS: i64 = 5;

/// Full request: `{source, params, version}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Input {
    pub source: Source,
    pub params: Params,
    /// `null` on the first `check` of a pipeline.
    pub version: Option<Version>,
}

/// Where the workspace lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Source {
    pub workspace: String,
    pub organization: String,
    pub token: String,
    pub address: String,
}

impl Default for Source {
    fn default() -> Self {
        Self {
            workspace: String::new(),
            organization: String::new(),
            token: String::new(),
            address: DEFAULT_ADDRESS.to_string(),
        }
    }
}

/// Step parameters for `in` and `out`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Params {
    /// Execution-scoped variables pushed by `out`.
    pub vars: BTreeMap<String, VariableSpec>,
    /// Environment-scoped variables pushed by `out`.
    pub env_vars: BTreeMap<String, VariableSpec>,
    /// Message of the run created by `out`.
    pub message: String,
    /// Comment attached when `in` confirms a run.
    pub apply_message: String,
    /// Accepted for payload compatibility; confirmation follows the run's own gates.
    pub confirm: bool,
    /// Seconds between status polls in `in`.
    pub polling_period: i64,
    /// Write sensitive output values instead of empty files.
    pub sensitive: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            vars: BTreeMap::new(),
            env_vars: BTreeMap::new(),
            message: DEFAULT_MESSAGE.to_string(),
            apply_message: String::new(),
            confirm: false,
            polling_period: DEFAULT_POLLING_PERIOD_SECS,
            sensitive: false,
        }
    }
}

/// Declared variables of both namespaces, with each namespace's default category.
#[derive(Debug, Clone, Copy)]
pub struct DeclaredVariables<'a> {
    pub execution: &'a BTreeMap<String, VariableSpec>,
    pub environment: &'a BTreeMap<String, VariableSpec>,
}

impl<'a> DeclaredVariables<'a> {
    /// Every declared variable with its effective category, execution-scoped first.
    pub fn iter(self) -> impl Iterator<Item = (&'a str, &'a VariableSpec, VariableCategory)> + 'a {
        let execution = self.execution.iter().map(|(key, spec)| {
            let category = spec.category.unwrap_or(VariableCategory::Terraform);
            (key.as_str(), spec, category)
        });
        let environment = self.environment.iter().map(|(key, spec)| {
            let category = spec.category.unwrap_or(VariableCategory::Env);
            (key.as_str(), spec, category)
        });
        execution.chain(environment)
    }

    pub fn len(&self) -> usize {
        self.execution.len() + self.environment.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Params {
    pub fn declared_variables(&self) -> DeclaredVariables<'_> {
        DeclaredVariables {
            execution: &self.vars,
            environment: &self.env_vars,
        }
    }

    /// Non-empty apply comment, if any.
    pub fn apply_comment(&self) -> Option<&str> {
        Some(self.apply_message.as_str()).filter(|message| !message.is_empty())
    }
}

impl Input {
    /// Decode a payload. Unknown fields are rejected.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader).context("parse resource input")
    }

    /// Render message templates and collect every configuration problem.
    ///
    /// Templates are rendered in place even when other fields are invalid.
    pub fn validate(&mut self) -> Vec<String> {
        self.validate_with(render_from_env)
    }

    fn validate_with<F>(&mut self, render: F) -> Vec<String>
    where
        F: Fn(&str) -> Result<String>,
    {
        let mut errors = Vec::new();
        match render(&self.params.apply_message) {
            Ok(message) => self.params.apply_message = message,
            Err(err) => errors.push(format!("invalid apply message ({err:#})")),
        }
        match render(&self.params.message) {
            Ok(message) => self.params.message = message,
            Err(err) => errors.push(format!("invalid run message ({err:#})")),
        }
        if Url::parse(&self.source.address).is_err() {
            errors.push(format!("{:?} is not a valid URL", self.source.address));
        }
        if self.source.workspace.is_empty() {
            errors.push("workspace is not set".to_string());
        }
        if self.source.organization.is_empty() {
            errors.push("organization is not set".to_string());
        }
        if self.source.token.is_empty() {
            errors.push("token is not set".to_string());
        }
        if self.params.polling_period < 1 {
            errors.push("polling_period must be at least 1 second".to_string());
        }
        errors
    }

    /// Reference of the requested version, empty when none was given.
    pub fn version_ref(&self) -> &str {
        self.version
            .as_ref()
            .map(|version| version.reference.as_str())
            .unwrap_or_default()
    }
}

/// Read, decode and validate the payload, logging each problem before failing once.
pub fn load_input<R: Read>(reader: R) -> Result<Input> {
    let mut input = Input::from_reader(reader)?;
    let errors = input.validate();
    if !errors.is_empty() {
        for problem in &errors {
            error!("error in configuration: {problem}");
        }
        bail!("invalid configuration provided:\n- {}", errors.join("\n- "));
    }
    debug!(
        workspace = %input.source.workspace,
        organization = %input.source.organization,
        address = %input.source.address,
        "input loaded"
    );
    Ok(input)
}
