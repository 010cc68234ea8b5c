//! Blocking HTTP implementation of [`RemoteService`] for the TFE API v2.
//!
//! Responses are JSON:API documents; the private `*Data` types below only
//! model the attributes and relationships this resource reads.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::core::state::OutputMap;
use crate::core::types::{
    CostEstimate, OutputValue, RemoteVariable, Run, RunStatus, VariableCategory, Workspace,
};
use crate::io::remote::{PageRequest, RemoteService, StateSource, VariableCreate, VariableUpdate};

const JSON_API: &str = "application/vnd.api+json";
const USER_AGENT: &str = concat!("tfe-resource/", env!("CARGO_PKG_VERSION"));
/// Per-request timeout. Runs themselves may take far longer; only single calls are bounded.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// TFE API client authenticated with a bearer token.
pub struct TfeClient {
    client: Client,
    base: String,
    token: String,
}

impl fmt::Debug for TfeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TfeClient")
            .field("base", &self.base)
            .finish()
    }
}

impl TfeClient {
    pub fn new(address: &str, token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("creating tfe client")?;
        Ok(Self {
            client,
            base: format!("{}/api/v2", address.trim_end_matches('/')),
            token: token.to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base, path))
            .bearer_auth(&self.token)
            .header(ACCEPT, JSON_API)
    }

    fn with_body(request: RequestBuilder, body: &Value) -> Result<RequestBuilder> {
        let payload = serde_json::to_vec(body).context("serialize request body")?;
        Ok(request.header(CONTENT_TYPE, JSON_API).body(payload))
    }

    fn send(&self, request: RequestBuilder, method: &Method, path: &str) -> Result<Response> {
        debug!(%method, path, "tfe request");
        let response = request
            .send()
            .with_context(|| format!("{method} {path}"))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        bail!("{method} {path} returned {status}{}", describe_errors(&body))
    }

    fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        configure: impl FnOnce(RequestBuilder) -> Result<RequestBuilder>,
    ) -> Result<T> {
        let request = configure(self.request(method.clone(), path))?;
        let response = self.send(request, &method, path)?;
        let bytes = response
            .bytes()
            .with_context(|| format!("read response of {method} {path}"))?;
        serde_json::from_slice(&bytes).with_context(|| format!("parse response of {method} {path}"))
    }
}

impl RemoteService for TfeClient {
    #[instrument(skip_all, fields(organization = %organization, name = %name))]
    fn read_workspace(&self, organization: &str, name: &str) -> Result<Workspace> {
        let path = format!("/organizations/{organization}/workspaces/{name}");
        let doc: Document<WorkspaceData> = self.fetch(Method::GET, &path, |req| {
            Ok(req.query(&[("include", "organization")]))
        })?;
        let cost_estimation_enabled = doc
            .included_attributes::<OrganizationAttributes>("organizations")?
            .first()
            .map(|(_, attrs)| attrs.cost_estimation_enabled)
            .unwrap_or(false);
        Ok(Workspace {
            id: doc.data.id,
            cost_estimation_enabled,
        })
    }

    #[instrument(skip_all, fields(workspace_id = %workspace_id, page = page.number))]
    fn list_runs(&self, workspace_id: &str, page: PageRequest) -> Result<Vec<Run>> {
        let path = format!("/workspaces/{workspace_id}/runs");
        let doc: Document<Vec<RunData>> = self.fetch(Method::GET, &path, |req| {
            Ok(req.query(&page_query(page)))
        })?;
        let costs = doc.cost_estimates()?;
        Ok(doc
            .data
            .into_iter()
            .map(|data| data.into_run(&costs))
            .collect())
    }

    #[instrument(skip_all, fields(run_id = %run_id))]
    fn read_run(&self, run_id: &str) -> Result<Run> {
        let path = format!("/runs/{run_id}");
        let doc: Document<RunData> = self.fetch(Method::GET, &path, |req| {
            Ok(req.query(&[("include", "cost_estimate")]))
        })?;
        let costs = doc.cost_estimates()?;
        Ok(doc.data.into_run(&costs))
    }

    #[instrument(skip_all, fields(run_id = %run_id))]
    fn apply_run(&self, run_id: &str, comment: Option<&str>) -> Result<()> {
        let path = format!("/runs/{run_id}/actions/apply");
        let body = match comment {
            Some(comment) => json!({ "comment": comment }),
            None => json!({}),
        };
        let request = Self::with_body(self.request(Method::POST, &path), &body)?;
        self.send(request, &Method::POST, &path)?;
        Ok(())
    }

    #[instrument(skip_all, fields(workspace_id = %workspace_id))]
    fn create_run(&self, workspace_id: &str, message: &str) -> Result<Run> {
        let body = json!({
            "data": {
                "type": "runs",
                "attributes": { "message": message },
                "relationships": {
                    "workspace": { "data": { "type": "workspaces", "id": workspace_id } }
                }
            }
        });
        let doc: Document<RunData> =
            self.fetch(Method::POST, "/runs", |req| Self::with_body(req, &body))?;
        let costs = doc.cost_estimates()?;
        Ok(doc.data.into_run(&costs))
    }

    #[instrument(skip_all, fields(workspace_id = %workspace_id, page = page.number))]
    fn list_variables(
        &self,
        workspace_id: &str,
        page: PageRequest,
    ) -> Result<Vec<RemoteVariable>> {
        let path = format!("/workspaces/{workspace_id}/vars");
        let doc: Document<Vec<VariableData>> = self.fetch(Method::GET, &path, |req| {
            Ok(req.query(&page_query(page)))
        })?;
        Ok(doc.data.into_iter().map(VariableData::into_variable).collect())
    }

    #[instrument(skip_all, fields(workspace_id = %workspace_id, key = %create.key))]
    fn create_variable(
        &self,
        workspace_id: &str,
        create: &VariableCreate,
    ) -> Result<RemoteVariable> {
        let path = format!("/workspaces/{workspace_id}/vars");
        let body = json!({
            "data": {
                "type": "vars",
                "attributes": {
                    "key": create.key,
                    "value": create.value,
                    "description": create.description,
                    "category": create.category.as_str(),
                    "hcl": create.hcl,
                    "sensitive": create.sensitive,
                }
            }
        });
        let doc: Document<VariableData> =
            self.fetch(Method::POST, &path, |req| Self::with_body(req, &body))?;
        Ok(doc.data.into_variable())
    }

    #[instrument(skip_all, fields(workspace_id = %workspace_id, variable_id = %variable_id, key = %update.key))]
    fn update_variable(
        &self,
        workspace_id: &str,
        variable_id: &str,
        update: &VariableUpdate,
    ) -> Result<RemoteVariable> {
        let path = format!("/workspaces/{workspace_id}/vars/{variable_id}");
        let body = json!({
            "data": {
                "type": "vars",
                "id": variable_id,
                "attributes": {
                    "key": update.key,
                    "value": update.value,
                    "description": update.description,
                    "hcl": update.hcl,
                    "sensitive": update.sensitive,
                }
            }
        });
        let doc: Document<VariableData> =
            self.fetch(Method::PATCH, &path, |req| Self::with_body(req, &body))?;
        Ok(doc.data.into_variable())
    }

    #[instrument(skip_all, fields(workspace_id = %workspace_id))]
    fn current_state(&self, workspace_id: &str) -> Result<StateSource> {
        let path = format!("/workspaces/{workspace_id}/current-state-version");
        let doc: Document<StateVersionData> = self.fetch(Method::GET, &path, |req| {
            Ok(req.query(&[("include", "outputs")]))
        })?;

        let url = match locate_state(&doc)? {
            StateLocation::Outputs(outputs) => {
                debug!(outputs = outputs.len(), "state outputs returned directly");
                return Ok(StateSource::Outputs(outputs));
            }
            StateLocation::Download(url) => url,
        };
        let snapshot = self
            .client
            .get(url.as_str())
            .bearer_auth(&self.token)
            .send()
            .and_then(Response::error_for_status)
            .and_then(Response::bytes)
            .context("downloading state file")?;
        debug!(bytes = snapshot.len(), "state file downloaded");
        Ok(StateSource::Snapshot(snapshot.to_vec()))
    }
}

/// Where the root outputs of a state version can be read from.
#[derive(Debug, PartialEq, Eq)]
enum StateLocation {
    Outputs(OutputMap),
    Download(String),
}

/// Prefer the included outputs, unless the service withheld a sensitive value
/// (sent as `null`), in which case the full snapshot has to be downloaded.
fn locate_state(doc: &Document<StateVersionData>) -> Result<StateLocation> {
    let download = doc.data.attributes.hosted_state_download_url.clone();
    if !doc.data.relationships.outputs.data.is_empty() {
        let included = doc.included_attributes::<StateOutputAttributes>("state-version-outputs")?;
        let withheld = included
            .iter()
            .any(|(_, attrs)| attrs.sensitive && attrs.value.is_null());
        if !withheld || download.is_none() {
            let outputs = included
                .into_iter()
                .map(|(_, attrs)| {
                    let value = OutputValue {
                        raw: attrs.value.to_string(),
                        sensitive: attrs.sensitive,
                    };
                    (attrs.name, value)
                })
                .collect();
            return Ok(StateLocation::Outputs(outputs));
        }
        debug!("sensitive output values withheld, downloading state file");
    }
    match download {
        Some(url) => Ok(StateLocation::Download(url)),
        None => bail!("state version has neither outputs nor a download url"),
    }
}

fn page_query(page: PageRequest) -> [(&'static str, usize); 2] {
    [("page[number]", page.number), ("page[size]", page.size)]
}

/// Render JSON:API `errors` of a failed response, if any.
fn describe_errors(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorDocument {
        errors: Vec<ErrorObject>,
    }
    #[derive(Deserialize)]
    struct ErrorObject {
        title: Option<String>,
        detail: Option<String>,
    }

    let Ok(doc) = serde_json::from_str::<ErrorDocument>(body) else {
        return String::new();
    };
    let messages: Vec<String> = doc
        .errors
        .into_iter()
        .filter_map(|err| match (err.title, err.detail) {
            (Some(title), Some(detail)) => Some(format!("{title} ({detail})")),
            (Some(title), None) => Some(title),
            (None, detail) => detail,
        })
        .collect();
    if messages.is_empty() {
        String::new()
    } else {
        format!(": {}", messages.join("; "))
    }
}

#[derive(Deserialize)]
struct Document<T> {
    data: T,
    #[serde(default)]
    included: Vec<IncludedResource>,
}

#[derive(Deserialize)]
struct IncludedResource {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    attributes: Value,
}

impl<T> Document<T> {
    /// Decode the attributes of every included resource of `kind`, keyed by id.
    fn included_attributes<A: DeserializeOwned>(&self, kind: &str) -> Result<Vec<(String, A)>> {
        self.included
            .iter()
            .filter(|resource| resource.kind == kind)
            .map(|resource| {
                let attrs = A::deserialize(&resource.attributes)
                    .with_context(|| format!("parse included {} {}", kind, resource.id))?;
                Ok((resource.id.clone(), attrs))
            })
            .collect()
    }

    fn cost_estimates(&self) -> Result<Vec<(String, CostEstimate)>> {
        Ok(self
            .included_attributes::<CostEstimateAttributes>("cost-estimates")?
            .into_iter()
            .map(|(id, attrs)| {
                let estimate = CostEstimate {
                    proposed_monthly_cost: attrs.proposed_monthly_cost.unwrap_or_default(),
                    delta_monthly_cost: attrs.delta_monthly_cost.unwrap_or_default(),
                };
                (id, estimate)
            })
            .collect())
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ToMany {
    data: Vec<ResourceId>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ToOne {
    data: Option<ResourceId>,
}

#[derive(Deserialize)]
struct ResourceId {
    id: String,
}

#[derive(Deserialize)]
struct WorkspaceData {
    id: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
struct OrganizationAttributes {
    cost_estimation_enabled: bool,
}

#[derive(Deserialize)]
struct RunData {
    id: String,
    attributes: RunAttributes,
    #[serde(default)]
    relationships: RunRelationships,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RunAttributes {
    status: RunStatus,
    message: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    has_changes: bool,
    #[serde(default)]
    actions: RunActions,
    source: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
struct RunActions {
    is_confirmable: bool,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
struct RunRelationships {
    policy_checks: ToMany,
    cost_estimate: ToOne,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CostEstimateAttributes {
    proposed_monthly_cost: Option<String>,
    delta_monthly_cost: Option<String>,
}

impl RunData {
    fn into_run(self, costs: &[(String, CostEstimate)]) -> Run {
        let cost_estimate = self.relationships.cost_estimate.data.and_then(|estimate| {
            costs
                .iter()
                .find(|(id, _)| *id == estimate.id)
                .map(|(_, cost)| cost.clone())
        });
        Run {
            id: self.id,
            status: self.attributes.status,
            message: self.attributes.message.unwrap_or_default(),
            created_at: self.attributes.created_at,
            cost_estimate,
            is_confirmable: self.attributes.actions.is_confirmable,
            has_changes: self.attributes.has_changes,
            policy_checks: self
                .relationships
                .policy_checks
                .data
                .into_iter()
                .map(|check| check.id)
                .collect(),
            source: self.attributes.source.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct VariableData {
    id: String,
    attributes: VariableAttributes,
}

#[derive(Deserialize)]
struct VariableAttributes {
    key: String,
    value: Option<String>,
    description: Option<String>,
    category: VariableCategory,
    #[serde(default)]
    hcl: bool,
    #[serde(default)]
    sensitive: bool,
}

impl VariableData {
    fn into_variable(self) -> RemoteVariable {
        RemoteVariable {
            id: self.id,
            key: self.attributes.key,
            value: self.attributes.value.unwrap_or_default(),
            description: self.attributes.description.unwrap_or_default(),
            category: self.attributes.category,
            hcl: self.attributes.hcl,
            sensitive: self.attributes.sensitive,
        }
    }
}

#[derive(Deserialize)]
struct StateVersionData {
    attributes: StateVersionAttributes,
    #[serde(default)]
    relationships: StateVersionRelationships,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StateVersionAttributes {
    hosted_state_download_url: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct StateVersionRelationships {
    outputs: ToMany,
}

#[derive(Deserialize)]
struct StateOutputAttributes {
    name: String,
    #[serde(default)]
    sensitive: bool,
    #[serde(default)]
    value: Value,
}
