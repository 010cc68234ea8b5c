//! `in`: wait for a run to finish and stage its workspace into a directory.
//!
//! Layout of the destination directory:
//!
//! ```text
//! env_vars/<key>      environment variables
//! vars/<key>          execution variables
//! vars/hcl/<key>      execution variables holding HCL
//! outputs/<name>      raw JSON value of each root output
//! outputs.json        every output, sensitive ones null unless requested
//! metadata.json       metadata of the finished run
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::value::RawValue;
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelToken;
use crate::context::ResourceContext;
use crate::core::metadata::run_metadata;
use crate::core::state::{OutputMap, root_outputs};
use crate::core::types::{RemoteVariable, VariableCategory, Version, VersionResponse};
use crate::io::input::Params;
use crate::io::output_files::{write_file, write_json_file};
use crate::io::remote::{RemoteService, StateSource};
use crate::lifecycle::{PollConfig, wait_for_run};
use crate::reconcile::fetch_remote_variables;

/// Run the `in` step for `version_ref` and return the response to print.
#[instrument(skip_all, fields(run_id = %version_ref, dir = %ctx.working_dir.display()))]
pub fn get_version<S: RemoteService>(
    ctx: &ResourceContext<S>,
    version_ref: &str,
    params: &Params,
    cancel: CancelToken,
) -> Result<VersionResponse> {
    if version_ref.is_empty() {
        bail!("no version requested");
    }

    let config = PollConfig {
        interval: Duration::from_secs(params.polling_period.max(1).unsigned_abs()),
        apply_comment: params.apply_comment().map(str::to_string),
        cancel,
    };
    let run = wait_for_run(&ctx.service, &ctx.workspace, version_ref, &config)?;

    let variables = fetch_remote_variables(&ctx.service, &ctx.workspace.id)?;
    write_variables(&ctx.working_dir, &variables)?;

    let outputs = current_outputs(&ctx.service, &ctx.workspace.id)?;
    write_outputs(&ctx.working_dir, &outputs, params.sensitive)?;

    let metadata = run_metadata(&run, ctx.run_url(&run.id));
    write_json_file(&ctx.working_dir.join("metadata.json"), &metadata)?;

    info!(
        status = %run.status,
        variables = variables.len(),
        outputs = outputs.len(),
        "version fetched"
    );
    Ok(VersionResponse {
        version: Version::new(run.id),
        metadata,
    })
}

/// Root outputs of the workspace's current state.
pub fn current_outputs<S: RemoteService>(service: &S, workspace_id: &str) -> Result<OutputMap> {
    let state = service
        .current_state(workspace_id)
        .context("retrieving workspace state")?;
    match state {
        StateSource::Outputs(outputs) => Ok(outputs),
        StateSource::Snapshot(bytes) => root_outputs(&bytes),
    }
}

fn variable_path(dir: &Path, variable: &RemoteVariable) -> PathBuf {
    match (variable.category, variable.hcl) {
        (VariableCategory::Env, _) => dir.join("env_vars").join(&variable.key),
        (VariableCategory::Terraform, true) => dir.join("vars").join("hcl").join(&variable.key),
        (VariableCategory::Terraform, false) => dir.join("vars").join(&variable.key),
    }
}

/// A name usable as a single file name inside a staging directory.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn write_variables(dir: &Path, variables: &[RemoteVariable]) -> Result<()> {
    for variable in variables {
        if !is_plain_file_name(&variable.key) {
            warn!(key = %variable.key, "variable key is not a plain file name, skipping");
            continue;
        }
        let path = variable_path(dir, variable);
        write_file(&path, variable.value.as_bytes())?;
        debug!(key = %variable.key, category = variable.category.as_str(), "variable staged");
    }
    Ok(())
}

fn write_outputs(dir: &Path, outputs: &OutputMap, reveal_sensitive: bool) -> Result<()> {
    let mut summary: BTreeMap<&str, Option<Box<RawValue>>> = BTreeMap::new();
    for (name, output) in outputs {
        let redacted = output.sensitive && !reveal_sensitive;
        let contents = if redacted { "" } else { output.raw.as_str() };
        if is_plain_file_name(name) {
            write_file(&dir.join("outputs").join(name), contents.as_bytes())?;
        } else {
            warn!(output = %name, "output name is not a plain file name, skipping its file");
        }

        let value = if redacted {
            None
        } else {
            Some(
                RawValue::from_string(output.raw.clone())
                    .with_context(|| format!("encoding output {name:?}"))?,
            )
        };
        summary.insert(name.as_str(), value);
    }
    write_json_file(&dir.join("outputs.json"), &summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RunStatus;
    use crate::test_support::{
        Op, ScriptedService, StepDir, output, remote_variable, run_with_status, source,
    };

    fn params() -> Params {
        Params {
            polling_period: 1,
            ..Params::default()
        }
    }

    fn context(service: ScriptedService, dir: PathBuf) -> ResourceContext<ScriptedService> {
        ResourceContext::connect(service, source(), dir).expect("connect")
    }

    fn outputs() -> OutputMap {
        OutputMap::from([
            ("region".to_string(), output("\"eu-west-1\"", false)),
            ("password".to_string(), output("\"hunter2\"", true)),
            ("ports".to_string(), output("[80, 443]", false)),
        ])
    }

    #[test]
    fn stages_variables_outputs_and_metadata() {
        let dir = StepDir::new().expect("dir");
        let mut hcl = remote_variable("var-2", "tags", VariableCategory::Terraform);
        hcl.hcl = true;
        hcl.value = "{ team = \"infra\" }".to_string();
        let mut env = remote_variable("var-3", "AWS_REGION", VariableCategory::Env);
        env.value = "eu-west-1".to_string();
        let mut plain = remote_variable("var-1", "name", VariableCategory::Terraform);
        plain.value = "demo".to_string();

        let service = ScriptedService::new()
            .with_run_reads(vec![run_with_status("run-1", RunStatus::Applied)])
            .with_variables(vec![plain, hcl, env])
            .with_state(StateSource::Outputs(outputs()));
        let ctx = context(service, dir.path().to_path_buf());

        let response = get_version(&ctx, "run-1", &params(), CancelToken::new()).expect("get");
        assert_eq!(response.version.reference, "run-1");
        assert_eq!(response.metadata[1].value, "applied");

        assert_eq!(dir.read("vars/name").as_deref(), Some("demo"));
        assert_eq!(dir.read("vars/hcl/tags").as_deref(), Some("{ team = \"infra\" }"));
        assert_eq!(dir.read("env_vars/AWS_REGION").as_deref(), Some("eu-west-1"));

        assert_eq!(dir.read("outputs/region").as_deref(), Some("\"eu-west-1\""));
        assert_eq!(dir.read("outputs/ports").as_deref(), Some("[80, 443]"));
        assert_eq!(dir.read("outputs/password").as_deref(), Some(""));

        let summary: serde_json::Value =
            serde_json::from_str(&dir.read("outputs.json").expect("outputs.json")).expect("json");
        assert_eq!(summary["region"], "eu-west-1");
        assert_eq!(summary["ports"], serde_json::json!([80, 443]));
        assert!(summary["password"].is_null());

        let metadata: serde_json::Value =
            serde_json::from_str(&dir.read("metadata.json").expect("metadata.json")).expect("json");
        assert_eq!(metadata[3]["name"], "run_url");
        assert_eq!(
            metadata[3]["value"],
            "https://tfe.example.com/app/acme/workspaces/foo/runs/run-1"
        );
    }

    #[test]
    fn sensitive_outputs_are_written_on_request() {
        let dir = StepDir::new().expect("dir");
        let service = ScriptedService::new()
            .with_run_reads(vec![run_with_status("run-1", RunStatus::Applied)])
            .with_state(StateSource::Outputs(outputs()));
        let ctx = context(service, dir.path().to_path_buf());
        let params = Params {
            sensitive: true,
            ..params()
        };

        get_version(&ctx, "run-1", &params, CancelToken::new()).expect("get");
        assert_eq!(dir.read("outputs/password").as_deref(), Some("\"hunter2\""));
        let summary: serde_json::Value =
            serde_json::from_str(&dir.read("outputs.json").expect("outputs.json")).expect("json");
        assert_eq!(summary["password"], "hunter2");
    }

    #[test]
    fn snapshot_bytes_are_decoded() {
        let dir = StepDir::new().expect("dir");
        let snapshot = br#"{"version": 4, "outputs": {"a": {"value": 1, "type": "number", "sensitive": false}}}"#;
        let service = ScriptedService::new()
            .with_run_reads(vec![run_with_status("run-1", RunStatus::PlannedAndFinished)])
            .with_state(StateSource::Snapshot(snapshot.to_vec()));
        let ctx = context(service, dir.path().to_path_buf());

        get_version(&ctx, "run-1", &params(), CancelToken::new()).expect("get");
        assert_eq!(dir.read("outputs/a").as_deref(), Some("1"));
    }

    #[test]
    fn state_failure_is_wrapped() {
        let dir = StepDir::new().expect("dir");
        let service = ScriptedService::new()
            .with_run_reads(vec![run_with_status("run-1", RunStatus::Applied)])
            .failing(Op::CurrentState, "NO");
        let ctx = context(service, dir.path().to_path_buf());

        let err = get_version(&ctx, "run-1", &params(), CancelToken::new()).unwrap_err();
        assert_eq!(format!("{err:#}"), "retrieving workspace state: NO");
        assert_eq!(dir.read("metadata.json"), None);
    }

    #[test]
    fn run_failure_writes_nothing() {
        let dir = StepDir::new().expect("dir");
        let service = ScriptedService::new().failing(Op::ReadRun, "gone");
        let ctx = context(service, dir.path().to_path_buf());

        let err = get_version(&ctx, "run-1", &params(), CancelToken::new()).unwrap_err();
        assert_eq!(format!("{err:#}"), "retrieving run: gone");
        assert_eq!(dir.read("metadata.json"), None);
        assert!(ctx.service.calls_of(Op::ListVariables).is_empty());
    }

    #[test]
    fn missing_version_is_rejected() {
        let service = ScriptedService::new();
        let ctx = context(service, PathBuf::from("."));
        let err = get_version(&ctx, "", &params(), CancelToken::new()).unwrap_err();
        assert_eq!(format!("{err:#}"), "no version requested");
        assert!(ctx.service.calls_of(Op::ReadRun).is_empty());
    }

    #[test]
    fn names_escaping_the_directory_are_skipped() {
        let dir = StepDir::new().expect("dir");
        let staging = dir.path().join("get");
        let escaping = remote_variable("var-1", "../../escaped", VariableCategory::Terraform);
        let mut kept = remote_variable("var-2", "kept", VariableCategory::Env);
        kept.value = "yes".to_string();
        let service = ScriptedService::new()
            .with_run_reads(vec![run_with_status("run-1", RunStatus::Applied)])
            .with_variables(vec![escaping, kept])
            .with_state(StateSource::Outputs(OutputMap::from([
                ("../leak".to_string(), output("1", false)),
                ("ok".to_string(), output("2", false)),
            ])));
        let ctx = context(service, staging);

        get_version(&ctx, "run-1", &params(), CancelToken::new()).expect("get");
        assert_eq!(dir.read("escaped"), None);
        assert_eq!(dir.read("get/leak"), None);
        assert_eq!(dir.read("get/env_vars/kept").as_deref(), Some("yes"));
        assert_eq!(dir.read("get/outputs/ok").as_deref(), Some("2"));

        let summary: serde_json::Value =
            serde_json::from_str(&dir.read("get/outputs.json").expect("outputs.json"))
                .expect("json");
        assert_eq!(summary["../leak"], 1);
    }

    #[test]
    fn plain_file_names() {
        assert!(is_plain_file_name("AWS_REGION"));
        assert!(is_plain_file_name("my.output"));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("a/b"));
        assert!(!is_plain_file_name("a\\b"));
    }
}
