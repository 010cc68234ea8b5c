//! Resource binary: `check`, `in` and `out` for a CI pipeline.
//!
//! Installed under the names `check`, `in` and `out`, the executable picks its
//! command from the name it was invoked as.

use std::env;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tfe_resource::cancel::{CancelToken, Cancelled};
use tfe_resource::check::discover_versions;
use tfe_resource::context::ResourceContext;
use tfe_resource::exit_codes;
use tfe_resource::get::get_version;
use tfe_resource::io::input::load_input;
use tfe_resource::logging;
use tfe_resource::put::put_version;

const BIN_NAME: &str = "tfe-resource";
const COMMAND_NAMES: &[&str] = &["check", "in", "out"];

#[derive(Parser)]
#[command(
    name = "tfe-resource",
    version,
    about = "CI resource for remote Terraform workspaces"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the run ids newer than the requested version.
    Check,
    /// Wait for the requested run and stage the workspace into a directory.
    In {
        /// Destination directory.
        dir: PathBuf,
    },
    /// Push variables and queue a run.
    Out {
        /// Directory holding the pipeline's inputs.
        dir: PathBuf,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        let code = if err.downcast_ref::<Cancelled>().is_some() {
            exit_codes::CANCELLED
        } else {
            exit_codes::FAILED
        };
        std::process::exit(code);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse_from(resource_args(env::args_os()));
    logging::init();

    let input = load_input(io::stdin().lock())?;
    match cli.command {
        Command::Check => {
            let working_dir = env::current_dir().context("resolve current directory")?;
            let ctx = ResourceContext::from_source(input.source.clone(), working_dir)?;
            let versions = discover_versions(&ctx.service, &ctx.workspace.id, input.version_ref())?;
            print_json(&versions)
        }
        Command::In { dir } => {
            let ctx = ResourceContext::from_source(input.source.clone(), dir)?;
            let response =
                get_version(&ctx, input.version_ref(), &input.params, CancelToken::new())?;
            print_json(&response)
        }
        Command::Out { dir } => {
            let ctx = ResourceContext::from_source(input.source.clone(), dir)?;
            let response = put_version(&ctx, &input.params)?;
            print_json(&response)
        }
    }
}

/// Turn `/opt/resource/in <dir>` into `tfe-resource in <dir>`.
fn resource_args<I: IntoIterator<Item = OsString>>(args: I) -> Vec<OsString> {
    let mut args: Vec<OsString> = args.into_iter().collect();
    let invoked_as = args
        .first()
        .and_then(|arg0| Path::new(arg0).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| COMMAND_NAMES.contains(name))
        .map(str::to_string);
    if let Some(command) = invoked_as {
        args.splice(0..1, [OsString::from(BIN_NAME), OsString::from(command)]);
    }
    args
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value).context("write response")?;
    writeln!(stdout).context("write response")?;
    Ok(())
}
