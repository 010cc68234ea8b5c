//! `${name}` templating of run and apply messages with build metadata.

use std::sync::LazyLock;

use anyhow::{Result, bail};
use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("placeholder regex is valid")
});

/// Map a template name to the build environment variable that supplies it.
pub fn build_variable(name: &str) -> Option<&'static str> {
    match name {
        "id" => Some("BUILD_ID"),
        "number" => Some("BUILD_NAME"),
        "job" => Some("BUILD_JOB_NAME"),
        "pipeline" => Some("BUILD_PIPELINE_NAME"),
        "team" => Some("BUILD_TEAM_NAME"),
        "url" => Some("ATC_EXTERNAL_URL"),
        _ => None,
    }
}

/// Expand `${name}` / `$name` placeholders.
///
/// `lookup` receives the environment variable name from [`build_variable`].
/// Unknown names and unset variables expand to the empty string; an
/// unterminated `${` is an error.
pub fn render_message<F>(template: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let leftover = PLACEHOLDER.replace_all(template, "");
    if let Some(pos) = leftover.find("${") {
        bail!("unterminated placeholder near byte {pos} in {template:?}");
    }
    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        build_variable(name).and_then(&lookup).unwrap_or_default()
    });
    Ok(rendered.into_owned())
}

/// Render with the process environment.
pub fn render_from_env(template: &str) -> Result<String> {
    render_message(template, |var| std::env::var(var).ok())
}
