//! Staging of files in the step's output directory.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

/// Write `contents` to `path`, creating parent directories as needed.
pub fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    debug!(path = %path.display(), bytes = contents.len(), "file written");
    Ok(())
}

/// Serialize `value` to pretty-printed JSON with trailing newline and write it.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value)
        .with_context(|| format!("serializing {}", path.display()))?;
    payload.push('\n');
    write_file(path, payload.as_bytes())
}
