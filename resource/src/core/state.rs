//! Root output extraction from versioned state snapshots.
//!
//! Snapshot schemas are looked up by their integer `version` in [`DECODERS`].
//! Every decoder yields the same [`OutputMap`] shape, so callers never care
//! which schema a workspace happens to store.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde_json::value::RawValue;

use crate::core::types::OutputValue;

/// Output name to value.
pub type OutputMap = BTreeMap<String, OutputValue>;

type Decoder = fn(&[u8]) -> Result<OutputMap>;

/// Registered snapshot schemas, keyed by `version`.
const DECODERS: &[(i64, Decoder)] = &[
    (2, decode_module_outputs),
    (3, decode_module_outputs),
    (4, decode_root_outputs),
];

#[derive(Deserialize)]
struct VersionTag {
    version: i64,
}

#[derive(Deserialize)]
struct OutputEntry {
    value: Box<RawValue>,
    #[serde(default)]
    sensitive: bool,
}

impl From<OutputEntry> for OutputValue {
    fn from(entry: OutputEntry) -> Self {
        OutputValue {
            raw: entry.value.get().to_string(),
            sensitive: entry.sensitive,
        }
    }
}

/// Versions 2 and 3: modules in breadth-first order, root first.
#[derive(Deserialize)]
struct ModuleState {
    #[serde(default)]
    modules: Vec<Module>,
}

#[derive(Deserialize)]
struct Module {
    #[serde(default)]
    outputs: BTreeMap<String, OutputEntry>,
}

/// Version 4: root outputs at the top level.
#[derive(Deserialize)]
struct RootState {
    #[serde(default)]
    outputs: BTreeMap<String, OutputEntry>,
}

/// Decode the root module outputs of a raw state snapshot.
pub fn root_outputs(snapshot: &[u8]) -> Result<OutputMap> {
    let tag: VersionTag = serde_json::from_slice(snapshot).context("decoding state file")?;
    let decode = DECODERS
        .iter()
        .find(|(version, _)| *version == tag.version)
        .map(|(_, decode)| *decode)
        .ok_or_else(|| anyhow!("unsupported state version {}", tag.version))?;
    decode(snapshot)
}

fn decode_module_outputs(snapshot: &[u8]) -> Result<OutputMap> {
    let state: ModuleState = serde_json::from_slice(snapshot).context("decoding v2 state file")?;
    let Some(root) = state.modules.into_iter().next() else {
        bail!("no root module in state file");
    };
    Ok(into_output_map(root.outputs))
}

fn decode_root_outputs(snapshot: &[u8]) -> Result<OutputMap> {
    let state: RootState = serde_json::from_slice(snapshot).context("decoding v4 state file")?;
    Ok(into_output_map(state.outputs))
}

fn into_output_map(outputs: BTreeMap<String, OutputEntry>) -> OutputMap {
    outputs
        .into_iter()
        .map(|(name, entry)| (name, entry.into()))
        .collect()
}
