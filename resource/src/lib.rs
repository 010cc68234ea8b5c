//! CI resource bridging a pipeline to a remote infrastructure-execution service.
//!
//! Three commands, each reading a JSON payload from stdin and printing a JSON
//! response on stdout:
//!
//! - `check` ([`check`]): list run ids newer than a known one.
//! - `in` ([`get`]): wait for a run to finish, confirming it when required, and
//!   stage the workspace's variables, outputs and run metadata in a directory.
//! - `out` ([`put`]): push declared variables and queue a new run.
//!
//! The layering follows:
//!
//! - **[`core`]**: Pure decisions and decoding (confirmation gates, metadata,
//!   state snapshots, message templates). No I/O.
//! - **[`io`]**: Payload parsing, the remote service trait and its HTTP
//!   implementation, output files.
//!
//! Orchestration modules ([`lifecycle`], [`reconcile`]) sit between the two and
//! receive an explicit [`context::ResourceContext`].

pub mod cancel;
pub mod check;
pub mod context;
pub mod core;
pub mod exit_codes;
pub mod get;
pub mod io;
pub mod lifecycle;
pub mod logging;
pub mod put;
pub mod reconcile;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
