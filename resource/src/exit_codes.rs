//! Exit codes of the resource binary.

/// The command printed its response.
pub const OK: i32 = 0;
/// Invalid payload, remote-service error or filesystem error.
pub const FAILED: i32 = 1;
/// The poll wait was cancelled before the run finished.
pub const CANCELLED: i32 = 130;
