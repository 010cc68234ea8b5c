//! Deterministic, pure logic shared by the resource commands.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod confirmation;
pub mod message;
pub mod metadata;
pub mod state;
pub mod types;
