//! I/O for the resource commands: stdin payload, remote service, output files.

pub mod input;
pub mod output_files;
pub mod remote;
pub mod tfe;
