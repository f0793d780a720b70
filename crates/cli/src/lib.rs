//! `hpc-upload` library: argument parsing and result rendering.
//!
//! The binary in `main.rs` wires these to the client orchestrator.

pub mod args;
pub mod report;
pub mod watch;

pub use args::Cli;
