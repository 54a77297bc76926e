//! Subprocess execution with timeouts and whole-process-group termination.

pub mod exec;
pub mod model;

pub use exec::{run_command, CommandRunner, RunOptions, RunOptionsBuilder, ShellRunner};
pub use model::{CommandResult, OutputMismatch, Verdict};
