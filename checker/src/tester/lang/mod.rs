//! Per-language build, run and style-check behavior.
//!
//! The orchestrator talks to one [`LanguageBackend`] chosen at task
//! construction from the language tag; everything language-specific lives
//! behind this trait.

pub mod bash;
pub mod cpp;

use super::CheckError;
use crate::config::{Language, TaskDescriptor, TestDescriptor};
use crate::runner::{CommandRunner, CommandResult, RunOptions, RunOptionsBuilder};
use async_trait::async_trait;
use std::{path::Path, sync::Arc, time::Duration};

pub use bash::BashBackend;
pub use cpp::CppBackend;

#[async_trait]
pub trait LanguageBackend: Send + Sync {
    /// Build the submission. `None` when the language has nothing to build.
    async fn build(&self) -> Option<CommandResult>;

    /// Run a single test command.
    async fn run_test(&self, test: &TestDescriptor) -> CommandResult;

    /// Run a static style check. `None` when the language has no style
    /// check or the tool reported no findings.
    async fn style_check(&self) -> Option<CommandResult>;
}

/// Pick the backend for a task's language tag.
pub fn backend_for(
    descriptor: &TaskDescriptor,
    scratch_dir: &Path,
    job_root: &Path,
    runner: Arc<dyn CommandRunner>,
) -> Result<Box<dyn LanguageBackend>, CheckError> {
    match descriptor.language {
        Language::Cpp => Ok(Box::new(CppBackend::new(
            descriptor,
            scratch_dir,
            job_root,
            runner,
        )?)),
        Language::Bash => Ok(Box::new(BashBackend::new(
            descriptor,
            scratch_dir,
            job_root,
            runner,
        ))),
    }
}

pub(crate) fn run_options(cwd: &Path, timeout_s: f64) -> RunOptions {
    RunOptionsBuilder::default()
        .cwd(cwd)
        .timeout(Duration::from_secs_f64(timeout_s))
        .build()
        .expect("Failed to build run options")
}

/// Expand the `$JOB_ROOT` placeholder of an explicit test command.
pub(crate) fn expand_cmd_template(template: &str, job_root: &Path) -> String {
    template.replace("$JOB_ROOT", &job_root.display().to_string())
}

/// `<binary invocation> <args> <pipe_through>`, skipping empty pieces.
pub(crate) fn assemble_run_cmd(invocation: String, args: &str, pipe_through: &str) -> String {
    let mut cmd = invocation;
    if !args.trim().is_empty() {
        cmd.push(' ');
        cmd.push_str(args.trim());
    }
    if !pipe_through.trim().is_empty() {
        cmd.push(' ');
        cmd.push_str(pipe_through.trim());
    }
    cmd
}
