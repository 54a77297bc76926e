//! Bash tasks: nothing to build, scripts run straight through `sh`.

use super::{assemble_run_cmd, expand_cmd_template, run_options, LanguageBackend};
use crate::config::{TaskDescriptor, TestDescriptor};
use crate::runner::{CommandRunner, CommandResult};
use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

pub struct BashBackend {
    runner: Arc<dyn CommandRunner>,
    cwd: PathBuf,
    job_root: PathBuf,
    binary_name: String,
    pipe_through: String,
}

impl BashBackend {
    pub fn new(
        descriptor: &TaskDescriptor,
        scratch_dir: &Path,
        job_root: &Path,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        BashBackend {
            runner,
            cwd: scratch_dir.to_owned(),
            job_root: job_root.to_owned(),
            binary_name: descriptor.binary_name.clone(),
            pipe_through: descriptor.pipe_through.clone(),
        }
    }

    fn test_cmd(&self, test: &TestDescriptor) -> String {
        if let Some(template) = &test.cmd {
            return expand_cmd_template(template, &self.job_root);
        }
        assemble_run_cmd(
            format!("sh {}.sh", self.binary_name),
            &test.input_args,
            &self.pipe_through,
        )
    }
}

#[async_trait]
impl LanguageBackend for BashBackend {
    async fn build(&self) -> Option<CommandResult> {
        // There is nothing to build in Bash.
        None
    }

    async fn run_test(&self, test: &TestDescriptor) -> CommandResult {
        let options = run_options(&self.cwd, test.timeout);
        self.runner.run(&self.test_cmd(test), &options).await
    }

    async fn style_check(&self) -> Option<CommandResult> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ShellRunner;
    use pretty_assertions::assert_eq as pretty_eq;

    #[test]
    fn script_invocation_uses_the_binary_name() {
        let descriptor: TaskDescriptor = serde_yaml::from_str(
            "name: t\nlanguage: bash\nfolder: f\nbinary_name: solve\n",
        )
        .unwrap();
        let backend = BashBackend::new(
            &descriptor,
            Path::new("/scratch"),
            Path::new("/jobs/hw"),
            Arc::new(ShellRunner),
        );
        let test: TestDescriptor =
            serde_yaml::from_str("name: Test 1\ninput_args: a b\n").unwrap();
        pretty_eq!(backend.test_cmd(&test), "sh solve.sh a b");
    }
}
