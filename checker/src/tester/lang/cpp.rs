//! C++ tasks: cmake or single-file builds, google-test suites and a cpplint
//! style check.

use super::{assemble_run_cmd, expand_cmd_template, run_options, LanguageBackend};
use crate::config::{BuildKind, TaskDescriptor, TestDescriptor};
use crate::runner::{CommandRunner, CommandResult};
use crate::tester::CheckError;
use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

const CMAKE_BUILD_CMD: &str = "cmake .. && make -j2";
const REMAKE_AND_TEST_CMD: &str = "make clean && rm -r * && cmake .. && make -j2 && ctest -VV";
const STYLE_CHECK_CMD: &str = "cpplint --counting=detailed \
    --filter=-legal,-readability/todo,-build/include_order,-runtime/threadsafe_fn,-runtime/arrays \
    $( find . -name \"*.h\" -o -name \"*.cpp\" | grep -vE \"^./build/\" )";
const STYLE_CHECK_TIMEOUT_S: f64 = 20.0;

/// Marker cpplint prints whenever it counted at least one finding.
const TOTAL_ERRORS_FOUND_TAG: &str = "Total errors found";

pub struct CppBackend {
    runner: Arc<dyn CommandRunner>,
    /// Root of the scratch copy; style checks run from here.
    source_dir: PathBuf,
    /// Where build and run commands execute. For cmake projects this is the
    /// `build` subfolder.
    cwd: PathBuf,
    job_root: PathBuf,
    build_type: BuildKind,
    binary_name: String,
    compiler_flags: String,
    pipe_through: String,
    build_timeout: f64,
}

impl CppBackend {
    pub fn new(
        descriptor: &TaskDescriptor,
        scratch_dir: &Path,
        job_root: &Path,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, CheckError> {
        let cwd = match descriptor.build_type {
            BuildKind::Cmake => {
                // The cmake project always works from a build folder.
                let build_dir = scratch_dir.join("build");
                std::fs::create_dir_all(&build_dir)?;
                build_dir
            }
            BuildKind::Simple => scratch_dir.to_owned(),
        };
        Ok(CppBackend {
            runner,
            source_dir: scratch_dir.to_owned(),
            cwd,
            job_root: job_root.to_owned(),
            build_type: descriptor.build_type,
            binary_name: descriptor.binary_name.clone(),
            compiler_flags: descriptor.compiler_flags.clone(),
            pipe_through: descriptor.pipe_through.clone(),
            build_timeout: descriptor.build_timeout,
        })
    }

    fn build_cmd(&self) -> String {
        match self.build_type {
            BuildKind::Cmake => CMAKE_BUILD_CMD.to_owned(),
            BuildKind::Simple => format!(
                "clang++ -std=c++14 -o {binary} {flags} {binary}.cpp",
                binary = self.binary_name,
                flags = self.compiler_flags
            ),
        }
    }

    fn test_cmd(&self, test: &TestDescriptor) -> String {
        if let Some(template) = &test.cmd {
            return expand_cmd_template(template, &self.job_root);
        }
        assemble_run_cmd(
            format!("./{}", self.binary_name),
            &test.input_args,
            &self.pipe_through,
        )
    }
}

#[async_trait]
impl LanguageBackend for CppBackend {
    async fn build(&self) -> Option<CommandResult> {
        let options = run_options(&self.cwd, self.build_timeout);
        Some(self.runner.run(&self.build_cmd(), &options).await)
    }

    async fn run_test(&self, test: &TestDescriptor) -> CommandResult {
        let options = run_options(&self.cwd, test.timeout);
        if test.run_google_tests {
            return self.runner.run(REMAKE_AND_TEST_CMD, &options).await;
        }
        self.runner.run(&self.test_cmd(test), &options).await
    }

    async fn style_check(&self) -> Option<CommandResult> {
        let options = run_options(&self.source_dir, STYLE_CHECK_TIMEOUT_S);
        let result = self.runner.run(STYLE_CHECK_CMD, &options).await;
        // Only report the slot when cpplint actually counted something;
        // everything else (including a missing cpplint) stays silent.
        if result.stdout.contains(TOTAL_ERRORS_FOUND_TAG)
            || result.stderr.contains(TOTAL_ERRORS_FOUND_TAG)
        {
            Some(result)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ShellRunner;
    use pretty_assertions::assert_eq as pretty_eq;

    fn backend(yaml: &str) -> CppBackend {
        let descriptor: TaskDescriptor = serde_yaml::from_str(yaml).expect("valid task yaml");
        let dir = tempfile::tempdir().unwrap();
        CppBackend::new(
            &descriptor,
            &dir.path().join("scratch"),
            Path::new("/jobs/hw"),
            Arc::new(ShellRunner),
        )
        .unwrap()
    }

    #[test]
    fn simple_build_command_carries_flags_and_binary() {
        let backend = backend(
            "name: t\nlanguage: cpp\nfolder: f\nbuild_type: simple\n\
             binary_name: sum_numbers\ncompiler_flags: -Wall -Wextra\n",
        );
        pretty_eq!(
            backend.build_cmd(),
            "clang++ -std=c++14 -o sum_numbers -Wall -Wextra sum_numbers.cpp"
        );
    }

    #[test]
    fn cmake_build_command_is_fixed() {
        let backend = backend("name: t\nlanguage: cpp\nfolder: f\n");
        pretty_eq!(backend.build_cmd(), "cmake .. && make -j2");
    }

    #[test]
    fn test_command_appends_args_and_pipe() {
        let backend =
            backend("name: t\nlanguage: cpp\nfolder: f\npipe_through: '| sort'\n");
        let test: TestDescriptor =
            serde_yaml::from_str("name: Test 1\ninput_args: 3 4\n").unwrap();
        pretty_eq!(backend.test_cmd(&test), "./main 3 4 | sort");
    }

    #[test]
    fn explicit_cmd_template_wins() {
        let backend = backend("name: t\nlanguage: cpp\nfolder: f\n");
        let test: TestDescriptor =
            serde_yaml::from_str("name: Test 1\ncmd: ./main < $JOB_ROOT/input.txt\n").unwrap();
        pretty_eq!(backend.test_cmd(&test), "./main < /jobs/hw/input.txt");
    }
}
