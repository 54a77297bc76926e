//! The per-task grading pipeline.

use super::{compare, inject::InjectionSet, lang, CheckError};
use crate::config::{TaskDescriptor, TestDescriptor};
use crate::fs::ScratchCopy;
use crate::runner::{CommandRunner, CommandResult};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Result slot holding the build outcome.
pub const BUILD_SUCCESS_SLOT: &str = "Build succeeded";
/// Result slot holding style findings, present only when there are any.
pub const STYLE_ERRORS_SLOT: &str = "Style errors";

/// Slots in the order they were produced: the build slot, one slot per
/// declared test, and the style slot last.
pub type TaskResult = Vec<(String, CommandResult)>;

/// One gradable unit: a student folder plus the descriptor saying how to
/// build and test it.
pub struct Task {
    pub name: String,
    descriptor: TaskDescriptor,
    student_task_folder: PathBuf,
    job_root: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl Task {
    /// `None` (with a warning) when the student never submitted this task.
    pub fn from_descriptor(
        descriptor: &TaskDescriptor,
        student_hw_folder: &Path,
        job_root: &Path,
        runner: Arc<dyn CommandRunner>,
    ) -> Option<Task> {
        let student_task_folder = student_hw_folder.join(&descriptor.folder);
        if !student_task_folder.exists() {
            tracing::warn!(
                folder = %student_task_folder.display(),
                "Folder does not exist. Skipping."
            );
            return None;
        }
        Some(Task {
            name: descriptor.name.clone(),
            descriptor: descriptor.clone(),
            student_task_folder,
            job_root: job_root.to_owned(),
            runner,
        })
    }

    /// Grade this task inside a fresh scratch copy.
    ///
    /// The build runs first, with task-level folder injections applied
    /// around it; a failed build short-circuits the whole task, so the
    /// result then holds exactly the build slot. Tests never short-circuit
    /// each other: all of them run and are recorded in declared order. A
    /// style check closes the round.
    ///
    /// The only hard error is a failed rebuild under test-level injections;
    /// that means the grading setup itself is broken and the check aborts
    /// instead of blaming the submission.
    pub async fn check(&self, scratch_prefix: Option<&str>) -> Result<TaskResult, CheckError> {
        tracing::info!(task = %self.name, "Checking task");
        let scratch = ScratchCopy::create(&self.student_task_folder, scratch_prefix)?;
        let backend = lang::backend_for(
            &self.descriptor,
            scratch.path(),
            &self.job_root,
            self.runner.clone(),
        )?;

        let mut results = TaskResult::new();

        let build_result = {
            let injections = InjectionSet::apply(
                scratch.path(),
                &self.job_root,
                &self.descriptor.inject_folders,
            )?;
            let build_result = backend.build().await;
            injections.revert()?;
            build_result
        };
        if let Some(build_result) = build_result {
            let build_ok = build_result.succeeded();
            results.push((BUILD_SUCCESS_SLOT.to_owned(), build_result));
            if !build_ok {
                // No point testing what does not build.
                return Ok(results);
            }
        }

        for test in &self.descriptor.tests {
            let result = self.run_test(scratch.path(), &*backend, test).await?;
            results.push((test.name.clone(), result));
        }

        if let Some(style_result) = backend.style_check().await {
            results.push((STYLE_ERRORS_SLOT.to_owned(), style_result));
        }

        Ok(results)
    }

    async fn run_test(
        &self,
        scratch_dir: &Path,
        backend: &dyn lang::LanguageBackend,
        test: &TestDescriptor,
    ) -> Result<CommandResult, CheckError> {
        let injections = if test.inject_folders.is_empty() {
            None
        } else {
            let set = InjectionSet::apply(scratch_dir, &self.job_root, &test.inject_folders)?;
            // The injected content replaces what the task-level build saw,
            // so the project must be rebuilt against it. This rebuild runs
            // known-good material; failure means the job definition is
            // broken, not the submission.
            if let Some(rebuild) = backend.build().await {
                if !rebuild.succeeded() {
                    let details = rebuild
                        .failure_text()
                        .unwrap_or_else(|| "no diagnostic output".to_owned());
                    return Err(CheckError::RebuildWithInjections(test.name.clone(), details));
                }
            }
            Some(set)
        };

        let result = backend.run_test(test).await;
        if let Some(set) = injections {
            set.revert()?;
        }

        let kind = test.output_type.unwrap_or(self.descriptor.output_type);
        Ok(compare::check_expectation(
            result,
            test.expected_output.as_deref(),
            kind,
        ))
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("folder", &self.student_task_folder)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskDescriptor;
    use crate::runner::{ShellRunner, Verdict};
    use pretty_assertions::assert_eq as pretty_eq;
    use std::path::Path;
    use tokio_test::block_on;

    fn write_file(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn task(yaml: &str, hw_folder: &Path, job_root: &Path) -> Task {
        let descriptor: TaskDescriptor = serde_yaml::from_str(yaml).expect("valid task yaml");
        Task::from_descriptor(&descriptor, hw_folder, job_root, Arc::new(ShellRunner))
            .expect("task folder exists")
    }

    #[test]
    fn bash_hello_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let hw = dir.path().join("hw");
        write_file(&hw.join("task_1/main.sh"), "echo 'Hello'\n");

        let task = task(
            "name: Task 1\nlanguage: bash\nfolder: task_1\n\
             tests:\n  - name: Test 1\n    expected_output: Hello\n",
            &hw,
            dir.path(),
        );
        let results = block_on(task.check(None)).unwrap();
        pretty_eq!(results.len(), 1);
        let (slot, result) = &results[0];
        pretty_eq!(slot, "Test 1");
        assert!(result.succeeded());
        pretty_eq!(result.stderr, "");
        pretty_eq!(result.stdout, "Hello\n");
    }

    #[test]
    fn cpp_hello_end_to_end() {
        // Needs a compiler; skip silently on machines without one.
        let have_clang = std::process::Command::new("sh")
            .arg("-c")
            .arg("command -v clang++")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false);
        if !have_clang {
            eprintln!("clang++ not found, skipping");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let hw = dir.path().join("hw");
        write_file(
            &hw.join("task_1/main.cpp"),
            "#include <cstdio>\nint main() { std::puts(\"Hello\"); return 0; }\n",
        );

        let task = task(
            "name: Task 1\nlanguage: cpp\nfolder: task_1\nbuild_type: simple\n\
             tests:\n  - name: Test 1\n    expected_output: Hello\n",
            &hw,
            dir.path(),
        );
        let results = block_on(task.check(None)).unwrap();
        pretty_eq!(results.len(), 2);
        pretty_eq!(results[0].0, BUILD_SUCCESS_SLOT);
        assert!(results[0].1.succeeded());
        pretty_eq!(results[1].0, "Test 1");
        assert!(results[1].1.succeeded());
        pretty_eq!(results[1].1.stderr, "");
    }

    #[test]
    fn failed_build_short_circuits_the_task() {
        let dir = tempfile::tempdir().unwrap();
        let hw = dir.path().join("hw");
        write_file(&hw.join("task_1/main.cpp"), "this is not C++\n");

        let task = task(
            "name: Task 1\nlanguage: cpp\nfolder: task_1\nbuild_type: simple\n\
             tests:\n  - name: Test 1\n    expected_output: 1\n  - name: Test 2\n",
            &hw,
            dir.path(),
        );
        let results = block_on(task.check(None)).unwrap();
        // Exactly the build slot, no test or style slots.
        pretty_eq!(results.len(), 1);
        pretty_eq!(results[0].0, BUILD_SUCCESS_SLOT);
        assert!(!results[0].1.succeeded());
    }

    #[test]
    fn failing_test_does_not_stop_later_tests() {
        let dir = tempfile::tempdir().unwrap();
        let hw = dir.path().join("hw");
        write_file(&hw.join("task_1/main.sh"), "echo \"$1\"\n");

        let task = task(
            "name: Task 1\nlanguage: bash\nfolder: task_1\n\
             tests:\n\
             \x20 - name: Wrong\n    input_args: nope\n    expected_output: right\n\
             \x20 - name: Right\n    input_args: right\n    expected_output: right\n",
            &hw,
            dir.path(),
        );
        let results = block_on(task.check(None)).unwrap();
        pretty_eq!(results.len(), 2);
        pretty_eq!(results[0].0, "Wrong");
        assert!(!results[0].1.succeeded());
        assert!(matches!(results[0].1.verdict, Verdict::Mismatch(_)));
        pretty_eq!(results[1].0, "Right");
        assert!(results[1].1.succeeded());
    }

    #[test]
    fn test_level_injection_is_applied_and_reverted() {
        let dir = tempfile::tempdir().unwrap();
        let hw = dir.path().join("hw");
        let job_root = dir.path().join("job");
        write_file(&hw.join("task_1/main.sh"), "cat hidden/data.txt\n");
        write_file(&job_root.join("hidden/data.txt"), "42\n");

        let task = task(
            "name: Task 1\nlanguage: bash\nfolder: task_1\n\
             tests:\n\
             \x20 - name: Hidden data\n    expected_output: 42\n    inject_folders: [hidden]\n",
            &hw,
            &job_root,
        );
        let results = block_on(task.check(None)).unwrap();
        pretty_eq!(results.len(), 1);
        assert!(results[0].1.succeeded());
        // The submission itself never learns about the injected folder.
        assert!(!hw.join("task_1/hidden").exists());
    }

    #[test]
    fn timed_out_test_is_recorded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let hw = dir.path().join("hw");
        write_file(&hw.join("task_1/main.sh"), "sleep 10\n");

        let task = task(
            "name: Task 1\nlanguage: bash\nfolder: task_1\n\
             tests:\n  - name: Loops forever\n    timeout: 1\n",
            &hw,
            dir.path(),
        );
        let results = block_on(task.check(None)).unwrap();
        pretty_eq!(results.len(), 1);
        let result = &results[0].1;
        assert!(matches!(result.verdict, Verdict::Timeout(_)));
        pretty_eq!(
            result.stderr,
            "Timeout: command 'sh main.sh' ran longer than 1 seconds"
        );
    }

    #[test]
    fn missing_task_folder_yields_no_task() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor: TaskDescriptor =
            serde_yaml::from_str("name: Task 1\nlanguage: bash\nfolder: nowhere\n").unwrap();
        assert!(Task::from_descriptor(
            &descriptor,
            dir.path(),
            dir.path(),
            Arc::new(ShellRunner)
        )
        .is_none());
    }

    #[test]
    fn original_submission_is_never_mutated() {
        let dir = tempfile::tempdir().unwrap();
        let hw = dir.path().join("hw");
        write_file(&hw.join("task_1/main.sh"), "echo polluted > generated.txt\n");

        let task = task(
            "name: Task 1\nlanguage: bash\nfolder: task_1\n\
             tests:\n  - name: Test 1\n",
            &hw,
            dir.path(),
        );
        let results = block_on(task.check(None)).unwrap();
        assert!(results[0].1.succeeded());
        // The side effect landed in the scratch copy, which is gone now.
        assert!(!hw.join("task_1/generated.txt").exists());
    }
}
