//! Walks all homeworks of a job, grades their tasks and aggregates the
//! campaign result.

use crate::config::JobDescriptor;
use crate::fs;
use crate::runner::{CommandRunner, ShellRunner};
use crate::tester::exec::{Task, TaskResult};
use chrono::Local;
use serde::Serialize;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Everything graded for one homework, in task declaration order.
#[derive(Debug, Clone, Serialize, Default)]
pub struct HomeworkResult {
    /// The deadline had already passed when grading ran. Advisory only;
    /// grading still happened.
    pub expired: bool,
    pub tasks: Vec<(String, TaskResult)>,
}

/// Homework name to result, in declaration order. Consumers that want a
/// display order must sort themselves.
pub type CampaignResult = Vec<(String, HomeworkResult)>;

/// Check homework.
pub struct Checker {
    job: JobDescriptor,
    job_root: PathBuf,
    checked_code_folder: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl Checker {
    /// Load a YAML job file and resolve the folders around it.
    pub fn from_job_file(job_file: &Path) -> anyhow::Result<Checker> {
        let job_file = fs::expand_path(job_file);
        let job = JobDescriptor::from_file(&job_file)?;
        let job_root = job_file
            .parent()
            .map(Path::to_owned)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self::new(job, job_root))
    }

    pub fn new(job: JobDescriptor, job_root: PathBuf) -> Checker {
        let checked_code_folder = fs::expand_path(Path::new(&job.folder));
        Checker {
            job,
            job_root,
            checked_code_folder,
            runner: Arc::new(ShellRunner),
        }
    }

    /// Run over all Tasks in all homeworks.
    pub async fn check_all_homeworks(&self) -> CampaignResult {
        let mut campaign = CampaignResult::new();
        for homework in &self.job.homeworks {
            let homework_folder = self.checked_code_folder.join(&homework.folder);
            if !homework_folder.exists() {
                tracing::warn!(
                    folder = %homework_folder.display(),
                    "Folder does not exist. Skipping."
                );
                continue;
            }
            let expired = Local::now().naive_local() > homework.submit_by;
            if expired {
                tracing::info!(homework = %homework.name, "The deadline has passed");
            }

            let mut tasks = Vec::new();
            for descriptor in &homework.tasks {
                let task = match Task::from_descriptor(
                    descriptor,
                    &homework_folder,
                    &self.job_root,
                    self.runner.clone(),
                ) {
                    Some(task) => task,
                    None => continue,
                };
                match task.check(Some(homework.name.as_str())).await {
                    Ok(result) => tasks.push((task.name.clone(), result)),
                    Err(e) => {
                        // The grading setup is broken for this task; say so
                        // loudly and move on to the next one.
                        tracing::error!(task = %task.name, error = %e, "Check aborted");
                    }
                }
            }

            // An untouched homework only shows up when its deadline fact
            // matters.
            if tasks.is_empty() && !expired {
                continue;
            }
            campaign.push((homework.name.clone(), HomeworkResult { expired, tasks }));
        }
        campaign
    }
}
