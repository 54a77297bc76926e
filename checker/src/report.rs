//! Renders a campaign result into a Markdown report, and optionally into a
//! raw JSON dump.

use crate::checker::CampaignResult;
use crate::runner::CommandResult;
use anyhow::Context;
use std::path::Path;

const TABLE_SEPARATOR: &str = "|---|---|---|:---:|\n";
const SEPARATOR: &str = "--------\n";
const FINISHING_NOTE: &str = "With ❤️ from Homework Bot 🤖\n";

const SUCCESS_TAG: &str = "✅";
const FAILED_TAG: &str = "❌";
const EXPIRED_NOTE: &str = "`[PAST DEADLINE]`";

/// Write given tests results into a markdown file.
#[derive(Debug)]
pub struct MdWriter {
    table: String,
    errors: String,
}

impl MdWriter {
    pub fn new() -> MdWriter {
        let mut table = table_row("Homework Name", "Task Name", "Test Name", "Result");
        table.push_str(TABLE_SEPARATOR);
        MdWriter {
            table,
            errors: String::new(),
        }
    }

    /// Add every result of a campaign, in the order it was produced.
    pub fn update(&mut self, results: &CampaignResult) {
        for (homework_name, homework) in results {
            let mut need_homework_name = true;
            if homework.expired && homework.tasks.iter().any(|(_, slots)| {
                slots.iter().any(|(_, result)| !result.succeeded())
            }) {
                self.add_expired_note(homework_name);
            }
            for (task_name, slots) in &homework.tasks {
                let mut need_task_name = true;
                for (slot_name, result) in slots {
                    let sign = if result.succeeded() {
                        SUCCESS_TAG
                    } else {
                        FAILED_TAG
                    };
                    let shown_homework = if homework.expired {
                        format!("{} {}", homework_name, EXPIRED_NOTE)
                    } else {
                        homework_name.clone()
                    };
                    self.table.push_str(&table_row(
                        if need_homework_name {
                            &shown_homework
                        } else {
                            ""
                        },
                        if need_task_name { task_name } else { "" },
                        slot_name,
                        sign,
                    ));
                    if !homework.expired {
                        self.add_error(homework_name, task_name, slot_name, result);
                    }
                    need_homework_name = false;
                    need_task_name = false;
                }
            }
        }
    }

    /// Write all the added content to the md file.
    pub fn write_md_file(&self, md_file_path: &Path) -> anyhow::Result<()> {
        std::fs::write(md_file_path, self.render())
            .with_context(|| format!("Failed to write report to {:?}", md_file_path))
    }

    pub fn render(&self) -> String {
        let mut content = String::from("# Test results\n");
        content.push_str(&self.table);
        if !self.errors.is_empty() {
            content.push_str("\n# Encountered errors\n");
            content.push_str(&self.errors);
        }
        content.push_str(SEPARATOR);
        content.push_str(FINISHING_NOTE);
        content
    }

    fn add_error(
        &mut self,
        homework_name: &str,
        task_name: &str,
        slot_name: &str,
        result: &CommandResult,
    ) {
        let failure = match result.failure_text() {
            Some(failure) => failure,
            None => return,
        };
        self.errors.push_str(&format!(
            "\n<details><summary><b>{hw} | {task} | {test}</b></summary>\n\n\
             **`stderr`**\n```apiblueprint\n{stderr}\n```\n\n\
             **`stdout`**\n```\n{stdout}\n```\n\n\
             --------\n\n</details>\n\n",
            hw = homework_name,
            task = task_name,
            test = slot_name,
            stderr = failure,
            stdout = result.stdout,
        ));
    }

    fn add_expired_note(&mut self, homework_name: &str) {
        self.errors.push_str(&format!(
            "\n<details><summary><b>{hw}</b></summary>\n\n\
             The deadline for this homework is exceeded. Errors hidden.\n\n\
             --------\n\n</details>\n\n",
            hw = homework_name,
        ));
    }
}

fn table_row(homework: &str, task: &str, test: &str, sign: &str) -> String {
    format!("| {} | {} | {} | {} |\n", homework, task, test, sign)
}

/// Dump the raw campaign result as pretty-printed JSON.
pub fn write_json_file(results: &CampaignResult, path: &Path) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(results).context("Failed to serialize results")?;
    std::fs::write(path, text).with_context(|| format!("Failed to write JSON to {:?}", path))
}
