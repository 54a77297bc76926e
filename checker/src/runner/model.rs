use difference::{Changeset, Difference};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The outcome of a single subprocess invocation.
///
/// Success or failure is encoded in the variant itself, never inferred from
/// the presence of an error string in `stderr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    /// The command ran to completion with exit code 0.
    Success,
    /// The command failed to launch, exited with a non-zero code, died on a
    /// signal, or produced output that could not be converted.
    Failure(String),
    /// The command exceeded its wall-clock budget and its process group was
    /// killed.
    Timeout(String),
    /// The command succeeded but its converted output differs from the
    /// expectation.
    Mismatch(OutputMismatch),
}

/// A failed expectation: the command succeeded but printed the wrong thing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputMismatch {
    /// The command line that produced the output.
    pub input: String,
    /// Expected output after conversion.
    pub expected: String,
    /// Actual output after conversion.
    pub actual: String,
}

impl OutputMismatch {
    pub fn new(
        input: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        OutputMismatch {
            input: input.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Line diff between the actual and the expected output.
    pub fn diff(&self) -> String {
        diff(&self.actual, &self.expected)
    }
}

impl fmt::Display for OutputMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Given input: '{}'\nYour output '{}'\nExpected output: '{}'",
            self.input, self.actual, self.expected
        )
    }
}

/// Generate a diff String of two Strings.
pub fn diff(got: &str, expected: &str) -> String {
    let Changeset { diffs, .. } = Changeset::new(got, expected, "\n");

    fn make_diff_line(ln_diff: &Difference) -> String {
        match ln_diff {
            Difference::Same(ln) => "  ".to_owned() + ln,
            Difference::Rem(ln) => "- ".to_owned() + ln,
            Difference::Add(ln) => "+ ".to_owned() + ln,
        }
    }

    diffs.iter().map(make_diff_line).join("\n")
}

/// Everything captured about one command run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// The command line as it was handed to the shell.
    pub command: String,
    pub verdict: Verdict,
    /// Exit code of the direct child; negative values encode the signal that
    /// killed it. `None` when the command never ran to completion.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    /// A command that could not even be started.
    pub fn launch_failure(command: &str, message: String) -> Self {
        CommandResult {
            command: command.to_owned(),
            verdict: Verdict::Failure(message),
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.verdict, Verdict::Success)
    }

    /// Downgrade this result to a failure, keeping the captured output.
    pub fn into_failure(mut self, message: String) -> Self {
        self.verdict = Verdict::Failure(message);
        self
    }

    /// Attach a failed expectation, keeping the captured output.
    pub fn with_mismatch(mut self, mismatch: OutputMismatch) -> Self {
        self.verdict = Verdict::Mismatch(mismatch);
        self
    }

    /// The text a report should show for a failed slot, `None` on success.
    pub fn failure_text(&self) -> Option<String> {
        match &self.verdict {
            Verdict::Success => None,
            Verdict::Failure(message) => {
                if self.stderr.trim().is_empty() {
                    Some(message.clone())
                } else {
                    Some(self.stderr.clone())
                }
            }
            Verdict::Timeout(message) => Some(message.clone()),
            Verdict::Mismatch(mismatch) => Some(format!("{}\n\n{}", mismatch, mismatch.diff())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq as pretty_eq;

    fn success(stdout: &str) -> CommandResult {
        CommandResult {
            command: "./main".into(),
            verdict: Verdict::Success,
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    #[test]
    fn test_diff() {
        let s1 = "Hello,\nworld!\nHi!";
        let s2 = "Hello,\nthis cruel\nworld!";
        let d = diff(s1, s2);
        pretty_eq!(
            dbg!(d),
            "  \
              Hello,\n\
            + this cruel\n  \
              world!\n\
            - Hi!"
        );
    }

    #[test]
    fn diff_of_identical_strings_has_no_markers() {
        let d = diff("a\nb", "a\nb");
        assert!(!d.contains("+ ") && !d.contains("- "));
    }

    #[test]
    fn mismatch_flips_success() {
        let result = success("41\n");
        assert!(result.succeeded());
        let result = result.with_mismatch(OutputMismatch::new("./main", "42", "41"));
        assert!(!result.succeeded());
        // The original capture survives the downgrade.
        pretty_eq!(result.stdout, "41\n");
        pretty_eq!(result.exit_code, Some(0));
    }

    #[test]
    fn failure_keeps_output() {
        let result = success("3.14\n").into_failure("invalid float literal".into());
        assert!(!result.succeeded());
        pretty_eq!(result.stdout, "3.14\n");
        pretty_eq!(
            result.failure_text().unwrap(),
            "invalid float literal".to_owned()
        );
    }

    #[test]
    fn mismatch_display() {
        let mismatch = OutputMismatch::new("./main 3 4", "7", "8");
        pretty_eq!(
            mismatch.to_string(),
            "Given input: './main 3 4'\nYour output '8'\nExpected output: '7'"
        );
        pretty_eq!(mismatch.diff(), "- 8\n+ 7");
    }
}
