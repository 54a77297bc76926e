//! Typed conversion and comparison of captured output.

use crate::runner::model::{CommandResult, OutputMismatch};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The type a test's output is interpreted as before comparison.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    String,
    Number,
}

impl Default for OutputKind {
    fn default() -> Self {
        OutputKind::String
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::String => write!(f, "string"),
            OutputKind::Number => write!(f, "number"),
        }
    }
}

/// A value after conversion through an [`OutputKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Converted {
    Text(String),
    Number(f64),
}

impl fmt::Display for Converted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Converted::Text(s) => write!(f, "{}", s),
            Converted::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Convert the value to a specified type.
///
/// An empty value cannot be converted to anything; a literal zero is a
/// perfectly valid number though.
pub fn convert(kind: OutputKind, value: &str) -> Result<Converted, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("No value. Cannot convert {} to '{}'.", value, kind));
    }
    match kind {
        OutputKind::String => Ok(Converted::Text(trimmed.to_owned())),
        OutputKind::Number => trimmed
            .parse::<f64>()
            .map(Converted::Number)
            .map_err(|e| e.to_string()),
    }
}

/// Reconcile a successful run against the declared expectation.
///
/// Results that already failed pass through untouched, as does everything
/// when no expectation is declared. Conversion failures of either side
/// downgrade the result to a failure carrying the parser's message;
/// converted values that differ attach an [`OutputMismatch`]. Numbers are
/// compared exactly, with no epsilon.
pub fn check_expectation(
    result: CommandResult,
    expected: Option<&str>,
    kind: OutputKind,
) -> CommandResult {
    let expected = match expected {
        Some(expected) => expected,
        None => return result,
    };
    if !result.succeeded() {
        return result;
    }
    let actual = match convert(kind, &result.stdout) {
        Ok(actual) => actual,
        Err(message) => return result.into_failure(message),
    };
    let expected = match convert(kind, expected) {
        Ok(expected) => expected,
        Err(message) => return result.into_failure(message),
    };
    if actual != expected {
        let mismatch = OutputMismatch::new(
            result.command.clone(),
            expected.to_string(),
            actual.to_string(),
        );
        return result.with_mismatch(mismatch);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::model::Verdict;
    use pretty_assertions::assert_eq as pretty_eq;

    fn success(command: &str, stdout: &str) -> CommandResult {
        CommandResult {
            command: command.into(),
            verdict: Verdict::Success,
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    #[test]
    fn convert_to_number() {
        pretty_eq!(
            convert(OutputKind::Number, "3.14"),
            Ok(Converted::Number(3.14))
        );
    }

    #[test]
    fn convert_to_string_trims() {
        pretty_eq!(
            convert(OutputKind::String, "3.14\n"),
            Ok(Converted::Text("3.14".into()))
        );
    }

    #[test]
    fn convert_garbage_to_number_reports_parser_error() {
        let err = convert(OutputKind::Number, "value").unwrap_err();
        assert!(dbg!(&err).contains("invalid float literal"));
    }

    #[test]
    fn convert_empty_value_fails() {
        pretty_eq!(
            convert(OutputKind::Number, "").unwrap_err(),
            "No value. Cannot convert  to 'number'."
        );
        pretty_eq!(
            convert(OutputKind::String, "  \n").unwrap_err(),
            "No value. Cannot convert   \n to 'string'."
        );
    }

    #[test]
    fn zero_is_a_valid_number() {
        pretty_eq!(convert(OutputKind::Number, "0"), Ok(Converted::Number(0.0)));
        pretty_eq!(
            convert(OutputKind::Number, "0.0\n"),
            Ok(Converted::Number(0.0))
        );
    }

    #[test]
    fn equal_numbers_pass() {
        let result = check_expectation(
            success("./main", "42.0\n"),
            Some("42"),
            OutputKind::Number,
        );
        assert!(result.succeeded());
    }

    #[test]
    fn equal_strings_ignore_surrounding_whitespace() {
        let result = check_expectation(
            success("./main", "Hello\n"),
            Some("Hello"),
            OutputKind::String,
        );
        assert!(result.succeeded());
    }

    #[test]
    fn differing_output_attaches_mismatch() {
        let result = check_expectation(
            success("./main 3 4", "8\n"),
            Some("7"),
            OutputKind::Number,
        );
        assert!(!result.succeeded());
        match &result.verdict {
            Verdict::Mismatch(mismatch) => {
                pretty_eq!(mismatch.input, "./main 3 4");
                pretty_eq!(mismatch.expected, "7");
                pretty_eq!(mismatch.actual, "8");
            }
            other => panic!("expected a mismatch, got {:?}", other),
        }
        // The raw capture is still there for the report.
        pretty_eq!(result.stdout, "8\n");
    }

    #[test]
    fn unparsable_actual_output_downgrades_to_failure() {
        let result = check_expectation(
            success("./main", "not a number\n"),
            Some("7"),
            OutputKind::Number,
        );
        match &result.verdict {
            Verdict::Failure(message) => assert!(message.contains("invalid float literal")),
            other => panic!("expected a failure, got {:?}", other),
        }
        pretty_eq!(result.stdout, "not a number\n");
    }

    #[test]
    fn no_expectation_leaves_result_untouched() {
        let result = success("./main", "anything\n");
        let checked = check_expectation(result.clone(), None, OutputKind::Number);
        pretty_eq!(checked, result);
    }

    #[test]
    fn failed_runs_are_not_compared() {
        let failed = success("./main", "7\n").into_failure("exited with code 1".into());
        let checked = check_expectation(failed.clone(), Some("7"), OutputKind::Number);
        pretty_eq!(checked, failed);
    }
}
