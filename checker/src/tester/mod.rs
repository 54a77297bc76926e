//! The per-task grading pipeline: isolation, folder injection, build, test
//! execution and style checking.

pub mod compare;
pub mod exec;
pub mod inject;
pub mod lang;

use err_derive::Error;

/// Errors that mean the grading environment itself is broken, as opposed to
/// a student submission failing. These abort the current task check instead
/// of being recorded as an ordinary result slot.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(display = "IO error: {}", _0)]
    Io(#[error(source)] std::io::Error),

    #[error(
        display = "Rebuilding with injected folders failed for test '{}': {}",
        _0,
        _1
    )]
    RebuildWithInjections(String, String),
}
