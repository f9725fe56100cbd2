//! Grader Error Types
//!
//! This module defines the [`GraderError`] enum, which covers every way the
//! harness itself can be misused or misconfigured. These are setup defects
//! surfaced to the driver immediately; they are never folded into a
//! check's score, and no outcome of the code under test produces one.

/// Represents all error types that can occur in the grading harness.
#[derive(Debug, PartialEq)]
pub enum GraderError {
    /// The score ledger was used before a scoring policy was configured.
    LedgerUnconfigured(String),
    /// A scoring policy was configured more than once for the same run.
    LedgerReconfigured(String),
    /// Fixed-policy configuration with an unusable total or check count.
    InvalidPointScheme(String),
    /// A variable-policy check reached accrual without a declared weight.
    MissingWeight(String),
    /// Lifecycle calls arrived out of order (a check run without
    /// `before_each`, run twice, or left open at `finish`).
    LifecycleViolation(String),
    /// The execution engine refused to run the check.
    Runner(String),
}

impl From<check_runner::error::RunnerError> for GraderError {
    fn from(err: check_runner::error::RunnerError) -> Self {
        GraderError::Runner(err.to_string())
    }
}
