//! # Grade Report
//!
//! The serializable result of one grading run: per-check records, the
//! overall earned/possible totals, and the chronological transcript. The
//! report is output-only; grading state lives in the ledger and session.

use chrono::{DateTime, Utc};
use serde::Serialize;

use check_runner::outcome::ExecutionOutcome;

/// Outcome record for a single executed check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckRecord {
    /// The check's display name.
    pub name: String,
    /// Points credited after clamping.
    pub earned: f64,
    /// The weight this check counted against.
    pub possible: f64,
    /// The diagnostic line(s) written to the transcript.
    pub diagnostic: String,
    /// The classified execution outcome.
    pub outcome: ExecutionOutcome,
}

/// The final report for one grading run.
#[derive(Debug, Serialize)]
pub struct GradeReport {
    pub earned: f64,
    pub possible: f64,
    pub generated_at: DateTime<Utc>,
    pub checks: Vec<CheckRecord>,
    /// Everything the checks printed, interleaved with their diagnostics,
    /// in execution order.
    pub transcript: String,
}

impl GradeReport {
    /// Renders the report the way it is printed to the console: the score
    /// line followed by the chronological transcript.
    pub fn final_text(&self) -> String {
        format!(
            "You scored a {:.2} out of {:.2}\n\n{}",
            self.earned, self.possible, self.transcript
        )
    }
}
