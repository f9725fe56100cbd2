//! Human-readable diagnostic lines for check outcomes.
//!
//! Pure text mapping, no side effects: the session appends the result to
//! the run transcript, and points are never touched here.

use check_runner::outcome::ExecutionOutcome;

/// Renders the transcript line(s) for one outcome.
///
/// An assertion failure surfaces the check-supplied message verbatim; a
/// crash reports the fault kind on one line and the fault text on the
/// next; an exit attempt is reported like a crash with the requested
/// status code surfaced.
pub fn describe(outcome: &ExecutionOutcome) -> String {
    match outcome {
        ExecutionOutcome::Succeeded => "Success!".to_string(),
        ExecutionOutcome::AssertionFailed { message } => message.clone(),
        ExecutionOutcome::Crashed { kind, message } => {
            format!("Program crashed due to a {kind}\n({kind}) {message}")
        }
        ExecutionOutcome::ExitAttempted { status } => {
            format!("Program attempted to exit with status {status}")
        }
        ExecutionOutcome::TimedOut { limit_ms } => {
            format!("Check timed out after {limit_ms} ms")
        }
    }
}
