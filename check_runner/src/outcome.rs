use serde::Serialize;

/// The classified result of running one check body to completion or
/// abandonment. Produced exactly once per execution and immutable from
/// then on; every variant must be handled by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The body returned normally. Whatever points it awarded stand.
    Succeeded,
    /// The body failed an expressed assertion; `message` is the
    /// check-supplied failure text, verbatim.
    AssertionFailed { message: String },
    /// The body asked to terminate the process; the request was converted
    /// into this outcome and the host kept running.
    ExitAttempted { status: i32 },
    /// The body raised an arbitrary fault. `kind` is a short category
    /// derived from the fault, `message` the fault text.
    Crashed { kind: String, message: String },
    /// The deadline elapsed before the body finished; the worker was
    /// abandoned, not killed.
    TimedOut { limit_ms: u64 },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Succeeded)
    }
}

/// Derives a short fault category from a panic message, so diagnostics can
/// say what kind of fault took the program down rather than just "panic".
pub fn fault_kind(message: &str) -> &'static str {
    if message.contains("index out of bounds") || message.contains("out of range") {
        "index out of bounds"
    } else if message.contains("`Option::unwrap()`") || message.contains("`Result::unwrap()`") {
        "failed unwrap"
    } else if message.contains("attempt to divide by zero")
        || message.contains("attempt to calculate the remainder with a divisor of zero")
    {
        "division by zero"
    } else if message.contains("attempt to") && message.contains("overflow") {
        "arithmetic overflow"
    } else if message.contains("capacity overflow") {
        "capacity overflow"
    } else {
        "panic"
    }
}
