use thiserror::Error;

/// Errors raised by the execution engine itself, as opposed to outcomes of
/// the code under test. These indicate a harness problem and are surfaced
/// to the driver immediately instead of being folded into a check's score.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Too many workers abandoned by timed-out checks are still running.
    #[error(
        "abandoned worker limit reached: {live} worker(s) from timed-out checks still running (limit {limit})"
    )]
    AbandonedWorkerLimit { live: usize, limit: usize },

    /// Exit interception was installed twice for the same check context.
    #[error("exit interception is already installed for this check context")]
    GuardAlreadyInstalled,

    /// The operating system refused to start a worker thread.
    #[error("failed to spawn check worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}
