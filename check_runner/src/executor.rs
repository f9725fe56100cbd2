use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use util::execution_config::ExecutionConfig;

use crate::context::CheckContext;
use crate::error::RunnerError;
use crate::exit::ExitRequest;
use crate::outcome::{ExecutionOutcome, fault_kind};
use crate::verify::AssertionFailure;

/// A single unit of gradeable work, run against a [`CheckContext`].
pub type CheckBody = Box<dyn FnOnce(&CheckContext) + Send + 'static>;

const WORKER_THREAD_NAME: &str = "check-worker";

/// Accounts for workers abandoned by timed-out checks.
///
/// A timeout cancels only the waiting; the worker thread keeps running
/// until the body yields on its own. The counter goes up before a worker
/// starts and down when it finally finishes, so between checks it counts
/// exactly the abandoned workers still alive. Once that count exceeds
/// `limit`, the budget refuses to start further checks.
#[derive(Clone)]
pub struct WorkerBudget {
    live: Arc<AtomicUsize>,
    limit: usize,
}

impl WorkerBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            live: Arc::new(AtomicUsize::new(0)),
            limit,
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(config.max_abandoned_workers)
    }

    /// Workers still running right now. Called between checks, this is the
    /// number of abandoned workers.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn admit(&self) -> Result<(), RunnerError> {
        let live = self.live();
        if live > self.limit {
            return Err(RunnerError::AbandonedWorkerLimit {
                live,
                limit: self.limit,
            });
        }
        Ok(())
    }

    fn enlist(&self) -> WorkerReceipt {
        self.live.fetch_add(1, Ordering::SeqCst);
        WorkerReceipt {
            live: Arc::clone(&self.live),
        }
    }
}

/// Held by a worker for its whole run; decrements the live count when the
/// worker finishes, however long after its check that happens.
struct WorkerReceipt {
    live: Arc<AtomicUsize>,
}

impl Drop for WorkerReceipt {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

static PANIC_HOOK_SHIM: Once = Once::new();

/// Routes panic reports from check-worker threads to the log instead of
/// stderr, so a crashing submission cannot spray the grading console.
/// Panics on every other thread keep the default report.
fn install_panic_hook_shim() {
    PANIC_HOOK_SHIM.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let on_worker = std::thread::current()
                .name()
                .is_some_and(|name| name.starts_with(WORKER_THREAD_NAME));
            if on_worker {
                tracing::debug!(report = %info, "captured panic from check body");
            } else {
                previous(info);
            }
        }));
    });
}

/// Runs `body` to completion or until `limit` elapses.
///
/// The body runs on its own worker thread under `catch_unwind`; this
/// function waits on the worker's completion signal for at most `limit`.
/// On timeout the worker is abandoned, never killed: there is no safe
/// preemption primitive for arbitrary foreign code, so cancellation is
/// cooperative-by-abandonment and `budget` bounds how many such leaked
/// workers may accumulate before the harness refuses to continue.
///
/// `Err` means the harness could not run the check at all; every result of
/// actually running it, including the timeout, is an `Ok` outcome.
pub async fn run_bounded(
    ctx: Arc<CheckContext>,
    body: CheckBody,
    limit: Duration,
    budget: &WorkerBudget,
) -> Result<ExecutionOutcome, RunnerError> {
    budget.admit()?;
    install_panic_hook_shim();

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    let receipt = budget.enlist();
    std::thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || {
            let _receipt = receipt;
            let result = panic::catch_unwind(AssertUnwindSafe(|| body(&ctx)));
            // The receiver is gone if the check already timed out.
            let _ = done_tx.send(result);
        })?;

    match tokio::time::timeout(limit, done_rx).await {
        Ok(Ok(Ok(()))) => Ok(ExecutionOutcome::Succeeded),
        Ok(Ok(Err(payload))) => Ok(classify_unwind(payload)),
        Ok(Err(_closed)) => Ok(ExecutionOutcome::Crashed {
            kind: "worker failure".to_string(),
            message: "check worker terminated without reporting an outcome".to_string(),
        }),
        Err(_elapsed) => {
            let limit_ms = limit.as_millis() as u64;
            tracing::warn!(
                limit_ms,
                live_workers = budget.live(),
                "check exceeded its deadline; abandoning worker"
            );
            Ok(ExecutionOutcome::TimedOut { limit_ms })
        }
    }
}

/// Maps an unwind payload from a check body onto an outcome: expressed
/// assertion failures and intercepted exit requests are distinguished from
/// arbitrary faults, which keep their message and get a derived fault kind.
fn classify_unwind(payload: Box<dyn Any + Send>) -> ExecutionOutcome {
    let payload = match payload.downcast::<AssertionFailure>() {
        Ok(failure) => {
            return ExecutionOutcome::AssertionFailed {
                message: failure.message,
            };
        }
        Err(other) => other,
    };
    let payload = match payload.downcast::<ExitRequest>() {
        Ok(request) => {
            return ExecutionOutcome::ExitAttempted {
                status: request.status,
            };
        }
        Err(other) => other,
    };
    let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "opaque panic payload".to_string()
    };
    ExecutionOutcome::Crashed {
        kind: fault_kind(&message).to_string(),
        message,
    }
}
