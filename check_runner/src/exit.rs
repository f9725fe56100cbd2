use std::sync::Arc;

use crate::context::CheckContext;
use crate::error::RunnerError;

/// Unwind payload raised when intercepted code asks to terminate the
/// process. Carries the status code the code under test requested.
#[derive(Debug, Clone, Copy)]
pub struct ExitRequest {
    pub status: i32,
}

/// What an exit request should do when no guard is installed on the
/// requesting context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TerminationPolicy {
    /// Convert the request into a caught unwind anyway. A worker abandoned
    /// by a timed-out check must never take the host process down with it.
    #[default]
    Isolate,
    /// Actually terminate the process. Only sensible when the context is
    /// used outside a grading run.
    Honor,
}

/// Scoped activation of exit interception for one check context.
///
/// Installing arms the context's guard; dropping disarms it. Because
/// disarm runs in `Drop`, the pairing holds on every exit path out of a
/// check: normal return, fault, and timeout.
pub struct ExitGuard {
    ctx: Arc<CheckContext>,
}

impl ExitGuard {
    pub fn install(ctx: &Arc<CheckContext>) -> Result<Self, RunnerError> {
        if ctx.arm_exit_guard() {
            Ok(Self {
                ctx: Arc::clone(ctx),
            })
        } else {
            Err(RunnerError::GuardAlreadyInstalled)
        }
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.ctx.disarm_exit_guard();
    }
}
