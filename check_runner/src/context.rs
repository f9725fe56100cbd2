use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::capture::{OutputSink, OutputSlot, RedirectToken};
use crate::exit::{ExitRequest, TerminationPolicy};

/// The handle a check body runs against.
///
/// One context exists per check execution and is retired with it. It owns
/// the check's current output target, its substituted standard input, the
/// exit-interception flag and the points the body has awarded so far. A
/// fresh context per check is what keeps a worker abandoned on timeout from
/// corrupting anything a later check observes.
pub struct CheckContext {
    output: OutputSlot,
    stdin: Mutex<Cursor<Vec<u8>>>,
    guard_armed: AtomicBool,
    policy: TerminationPolicy,
    earned: Mutex<f64>,
}

impl CheckContext {
    pub fn new(initial_output: OutputSink, policy: TerminationPolicy) -> Self {
        Self {
            output: OutputSlot::new(initial_output),
            stdin: Mutex::new(Cursor::new(Vec::new())),
            guard_armed: AtomicBool::new(false),
            policy,
            earned: Mutex::new(0.0),
        }
    }

    /// Substitutes the bytes the body will see on its standard input.
    pub fn with_input(self, bytes: Vec<u8>) -> Self {
        Self {
            stdin: Mutex::new(Cursor::new(bytes)),
            ..self
        }
    }

    /// Writes one line to the current output target. Errors from in-memory
    /// sinks cannot happen; any others are traced and dropped so a print
    /// can never fail a check by itself.
    pub fn println(&self, line: &str) {
        let target = self.output.target();
        let mut writer = target.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = writeln!(writer, "{line}") {
            tracing::trace!(%err, "dropped write from check body");
        }
    }

    /// Writes raw text to the current output target, without a newline.
    pub fn print(&self, text: &str) {
        let target = self.output.target();
        let mut writer = target.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = write!(writer, "{text}") {
            tracing::trace!(%err, "dropped write from check body");
        }
    }

    /// The currently active output target.
    pub fn stdout(&self) -> OutputSink {
        self.output.target()
    }

    /// Redirects this check's output mid-execution, e.g. into a buffer the
    /// body inspects afterwards. The harness restores its own target when
    /// the check ends no matter what was set here.
    pub fn set_stdout(&self, sink: OutputSink) {
        self.output.set(sink);
    }

    pub fn redirect_output(&self, sink: OutputSink) -> RedirectToken {
        self.output.redirect(sink)
    }

    pub fn restore_output(&self, token: RedirectToken) {
        self.output.restore(token);
    }

    /// Locked access to the substituted standard input. `Cursor<Vec<u8>>`
    /// is `BufRead`, so bodies can `read_line` through the guard.
    pub fn stdin(&self) -> MutexGuard<'_, Cursor<Vec<u8>>> {
        self.stdin.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reads one line from the substituted input, without the trailing
    /// newline. Returns `None` once the input is exhausted.
    pub fn read_input_line(&self) -> Option<String> {
        use std::io::BufRead;
        let mut line = String::new();
        let read = self.stdin().read_line(&mut line).ok()?;
        if read == 0 {
            return None;
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }

    /// Adds points to this check's earned total. Credit only stands if the
    /// body goes on to complete normally; it is clamped against the
    /// check's weight at accrual time.
    pub fn award(&self, points: f64) {
        let mut earned = self.earned.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *earned += points;
    }

    pub fn points_awarded(&self) -> f64 {
        *self.earned.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Requests termination of the process, the way submitted code would
    /// call `exit()`. With the exit guard armed this raises a catchable
    /// unwind carrying `status`; the bounded executor converts it into an
    /// `ExitAttempted` outcome. Without the guard, the context's
    /// [`TerminationPolicy`] decides.
    pub fn request_exit(&self, status: i32) -> ! {
        if self.guard_armed.load(Ordering::SeqCst) {
            std::panic::panic_any(ExitRequest { status });
        }
        match self.policy {
            TerminationPolicy::Honor => std::process::exit(status),
            TerminationPolicy::Isolate => {
                tracing::warn!(status, "exit requested outside a guarded check; isolating");
                std::panic::panic_any(ExitRequest { status });
            }
        }
    }

    pub fn exit_guard_installed(&self) -> bool {
        self.guard_armed.load(Ordering::SeqCst)
    }

    pub(crate) fn arm_exit_guard(&self) -> bool {
        self.guard_armed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn disarm_exit_guard(&self) {
        self.guard_armed.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureBuffer;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    fn context_with(buffer: &CaptureBuffer) -> CheckContext {
        CheckContext::new(buffer.sink(), TerminationPolicy::Isolate)
    }

    #[test]
    fn test_println_lands_in_the_current_target() {
        let buffer = CaptureBuffer::new();
        let ctx = context_with(&buffer);
        ctx.println("hello");
        ctx.print("wor");
        ctx.print("ld");
        assert_eq!(buffer.contents(), "hello\nworld");
    }

    #[test]
    fn test_set_stdout_moves_subsequent_prints() {
        let first = CaptureBuffer::new();
        let second = CaptureBuffer::new();
        let ctx = context_with(&first);
        ctx.println("before");
        let replacement = second.sink();
        ctx.set_stdout(std::sync::Arc::clone(&replacement));
        assert!(std::sync::Arc::ptr_eq(&ctx.stdout(), &replacement));
        ctx.println("after");
        assert_eq!(first.contents(), "before\n");
        assert_eq!(second.contents(), "after\n");
    }

    #[test]
    fn test_read_input_line_walks_the_substituted_bytes() {
        let ctx = context_with(&CaptureBuffer::new()).with_input(b"42\nnext\n".to_vec());
        assert_eq!(ctx.read_input_line().as_deref(), Some("42"));
        assert_eq!(ctx.read_input_line().as_deref(), Some("next"));
        assert_eq!(ctx.read_input_line(), None);
    }

    #[test]
    fn test_awards_accumulate() {
        let ctx = context_with(&CaptureBuffer::new());
        assert_eq!(ctx.points_awarded(), 0.0);
        ctx.award(10.0);
        ctx.award(5.0);
        assert_eq!(ctx.points_awarded(), 15.0);
    }

    #[test]
    fn test_request_exit_unwinds_when_guarded() {
        let ctx = context_with(&CaptureBuffer::new());
        assert!(ctx.arm_exit_guard());
        let unwound = catch_unwind(AssertUnwindSafe(|| {
            ctx.request_exit(3);
        }))
        .unwrap_err();
        let request = unwound.downcast_ref::<ExitRequest>().unwrap();
        assert_eq!(request.status, 3);
    }

    #[test]
    fn test_request_exit_isolates_when_unguarded() {
        let ctx = context_with(&CaptureBuffer::new());
        let unwound = catch_unwind(AssertUnwindSafe(|| {
            ctx.request_exit(1);
        }))
        .unwrap_err();
        assert!(unwound.downcast_ref::<ExitRequest>().is_some());
    }
}
