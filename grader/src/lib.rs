//! # Grader Library
//!
//! Driver-facing orchestration for grading untrusted check bodies. The
//! external test-discovery runner owns check enumeration and pass/fail
//! reporting; this crate owns everything between: per-check isolation,
//! outcome classification, score accrual, and the final report.
//!
//! ## Key Concepts
//! - **GradingSession**: one grading run. The driver walks it through
//!   `before_each` / `run_check` / `after_each` per check and `finish` at
//!   the end.
//! - **Check**: one unit of gradeable work: a body closure plus its
//!   weight, optional timeout override, and optional substituted input.
//! - **Ledger**: fixed or variable scoring, configured once per session.
//! - **Transcript**: the chronological record of everything checks printed,
//!   interleaved with their diagnostic lines, emitted with the score line
//!   through the session's original console target.
//!
//! ## Example
//!
//! ```
//! use check_runner::verify;
//! use grader::{Check, GradingSession};
//! use util::execution_config::ExecutionConfig;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), grader::error::GraderError> {
//! let mut session = GradingSession::new(ExecutionConfig::default());
//! session.variable_scoring()?;
//!
//! session.before_each("adds small numbers")?;
//! session
//!     .run_check(
//!         Check::new(|ctx| {
//!             verify::ensure(2 + 2 == 4, "Wrong sum.");
//!             ctx.award(25.0);
//!         })
//!         .worth(25.0),
//!     )
//!     .await?;
//! session.after_each()?;
//!
//! let report = session.finish()?;
//! assert!(report.final_text().starts_with("You scored a 25.00 out of 25.00"));
//! # Ok(())
//! # }
//! ```

pub mod diagnostics;
pub mod error;
pub mod ledger;
pub mod report;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use check_runner::capture::{CaptureBuffer, OutputSink, console_sink};
use check_runner::context::CheckContext;
use check_runner::executor::{CheckBody, WorkerBudget, run_bounded};
use check_runner::exit::{ExitGuard, TerminationPolicy};
use check_runner::outcome::ExecutionOutcome;

use crate::error::GraderError;
use crate::ledger::{ScoreLedger, ScoringPolicy};
use crate::report::{CheckRecord, GradeReport};
use util::execution_config::ExecutionConfig;

/// One unit of gradeable work.
///
/// The body receives the check's [`CheckContext`] and expresses failure
/// through [`check_runner::verify`] assertions (or any panic); it awards
/// its points through the context before returning. Weight, timeout and
/// substituted input are attached builder-style.
pub struct Check {
    body: CheckBody,
    weight: Option<f64>,
    timeout: Option<Duration>,
    input: Vec<u8>,
}

impl Check {
    pub fn new(body: impl FnOnce(&CheckContext) + Send + 'static) -> Self {
        Self {
            body: Box::new(body),
            weight: None,
            timeout: None,
            input: Vec::new(),
        }
    }

    /// Declares this check's weight. Required under variable scoring,
    /// ignored under fixed scoring.
    pub fn worth(mut self, points: f64) -> Self {
        self.weight = Some(points);
        self
    }

    /// Overrides the session's default deadline for this check alone.
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Substitutes the bytes the body will see on its standard input, to
    /// simulate user input for an interactive program under test.
    pub fn with_input(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.input = bytes.into();
        self
    }
}

struct ActiveCheck {
    name: String,
    executed: bool,
}

/// One grading run.
///
/// All formerly process-global state (the output target, the exit
/// interception flag, the score accumulator) lives here or in the
/// per-check contexts this session creates, so repeated or concurrent
/// sessions compose without touching each other.
pub struct GradingSession {
    config: ExecutionConfig,
    ledger: ScoreLedger,
    transcript: CaptureBuffer,
    console: OutputSink,
    budget: WorkerBudget,
    policy: TerminationPolicy,
    active: Option<ActiveCheck>,
    records: Vec<CheckRecord>,
}

impl GradingSession {
    pub fn new(config: ExecutionConfig) -> Self {
        let budget = WorkerBudget::from_config(&config);
        Self {
            config,
            ledger: ScoreLedger::new(),
            transcript: CaptureBuffer::new(),
            console: console_sink(),
            budget,
            policy: TerminationPolicy::default(),
            active: None,
            records: Vec::new(),
        }
    }

    /// Replaces the console target the final report is written to. The
    /// default is the process's real standard output; tests substitute a
    /// buffer.
    pub fn with_console(mut self, sink: OutputSink) -> Self {
        self.console = sink;
        self
    }

    /// Sets the termination policy handed to each check context.
    pub fn with_termination_policy(mut self, policy: TerminationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Selects fixed scoring: `checks` equal-weight checks summing to
    /// `total`. Must be called exactly once, before the first check.
    pub fn fixed_scoring(&mut self, total: f64, checks: u32) -> Result<(), GraderError> {
        self.ledger.configure_fixed(total, checks)
    }

    /// Selects variable scoring: each check declares its own weight.
    /// Must be called exactly once, before the first check.
    pub fn variable_scoring(&mut self) -> Result<(), GraderError> {
        self.ledger.configure_variable()
    }

    /// Opens a check: writes its transcript header and arms the lifecycle
    /// state `run_check` requires.
    pub fn before_each(&mut self, name: &str) -> Result<(), GraderError> {
        if let Some(open) = &self.active {
            return Err(GraderError::LifecycleViolation(format!(
                "check \"{}\" is still open; call after_each before starting \"{name}\"",
                open.name
            )));
        }
        self.transcript.append_line(&format!("Test Case \"{name}\":"));
        self.active = Some(ActiveCheck {
            name: name.to_string(),
            executed: false,
        });
        Ok(())
    }

    /// Runs the open check's body under the session deadline and records
    /// its outcome: fresh context, exit guard installed, bounded
    /// execution, classification, single ledger accrual, capture merge,
    /// diagnostic line. Returns the outcome so the driver can mark the
    /// check pass/fail in its own reporting.
    ///
    /// `Err` here always means a harness defect (lifecycle misuse, ledger
    /// misconfiguration, worker budget exhausted), never a result of the
    /// code under test. No outcome aborts the run.
    pub async fn run_check(&mut self, check: Check) -> Result<ExecutionOutcome, GraderError> {
        let name = match &self.active {
            Some(open) if !open.executed => open.name.clone(),
            Some(open) => {
                return Err(GraderError::LifecycleViolation(format!(
                    "check \"{}\" has already executed; call after_each first",
                    open.name
                )));
            }
            None => {
                return Err(GraderError::LifecycleViolation(
                    "run_check called without before_each".to_string(),
                ));
            }
        };

        // Surface a misconfigured ledger before any untrusted code runs.
        match self.ledger.policy() {
            None => {
                return Err(GraderError::LedgerUnconfigured(
                    "no scoring policy configured for this session".to_string(),
                ));
            }
            Some(ScoringPolicy::Variable) if check.weight.is_none() => {
                return Err(GraderError::MissingWeight(format!(
                    "check \"{name}\" declares no weight under variable scoring"
                )));
            }
            Some(_) => {}
        }

        let limit = check.timeout.unwrap_or_else(|| self.config.check_timeout());
        let check_output = CaptureBuffer::new();
        let ctx = Arc::new(
            CheckContext::new(self.console.clone(), self.policy).with_input(check.input),
        );

        let token = ctx.redirect_output(check_output.sink());
        let guard = ExitGuard::install(&ctx)?;
        tracing::info!(check = %name, limit_ms = limit.as_millis() as u64, "running check");
        let run = run_bounded(Arc::clone(&ctx), check.body, limit, &self.budget).await;
        drop(guard);
        ctx.restore_output(token);
        let outcome = run?;

        // Credit stands only when the body ran to completion; every other
        // outcome means it never reached its award statement.
        let earned = if outcome.is_success() {
            ctx.points_awarded()
        } else {
            0.0
        };
        let accrual = self.ledger.accrue(earned, check.weight)?;

        // Merge this check's captured output into the transcript, then the
        // diagnostic, so the run reads as a chronological record.
        let body_output = check_output.contents();
        if !body_output.is_empty() {
            self.transcript.append(&body_output);
            if !body_output.ends_with('\n') {
                self.transcript.append("\n");
            }
        }
        let diagnostic = diagnostics::describe(&outcome);
        for line in diagnostic.lines() {
            self.transcript.append_line(&format!("\t{line}"));
        }

        tracing::info!(
            check = %name,
            credited = accrual.credited,
            weight = accrual.weight,
            ?outcome,
            "check finished"
        );
        self.records.push(CheckRecord {
            name,
            earned: accrual.credited,
            possible: accrual.weight,
            diagnostic,
            outcome: outcome.clone(),
        });
        if let Some(open) = &mut self.active {
            open.executed = true;
        }
        Ok(outcome)
    }

    /// Closes the open check. A check that was opened but never run is
    /// allowed through here and simply contributes nothing to the run.
    pub fn after_each(&mut self) -> Result<(), GraderError> {
        match self.active.take() {
            Some(_) => {
                // Spacing between test case blocks in the transcript.
                self.transcript.append_line("");
                Ok(())
            }
            None => Err(GraderError::LifecycleViolation(
                "after_each called without an open check".to_string(),
            )),
        }
    }

    /// The transcript accumulated so far.
    pub fn transcript(&self) -> String {
        self.transcript.contents()
    }

    /// Workers abandoned by timed-out checks that are still running.
    pub fn abandoned_workers(&self) -> usize {
        self.budget.live()
    }

    /// Ends the run: builds the report and writes its text through the
    /// session's original, never-redirected console target.
    pub fn finish(self) -> Result<GradeReport, GraderError> {
        if let Some(open) = &self.active {
            return Err(GraderError::LifecycleViolation(format!(
                "check \"{}\" is still open; call after_each before finish",
                open.name
            )));
        }
        let summary = self.ledger.summary()?;
        let report = GradeReport {
            earned: summary.earned,
            possible: summary.possible,
            generated_at: Utc::now(),
            checks: self.records,
            transcript: self.transcript.contents(),
        };
        {
            let mut console = self
                .console
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Err(err) = writeln!(console, "{}", report.final_text()) {
                tracing::warn!(%err, "failed to write the final report to the console target");
            }
            let _ = console.flush();
        }
        Ok(report)
    }
}
