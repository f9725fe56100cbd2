// tests/bounded_execution.rs
//
// Exercises the execution engine end to end: deadline handling, fault
// classification, exit interception, and the abandoned-worker budget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use check_runner::capture::CaptureBuffer;
use check_runner::context::CheckContext;
use check_runner::error::RunnerError;
use check_runner::executor::{WorkerBudget, run_bounded};
use check_runner::exit::{ExitGuard, TerminationPolicy};
use check_runner::outcome::ExecutionOutcome;
use check_runner::verify;

fn guarded_context(buffer: &CaptureBuffer) -> (Arc<CheckContext>, ExitGuard) {
    let ctx = Arc::new(CheckContext::new(buffer.sink(), TerminationPolicy::Isolate));
    let guard = ExitGuard::install(&ctx).expect("fresh context");
    (ctx, guard)
}

#[tokio::test]
async fn host_survives_an_exit_attempt() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let buffer = CaptureBuffer::new();
    let (ctx, guard) = guarded_context(&buffer);
    let budget = WorkerBudget::new(4);

    let outcome = run_bounded(
        Arc::clone(&ctx),
        Box::new(|ctx| {
            ctx.println("about to bail");
            ctx.request_exit(42);
        }),
        Duration::from_secs(1),
        &budget,
    )
    .await
    .unwrap();
    drop(guard);

    // Reaching this line at all means the process survived.
    assert_eq!(outcome, ExecutionOutcome::ExitAttempted { status: 42 });
    assert_eq!(buffer.contents(), "about to bail\n");
}

#[tokio::test]
async fn timeout_returns_within_bounded_latency() {
    let buffer = CaptureBuffer::new();
    let (ctx, guard) = guarded_context(&buffer);
    let budget = WorkerBudget::new(4);

    let started = Instant::now();
    let outcome = run_bounded(
        ctx,
        Box::new(|_ctx| std::thread::sleep(Duration::from_millis(500))),
        Duration::from_millis(50),
        &budget,
    )
    .await
    .unwrap();
    drop(guard);

    assert_eq!(outcome, ExecutionOutcome::TimedOut { limit_ms: 50 });
    // The harness must come back promptly, not wait out the worker.
    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(budget.live(), 1);
}

#[tokio::test]
async fn abandoned_worker_cannot_kill_the_host() {
    let buffer = CaptureBuffer::new();
    let (ctx, guard) = guarded_context(&buffer);
    let budget = WorkerBudget::new(4);

    // The body outlives its deadline, then asks to exit after the check is
    // long over and its guard is gone.
    let outcome = run_bounded(
        ctx,
        Box::new(|ctx| {
            std::thread::sleep(Duration::from_millis(200));
            ctx.request_exit(7);
        }),
        Duration::from_millis(30),
        &budget,
    )
    .await
    .unwrap();
    drop(guard);
    assert_eq!(outcome, ExecutionOutcome::TimedOut { limit_ms: 30 });

    // Give the zombie time to make its exit request.
    std::thread::sleep(Duration::from_millis(400));
    // Still here, and the worker has wound down.
    assert_eq!(budget.live(), 0);
}

#[tokio::test]
async fn budget_recovers_once_workers_finish() {
    let buffer = CaptureBuffer::new();
    let budget = WorkerBudget::new(0);

    let (ctx, guard) = guarded_context(&buffer);
    let outcome = run_bounded(
        ctx,
        Box::new(|_ctx| std::thread::sleep(Duration::from_millis(150))),
        Duration::from_millis(30),
        &budget,
    )
    .await
    .unwrap();
    drop(guard);
    assert_eq!(outcome, ExecutionOutcome::TimedOut { limit_ms: 30 });

    let (ctx, guard) = guarded_context(&buffer);
    let refused = run_bounded(ctx, Box::new(|_ctx| {}), Duration::from_millis(30), &budget).await;
    drop(guard);
    assert!(matches!(
        refused,
        Err(RunnerError::AbandonedWorkerLimit { .. })
    ));

    std::thread::sleep(Duration::from_millis(300));

    let (ctx, guard) = guarded_context(&buffer);
    let outcome = run_bounded(
        ctx,
        Box::new(|ctx| ctx.award(1.0)),
        Duration::from_millis(100),
        &budget,
    )
    .await
    .unwrap();
    drop(guard);
    assert_eq!(outcome, ExecutionOutcome::Succeeded);
}

#[tokio::test]
async fn capture_isolates_checks_from_each_other() {
    let budget = WorkerBudget::new(4);

    // First check times out while still printing in a loop.
    let first_buffer = CaptureBuffer::new();
    let (ctx, guard) = guarded_context(&first_buffer);
    let outcome = run_bounded(
        ctx,
        Box::new(|ctx| {
            for _ in 0..20 {
                ctx.println("still going");
                std::thread::sleep(Duration::from_millis(20));
            }
        }),
        Duration::from_millis(30),
        &budget,
    )
    .await
    .unwrap();
    drop(guard);
    assert_eq!(outcome, ExecutionOutcome::TimedOut { limit_ms: 30 });

    // Second check has its own buffer; the zombie keeps writing to the
    // first one only.
    let second_buffer = CaptureBuffer::new();
    let (ctx, guard) = guarded_context(&second_buffer);
    run_bounded(
        ctx,
        Box::new(|ctx| ctx.println("clean run")),
        Duration::from_secs(1),
        &budget,
    )
    .await
    .unwrap();
    drop(guard);

    assert_eq!(second_buffer.contents(), "clean run\n");
    assert!(!second_buffer.contents().contains("still going"));
}

#[tokio::test]
async fn assertion_and_crash_are_distinguished() {
    let budget = WorkerBudget::new(4);

    let (ctx, guard) = guarded_context(&CaptureBuffer::new());
    let assertion = run_bounded(
        ctx,
        Box::new(|_ctx| verify::ensure(false, "Returned false when expected true.")),
        Duration::from_secs(1),
        &budget,
    )
    .await
    .unwrap();
    drop(guard);
    assert_eq!(
        assertion,
        ExecutionOutcome::AssertionFailed {
            message: "Returned false when expected true.".to_string()
        }
    );

    let (ctx, guard) = guarded_context(&CaptureBuffer::new());
    let crash = run_bounded(
        ctx,
        Box::new(|_ctx| {
            let nothing: Option<u32> = None;
            let _ = nothing.unwrap();
        }),
        Duration::from_secs(1),
        &budget,
    )
    .await
    .unwrap();
    drop(guard);
    match crash {
        ExecutionOutcome::Crashed { kind, .. } => assert_eq!(kind, "failed unwrap"),
        other => panic!("expected a crash, got {other:?}"),
    }
}
