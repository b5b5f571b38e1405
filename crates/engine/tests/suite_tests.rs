//! Integration tests for the sequential test loop in `kata_engine::suite`.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use common::{specs, Behavior, ScriptedSandbox};
use kata_core::{ChallengeKind, ExecutableBundle, RunnerError, Verdict};
use kata_engine::suite::{execute_tests, invoke, Superseded};
use kata_engine::{Loggers, OutputChannel, Sandbox, TestRunner};
use tokio_util::sync::CancellationToken;

const TIMEOUT: Duration = Duration::from_millis(5000);

fn runner(sandbox: &ScriptedSandbox) -> Box<dyn TestRunner> {
    let bundle = ExecutableBundle {
        challenge_id: "suite".into(),
        kind: ChallengeKind::JavaScript,
        source: "var a = 1;".into(),
    };
    sandbox
        .create_runner(&bundle, Loggers::new(OutputChannel::new("log"), None))
        .expect("scripted sandbox always creates runners")
}

// ---------------------------------------------------------------------------
// Test: execute_tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn failures_are_reported_as_they_happen() {
    let sandbox = ScriptedSandbox::default();
    sandbox.script("assert_t1", Behavior::Fail("AssertionError", ""));
    sandbox.script("assert_t3", Behavior::Hang);
    let runner = runner(&sandbox);

    let mut failures = Vec::new();
    let results = execute_tests(
        runner.as_ref(),
        &specs(&["t1", "t2", "t3"]),
        TIMEOUT,
        &CancellationToken::new(),
        |failed| failures.push(failed.message.clone().unwrap_or_default()),
    )
    .await
    .expect("not cancelled");

    assert_eq!(results.len(), 3);
    assert!(results[1].is_passed());
    assert_eq!(failures, vec!["t1", "t3 (Test timed out)"]);
}

#[tokio::test(start_paused = true)]
async fn cancelled_suite_runs_nothing() {
    let sandbox = ScriptedSandbox::default();
    let runner = runner(&sandbox);
    let token = CancellationToken::new();
    token.cancel();

    let outcome = execute_tests(runner.as_ref(), &specs(&["t1"]), TIMEOUT, &token, |_| {}).await;

    assert_eq!(outcome, Err(Superseded));
    assert!(sandbox.invocations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_discards_in_flight_result() {
    let sandbox = ScriptedSandbox::default();
    sandbox.script("assert_t1", Behavior::Hang);
    let runner = runner(&sandbox);
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = tokio::time::Instant::now();
    let outcome =
        execute_tests(runner.as_ref(), &specs(&["t1", "t2"]), TIMEOUT, &token, |_| {}).await;

    // The dispatched invocation still runs to its own timeout.
    assert_eq!(outcome, Err(Superseded));
    assert_eq!(started.elapsed(), TIMEOUT);
    assert_eq!(sandbox.invocations().len(), 1);
}

// ---------------------------------------------------------------------------
// Test: invoke
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn invoke_times_out_at_exact_deadline() {
    let sandbox = ScriptedSandbox::default();
    sandbox.script("slow", Behavior::Slow(Duration::from_secs(10)));
    let runner = runner(&sandbox);

    let started = tokio::time::Instant::now();
    let outcome = invoke(runner.as_ref(), Some("slow"), Duration::from_secs(2), false).await;

    assert_matches!(outcome, Err(RunnerError::Timeout));
    assert_eq!(started.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn invoke_returns_verdict_within_deadline() {
    let sandbox = ScriptedSandbox::default();
    sandbox.script("slow", Behavior::Slow(Duration::from_secs(1)));
    let runner = runner(&sandbox);

    let outcome = invoke(runner.as_ref(), Some("slow"), Duration::from_secs(2), true).await;

    assert_matches!(outcome, Ok(Verdict::Pass));
    assert!(sandbox.invocations()[0].flush_logs);
}
