//! Sequential test execution loop.
//!
//! Drives a [`TestRunner`] over a suite one assertion at a time, in input
//! order. A failing or timed-out test is recorded and the loop moves on.

use std::time::{Duration, Instant};

use kata_core::{AssertionError, RunnerError, TestResult, TestSpec, Verdict};
use tokio_util::sync::CancellationToken;

use crate::adapters::TestRunner;

/// Index of the only invocation allowed to surface sandbox console output.
///
/// Every test re-evaluates the same user code, so forwarding logs from each
/// invocation would print them once per test.
pub const FLUSH_TEST_INDEX: usize = 1;

/// Whether the invocation at `index` should flush captured logs.
pub fn should_flush_logs(index: usize) -> bool {
    index == FLUSH_TEST_INDEX
}

/// The run was superseded; remaining tests were not started and the
/// partial results were discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superseded;

/// Run every test in `tests` and return one result per test, in order.
///
/// `on_failure` is called with each failing or timed-out result as soon as
/// it is known. Cancellation is checked before and after every invocation;
/// an invocation already in flight is allowed to settle but its result is
/// dropped.
pub async fn execute_tests<F>(
    runner: &dyn TestRunner,
    tests: &[TestSpec],
    timeout: Duration,
    cancel: &CancellationToken,
    mut on_failure: F,
) -> Result<Vec<TestResult>, Superseded>
where
    F: FnMut(&TestResult),
{
    let mut results = Vec::with_capacity(tests.len());

    for (index, spec) in tests.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(Superseded);
        }

        let start = Instant::now();
        let outcome = invoke(
            runner,
            Some(&spec.test_string),
            timeout,
            should_flush_logs(index),
        )
        .await;

        if cancel.is_cancelled() {
            tracing::debug!(test_index = index, "Discarding result of superseded run");
            return Err(Superseded);
        }

        let result = classify(spec, outcome);
        tracing::debug!(
            test_index = index,
            passed = result.is_passed(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Test finished",
        );
        if !result.is_passed() {
            on_failure(&result);
        }
        results.push(result);
    }

    Ok(results)
}

/// One runner invocation raced against a timer of exactly `timeout`.
///
/// Whichever settles first wins. If the timer wins the runner future is
/// dropped, so its late result can never be recorded.
pub async fn invoke(
    runner: &dyn TestRunner,
    assertion: Option<&str>,
    timeout: Duration,
    flush_logs: bool,
) -> Result<Verdict, RunnerError> {
    match tokio::time::timeout(timeout, runner.run(assertion, timeout, flush_logs)).await {
        Ok(outcome) => outcome,
        Err(_elapsed) => Err(RunnerError::Timeout),
    }
}

/// Convert one invocation outcome into the test's result.
pub fn classify(spec: &TestSpec, outcome: Result<Verdict, RunnerError>) -> TestResult {
    match outcome {
        Ok(Verdict::Pass) => TestResult::passed(spec),
        Ok(Verdict::Fail(err)) | Err(RunnerError::Failed(err)) => TestResult::failed(spec, &err),
        Err(RunnerError::Timeout) => {
            tracing::warn!(test = %spec.text, "Test timed out");
            TestResult::timed_out(spec)
        }
        Err(RunnerError::Sandbox(message)) => {
            TestResult::failed(spec, &AssertionError::new(message, ""))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
