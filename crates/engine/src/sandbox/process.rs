//! Subprocess sandbox.
//!
//! Each runner invocation spawns the configured interpreter, pipes a JSON
//! request to its stdin, and reads JSON lines back from stdout:
//!
//! ```text
//! -> {"source": "...", "assertion": "assert(a === 1)", "flush_logs": true}
//! <- {"log": ["a is", 1]}
//! <- {"pass": false, "err": {"message": "AssertionError", "stack": "at x"}}
//! ```
//!
//! `log` lines are forwarded only when `flush_logs` is set. The first
//! verdict line ends the invocation; the child is killed once it is
//! dropped, whether it settled, timed out, or lingered after its verdict.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use kata_core::{AssertionError, ExecutableBundle, LogFragment, RunnerError, Verdict};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

use crate::adapters::{Loggers, Sandbox, TestRunner};
use crate::config::SandboxConfig;
use crate::error::SandboxError;

/// Maximum stderr captured per invocation (64 KiB).
const MAX_STDERR_BYTES: u64 = 64 * 1024;

/// Spawns one interpreter process per runner invocation.
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    program: String,
    args: Vec<String>,
}

impl ProcessSandbox {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
        }
    }
}

impl Sandbox for ProcessSandbox {
    fn create_runner(
        &self,
        bundle: &ExecutableBundle,
        loggers: Loggers,
    ) -> Result<Box<dyn TestRunner>, SandboxError> {
        if !bundle.kind.is_assertion_compatible() {
            return Err(SandboxError::Unsupported(bundle.kind));
        }
        Ok(Box::new(ProcessTestRunner {
            program: self.program.clone(),
            args: self.args.clone(),
            source: bundle.source.clone(),
            loggers,
        }))
    }
}

/// Request written to the interpreter's stdin.
#[derive(Debug, Serialize)]
struct SandboxRequest<'a> {
    source: &'a str,
    assertion: Option<&'a str>,
    flush_logs: bool,
}

/// One line of interpreter output.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SandboxMessage {
    Log {
        log: serde_json::Value,
    },
    Verdict {
        pass: bool,
        #[serde(default)]
        err: Option<AssertionError>,
    },
}

pub struct ProcessTestRunner {
    program: String,
    args: Vec<String>,
    source: String,
    loggers: Loggers,
}

#[async_trait]
impl TestRunner for ProcessTestRunner {
    async fn run(
        &self,
        assertion: Option<&str>,
        timeout: Duration,
        flush_logs: bool,
    ) -> Result<Verdict, RunnerError> {
        let start = Instant::now();

        // `kill_on_drop(true)` ensures the child dies with the timed-out future.
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RunnerError::Sandbox(format!("Failed to spawn {}: {e}", self.program)))?;

        let request = SandboxRequest {
            source: &self.source,
            assertion,
            flush_logs,
        };
        write_request(&mut child, &request).await?;

        let outcome = tokio::time::timeout(timeout, self.exchange(child, flush_logs)).await;

        tracing::trace!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            timed_out = outcome.is_err(),
            "Sandbox invocation finished",
        );

        match outcome {
            Ok(result) => result,
            Err(_elapsed) => Err(RunnerError::Timeout),
        }
    }
}

impl ProcessTestRunner {
    /// Read output lines until the first verdict. Without one, wait for the
    /// child to exit and report its stderr.
    async fn exchange(&self, mut child: Child, flush_logs: bool) -> Result<Verdict, RunnerError> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::Sandbox("Sandbox stdout unavailable".into()))?;
        let stderr_task = tokio::spawn(read_capped(child.stderr.take()));

        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| RunnerError::Sandbox(format!("Failed to read sandbox output: {e}")))?
        {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SandboxMessage>(&line) {
                Ok(SandboxMessage::Log { log }) => {
                    if flush_logs {
                        self.loggers.log(LogFragment(log));
                    }
                }
                Ok(SandboxMessage::Verdict { pass, err }) => {
                    // Dropping `child` on return kills it.
                    stderr_task.abort();
                    return match to_verdict(pass, err) {
                        Verdict::Fail(err) => Err(RunnerError::Failed(err)),
                        Verdict::Pass => Ok(Verdict::Pass),
                    };
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Ignoring malformed sandbox line");
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| RunnerError::Sandbox(format!("Failed to wait for sandbox: {e}")))?;
        let stderr = stderr_task.await.unwrap_or_default();

        Err(RunnerError::Sandbox(format!(
            "Sandbox exited with {status} without a verdict: {}",
            String::from_utf8_lossy(&stderr).trim()
        )))
    }
}

fn to_verdict(pass: bool, err: Option<AssertionError>) -> Verdict {
    if pass {
        Verdict::Pass
    } else {
        Verdict::Fail(err.unwrap_or_else(|| AssertionError::new("Assertion failed", "")))
    }
}

async fn write_request(child: &mut Child, request: &SandboxRequest<'_>) -> Result<(), RunnerError> {
    let mut payload = serde_json::to_vec(request)
        .map_err(|e| RunnerError::Sandbox(format!("Failed to encode sandbox request: {e}")))?;
    payload.push(b'\n');

    if let Some(mut stdin) = child.stdin.take() {
        // Best-effort write; an interpreter that exits early closes stdin.
        let _ = stdin.write_all(&payload).await;
        drop(stdin);
    }
    Ok(())
}

/// Read an entire stream into a byte buffer, capped at [`MAX_STDERR_BYTES`].
async fn read_capped<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        let _ = h.take(MAX_STDERR_BYTES).read_to_end(&mut buf).await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
