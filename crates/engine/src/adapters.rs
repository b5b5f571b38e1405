//! Contracts of the collaborators the orchestrator drives.
//!
//! The engine never builds or executes learner code itself. It calls a
//! [`BuildPipeline`] to produce a bundle, asks a [`Sandbox`] for a
//! [`TestRunner`] over that bundle, and hands preview bundles to a
//! [`PreviewUpdater`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kata_core::{BuildError, ChallengeData, ExecutableBundle, LogFragment, RunnerError, Verdict};

use crate::channel::OutputChannel;
use crate::error::SandboxError;

/// Transforms challenge input into something a sandbox can run.
#[async_trait]
pub trait BuildPipeline: Send + Sync {
    async fn build(&self, challenge: &ChallengeData) -> Result<ExecutableBundle, BuildError>;
}

/// Executes assertions against one built bundle.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Run `assertion` (or just evaluate the user code when `None`).
    ///
    /// `flush_logs` tells the runner whether console output captured during
    /// this invocation should be forwarded to the log sink.
    async fn run(
        &self,
        assertion: Option<&str>,
        timeout: Duration,
        flush_logs: bool,
    ) -> Result<Verdict, RunnerError>;
}

/// Factory for test runners.
pub trait Sandbox: Send + Sync {
    fn create_runner(
        &self,
        bundle: &ExecutableBundle,
        loggers: Loggers,
    ) -> Result<Box<dyn TestRunner>, SandboxError>;
}

/// Renders a bundle into a live preview surface.
///
/// Best effort: failures are reported through `loggers`, never returned.
#[async_trait]
pub trait PreviewUpdater: Send + Sync {
    async fn render(&self, bundle: &ExecutableBundle, loggers: &Loggers);
}

/// The collaborators a [`crate::Orchestrator`] is wired with.
#[derive(Clone)]
pub struct Adapters {
    pub build: Arc<dyn BuildPipeline>,
    pub sandbox: Arc<dyn Sandbox>,
    pub preview: Arc<dyn PreviewUpdater>,
}

/// Output sinks handed to sandboxed code.
///
/// `log` receives captured `console.log` output. `console` receives
/// runtime errors raised by the live preview, and is only present in
/// Preview runs.
#[derive(Debug, Clone)]
pub struct Loggers {
    log: OutputChannel,
    console: Option<OutputChannel>,
}

impl Loggers {
    pub fn new(log: OutputChannel, console: Option<OutputChannel>) -> Self {
        Self { log, console }
    }

    /// Emit captured output. Dropped silently once the run has closed its
    /// log channel.
    pub fn log(&self, fragment: impl Into<LogFragment>) {
        if self.log.emit(fragment).is_err() {
            tracing::trace!(channel = self.log.name(), "Dropping output after close");
        }
    }

    /// Emit a console line, if this run owns a console channel.
    pub fn console(&self, fragment: impl Into<LogFragment>) {
        if let Some(console) = &self.console {
            if console.emit(fragment).is_err() {
                tracing::trace!(channel = console.name(), "Dropping output after close");
            }
        }
    }

    pub fn log_channel(&self) -> &OutputChannel {
        &self.log
    }

    pub fn console_channel(&self) -> Option<&OutputChannel> {
        self.console.as_ref()
    }
}
