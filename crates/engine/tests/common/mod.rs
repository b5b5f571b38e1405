//! Shared fakes for orchestrator and suite tests.
//!
//! The fakes script every collaborator the engine drives so tests can
//! assert on exactly which builds and invocations happened.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kata_core::{
    AssertionError, BuildError, ChallengeData, ChallengeFile, ChallengeKind, ExecutableBundle,
    RunnerError, TestSpec, Verdict,
};
use kata_engine::{
    Adapters, BuildPipeline, EngineConfig, Loggers, Orchestrator, PreviewUpdater, RunHandle,
    Sandbox, SandboxError, TestRunner,
};
use kata_events::{ChallengeEvent, EventBus, StateUpdate};
use tokio::sync::{mpsc, Barrier};

// ---------------------------------------------------------------------------
// Challenges
// ---------------------------------------------------------------------------

pub fn js_challenge() -> ChallengeData {
    ChallengeData::new("js-basics", ChallengeKind::JavaScript)
        .with_file(ChallengeFile::new("indexjs", "js", "var a = 1;"))
}

pub fn html_challenge() -> ChallengeData {
    ChallengeData::new("html-basics", ChallengeKind::Html)
        .with_file(ChallengeFile::new("indexhtml", "html", "<h1>Hello</h1>"))
}

pub fn specs(names: &[&str]) -> Vec<TestSpec> {
    names
        .iter()
        .map(|name| TestSpec::new(*name, format!("assert_{name}")))
        .collect()
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Counts builds and fails them on demand.
#[derive(Default)]
pub struct FakeBuild {
    builds: AtomicUsize,
    fail: AtomicBool,
    rendezvous: Mutex<Option<Arc<Barrier>>>,
}

impl FakeBuild {
    /// Hold every build until `parties` builds are in flight at once.
    pub fn set_rendezvous(&self, parties: usize) {
        *self.rendezvous.lock().expect("rendezvous lock") = Some(Arc::new(Barrier::new(parties)));
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BuildPipeline for FakeBuild {
    async fn build(&self, challenge: &ChallengeData) -> Result<ExecutableBundle, BuildError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        let rendezvous = self.rendezvous.lock().expect("rendezvous lock").clone();
        if let Some(barrier) = rendezvous {
            barrier.wait().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(BuildError::Transform("Unexpected token <".into()));
        }
        Ok(ExecutableBundle {
            challenge_id: challenge.id.clone(),
            kind: challenge.kind,
            source: challenge
                .files
                .iter()
                .map(|f| f.contents.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        })
    }
}

// ---------------------------------------------------------------------------
// Sandbox
// ---------------------------------------------------------------------------

/// What the fake runner does for one assertion.
#[derive(Debug, Clone)]
pub enum Behavior {
    Pass,
    /// Resolve with a failing verdict.
    Fail(&'static str, &'static str),
    /// Reject with an assertion error.
    Throw(&'static str, &'static str),
    /// Never settle.
    Hang,
    /// Log the fragment (when flushing is requested), then pass.
    Log(&'static str),
    /// Settle with a pass after `delay`.
    Slow(Duration),
}

/// One recorded runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub assertion: Option<String>,
    pub flush_logs: bool,
}

/// Sandbox whose runners follow a per-assertion script.
///
/// Unscripted assertions pass. Evaluation without an assertion is keyed
/// by the empty string.
#[derive(Default)]
pub struct ScriptedSandbox {
    script: Mutex<HashMap<String, Behavior>>,
    invocations: Arc<Mutex<Vec<Invocation>>>,
    loggers: Mutex<Vec<Loggers>>,
}

impl ScriptedSandbox {
    pub fn script(&self, assertion: &str, behavior: Behavior) {
        self.script
            .lock()
            .expect("script lock")
            .insert(assertion.to_string(), behavior);
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().expect("invocations lock").clone()
    }

    /// Loggers handed to every runner created so far, in creation order.
    pub fn loggers(&self) -> Vec<Loggers> {
        self.loggers.lock().expect("loggers lock").clone()
    }
}

impl Sandbox for ScriptedSandbox {
    fn create_runner(
        &self,
        _bundle: &ExecutableBundle,
        loggers: Loggers,
    ) -> Result<Box<dyn TestRunner>, SandboxError> {
        self.loggers
            .lock()
            .expect("loggers lock")
            .push(loggers.clone());
        Ok(Box::new(ScriptedRunner {
            script: self.script.lock().expect("script lock").clone(),
            invocations: Arc::clone(&self.invocations),
            loggers,
        }))
    }
}

struct ScriptedRunner {
    script: HashMap<String, Behavior>,
    invocations: Arc<Mutex<Vec<Invocation>>>,
    loggers: Loggers,
}

#[async_trait]
impl TestRunner for ScriptedRunner {
    async fn run(
        &self,
        assertion: Option<&str>,
        _timeout: Duration,
        flush_logs: bool,
    ) -> Result<Verdict, RunnerError> {
        self.invocations
            .lock()
            .expect("invocations lock")
            .push(Invocation {
                assertion: assertion.map(str::to_string),
                flush_logs,
            });

        let behavior = self
            .script
            .get(assertion.unwrap_or(""))
            .cloned()
            .unwrap_or(Behavior::Pass);

        match behavior {
            Behavior::Pass => Ok(Verdict::Pass),
            Behavior::Fail(message, stack) => {
                Ok(Verdict::Fail(AssertionError::new(message, stack)))
            }
            Behavior::Throw(message, stack) => {
                Err(RunnerError::Failed(AssertionError::new(message, stack)))
            }
            Behavior::Hang => std::future::pending().await,
            Behavior::Log(fragment) => {
                if flush_logs {
                    self.loggers.log(fragment);
                }
                Ok(Verdict::Pass)
            }
            Behavior::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(Verdict::Pass)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// Records rendered bundles and the loggers each render received.
#[derive(Default)]
pub struct FakePreview {
    rendered: Mutex<Vec<String>>,
    loggers: Mutex<Vec<Loggers>>,
}

impl FakePreview {
    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().expect("rendered lock").clone()
    }

    pub fn loggers(&self) -> Vec<Loggers> {
        self.loggers.lock().expect("loggers lock").clone()
    }
}

#[async_trait]
impl PreviewUpdater for FakePreview {
    async fn render(&self, bundle: &ExecutableBundle, loggers: &Loggers) {
        self.rendered
            .lock()
            .expect("rendered lock")
            .push(bundle.source.clone());
        self.loggers
            .lock()
            .expect("loggers lock")
            .push(loggers.clone());
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub build: Arc<FakeBuild>,
    pub sandbox: Arc<ScriptedSandbox>,
    pub preview: Arc<FakePreview>,
    pub updates: mpsc::UnboundedReceiver<StateUpdate>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let build = Arc::new(FakeBuild::default());
        let sandbox = Arc::new(ScriptedSandbox::default());
        let preview = Arc::new(FakePreview::default());
        let bus = Arc::new(EventBus::default());
        let updates = bus.subscribe();

        let adapters = Adapters {
            build: build.clone(),
            sandbox: sandbox.clone(),
            preview: preview.clone(),
        };

        Self {
            orchestrator: Orchestrator::new(config, adapters, bus),
            build,
            sandbox,
            preview,
            updates,
        }
    }

    /// Every update published since the last drain.
    pub fn drain(&mut self) -> Vec<StateUpdate> {
        let mut drained = Vec::new();
        while let Ok(update) = self.updates.try_recv() {
            drained.push(update);
        }
        drained
    }

    /// Wait until the sandbox has seen `count` invocations.
    pub async fn until_invocations(&self, count: usize) {
        while self.sandbox.invocations().len() < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

/// Flatten the events published by one run.
pub fn events_of(updates: &[StateUpdate], handle: &RunHandle) -> Vec<ChallengeEvent> {
    updates
        .iter()
        .filter(|u| u.run_id == handle.id())
        .flat_map(|u| u.events.iter().cloned())
        .collect()
}

pub fn count_build_disabled(updates: &[StateUpdate]) -> usize {
    updates
        .iter()
        .flat_map(|u| u.events.iter())
        .filter(|e| matches!(e, ChallengeEvent::BuildDisabled))
        .count()
}
