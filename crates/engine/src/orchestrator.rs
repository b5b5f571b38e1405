//! Run orchestrator: accepts commands, owns cancellation, and turns build
//! and test outcomes into state updates.
//!
//! Each accepted command becomes a run: a Tokio task holding a
//! [`CancellationToken`]. Accepting a command cancels the previous run of
//! the same family (Execute also cancels a Preview that has not yet
//! completed). The new task first waits
//! for every run it superseded to finish its cleanup, so it never shares
//! state with a predecessor that is still writing.
//!
//! A run writes state only through `RunScope::publish`, which checks the
//! token and applies the events under the state lock. A superseded run can
//! therefore still close its channels but never reaches observers again.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use kata_core::console::{CONSOLE_OUTPUT_HEADER, CONSOLE_RUNNING_TESTS, CONSOLE_TESTS_COMPLETED};
use kata_core::types::{new_run_id, RunId};
use kata_core::{
    escape_html, BuildError, ChallengeData, ExecutableBundle, RunnerError, TestResult, TestSpec,
    Verdict,
};
use kata_events::{ChallengeEvent, EventBus, RunFamily, StateUpdate};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::adapters::{Adapters, Loggers};
use crate::channel::{OutputChannel, OutputStream};
use crate::config::EngineConfig;
use crate::error::{EngineError, SandboxError};
use crate::state::ChallengeState;
use crate::suite::{execute_tests, invoke, Superseded};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Commands accepted from the surrounding application.
#[derive(Debug, Clone)]
pub enum Command {
    /// Build and run the test suite.
    Execute {
        challenge: ChallengeData,
        tests: Vec<TestSpec>,
    },
    /// The learner edited a file. Re-enables the build gate.
    FileChanged { challenge: ChallengeData },
    /// The preview surface became available.
    PreviewMounted { challenge: ChallengeData },
    /// A challenge page was opened.
    ChallengeMounted { challenge: ChallengeData },
    /// The learner restored the seed code. Re-enables the build gate.
    ResetChallenge { challenge: ChallengeData },
}

impl Command {
    pub fn family(&self) -> RunFamily {
        match self {
            Self::Execute { .. } => RunFamily::Execute,
            _ => RunFamily::Preview,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Execute { .. } => "execute",
            Self::FileChanged { .. } => "file_changed",
            Self::PreviewMounted { .. } => "preview_mounted",
            Self::ChallengeMounted { .. } => "challenge_mounted",
            Self::ResetChallenge { .. } => "reset_challenge",
        }
    }
}

// ---------------------------------------------------------------------------
// Run lifecycle
// ---------------------------------------------------------------------------

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Waiting for superseded runs to finish their cleanup.
    Pending,
    /// Preview only: waiting out the debounce interval.
    Debouncing,
    Building,
    Running,
    Finalizing,
    /// Finished normally.
    Completed,
    /// The build gate was closed; nothing was done.
    Skipped,
    /// Superseded before it finished.
    Cancelled,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped | Self::Cancelled)
    }
}

/// Caller's view of one accepted command.
#[derive(Debug, Clone)]
pub struct RunHandle {
    id: RunId,
    family: RunFamily,
    token: CancellationToken,
    phase: watch::Receiver<RunPhase>,
}

impl RunHandle {
    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn family(&self) -> RunFamily {
        self.family
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.borrow()
    }

    /// Whether a newer command has superseded this run.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the run reaches a terminal phase and return it.
    ///
    /// A Preview run reports `Completed` while its console channel is still
    /// open; the channel stays open until the run is superseded.
    pub async fn wait(&mut self) -> RunPhase {
        match self.phase.wait_for(|phase| phase.is_terminal()).await {
            Ok(phase) => *phase,
            Err(_) => RunPhase::Cancelled,
        }
    }
}

/// What happens to an owned channel when its run finishes normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLifetime {
    CloseOnExit,
    /// Keep delivering until the run is superseded or the orchestrator
    /// shuts down.
    LeaveOpen,
}

/// Which channels a run owns and how long each one lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPolicy {
    pub log: ChannelLifetime,
    pub console: Option<ChannelLifetime>,
}

impl ChannelPolicy {
    pub const EXECUTE: Self = Self {
        log: ChannelLifetime::CloseOnExit,
        console: None,
    };

    /// The console stays open so runtime errors from later interaction with
    /// the live preview still reach the learner.
    pub const PREVIEW: Self = Self {
        log: ChannelLifetime::CloseOnExit,
        console: Some(ChannelLifetime::LeaveOpen),
    };
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Top-level coordinator of Execute and Preview runs.
///
/// Must be used from within a Tokio runtime. Dropping the orchestrator
/// cancels every run; call [`shutdown`](Self::shutdown) to also wait for
/// their cleanup.
pub struct Orchestrator {
    shared: Arc<Shared>,
    slots: Mutex<Slots>,
}

struct Shared {
    config: EngineConfig,
    adapters: Adapters,
    bus: Arc<EventBus>,
    state: Mutex<ChallengeState>,
}

#[derive(Default)]
struct Slots {
    execute: Option<ActiveRun>,
    preview: Option<ActiveRun>,
}

struct ActiveRun {
    id: RunId,
    token: CancellationToken,
    task: JoinHandle<()>,
    phase: watch::Receiver<RunPhase>,
}

impl ActiveRun {
    /// Whether the run has reached a terminal phase. A completed Preview
    /// may still be holding its console open.
    fn is_finished(&self) -> bool {
        self.phase.borrow().is_terminal()
    }

    /// Cancel the run and hand back its task so a successor can wait on it.
    fn supersede(self, by: RunId) -> JoinHandle<()> {
        tracing::info!(run_id = %self.id, superseded_by = %by, "Run superseded");
        self.token.cancel();
        self.task
    }
}

impl Orchestrator {
    pub fn new(config: EngineConfig, adapters: Adapters, bus: Arc<EventBus>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                adapters,
                bus,
                state: Mutex::new(ChallengeState::default()),
            }),
            slots: Mutex::new(Slots::default()),
        }
    }

    /// Route a command to its run family and start it.
    pub fn dispatch(&self, command: Command) -> RunHandle {
        tracing::debug!(command = command.name(), family = %command.family(), "Command accepted");
        match command {
            Command::Execute { challenge, tests } => self.start_execute(challenge, tests),
            Command::FileChanged { challenge } | Command::ResetChallenge { challenge } => {
                self.enable_build();
                self.start_preview(challenge)
            }
            Command::PreviewMounted { challenge } | Command::ChallengeMounted { challenge } => {
                self.start_preview(challenge)
            }
        }
    }

    /// Build the challenge and run `tests` against it.
    ///
    /// Supersedes the current Execute run and any debouncing or running
    /// Preview run. A Preview that already completed keeps its console
    /// open for errors from later interaction with the live preview.
    pub fn start_execute(&self, challenge: ChallengeData, tests: Vec<TestSpec>) -> RunHandle {
        let mut slots = lock(&self.slots);
        let id = new_run_id();
        let preview = match slots.preview.take() {
            Some(run) if run.is_finished() => {
                slots.preview = Some(run);
                None
            }
            active => active,
        };
        let predecessors: Vec<_> = [slots.execute.take(), preview]
            .into_iter()
            .flatten()
            .map(|run| run.supersede(id))
            .collect();

        let (handle, run) = self.spawn(id, RunFamily::Execute, predecessors, move |scope| {
            execute_run(scope, challenge, tests)
        });
        slots.execute = Some(run);
        handle
    }

    /// Debounce, build, and render or evaluate the challenge.
    pub fn start_preview(&self, challenge: ChallengeData) -> RunHandle {
        let mut slots = lock(&self.slots);
        let id = new_run_id();
        let predecessors: Vec<_> = slots
            .preview
            .take()
            .map(|run| run.supersede(id))
            .into_iter()
            .collect();

        let (handle, run) = self.spawn(id, RunFamily::Preview, predecessors, move |scope| {
            preview_run(scope, challenge)
        });
        slots.preview = Some(run);
        handle
    }

    /// Reopen the build gate after a failed build.
    pub fn enable_build(&self) {
        let mut state = lock(&self.shared.state);
        if !state.build_enabled {
            tracing::info!("Build re-enabled");
            state.build_enabled = true;
        }
    }

    /// Owned copy of the current console, log, and test state.
    pub fn snapshot(&self) -> ChallengeState {
        lock(&self.shared.state).clone()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.shared.bus
    }

    /// Cancel every run and wait for all of them to clean up.
    pub async fn shutdown(&self) {
        let runs: Vec<ActiveRun> = {
            let mut slots = lock(&self.slots);
            [slots.execute.take(), slots.preview.take()]
                .into_iter()
                .flatten()
                .collect()
        };

        tracing::info!(active = runs.len(), "Shutting down orchestrator");
        for run in runs {
            run.token.cancel();
            if let Err(e) = run.task.await {
                tracing::error!(run_id = %run.id, error = %e, "Run task failed during shutdown");
            }
        }
    }

    fn spawn<F, Fut>(
        &self,
        id: RunId,
        family: RunFamily,
        predecessors: Vec<JoinHandle<()>>,
        body: F,
    ) -> (RunHandle, ActiveRun)
    where
        F: FnOnce(RunScope) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let (phase_tx, phase_rx) = watch::channel(RunPhase::Pending);
        let scope = RunScope {
            id,
            family,
            token: token.clone(),
            shared: Arc::clone(&self.shared),
            phase: Arc::new(phase_tx),
        };

        let task = tokio::spawn(async move {
            for predecessor in predecessors {
                if let Err(e) = predecessor.await {
                    tracing::error!(run_id = %scope.id, error = %e, "Superseded run task failed");
                }
            }
            if scope.token.is_cancelled() {
                scope.set_phase(RunPhase::Cancelled);
                return;
            }
            tracing::info!(run_id = %scope.id, family = %scope.family, "Run started");
            body(scope).await;
        });

        let handle = RunHandle {
            id,
            family,
            token: token.clone(),
            phase: phase_rx.clone(),
        };
        let run = ActiveRun {
            id,
            token,
            task,
            phase: phase_rx,
        };
        (handle, run)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        let slots = lock(&self.slots);
        for run in [slots.execute.as_ref(), slots.preview.as_ref()]
            .into_iter()
            .flatten()
        {
            run.token.cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// RunScope
// ---------------------------------------------------------------------------

/// Why a run left its main path early.
enum RunError {
    Superseded,
    Failed(EngineError),
}

impl From<Superseded> for RunError {
    fn from(_: Superseded) -> Self {
        Self::Superseded
    }
}

impl From<EngineError> for RunError {
    fn from(err: EngineError) -> Self {
        Self::Failed(err)
    }
}

impl From<BuildError> for RunError {
    fn from(err: BuildError) -> Self {
        Self::Failed(err.into())
    }
}

impl From<RunnerError> for RunError {
    fn from(err: RunnerError) -> Self {
        Self::Failed(err.into())
    }
}

impl From<SandboxError> for RunError {
    fn from(err: SandboxError) -> Self {
        Self::Failed(err.into())
    }
}

/// Everything one run task needs. Cheap to clone into forwarders.
#[derive(Clone)]
struct RunScope {
    id: RunId,
    family: RunFamily,
    token: CancellationToken,
    shared: Arc<Shared>,
    phase: Arc<watch::Sender<RunPhase>>,
}

impl RunScope {
    /// Apply `events` and deliver them as one update, unless the run has
    /// been superseded. The check and the write happen under one lock.
    fn publish(&self, events: Vec<ChallengeEvent>) -> bool {
        self.publish_if(|_| true, events)
    }

    /// Like [`publish`](Self::publish), but only when `guard` accepts the
    /// current state. The guard runs under the same lock as the write.
    fn publish_if(
        &self,
        guard: impl FnOnce(&ChallengeState) -> bool,
        events: Vec<ChallengeEvent>,
    ) -> bool {
        let mut state = lock(&self.shared.state);
        if self.token.is_cancelled() {
            tracing::trace!(run_id = %self.id, "Dropping update from superseded run");
            return false;
        }
        if !guard(&state) {
            return false;
        }
        for event in &events {
            state.apply(event);
        }
        self.shared
            .bus
            .publish(StateUpdate::new(self.id, self.family, events));
        true
    }

    fn checkpoint(&self) -> Result<(), RunError> {
        if self.token.is_cancelled() {
            Err(RunError::Superseded)
        } else {
            Ok(())
        }
    }

    fn set_phase(&self, phase: RunPhase) {
        self.phase.send_replace(phase);
    }

    fn build_enabled(&self) -> bool {
        lock(&self.shared.state).build_enabled
    }

    fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    fn adapters(&self) -> &Adapters {
        &self.shared.adapters
    }

    /// Mark the run finished: `Completed`, or `Cancelled` if it was
    /// superseded along the way.
    fn finish(&self) {
        let phase = if self.token.is_cancelled() {
            RunPhase::Cancelled
        } else {
            RunPhase::Completed
        };
        tracing::info!(run_id = %self.id, family = %self.family, ?phase, "Run finished");
        self.set_phase(phase);
    }

    fn skip(&self) {
        tracing::info!(run_id = %self.id, family = %self.family, "Build disabled, run skipped");
        self.set_phase(RunPhase::Skipped);
    }

    /// Run the build pipeline, closing the build gate on failure.
    async fn build(&self, challenge: &ChallengeData) -> Result<ExecutableBundle, RunError> {
        self.set_phase(RunPhase::Building);
        match self.adapters().build.build(challenge).await {
            Ok(bundle) => Ok(bundle),
            Err(e) => {
                tracing::warn!(run_id = %self.id, error = %e, "Build failed");
                self.disable_build();
                Err(e.into())
            }
        }
    }

    /// Close the build gate. Concurrent failures publish `BuildDisabled`
    /// once between them.
    fn disable_build(&self) {
        self.publish_if(|state| state.build_enabled, vec![ChallengeEvent::BuildDisabled]);
    }

    /// Open the channels `policy` names and start forwarding them.
    fn open_channels(&self, policy: ChannelPolicy) -> Result<OwnedChannels, EngineError> {
        let log = self.own(OutputChannel::new("log"), policy.log, |text| {
            ChallengeEvent::LogsAppended { text }
        })?;
        let console = policy
            .console
            .map(|lifetime| {
                self.own(OutputChannel::new("console"), lifetime, |text| {
                    ChallengeEvent::ConsoleAppended { text }
                })
            })
            .transpose()?;
        Ok(OwnedChannels { log, console })
    }

    fn own(
        &self,
        channel: OutputChannel,
        lifetime: ChannelLifetime,
        to_event: fn(String) -> ChallengeEvent,
    ) -> Result<OwnedChannel, EngineError> {
        let stream = channel.subscribe()?;
        let forwarder = tokio::spawn(forward(self.clone(), stream, to_event));
        Ok(OwnedChannel {
            channel,
            lifetime,
            forwarder,
        })
    }
}

/// Deliver every fragment of `stream` as its own update, in order.
async fn forward(
    scope: RunScope,
    mut stream: OutputStream,
    to_event: fn(String) -> ChallengeEvent,
) {
    while let Some(text) = stream.next().await {
        scope.publish(vec![to_event(text)]);
    }
}

// ---------------------------------------------------------------------------
// Owned channels
// ---------------------------------------------------------------------------

struct OwnedChannel {
    channel: OutputChannel,
    lifetime: ChannelLifetime,
    forwarder: JoinHandle<()>,
}

impl OwnedChannel {
    /// Close the channel and wait until its forwarder has drained it.
    async fn close(self) {
        self.channel.close();
        if let Err(e) = self.forwarder.await {
            tracing::error!(channel = self.channel.name(), error = %e, "Forwarder task failed");
        }
    }
}

struct OwnedChannels {
    log: OwnedChannel,
    console: Option<OwnedChannel>,
}

impl OwnedChannels {
    fn loggers(&self) -> Loggers {
        Loggers::new(
            self.log.channel.clone(),
            self.console.as_ref().map(|c| c.channel.clone()),
        )
    }

    /// Close every channel whose lifetime ends with the run and return the
    /// ones left open.
    async fn close_on_exit(self) -> Vec<OwnedChannel> {
        let mut left_open = Vec::new();
        for owned in std::iter::once(self.log).chain(self.console) {
            match owned.lifetime {
                ChannelLifetime::CloseOnExit => owned.close().await,
                ChannelLifetime::LeaveOpen => left_open.push(owned),
            }
        }
        left_open
    }
}

// ---------------------------------------------------------------------------
// Execute
// ---------------------------------------------------------------------------

async fn execute_run(scope: RunScope, challenge: ChallengeData, tests: Vec<TestSpec>) {
    if !scope.build_enabled() {
        scope.skip();
        return;
    }

    let channels = match scope.open_channels(ChannelPolicy::EXECUTE) {
        Ok(channels) => channels,
        Err(e) => {
            tracing::error!(run_id = %scope.id, error = %e, "Failed to open output channels");
            scope.finish();
            return;
        }
    };

    scope.publish(vec![
        ChallengeEvent::LogsReset,
        ChallengeEvent::console_reset(CONSOLE_RUNNING_TESTS),
        ChallengeEvent::TestsReset {
            tests: tests.iter().map(TestResult::pending).collect(),
        },
    ]);

    let outcome = run_suite(&scope, &challenge, &tests, channels.loggers()).await;

    scope.set_phase(RunPhase::Finalizing);
    for owned in channels.close_on_exit().await {
        owned.close().await;
    }

    match outcome {
        Ok(results) => {
            let passed = results.iter().filter(|r| r.is_passed()).count();
            tracing::info!(run_id = %scope.id, total = results.len(), passed, "Test suite finished");
            scope.publish(vec![
                ChallengeEvent::TestsUpdated { tests: results },
                ChallengeEvent::console(CONSOLE_TESTS_COMPLETED),
                ChallengeEvent::logs_to_console(CONSOLE_OUTPUT_HEADER),
            ]);
        }
        Err(RunError::Failed(e)) => {
            scope.publish(vec![ChallengeEvent::console(escape_html(&e.to_string()))]);
        }
        Err(RunError::Superseded) => {}
    }

    scope.finish();
}

async fn run_suite(
    scope: &RunScope,
    challenge: &ChallengeData,
    tests: &[TestSpec],
    loggers: Loggers,
) -> Result<Vec<TestResult>, RunError> {
    let bundle = scope.build(challenge).await?;
    scope.checkpoint()?;

    let runner = scope.adapters().sandbox.create_runner(&bundle, loggers)?;
    scope.set_phase(RunPhase::Running);

    let results = execute_tests(
        runner.as_ref(),
        tests,
        scope.config().test_timeout,
        &scope.token,
        |failed| {
            let text = failed.message.as_deref().unwrap_or(failed.text.as_str());
            scope.publish(vec![ChallengeEvent::console(escape_html(text))]);
        },
    )
    .await?;

    Ok(results)
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

async fn preview_run(scope: RunScope, challenge: ChallengeData) {
    scope.set_phase(RunPhase::Debouncing);
    tokio::select! {
        _ = scope.token.cancelled() => {
            scope.finish();
            return;
        }
        _ = tokio::time::sleep(scope.config().preview_debounce) => {}
    }

    if !scope.build_enabled() {
        scope.skip();
        return;
    }

    let channels = match scope.open_channels(ChannelPolicy::PREVIEW) {
        Ok(channels) => channels,
        Err(e) => {
            tracing::error!(run_id = %scope.id, error = %e, "Failed to open output channels");
            scope.finish();
            return;
        }
    };
    let loggers = channels.loggers();

    scope.publish(vec![ChallengeEvent::LogsReset]);

    match evaluate_preview(&scope, &challenge, &loggers).await {
        Ok(()) | Err(RunError::Superseded) => {}
        Err(RunError::Failed(e)) => {
            tracing::debug!(run_id = %scope.id, error = %e, "Preview evaluation failed");
            loggers.log(e.to_string());
        }
    }

    scope.set_phase(RunPhase::Finalizing);
    let left_open = channels.close_on_exit().await;

    // Reset and flush together so the default console never shows through.
    scope.publish(vec![
        ChallengeEvent::console_reset(""),
        ChallengeEvent::logs_to_console(CONSOLE_OUTPUT_HEADER),
    ]);
    scope.finish();

    if !left_open.is_empty() {
        scope.token.cancelled().await;
        for owned in left_open {
            owned.close().await;
        }
    }
}

async fn evaluate_preview(
    scope: &RunScope,
    challenge: &ChallengeData,
    loggers: &Loggers,
) -> Result<(), RunError> {
    let bundle = scope.build(challenge).await?;
    scope.checkpoint()?;
    scope.set_phase(RunPhase::Running);

    if challenge.has_live_preview() {
        scope.adapters().preview.render(&bundle, loggers).await;
    } else if challenge.is_assertion_compatible() {
        let runner = scope
            .adapters()
            .sandbox
            .create_runner(&bundle, loggers.clone())?;
        // No assertion: the runner only evaluates the user's code.
        match invoke(runner.as_ref(), None, scope.config().eval_timeout, true).await {
            Ok(Verdict::Pass) => {}
            Ok(Verdict::Fail(err)) => return Err(RunnerError::Failed(err).into()),
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

/// Poisoning only means a run task panicked mid-write; the state it guards
/// is replaced wholesale by the next run.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
