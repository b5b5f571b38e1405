//! `kata-runner` -- run a challenge's test suite from the command line.
//!
//! Loads a challenge document, builds it with the concatenating pipeline,
//! runs every test in the subprocess sandbox, prints each state update as
//! it happens and a verdict per test at the end. Exits non-zero when the
//! build or any test fails.
//!
//! # Environment variables
//!
//! | Variable                   | Default        | Description                      |
//! |----------------------------|----------------|----------------------------------|
//! | `KATA_TEST_TIMEOUT_MS`     | `5000`         | Per-assertion timeout            |
//! | `KATA_EVAL_TIMEOUT_MS`     | `5000`         | Preview evaluation timeout       |
//! | `KATA_PREVIEW_DEBOUNCE_MS` | `700`          | Preview debounce                 |
//! | `KATA_SANDBOX_CMD`         | `node`         | Interpreter spawned per test     |
//! | `KATA_SANDBOX_ARGS`        | --             | Extra interpreter arguments      |
//! | `KATA_PREVIEW_PATH`        | `preview.html` | Output file of the preview host  |

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use kata_engine::{
    Adapters, Command, ConcatBuild, EngineConfig, FilePreview, Orchestrator, ProcessSandbox,
    SandboxConfig,
};
use kata_events::EventBus;
use kata_runner::document::ChallengeDocument;
use kata_runner::report::{self, Summary};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kata_runner=info,kata_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = ?e, "kata-runner failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: kata-runner <challenge.json>")?;

    let document = ChallengeDocument::load(&path).await?;
    let config = EngineConfig::from_env().context("Invalid engine configuration")?;
    let sandbox_config = SandboxConfig::from_env().context("Invalid sandbox configuration")?;

    tracing::info!(
        challenge_id = %document.challenge.id,
        kind = %document.challenge.kind,
        tests = document.tests.len(),
        sandbox = %sandbox_config.program,
        "Starting kata-runner",
    );

    let bus = Arc::new(EventBus::default());
    let mut updates = bus.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            for line in report::describe(&update) {
                println!("{line}");
            }
        }
    });

    let adapters = Adapters {
        build: Arc::new(ConcatBuild),
        sandbox: Arc::new(ProcessSandbox::new(&sandbox_config)),
        preview: Arc::new(FilePreview::from_config(&sandbox_config)),
    };
    let orchestrator = Orchestrator::new(config, adapters, Arc::clone(&bus));

    let mut handle = orchestrator.dispatch(Command::Execute {
        challenge: document.challenge,
        tests: document.tests,
    });
    let phase = handle.wait().await;
    let state = orchestrator.snapshot();

    orchestrator.shutdown().await;
    // The printer stops once every sender of the bus is gone.
    drop(orchestrator);
    drop(bus);
    printer.await.context("Update printer task failed")?;

    println!();
    for result in &state.tests {
        println!("{}", report::verdict_line(result));
    }
    let summary = Summary::from_state(&state);
    println!("{summary}");

    tracing::info!(
        run_id = %handle.id(),
        ?phase,
        passed = summary.passed,
        total = summary.total,
        "Run complete",
    );

    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
