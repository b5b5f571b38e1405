//! Challenge execution engine.
//!
//! The [`Orchestrator`] turns learner commands into runs. An Execute run
//! builds the challenge and evaluates every test in order; a Preview run
//! debounces edits and refreshes the live preview. Every change to the
//! learner-visible state is published on a [`kata_events::EventBus`].
//!
//! Building, sandboxing, and preview rendering are pluggable through the
//! traits in [`adapters`]. [`build::ConcatBuild`] and the [`sandbox`]
//! module provide local implementations.

pub mod adapters;
pub mod build;
pub mod channel;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod sandbox;
pub mod state;
pub mod suite;

pub use adapters::{Adapters, BuildPipeline, Loggers, PreviewUpdater, Sandbox, TestRunner};
pub use build::ConcatBuild;
pub use channel::{OutputChannel, OutputStream};
pub use config::{EngineConfig, SandboxConfig};
pub use error::{ChannelError, ConfigError, EngineError, SandboxError};
pub use orchestrator::{ChannelLifetime, ChannelPolicy, Command, Orchestrator, RunHandle, RunPhase};
pub use sandbox::{FilePreview, ProcessSandbox};
pub use state::ChallengeState;
