use kata_core::{BuildError, ChallengeKind, RunnerError};

/// Misuse of an [`OutputChannel`](crate::channel::OutputChannel).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("Output channel '{0}' is closed")]
    Closed(&'static str),

    #[error("Output channel '{0}' already has a subscriber")]
    AlreadySubscribed(&'static str),
}

/// An environment variable held a value that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// The sandbox could not produce a test runner for a bundle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SandboxError {
    #[error("Sandbox cannot run {0} challenges")]
    Unsupported(ChallengeKind),

    #[error("Sandbox unavailable: {0}")]
    Unavailable(String),
}

/// Any failure that ends a run's build or evaluation path.
///
/// Per-test failures never become an `EngineError`; the test loop records
/// them as results.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
