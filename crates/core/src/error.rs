use crate::assertion::AssertionError;
use crate::challenge::ChallengeKind;

/// Failure of the build pipeline. Fatal to the run that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("Challenge has no source files")]
    NoSourceFiles,

    #[error("Source file is empty: {0}")]
    EmptyFile(String),

    #[error("Challenges of kind {0} cannot be built")]
    Unsupported(ChallengeKind),

    #[error("Build failed: {0}")]
    Transform(String),
}

/// Rejection reported by a test runner invocation.
///
/// A runner that resolves with a failing verdict is classified the same
/// way as one that rejects with [`RunnerError::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunnerError {
    /// The invocation did not settle within its timeout.
    #[error("timeout")]
    Timeout,

    /// The user code or the assertion threw.
    #[error("{0}")]
    Failed(AssertionError),

    /// The sandbox itself misbehaved (spawn failure, broken protocol).
    #[error("Sandbox error: {0}")]
    Sandbox(String),
}
