//! Engine and sandbox configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Per-assertion timeout.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Timeout for the single evaluation a Preview run performs.
pub const DEFAULT_EVAL_TIMEOUT: Duration = Duration::from_millis(5000);

/// Quiet period before a Preview run starts doing any work.
pub const DEFAULT_PREVIEW_DEBOUNCE: Duration = Duration::from_millis(700);

/// Run timing for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub test_timeout: Duration,
    pub eval_timeout: Duration,
    pub preview_debounce: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            test_timeout: DEFAULT_TEST_TIMEOUT,
            eval_timeout: DEFAULT_EVAL_TIMEOUT,
            preview_debounce: DEFAULT_PREVIEW_DEBOUNCE,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default |
    /// |----------------------------|---------|
    /// | `KATA_TEST_TIMEOUT_MS`     | `5000`  |
    /// | `KATA_EVAL_TIMEOUT_MS`     | `5000`  |
    /// | `KATA_PREVIEW_DEBOUNCE_MS` | `700`   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            test_timeout: millis(&lookup, "KATA_TEST_TIMEOUT_MS", defaults.test_timeout)?,
            eval_timeout: millis(&lookup, "KATA_EVAL_TIMEOUT_MS", defaults.eval_timeout)?,
            preview_debounce: millis(
                &lookup,
                "KATA_PREVIEW_DEBOUNCE_MS",
                defaults.preview_debounce,
            )?,
        })
    }
}

/// How the subprocess sandbox and file preview host are launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Interpreter spawned once per runner invocation.
    pub program: String,
    pub args: Vec<String>,
    /// File the preview host writes rendered markup to.
    pub preview_path: PathBuf,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            program: "node".into(),
            args: Vec::new(),
            preview_path: PathBuf::from("preview.html"),
        }
    }
}

impl SandboxConfig {
    /// | Env Var              | Default        |
    /// |----------------------|----------------|
    /// | `KATA_SANDBOX_CMD`   | `node`         |
    /// | `KATA_SANDBOX_ARGS`  | (none)         |
    /// | `KATA_PREVIEW_PATH`  | `preview.html` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let program = match lookup("KATA_SANDBOX_CMD") {
            Some(value) if value.trim().is_empty() => {
                return Err(ConfigError::Invalid {
                    var: "KATA_SANDBOX_CMD",
                    value,
                })
            }
            Some(value) => value.trim().to_string(),
            None => defaults.program,
        };

        let args = lookup("KATA_SANDBOX_ARGS")
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or(defaults.args);

        let preview_path = lookup("KATA_PREVIEW_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.preview_path);

        Ok(Self {
            program,
            args,
            preview_path,
        })
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
