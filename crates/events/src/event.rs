//! State-change events emitted by the run orchestrator.
//!
//! These are the only view observers get of console, log, and test state.
//! Appended text is already HTML-escaped.

use kata_core::TestResult;
use serde::{Deserialize, Serialize};

/// One state transition of the challenge workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChallengeEvent {
    /// Captured log output was cleared.
    LogsReset,

    /// A sanitized fragment was appended to the captured log output.
    LogsAppended { text: String },

    /// The console was replaced with `text` (possibly empty).
    ConsoleReset { text: String },

    /// A line was appended to the console.
    ConsoleAppended { text: String },

    /// Captured log output was copied into the console below `header`.
    LogsFlushedToConsole { header: String },

    /// The visible test list was replaced with outcome-free entries.
    TestsReset { tests: Vec<TestResult> },

    /// The visible test list was replaced with verdicts.
    TestsUpdated { tests: Vec<TestResult> },

    /// A build failed; further runs are no-ops until the build is enabled.
    BuildDisabled,
}

impl ChallengeEvent {
    pub fn console(text: impl Into<String>) -> Self {
        Self::ConsoleAppended { text: text.into() }
    }

    pub fn console_reset(text: impl Into<String>) -> Self {
        Self::ConsoleReset { text: text.into() }
    }

    pub fn logs_to_console(header: impl Into<String>) -> Self {
        Self::LogsFlushedToConsole {
            header: header.into(),
        }
    }

    /// Dot-separated event name, used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LogsReset => "logs.reset",
            Self::LogsAppended { .. } => "logs.appended",
            Self::ConsoleReset { .. } => "console.reset",
            Self::ConsoleAppended { .. } => "console.appended",
            Self::LogsFlushedToConsole { .. } => "console.logs_flushed",
            Self::TestsReset { .. } => "tests.reset",
            Self::TestsUpdated { .. } => "tests.updated",
            Self::BuildDisabled => "build.disabled",
        }
    }
}
