//! Plain-text rendering of state updates and test verdicts.

use kata_core::TestResult;
use kata_engine::ChallengeState;
use kata_events::{ChallengeEvent, StateUpdate};

/// One line per event in `update`, prefixed with the run family.
pub fn describe(update: &StateUpdate) -> Vec<String> {
    update
        .events
        .iter()
        .map(|event| format!("[{}] {}", update.family, describe_event(event)))
        .collect()
}

fn describe_event(event: &ChallengeEvent) -> String {
    match event {
        ChallengeEvent::LogsAppended { text } | ChallengeEvent::ConsoleAppended { text } => {
            format!("{}: {text}", event.name())
        }
        ChallengeEvent::ConsoleReset { text } if !text.is_empty() => {
            format!("{}: {text}", event.name())
        }
        ChallengeEvent::LogsFlushedToConsole { header } => format!("{}: {header}", event.name()),
        ChallengeEvent::TestsReset { tests } | ChallengeEvent::TestsUpdated { tests } => {
            format!("{}: {} test(s)", event.name(), tests.len())
        }
        _ => event.name().to_string(),
    }
}

/// `PASS`/`FAIL` line for one result. Failures show the first line of the
/// recorded error.
pub fn verdict_line(result: &TestResult) -> String {
    if result.is_passed() {
        return format!("PASS  {}", result.text);
    }
    match result.err.as_deref() {
        Some(err) => {
            let first = err.lines().next().unwrap_or_default();
            format!("FAIL  {} ({first})", result.text)
        }
        None => format!("----  {} (not run)", result.text),
    }
}

/// Totals for the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub build_failed: bool,
}

impl Summary {
    pub fn from_state(state: &ChallengeState) -> Self {
        Self {
            total: state.tests.len(),
            passed: state.tests.iter().filter(|t| t.is_passed()).count(),
            build_failed: !state.build_enabled,
        }
    }

    pub fn is_success(&self) -> bool {
        !self.build_failed && self.passed == self.total
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.build_failed {
            return f.write_str("build failed");
        }
        write!(f, "{}/{} tests passed", self.passed, self.total)
    }
}
