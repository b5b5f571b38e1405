//! Reduced view of console, log, and test state.
//!
//! Only the orchestrator writes a [`ChallengeState`]; every write is the
//! application of a [`ChallengeEvent`] that is then published, so observers
//! folding the same events arrive at the same state.

use kata_core::TestResult;
use kata_events::ChallengeEvent;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeState {
    pub console: Vec<String>,
    pub logs: Vec<String>,
    pub tests: Vec<TestResult>,
    pub build_enabled: bool,
}

impl Default for ChallengeState {
    fn default() -> Self {
        Self {
            console: Vec::new(),
            logs: Vec::new(),
            tests: Vec::new(),
            build_enabled: true,
        }
    }
}

impl ChallengeState {
    pub fn apply(&mut self, event: &ChallengeEvent) {
        match event {
            ChallengeEvent::LogsReset => self.logs.clear(),
            ChallengeEvent::LogsAppended { text } => self.logs.push(text.clone()),
            ChallengeEvent::ConsoleReset { text } => {
                self.console.clear();
                if !text.is_empty() {
                    self.console.push(text.clone());
                }
            }
            ChallengeEvent::ConsoleAppended { text } => self.console.push(text.clone()),
            ChallengeEvent::LogsFlushedToConsole { header } => {
                self.console.push(header.clone());
                self.console.extend(self.logs.iter().cloned());
            }
            ChallengeEvent::TestsReset { tests } | ChallengeEvent::TestsUpdated { tests } => {
                self.tests = tests.clone();
            }
            ChallengeEvent::BuildDisabled => self.build_enabled = false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kata_core::TestSpec;

    #[test]
    fn starts_with_build_enabled_and_empty_buffers() {
        let state = ChallengeState::default();
        assert!(state.build_enabled);
        assert!(state.console.is_empty());
        assert!(state.logs.is_empty());
    }

    #[test]
    fn flushing_logs_copies_them_below_header() {
        let mut state = ChallengeState::default();
        state.apply(&ChallengeEvent::console_reset("// running tests"));
        state.apply(&ChallengeEvent::LogsAppended { text: "hi".into() });
        state.apply(&ChallengeEvent::console("// tests completed"));
        state.apply(&ChallengeEvent::logs_to_console("// console output"));

        assert_eq!(
            state.console,
            vec![
                "// running tests",
                "// tests completed",
                "// console output",
                "hi"
            ]
        );
        assert_eq!(state.logs, vec!["hi"]);
    }

    #[test]
    fn empty_console_reset_clears_console() {
        let mut state = ChallengeState::default();
        state.apply(&ChallengeEvent::console("stale"));
        state.apply(&ChallengeEvent::console_reset(""));
        assert!(state.console.is_empty());
    }

    #[test]
    fn test_updates_replace_list() {
        let mut state = ChallengeState::default();
        let spec = TestSpec::new("t1", "assert(true)");
        state.apply(&ChallengeEvent::TestsReset {
            tests: vec![TestResult::pending(&spec)],
        });
        state.apply(&ChallengeEvent::TestsUpdated {
            tests: vec![TestResult::passed(&spec)],
        });
        assert_eq!(state.tests, vec![TestResult::passed(&spec)]);
    }

    #[test]
    fn build_disabled_clears_flag() {
        let mut state = ChallengeState::default();
        state.apply(&ChallengeEvent::BuildDisabled);
        assert!(!state.build_enabled);
    }
}
