//! Test assertions and their per-run results.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error text recorded for a test whose invocation timed out.
pub const TEST_TIMED_OUT: &str = "Test timed out";

/// One assertion of a challenge's test suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSpec {
    /// Human-readable description shown next to the verdict.
    pub text: String,
    /// Assertion source evaluated against the learner's code.
    pub test_string: String,
}

impl TestSpec {
    pub fn new(text: impl Into<String>, test_string: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            test_string: test_string.into(),
        }
    }
}

/// Structured error thrown by user code or by an assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionError {
    pub message: String,
    #[serde(default)]
    pub stack: String,
}

impl AssertionError {
    pub fn new(message: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: stack.into(),
        }
    }
}

impl fmt::Display for AssertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// What a runner invocation resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(AssertionError),
}

/// Outcome of one [`TestSpec`] in a run.
///
/// A freshly seeded result carries neither `pass` nor `err`. Once the test
/// has run exactly one of them is set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub text: String,
    pub test_string: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl TestResult {
    /// A result with no outcome yet, used to reset the visible test list.
    pub fn pending(spec: &TestSpec) -> Self {
        Self {
            text: spec.text.clone(),
            test_string: spec.test_string.clone(),
            ..Self::default()
        }
    }

    pub fn passed(spec: &TestSpec) -> Self {
        Self {
            pass: Some(true),
            ..Self::pending(spec)
        }
    }

    /// `message` is the test text; `err` joins the thrown message and stack
    /// with a newline.
    pub fn failed(spec: &TestSpec, error: &AssertionError) -> Self {
        Self {
            message: Some(spec.text.clone()),
            err: Some(format!("{}\n{}", error.message, error.stack)),
            stack: Some(error.stack.clone()),
            ..Self::pending(spec)
        }
    }

    pub fn timed_out(spec: &TestSpec) -> Self {
        Self {
            message: Some(format!("{} ({TEST_TIMED_OUT})", spec.text)),
            err: Some(TEST_TIMED_OUT.to_string()),
            ..Self::pending(spec)
        }
    }

    pub fn is_passed(&self) -> bool {
        self.pass == Some(true)
    }

    pub fn is_complete(&self) -> bool {
        self.pass.is_some() || self.err.is_some()
    }

    /// Strip any outcome fields, keeping only the assertion itself.
    pub fn spec(&self) -> TestSpec {
        TestSpec::new(self.text.clone(), self.test_string.clone())
    }
}
