//! Domain types for the challenge execution engine.
//!
//! Pure data and formatting only; no async runtime, no I/O.

pub mod assertion;
pub mod challenge;
pub mod console;
pub mod error;
pub mod sanitize;
pub mod types;

pub use assertion::{AssertionError, TestResult, TestSpec, Verdict, TEST_TIMED_OUT};
pub use challenge::{ChallengeData, ChallengeFile, ChallengeKind, ExecutableBundle};
pub use error::{BuildError, RunnerError};
pub use sanitize::{escape_html, LogFragment};
