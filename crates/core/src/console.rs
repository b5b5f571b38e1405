//! Marker lines written to the learner's console around a run.

/// Console contents while an Execute run is in progress.
pub const CONSOLE_RUNNING_TESTS: &str = "// running tests";

/// Appended to the console once every test has a verdict.
pub const CONSOLE_TESTS_COMPLETED: &str = "// tests completed";

/// Header placed above the captured log output when it is moved into the
/// console.
pub const CONSOLE_OUTPUT_HEADER: &str = "// console output";
