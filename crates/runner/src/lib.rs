//! Library half of the `kata-runner` binary: challenge file loading and
//! terminal reporting.

pub mod document;
pub mod report;
