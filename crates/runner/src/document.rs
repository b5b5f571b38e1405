//! Challenge documents read from disk.

use std::path::Path;

use anyhow::Context;
use kata_core::{ChallengeData, TestSpec};
use serde::Deserialize;

/// A challenge and the test suite to run against it.
///
/// ```json
/// {
///   "id": "basic-js-1",
///   "kind": "javascript",
///   "files": [{"key": "indexjs", "ext": "js", "contents": "var a = 1;"}],
///   "tests": [{"text": "a is 1", "testString": "assert(a === 1)"}]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeDocument {
    #[serde(flatten)]
    pub challenge: ChallengeData,
    #[serde(default)]
    pub tests: Vec<TestSpec>,
}

impl ChallengeDocument {
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid challenge document {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
