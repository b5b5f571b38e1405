//! Challenge input and build output.
//!
//! [`ChallengeData`] is owned by the caller and only read by the engine.
//! [`ExecutableBundle`] is produced by a build pipeline and consumed by the
//! sandbox or preview host of the run that built it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What kind of learner project a challenge is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    /// Classic HTML/CSS challenge rendered into a preview frame.
    Html,
    /// Multi-file front-end project rendered into a preview frame.
    Modern,
    /// Plain JavaScript evaluated in a worker sandbox.
    #[serde(rename = "javascript")]
    JavaScript,
    /// Server-side project hosted elsewhere; nothing to build locally.
    Backend,
}

impl ChallengeKind {
    /// Whether bundles of this kind render into a live preview surface.
    pub fn has_live_preview(self) -> bool {
        matches!(self, Self::Html | Self::Modern)
    }

    /// Whether user code of this kind can be evaluated by the assertion
    /// sandbox without a preview surface.
    pub fn is_assertion_compatible(self) -> bool {
        matches!(self, Self::JavaScript)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Modern => "modern",
            Self::JavaScript => "javascript",
            Self::Backend => "backend",
        }
    }
}

impl fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One editable file of a challenge.
///
/// `head` and `tail` are fixed scaffolding wrapped around the learner's
/// `contents` when the challenge is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeFile {
    /// Stable key, e.g. `"indexjs"`.
    pub key: String,
    /// File extension without the dot, e.g. `"js"`.
    pub ext: String,
    pub contents: String,
    #[serde(default)]
    pub head: String,
    #[serde(default)]
    pub tail: String,
}

impl ChallengeFile {
    pub fn new(key: impl Into<String>, ext: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ext: ext.into(),
            contents: contents.into(),
            head: String::new(),
            tail: String::new(),
        }
    }

    /// Attach scaffolding before and after the learner's code.
    pub fn with_scaffold(mut self, head: impl Into<String>, tail: impl Into<String>) -> Self {
        self.head = head.into();
        self.tail = tail.into();
        self
    }
}

/// The learner's in-progress challenge, as handed to the build pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeData {
    pub id: String,
    pub kind: ChallengeKind,
    pub files: Vec<ChallengeFile>,
}

impl ChallengeData {
    pub fn new(id: impl Into<String>, kind: ChallengeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            files: Vec::new(),
        }
    }

    pub fn with_file(mut self, file: ChallengeFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn has_live_preview(&self) -> bool {
        self.kind.has_live_preview()
    }

    pub fn is_assertion_compatible(&self) -> bool {
        self.kind.is_assertion_compatible()
    }
}

/// Output of a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutableBundle {
    pub challenge_id: String,
    pub kind: ChallengeKind,
    /// The assembled program (or markup, for preview challenges).
    pub source: String,
}

impl ExecutableBundle {
    pub fn has_live_preview(&self) -> bool {
        self.kind.has_live_preview()
    }
}
