//! Preview host that writes rendered markup to disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use kata_core::ExecutableBundle;

use crate::adapters::{Loggers, PreviewUpdater};
use crate::config::SandboxConfig;

/// Overwrites one HTML file with each rendered bundle.
#[derive(Debug, Clone)]
pub struct FilePreview {
    path: PathBuf,
}

impl FilePreview {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::new(config.preview_path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PreviewUpdater for FilePreview {
    async fn render(&self, bundle: &ExecutableBundle, loggers: &Loggers) {
        match tokio::fs::write(&self.path, bundle.source.as_bytes()).await {
            Ok(()) => {
                tracing::debug!(
                    challenge_id = %bundle.challenge_id,
                    path = %self.path.display(),
                    bytes = bundle.source.len(),
                    "Preview written",
                );
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to write preview");
                loggers.console(format!(
                    "Failed to write preview to {}: {e}",
                    self.path.display()
                ));
            }
        }
    }
}
