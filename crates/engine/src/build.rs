//! Build pipeline that assembles challenge files into one program.

use async_trait::async_trait;
use kata_core::{BuildError, ChallengeData, ChallengeKind, ExecutableBundle};

use crate::adapters::BuildPipeline;

/// Joins every file as `head`, `contents`, `tail` in declared order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatBuild;

#[async_trait]
impl BuildPipeline for ConcatBuild {
    async fn build(&self, challenge: &ChallengeData) -> Result<ExecutableBundle, BuildError> {
        assemble(challenge)
    }
}

/// Assemble `challenge` into a bundle.
///
/// Empty scaffolding parts are skipped so a file without `head`/`tail`
/// contributes exactly its contents.
pub fn assemble(challenge: &ChallengeData) -> Result<ExecutableBundle, BuildError> {
    if challenge.kind == ChallengeKind::Backend {
        return Err(BuildError::Unsupported(challenge.kind));
    }
    if challenge.files.is_empty() {
        return Err(BuildError::NoSourceFiles);
    }

    let mut parts = Vec::with_capacity(challenge.files.len());
    for file in &challenge.files {
        let text = [&file.head, &file.contents, &file.tail]
            .into_iter()
            .filter(|part| !part.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return Err(BuildError::EmptyFile(file.key.clone()));
        }
        parts.push(text);
    }

    Ok(ExecutableBundle {
        challenge_id: challenge.id.clone(),
        kind: challenge.kind,
        source: parts.join("\n"),
    })
}
