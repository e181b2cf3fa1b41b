//! Git commit, tag and push
//!
//! These steps straddle the point-of-no-return: the commit and tag are local
//! and reversible, but once the pushes land on the remote nothing here may be
//! undone automatically. The orchestrator calls the fine-grained methods so
//! it can record exactly which externally visible actions have happened.

use tracing::{debug, info};

use slipway_core::CommandRunner;
use slipway_version::VersionPair;

use crate::error::Result;

/// Remote branch releases are pushed to.
pub const RELEASE_BRANCH: &str = "main";

/// Commit message for a release.
pub fn commit_message(pair: &VersionPair) -> String {
    format!("Publish {}", pair.tag())
}

/// Publishes the release commit and annotated tag through the system git.
#[derive(Debug)]
pub struct GitPublisher<'a> {
    runner: &'a CommandRunner,
}

impl<'a> GitPublisher<'a> {
    pub fn new(runner: &'a CommandRunner) -> Self {
        Self { runner }
    }

    /// Stage every change in the working tree.
    pub async fn stage_all(&self) -> Result<()> {
        self.runner.run("git", &["add", "-A"]).await?;
        Ok(())
    }

    /// Create the release commit from the staged changes.
    pub async fn commit(&self, pair: &VersionPair) -> Result<()> {
        let message = commit_message(pair);
        debug!(%message, "creating release commit");
        self.runner.run("git", &["commit", "-m", &message]).await?;
        Ok(())
    }

    /// Create the annotated release tag, carrying the release notes as the
    /// tag message. Returns the tag name.
    pub async fn tag(&self, pair: &VersionPair, notes: &str) -> Result<String> {
        let tag = pair.tag();
        debug!(%tag, "creating annotated tag");
        self.runner
            .run("git", &["tag", "-a", &tag, "-m", notes])
            .await?;
        Ok(tag)
    }

    /// Push the release branch. The first externally visible git action.
    pub async fn push_branch(&self) -> Result<()> {
        self.runner
            .run("git", &["push", "origin", RELEASE_BRANCH])
            .await?;
        info!(branch = RELEASE_BRANCH, "pushed release commit");
        Ok(())
    }

    /// Push the release tag. Once this returns the release is public.
    pub async fn push_tag(&self, tag: &str) -> Result<()> {
        self.runner.run("git", &["push", "origin", tag]).await?;
        info!(%tag, "pushed release tag");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_message_names_tag() {
        let pair = VersionPair::new(46, "1.2.3");
        assert_eq!(commit_message(&pair), "Publish v1.2.3");
    }
}
