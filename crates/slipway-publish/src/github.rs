//! Hosted release creation through the gh CLI

use std::path::Path;

use tracing::{debug, info};

use slipway_core::CommandRunner;
use slipway_version::VersionPair;

use crate::error::{PublishError, Result};

/// Creates the GitHub release for an already-pushed tag.
#[derive(Debug)]
pub struct GithubReleaser<'a> {
    runner: &'a CommandRunner,
}

impl<'a> GithubReleaser<'a> {
    pub fn new(runner: &'a CommandRunner) -> Self {
        Self { runner }
    }

    /// Create the release with the disk image and, when present, the
    /// debug-symbol archive attached. Release notes come from the annotated
    /// tag, which gh verifies exists on the remote. Returns the release URL.
    pub async fn create_release(
        &self,
        tag: &str,
        pair: &VersionPair,
        dmg_path: &Path,
        dsyms_zip: Option<&Path>,
    ) -> Result<String> {
        let dmg = dmg_path.to_string_lossy();
        let title = format!("Version {}", pair.marketing);

        let mut args: Vec<&str> = vec!["release", "create", tag, &dmg];
        let dsyms;
        if let Some(zip) = dsyms_zip.filter(|z| z.exists()) {
            dsyms = zip.to_string_lossy().into_owned();
            args.push(&dsyms);
        }
        args.extend([
            "--latest",
            "--notes-from-tag",
            "--verify-tag",
            "--title",
            &title,
        ]);

        debug!(%tag, "creating GitHub release");
        let output = self.runner.run("gh", &args).await?;

        let url = parse_release_url(&output.stdout).ok_or(PublishError::ReleaseUrlMissing)?;
        info!(%url, "GitHub release created");
        Ok(url)
    }
}

/// gh prints the release URL on its own stdout line.
pub fn parse_release_url(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("https://github.com/"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_url_among_progress_lines() {
        let out = "Uploading assets...\nhttps://github.com/acme/app/releases/tag/v1.2.3\n";
        assert_eq!(
            parse_release_url(out).as_deref(),
            Some("https://github.com/acme/app/releases/tag/v1.2.3")
        );
    }

    #[test]
    fn missing_url_yields_none() {
        assert_eq!(parse_release_url("created release\n"), None);
    }

    #[test]
    fn ignores_non_github_urls() {
        assert_eq!(parse_release_url("https://example.com/foo\n"), None);
    }
}
