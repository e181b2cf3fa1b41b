//! Deep-clean and code-sign state machine for the exported app bundle
//!
//! Signing proceeds through a fixed sequence of states over one artifact:
//! extended attributes are stripped, nested leaf bundles are signed before
//! the bundles containing them, then the main bundle, then a deep
//! verification. An artifact whose deep signature already verifies on entry
//! skips straight to the end, which makes a re-run idempotent.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};
use walkdir::WalkDir;

use slipway_core::CommandRunner;

use crate::error::{PackagingError, Result};

/// States of the signing pass, in forced order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignPhase {
    Unsigned,
    ExtendedAttributesCleaned,
    NestedComponentsSigned,
    MainBundleSigned,
    Verified,
}

/// Look up the Developer ID Application certificate for a team in the
/// keychain.
pub async fn find_signing_identity(runner: &CommandRunner, team_id: &str) -> Result<String> {
    let output = runner
        .run("security", &["find-identity", "-v", "-p", "codesigning"])
        .await?;

    let pattern = format!(
        "\"(Developer ID Application: [^\"]+\\({}\\))\"",
        regex::escape(team_id)
    );
    let re = Regex::new(&pattern).unwrap();

    re.captures(&output.stdout)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| PackagingError::IdentityNotFound(team_id.to_string()))
}

/// Order in which nested components must be signed: XPC service leaves
/// first, then framework containers. Symbolic links are resolved to their
/// canonical target and each distinct target appears exactly once, so a
/// shared framework reached via several symlinks is not signed twice.
pub fn plan_nested_signing(frameworks_dir: &Path) -> Vec<PathBuf> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut plan = Vec::new();

    let mut push_unique = |path: &Path, plan: &mut Vec<PathBuf>| {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if seen.insert(canonical) {
            plan.push(path.to_path_buf());
        } else {
            debug!(path = %path.display(), "skipping already-planned bundle (symlink)");
        }
    };

    // XPC services sit deepest in the hierarchy.
    for entry in WalkDir::new(frameworks_dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.path().extension().is_some_and(|e| e == "xpc") {
            push_unique(entry.path(), &mut plan);
        }
    }

    // Then frameworks at the top of Contents/Frameworks.
    if let Ok(entries) = std::fs::read_dir(frameworks_dir) {
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "framework") {
                push_unique(&path, &mut plan);
            }
        }
    }

    plan
}

/// Runs the clean-and-sign state machine against one app bundle.
pub struct CodeSigner<'a> {
    runner: &'a CommandRunner,
    identity: String,
}

impl<'a> CodeSigner<'a> {
    pub fn new(runner: &'a CommandRunner, identity: impl Into<String>) -> Self {
        Self {
            runner,
            identity: identity.into(),
        }
    }

    /// Drive the artifact from `Unsigned` to `Verified`. Returns the phases
    /// traversed, ending in `Verified`; a failed final verification is fatal
    /// and not retried.
    pub async fn ensure_signed(&self, app_path: &Path) -> Result<Vec<SignPhase>> {
        let mut phases = vec![SignPhase::Unsigned];

        if self.verify_deep(app_path).await? {
            // Already properly signed: strip metadata only and re-verify.
            info!(app = %app_path.display(), "bundle already signed, cleaning only");
            self.clean(app_path).await?;
            if !self.verify_deep(app_path).await? {
                return Err(PackagingError::VerificationFailed(
                    "signature invalidated by metadata cleanup".to_string(),
                ));
            }
            phases.push(SignPhase::Verified);
            return Ok(phases);
        }

        self.clean(app_path).await?;
        phases.push(SignPhase::ExtendedAttributesCleaned);

        let frameworks_dir = app_path.join("Contents").join("Frameworks");
        if frameworks_dir.exists() {
            for bundle in plan_nested_signing(&frameworks_dir) {
                self.clean_bundle(&bundle).await?;
                self.sign_bundle(&bundle, false).await?;
            }
        }
        phases.push(SignPhase::NestedComponentsSigned);

        self.clean(app_path).await?;
        self.sign_bundle(app_path, true).await?;
        phases.push(SignPhase::MainBundleSigned);

        if !self.verify_deep(app_path).await? {
            return Err(PackagingError::VerificationFailed(format!(
                "deep verification failed for {}",
                app_path.display()
            )));
        }
        phases.push(SignPhase::Verified);

        info!(app = %app_path.display(), "bundle signed and verified");
        Ok(phases)
    }

    /// Strip extended attributes, AppleDouble files and Finder metadata.
    /// These stray per-file artifacts break both codesign and notarization.
    async fn clean(&self, path: &Path) -> Result<()> {
        let path_str = path.to_string_lossy();
        self.runner.run("xattr", &["-cr", &path_str]).await?;
        self.runner
            .run("find", &[&path_str, "-name", ".DS_Store", "-delete"])
            .await?;
        self.runner
            .run_unchecked("find", &[&path_str, "-name", "._*", "-delete"])
            .await?;
        // dot_clean is not always installed
        self.runner
            .run_unchecked("dot_clean", &["-m", &path_str])
            .await?;
        Ok(())
    }

    async fn clean_bundle(&self, bundle: &Path) -> Result<()> {
        let bundle_str = bundle.to_string_lossy();
        self.runner.run("xattr", &["-cr", &bundle_str]).await?;
        self.runner
            .run_unchecked("find", &[&bundle_str, "-name", "._*", "-delete"])
            .await?;
        Ok(())
    }

    async fn sign_bundle(&self, bundle: &Path, deep: bool) -> Result<()> {
        debug!(bundle = %bundle.display(), deep, "signing bundle");
        let bundle_str = bundle.to_string_lossy();

        let mut args = vec!["--force"];
        if deep {
            args.push("--deep");
        }
        args.extend([
            "--sign",
            &self.identity,
            "--options",
            "runtime",
            "--timestamp",
            &bundle_str,
        ]);

        self.runner.run("codesign", &args).await?;
        Ok(())
    }

    /// Deep, strict signature check. A non-zero exit is a negative answer,
    /// not an error.
    async fn verify_deep(&self, path: &Path) -> Result<bool> {
        let output = self
            .runner
            .run_unchecked(
                "codesign",
                &["--verify", "--deep", "--strict", &path.to_string_lossy()],
            )
            .await?;
        Ok(output.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    #[test]
    fn test_plan_orders_xpc_before_frameworks() {
        let temp = TempDir::new().unwrap();
        let frameworks = temp.path().join("Frameworks");
        let fw = frameworks.join("Sparkle.framework");
        let xpc = fw.join("Versions/A/XPCServices/Downloader.xpc");
        std::fs::create_dir_all(&xpc).unwrap();

        let plan = plan_nested_signing(&frameworks);
        assert_eq!(plan.len(), 2);
        assert!(plan[0].extension().is_some_and(|e| e == "xpc"));
        assert!(plan[1].extension().is_some_and(|e| e == "framework"));
    }

    #[test]
    fn test_plan_dedupes_symlinked_targets() {
        let temp = TempDir::new().unwrap();
        let frameworks = temp.path().join("Frameworks");
        let real = frameworks.join("Shared.framework");
        std::fs::create_dir_all(&real).unwrap();
        symlink(&real, frameworks.join("Alias.framework")).unwrap();

        let plan = plan_nested_signing(&frameworks);
        // One canonical target, signed exactly once.
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_plan_empty_dir() {
        let temp = TempDir::new().unwrap();
        assert!(plan_nested_signing(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_identity_not_found_maps_error() {
        // find-identity via `security` does not exist on CI Linux; a spawn
        // failure surfaces as a tool error, not a panic.
        let runner = CommandRunner::new();
        let result = find_signing_identity(&runner, "TEAM123").await;
        assert!(result.is_err());
    }
}
