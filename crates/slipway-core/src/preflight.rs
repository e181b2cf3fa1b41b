//! Pre-release validation: tools, environment, repository state
//!
//! Everything here runs before any file is mutated, so a failure or a
//! declined checklist is free to abort the run without rollback.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::command::CommandRunner;
use crate::context::ReleaseEnv;
use crate::error::{Result, ValidationError};

/// Location of the Sparkle detached-signature tool inside the repository.
pub const SIGN_UPDATE_PATH: &str = "scripts/bin/sparkle/sign_update";

/// Default keychain profile used for notarytool credentials.
pub const DEFAULT_KEYCHAIN_PROFILE: &str = "App Store Connect Profile";

/// Minimum free disk space before a warning is raised, in gigabytes.
const MIN_FREE_DISK_GB: u64 = 5;

/// Resolve the notarytool path from the active Xcode developer directory,
/// falling back to PATH lookup.
pub async fn notarytool_path(runner: &CommandRunner) -> PathBuf {
    match runner.run_unchecked("xcode-select", &["-p"]).await {
        Ok(output) if output.success => {
            let developer_dir = output.stdout.trim();
            Path::new(developer_dir).join("usr").join("bin").join("notarytool")
        }
        _ => PathBuf::from("notarytool"),
    }
}

/// Verify that every collaborator CLI the pipeline invokes is installed.
pub async fn validate_tools(runner: &CommandRunner, skip_sparkle: bool) -> Result<()> {
    let tools = [
        ("xcodebuild", "Xcode command line tools"),
        ("gh", "GitHub CLI"),
        ("hdiutil", "macOS disk image utility"),
        ("codesign", "macOS code signing tool"),
        ("xcbeautify", "Xcode build output formatter"),
    ];

    let mut missing = Vec::new();
    for (tool, description) in tools {
        if which::which(tool).is_err() {
            missing.push(format!("{tool} ({description})"));
        }
    }

    let notarytool = notarytool_path(runner).await;
    if !notarytool.exists() && which::which("notarytool").is_err() {
        missing.push(format!(
            "notarytool (Apple notarization tool at {})",
            notarytool.display()
        ));
    }

    if !skip_sparkle && !Path::new(SIGN_UPDATE_PATH).exists() {
        missing.push(format!(
            "sign_update (Sparkle signing tool at {SIGN_UPDATE_PATH})"
        ));
    }

    if !missing.is_empty() {
        return Err(ValidationError::MissingTools(missing).into());
    }

    debug!("all required tools present");
    Ok(())
}

/// Validate environment variables and resolve the release environment.
pub fn validate_env() -> Result<ReleaseEnv> {
    let team_id = std::env::var("APPLE_TEAM_ID").ok().filter(|v| !v.is_empty());

    let Some(team_id) = team_id else {
        return Err(ValidationError::MissingEnv(vec![
            "APPLE_TEAM_ID (Apple Team ID for code signing)".to_string(),
        ])
        .into());
    };

    let keychain_profile = std::env::var("APPLE_KEYCHAIN_PROFILE")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_KEYCHAIN_PROFILE.to_string());

    let sentry_auth_token = std::env::var("SENTRY_AUTH_TOKEN")
        .ok()
        .filter(|v| !v.is_empty());

    info!(team_id = %team_id, "environment validated");
    Ok(ReleaseEnv {
        team_id,
        keychain_profile,
        sentry_auth_token,
    })
}

/// Run the repository-state checks and collect human-readable warnings.
/// None of these are fatal on their own; the checklist decides.
pub async fn preflight_warnings(runner: &CommandRunner) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    let status = runner
        .run_unchecked("git", &["status", "--porcelain"])
        .await?;
    if !status.stdout.trim().is_empty() {
        let count = status.stdout.trim().lines().count();
        warnings.push(format!(
            "Working directory has {count} uncommitted changes"
        ));
    }

    let branch = runner
        .run_unchecked("git", &["branch", "--show-current"])
        .await?;
    let current_branch = branch.stdout.trim().to_string();
    if current_branch != "main" {
        warnings.push(format!("Not on main branch (currently on '{current_branch}')"));
    }

    let _ = runner.run_unchecked("git", &["fetch"]).await;
    let behind = runner
        .run_unchecked("git", &["rev-list", "HEAD..origin/main", "--count"])
        .await?;
    if behind.success && behind.stdout.trim() != "0" {
        warnings.push("Local branch is behind origin/main".to_string());
    }

    warnings.extend(changelog_warnings(Path::new("CHANGELOG.md")));

    if !Path::new("appcast.xml").exists() {
        warnings.push("appcast.xml not found".to_string());
    }

    if let Some(free_gb) = free_disk_gb(runner).await {
        if free_gb < MIN_FREE_DISK_GB {
            warnings.push(format!(
                "Low disk space: {free_gb} GB free (recommend at least {MIN_FREE_DISK_GB} GB)"
            ));
        }
    }

    Ok(warnings)
}

/// Changelog-shape warnings, split out so they are testable without git.
pub fn changelog_warnings(changelog_path: &Path) -> Vec<String> {
    let mut warnings = Vec::new();

    match std::fs::read_to_string(changelog_path) {
        Ok(content) => {
            if let Some(pos) = content.find("## Unreleased") {
                let after = &content[pos + "## Unreleased".len()..];
                let section = match after.find("\n## ") {
                    Some(end) => &after[..end],
                    None => after,
                };
                if section.trim().is_empty() {
                    warnings.push("'## Unreleased' section in CHANGELOG.md is empty".to_string());
                }
            } else {
                warnings.push("No '## Unreleased' section in CHANGELOG.md".to_string());
            }
        }
        Err(_) => warnings.push("CHANGELOG.md not found".to_string()),
    }

    warnings
}

/// Free space on the current filesystem in whole gigabytes, best effort.
async fn free_disk_gb(runner: &CommandRunner) -> Option<u64> {
    let output = runner.run_unchecked("df", &["-Pk", "."]).await.ok()?;
    if !output.success {
        return None;
    }
    // POSIX df output: second line, fourth column is available 1K blocks.
    let line = output.stdout.lines().nth(1)?;
    let avail_kb: u64 = line.split_whitespace().nth(3)?.parse().ok()?;
    Some(avail_kb / (1024 * 1024))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_changelog_missing_file() {
        let temp = TempDir::new().unwrap();
        let warnings = changelog_warnings(&temp.path().join("CHANGELOG.md"));
        assert_eq!(warnings, vec!["CHANGELOG.md not found".to_string()]);
    }

    #[test]
    fn test_changelog_missing_section() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("CHANGELOG.md");
        std::fs::write(&path, "# Changelog\n\n## Version 1.0.0 (1)\n- done\n").unwrap();

        let warnings = changelog_warnings(&path);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("No '## Unreleased'"));
    }

    #[test]
    fn test_changelog_empty_section() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("CHANGELOG.md");
        std::fs::write(&path, "## Unreleased\n\n## Version 1.0.0 (1)\n- done\n").unwrap();

        let warnings = changelog_warnings(&path);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("is empty"));
    }

    #[test]
    fn test_changelog_with_content_is_clean() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("CHANGELOG.md");
        std::fs::write(&path, "## Unreleased\n- new thing\n\n## Version 1.0.0 (1)\n").unwrap();

        assert!(changelog_warnings(&path).is_empty());
    }
}
