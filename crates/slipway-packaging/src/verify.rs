//! Release artifact verification ahead of the point of no return

use std::path::Path;

use tracing::info;

use slipway_core::{CommandRunner, RunContext};

use crate::error::{PackagingError, Result};

/// Outcome of one verification check.
#[derive(Debug)]
pub enum Verification {
    Passed(String),
    Warning(String),
}

/// Verify the packaged artifacts before anything becomes public. A missing
/// or unsigned image is fatal; a failed Gatekeeper assessment is only a
/// warning because notarization info can lag right after acceptance.
pub async fn verify_release(
    ctx: &RunContext,
    runner: &CommandRunner,
    dmg_path: &Path,
    version_header: &str,
) -> Result<Vec<Verification>> {
    let mut results = Vec::new();

    if !dmg_path.exists() {
        return Err(PackagingError::DmgNotFound(dmg_path.to_path_buf()));
    }
    let size_mb = std::fs::metadata(dmg_path)?.len() as f64 / (1024.0 * 1024.0);
    results.push(Verification::Passed(format!("DMG size: {size_mb:.1} MB")));

    let signature = runner
        .run_unchecked("codesign", &["--verify", &dmg_path.to_string_lossy()])
        .await?;
    if !signature.success {
        return Err(PackagingError::VerificationFailed(
            "DMG signature verification failed".to_string(),
        ));
    }
    results.push(Verification::Passed("DMG signature verified".to_string()));

    let assessment = runner
        .run_unchecked(
            "spctl",
            &[
                "-a",
                "-t",
                "open",
                "--context",
                "context:primary-signature",
                "-v",
                &dmg_path.to_string_lossy(),
            ],
        )
        .await?;
    if assessment.success {
        results.push(Verification::Passed("DMG notarization verified".to_string()));
    } else {
        results.push(Verification::Warning(
            "DMG notarization check failed (may be normal if run immediately)".to_string(),
        ));
    }

    let appcast = Path::new("appcast.xml");
    if appcast.exists() && !ctx.skip_sparkle {
        let content = std::fs::read_to_string(appcast)?;
        if content.contains(version_header) {
            results.push(Verification::Passed("Appcast updated".to_string()));
        } else {
            results.push(Verification::Warning(
                "Appcast may not have been updated correctly".to_string(),
            ));
        }
    }

    info!(checks = results.len(), "release verification complete");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipway_core::{IncrementKind, ReleaseConfig, ReleaseEnv, RunContext};
    use tempfile::TempDir;

    fn test_context(archive_dir: &Path) -> RunContext {
        RunContext {
            config: ReleaseConfig {
                app_name: "Context".to_string(),
                bundle_identifier: "com.example.Context".to_string(),
                xcode_project: "Context/Context.xcodeproj".to_string(),
                scheme: "Context".to_string(),
                website_url: "https://www.example.com/".to_string(),
                github_owner: "example".to_string(),
                github_repo: "Context".to_string(),
                minimum_system_version: "15.0".to_string(),
            },
            env: ReleaseEnv {
                team_id: "TEAMID1234".to_string(),
                keychain_profile: "App Store Connect Profile".to_string(),
                sentry_auth_token: None,
            },
            increment: IncrementKind::Patch,
            archive_dir: archive_dir.to_path_buf(),
            skip_sparkle: false,
            sentry: None,
            verbose: false,
            quiet: true,
            debug: false,
            assume_yes: true,
        }
    }

    #[tokio::test]
    async fn missing_image_names_the_disk_image() {
        let temp = TempDir::new().unwrap();
        let ctx = test_context(temp.path());
        let runner = CommandRunner::new();
        let dmg = temp.path().join("Context_v1.2.3.dmg");

        let err = verify_release(&ctx, &runner, &dmg, "Version 1.2.3 (1)")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Disk image not found"));
        assert!(matches!(err, PackagingError::DmgNotFound(path) if path == dmg));
    }
}
