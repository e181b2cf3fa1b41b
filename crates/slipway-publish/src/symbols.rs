//! Debug-symbol packaging and Sentry upload
//!
//! Everything here is best-effort: a release without symbols is degraded,
//! not failed, so missing tooling or a rejected upload downgrades to a
//! skipped-item entry instead of aborting the run.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use slipway_core::{CommandRunner, RunContext};

use crate::error::Result;

/// Outcome of a best-effort symbol step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolOutcome {
    Done,
    /// The step did not run or did not finish; the reason is shown in the
    /// release summary's skipped list.
    Skipped(String),
}

/// dSYMs directory inside the exported archive.
pub fn dsyms_dir(ctx: &RunContext) -> PathBuf {
    ctx.xcarchive_path().join("dSYMs")
}

/// Zip the dSYMs directory next to the disk image using ditto, so symbol
/// files keep their resource forks. Returns None when the archive produced
/// no symbols.
pub async fn create_dsyms_zip(
    runner: &CommandRunner,
    ctx: &RunContext,
    dmg_path: &Path,
) -> Result<Option<PathBuf>> {
    let dsyms = dsyms_dir(ctx);
    if !dsyms.exists() {
        warn!(path = %dsyms.display(), "dSYMs directory not found, skipping zip");
        return Ok(None);
    }

    let stem = dmg_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| ctx.config.app_name.clone());
    let zip_path = ctx.archive_dir.join(format!("{stem}_dSYMs.zip"));

    let src = dsyms.to_string_lossy();
    let dst = zip_path.to_string_lossy();
    runner
        .run("ditto", &["-c", "-k", "--keepParent", &src, &dst])
        .await?;

    info!(zip = %zip_path.display(), "created dSYMs archive");
    Ok(Some(zip_path))
}

/// Upload the dSYMs to Sentry. Never fatal: any missing precondition or a
/// failed upload is reported as a skip.
pub async fn upload_dsyms(runner: &CommandRunner, ctx: &RunContext) -> SymbolOutcome {
    let Some(target) = ctx.sentry.as_ref() else {
        return SymbolOutcome::Skipped("Sentry upload (no org/project configured)".to_string());
    };
    if which::which("sentry-cli").is_err() {
        return SymbolOutcome::Skipped("Sentry upload (sentry-cli not found)".to_string());
    }
    let Some(token) = ctx.env.sentry_auth_token.as_deref() else {
        return SymbolOutcome::Skipped("Sentry upload (SENTRY_AUTH_TOKEN not set)".to_string());
    };
    let dsyms = dsyms_dir(ctx);
    if !dsyms.exists() {
        return SymbolOutcome::Skipped(format!(
            "Sentry upload (dSYMs not found at {})",
            dsyms.display()
        ));
    }

    let path = dsyms.to_string_lossy();
    let result = runner
        .run(
            "sentry-cli",
            &[
                "debug-files",
                "upload",
                "--auth-token",
                token,
                "--org",
                &target.org,
                "--project",
                &target.project,
                &path,
            ],
        )
        .await;

    match result {
        Ok(_) => {
            info!(org = %target.org, project = %target.project, "uploaded dSYMs to Sentry");
            SymbolOutcome::Done
        }
        Err(err) => {
            warn!(error = %err, "Sentry upload failed, continuing");
            SymbolOutcome::Skipped(format!("Sentry upload (failed: {err})"))
        }
    }
}
