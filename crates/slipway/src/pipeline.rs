//! Release pipeline orchestration
//!
//! Phases run strictly in order, each one a blocking call into a component
//! crate. The pipeline owns the only mutable run state: the `ReleaseState`
//! and the rollback ledger. `past_point_of_no_return` flips exactly once,
//! after both pushes land on the remote; from then on no failure path may
//! touch the ledger.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context};
use console::style;
use tracing::{debug, error, info};

use slipway_core::error::ValidationError;
use slipway_core::{
    preflight, CommandRunner, IncrementKind, ReleaseError, RollbackManager, RollbackReport,
    RollbackStep, RunContext,
};
use slipway_feed::{FeedEntry, UpdateSigner};
use slipway_packaging::{find_signing_identity, ArtifactBuilder, DiskImageBuilder, Notarizer};
use slipway_publish::{GitPublisher, GithubReleaser, SymbolOutcome, RELEASE_BRANCH};
use slipway_version::VersionPair;

use crate::report;

/// Changelog file at the repository root.
pub const CHANGELOG_PATH: &str = "CHANGELOG.md";

/// Pipeline phases, entered strictly in this order. `SparkleSkipped` takes
/// the place of `FeedUpdated` on --skip-sparkle runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validating,
    ChecklistConfirmed,
    VersionComputed,
    ChangelogProcessed,
    Built,
    Packaged,
    FeedUpdated,
    SparkleSkipped,
    Verified,
    Pushed,
    Released,
    SymbolsUploaded,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::ChecklistConfirmed => "checklist confirmed",
            Self::VersionComputed => "version computed",
            Self::ChangelogProcessed => "changelog processed",
            Self::Built => "built",
            Self::Packaged => "packaged",
            Self::FeedUpdated => "feed updated",
            Self::SparkleSkipped => "sparkle skipped",
            Self::Verified => "verified",
            Self::Pushed => "pushed",
            Self::Released => "released",
            Self::SymbolsUploaded => "symbols uploaded",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mutable state of one release run, owned exclusively by the pipeline.
#[derive(Debug)]
pub struct ReleaseState {
    pub phase: Phase,
    pub versions: Option<VersionPair>,
    pub release_notes: Option<String>,
    pub app_path: Option<PathBuf>,
    pub dmg_path: Option<PathBuf>,
    pub tag: Option<String>,
    pub release_url: Option<String>,
    /// True once the commit and tag have both been pushed. Never reset.
    pub past_point_of_no_return: bool,
    pub skipped: Vec<String>,
    /// Externally visible actions already taken, listed verbatim in the
    /// failure report since none of them can be rolled back locally.
    pub external_actions: Vec<String>,
}

impl ReleaseState {
    fn new() -> Self {
        Self {
            phase: Phase::Validating,
            versions: None,
            release_notes: None,
            app_path: None,
            dmg_path: None,
            tag: None,
            release_url: None,
            past_point_of_no_return: false,
            skipped: Vec::new(),
            external_actions: Vec::new(),
        }
    }
}

/// What the top-level failure handler did with the ledger.
#[derive(Debug)]
pub enum FailureOutcome {
    /// Past the point of no return: the ledger was left untouched.
    ManualIntervention,
    /// Local mutations were rolled back.
    RolledBack(RollbackReport),
}

/// Apply the failure policy to the rollback ledger. Before the point of no
/// return every recorded local mutation is undone; at or after it the ledger
/// is never consumed.
pub fn resolve_failure(
    past_point_of_no_return: bool,
    rollback: &mut RollbackManager,
) -> FailureOutcome {
    if past_point_of_no_return {
        FailureOutcome::ManualIntervention
    } else {
        FailureOutcome::RolledBack(rollback.rollback())
    }
}

/// External-actions line for an accepted notarization. notarytool does not
/// always echo the submission id back, so the line degrades gracefully.
fn notarization_action(submission_id: Option<&str>) -> String {
    match submission_id {
        Some(id) => format!("notarization submission {id} accepted"),
        None => "notarization accepted".to_string(),
    }
}

pub struct ReleasePipeline {
    ctx: RunContext,
    runner: CommandRunner,
    rollback: RollbackManager,
    state: ReleaseState,
    started: Instant,
}

impl ReleasePipeline {
    pub fn new(ctx: RunContext) -> Self {
        let runner = CommandRunner::verbose(ctx.verbose);
        Self {
            ctx,
            runner,
            rollback: RollbackManager::new(),
            state: ReleaseState::new(),
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> &ReleaseState {
        &self.state
    }

    fn enter(&mut self, phase: Phase) {
        debug!(%phase, "entering phase");
        self.state.phase = phase;
    }

    /// Run the whole release. Any error propagated from here is handled by
    /// `handle_failure`, which decides rollback versus manual intervention.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.enter(Phase::Validating);
        report::phase(&self.ctx, "Validation Phase");
        preflight::validate_tools(&self.runner, self.ctx.skip_sparkle).await?;
        let warnings = preflight::preflight_warnings(&self.runner).await?;
        report::step_done(&self.ctx, "Validated tools and environment");

        if !report::confirm_checklist(&self.ctx, &warnings)? {
            return Err(ReleaseError::Validation(ValidationError::Cancelled).into());
        }
        self.enter(Phase::ChecklistConfirmed);

        // Version management. The descriptor is only touched for real bumps;
        // skip runs reuse the numbers already in the project.
        report::phase(&self.ctx, "Version Management");
        let descriptor = self.ctx.config.descriptor_path();
        let current =
            slipway_version::read_file(&descriptor, &self.ctx.config.bundle_identifier)?;
        let next = slipway_version::compute_next(&current, self.ctx.increment)?;
        report::version_table(&self.ctx, &current, &next, self.ctx.increment);

        if self.ctx.increment == IncrementKind::Skip {
            report::step_skipped(&self.ctx, "Skipping version number update");
            self.state.skipped.push("Version number update".to_string());
        } else {
            slipway_version::write_file(
                &descriptor,
                &self.ctx.config.bundle_identifier,
                &next,
                &mut self.rollback,
            )?;
            report::step_done(&self.ctx, "Updated version numbers");
        }
        self.state.versions = Some(next.clone());
        self.enter(Phase::VersionComputed);

        report::phase(&self.ctx, "Changelog Processing");
        let notes =
            slipway_changelog::promote_file(Path::new(CHANGELOG_PATH), &next, &mut self.rollback)?;
        report::step_done(&self.ctx, "Processed changelog and generated release notes");
        report::release_notes_preview(&self.ctx, &notes, &next);
        self.state.release_notes = Some(notes.clone());
        self.enter(Phase::ChangelogProcessed);

        report::phase(&self.ctx, "Building Release");
        let bar = report::spinner(&self.ctx, "Building and exporting archive...");
        let build_result = ArtifactBuilder::new(&self.ctx, &self.runner).build().await;
        report::finish_spinner(bar);
        let app_path = build_result?;
        report::step_done(&self.ctx, "Built Xcode archive");
        self.state.app_path = Some(app_path.clone());
        self.enter(Phase::Built);

        report::phase(&self.ctx, "DMG Creation & Notarization");
        let identity = find_signing_identity(&self.runner, &self.ctx.env.team_id).await?;
        let bar = report::spinner(&self.ctx, "Creating disk image...");
        let package_result = DiskImageBuilder::new(&self.ctx, &self.runner)
            .package(&app_path, &identity, &next.marketing)
            .await;
        report::finish_spinner(bar);
        let dmg_path = package_result?;

        let notarytool = preflight::notarytool_path(&self.runner).await;
        let bar = report::spinner(&self.ctx, "Notarizing (this can take a while)...");
        let notarize_result =
            Notarizer::new(&self.runner, notarytool, self.ctx.env.keychain_profile.clone())
                .notarize(&dmg_path, &self.ctx.archive_dir)
                .await;
        report::finish_spinner(bar);
        let submission_id = notarize_result?;
        self.state
            .external_actions
            .push(notarization_action(submission_id.as_deref()));
        report::step_done(&self.ctx, "Created and notarized DMG");
        self.state.dmg_path = Some(dmg_path.clone());
        self.enter(Phase::Packaged);

        if self.ctx.skip_sparkle {
            report::step_skipped(
                &self.ctx,
                "Skipping Sparkle signing and appcast update (--skip-sparkle)",
            );
            self.state.skipped.push("Sparkle signing".to_string());
            self.state.skipped.push("Appcast update".to_string());
            self.enter(Phase::SparkleSkipped);
        } else {
            report::phase(&self.ctx, "Sparkle Update Signing");
            self.unlock_keychain().await?;

            let signature = UpdateSigner::new(&self.runner).sign(&dmg_path).await?;
            report::step_done(&self.ctx, "Signed update");

            let html = slipway_changelog::render_fragment(&notes);
            let entry = FeedEntry::new(&self.ctx.config, &next, &signature, html);
            slipway_feed::update_feed(
                Path::new(slipway_feed::APPCAST_PATH),
                &entry,
                &mut self.rollback,
            )?;
            report::step_done(&self.ctx, "Updated appcast.xml");
            self.enter(Phase::FeedUpdated);
        }

        let results =
            slipway_packaging::verify_release(&self.ctx, &self.runner, &dmg_path, &next.header())
                .await?;
        report::verification_results(&self.ctx, &results);
        self.enter(Phase::Verified);

        // Git publication. Once both pushes return, the release is public
        // and the failure policy flips to manual intervention.
        report::phase(&self.ctx, "Git & GitHub Release");
        let git = GitPublisher::new(&self.runner);
        git.stage_all().await?;
        git.commit(&next).await?;
        let tag = git.tag(&next, &notes).await?;
        self.state.tag = Some(tag.clone());
        git.push_branch().await?;
        self.state
            .external_actions
            .push(format!("release commit pushed to origin/{RELEASE_BRANCH}"));
        git.push_tag(&tag).await?;
        self.state
            .external_actions
            .push(format!("tag {tag} pushed to origin"));
        self.state.past_point_of_no_return = true;
        info!(%tag, "point of no return passed");
        report::step_done(
            &self.ctx,
            &format!("Created and pushed commit and tag for {tag}"),
        );
        self.enter(Phase::Pushed);

        let dsyms_zip =
            slipway_publish::create_dsyms_zip(&self.runner, &self.ctx, &dmg_path).await?;
        let release_url = GithubReleaser::new(&self.runner)
            .create_release(&tag, &next, &dmg_path, dsyms_zip.as_deref())
            .await?;
        self.state.release_url = Some(release_url.clone());
        report::step_done(&self.ctx, "Created GitHub release");
        self.enter(Phase::Released);

        if self.ctx.sentry.is_some() {
            report::phase(&self.ctx, "Post-Release Tasks");
            match slipway_publish::upload_dsyms(&self.runner, &self.ctx).await {
                SymbolOutcome::Done => {
                    report::step_done(&self.ctx, "Uploaded dSYMs to Sentry")
                }
                SymbolOutcome::Skipped(reason) => {
                    report::step_skipped(&self.ctx, &reason);
                    self.state.skipped.push(reason);
                }
            }
        } else {
            report::step_skipped(
                &self.ctx,
                "Skipping Sentry dSYM upload (--sentry-org and --sentry-project not provided)",
            );
            self.state.skipped.push("Sentry dSYM upload".to_string());
        }
        self.enter(Phase::SymbolsUploaded);

        report::release_summary(
            &self.ctx,
            &next,
            &dmg_path,
            &release_url,
            self.started.elapsed(),
            &self.state.skipped,
        );
        Ok(())
    }

    /// Unlock the keychain interactively so codesign, notarytool and
    /// sign_update can reach their credentials. Runs `security` with
    /// inherited stdio; the password never passes through this process.
    async fn unlock_keychain(&self) -> anyhow::Result<()> {
        report::keychain_prompt(&self.ctx);
        let status = tokio::process::Command::new("security")
            .args(["-i", "unlock-keychain"])
            .status()
            .await
            .context("failed to run security unlock-keychain")?;
        if !status.success() {
            return Err(anyhow!("Failed to unlock keychain for Sparkle signing"));
        }
        report::step_done(&self.ctx, "Keychain unlocked");
        Ok(())
    }

    /// Top-level failure handler: roll back local mutations before the
    /// point of no return, otherwise report what is already public and
    /// leave everything in place.
    pub fn handle_failure(&mut self, err: &anyhow::Error) {
        error!(error = %err, phase = %self.state.phase, "release failed");

        let tag = self
            .state
            .tag
            .clone()
            .or_else(|| self.state.versions.as_ref().map(|v| v.tag()));

        match resolve_failure(self.state.past_point_of_no_return, &mut self.rollback) {
            FailureOutcome::ManualIntervention => {
                let tag = tag.as_deref().unwrap_or("the release tag");
                eprintln!();
                eprintln!(
                    "{}",
                    style("Release Partially Completed").red().bold()
                );
                eprintln!(
                    "The commit and tag ({tag}) have been pushed, but the release \
                     failed at step '{}': {err}",
                    self.state.phase
                );
                if !self.state.external_actions.is_empty() {
                    eprintln!("Already done and not undone automatically:");
                    for action in &self.state.external_actions {
                        eprintln!("  • {action}");
                    }
                }
                eprintln!(
                    "{}",
                    style("Manual intervention may be required to complete the release.")
                        .yellow()
                );
            }
            FailureOutcome::RolledBack(rollback_report) => {
                eprintln!();
                eprintln!("{} {err}", style("Release Failed:").red().bold());
                for step in &rollback_report.steps {
                    if let RollbackStep::Failed(path, reason) = step {
                        eprintln!(
                            "{} could not restore {}: {reason}",
                            style("!").yellow(),
                            path.display()
                        );
                    }
                }
            }
        }

        if self.ctx.debug {
            eprintln!();
            for cause in err.chain().skip(1) {
                eprintln!("  caused by: {cause}");
            }
        } else if !self.ctx.quiet {
            eprintln!("Run with --debug for the full error chain");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_before_push_restores_backups() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("project.pbxproj");
        std::fs::write(&file, "original").unwrap();

        let mut rollback = RollbackManager::new();
        rollback.backup(&file).unwrap();
        std::fs::write(&file, "mutated").unwrap();

        let outcome = resolve_failure(false, &mut rollback);
        assert!(matches!(outcome, FailureOutcome::RolledBack(_)));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "original");
    }

    #[test]
    fn failure_after_push_never_touches_the_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("appcast.xml");
        std::fs::write(&file, "original").unwrap();
        let created = dir.path().join("export_options.plist");
        std::fs::write(&created, "generated").unwrap();

        let mut rollback = RollbackManager::new();
        rollback.backup(&file).unwrap();
        std::fs::write(&file, "mutated").unwrap();
        rollback.track_created(&created);

        let outcome = resolve_failure(true, &mut rollback);
        assert!(matches!(outcome, FailureOutcome::ManualIntervention));

        // Zero restores and zero deletions happened.
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "mutated");
        assert!(created.exists());
        assert!(!rollback.is_empty());
    }

    #[test]
    fn notarization_action_degrades_without_an_id() {
        assert_eq!(
            notarization_action(Some("abc-123")),
            "notarization submission abc-123 accepted"
        );
        assert_eq!(notarization_action(None), "notarization accepted");
    }

    #[test]
    fn phases_render_for_failure_messages() {
        assert_eq!(Phase::Pushed.to_string(), "pushed");
        assert_eq!(Phase::SparkleSkipped.to_string(), "sparkle skipped");
    }
}
