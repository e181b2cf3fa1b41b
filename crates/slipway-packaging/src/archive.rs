//! Xcode archive build and export

use std::path::PathBuf;

use tracing::info;

use slipway_core::{CommandRunner, RunContext};

use crate::error::{PackagingError, Result};

/// Drives xcodebuild to produce a signed, exportable app bundle.
pub struct ArtifactBuilder<'a> {
    ctx: &'a RunContext,
    runner: &'a CommandRunner,
}

impl<'a> ArtifactBuilder<'a> {
    pub fn new(ctx: &'a RunContext, runner: &'a CommandRunner) -> Self {
        Self { ctx, runner }
    }

    /// Archive the scheme and export the app. Returns the exported bundle
    /// path. Artifacts land in the operator-chosen archive directory and are
    /// deliberately not tracked for rollback.
    pub async fn build(&self) -> Result<PathBuf> {
        let xcconfig_path = self.write_signing_xcconfig()?;
        let archive_path = self.ctx.xcarchive_path();

        info!(scheme = %self.ctx.config.scheme, "building Xcode archive");
        self.runner
            .run_piped(
                "xcodebuild",
                &[
                    "-project",
                    &self.ctx.config.xcode_project,
                    "-scheme",
                    &self.ctx.config.scheme,
                    "-configuration",
                    "Release",
                    "-xcconfig",
                    &xcconfig_path.to_string_lossy(),
                    "-archivePath",
                    &archive_path.to_string_lossy(),
                    "-skipMacroValidation",
                    "-skipPackagePluginValidation",
                    "archive",
                ],
                "xcbeautify",
                &[],
            )
            .await?;

        let export_path = self.ctx.archive_dir.join("export");
        let options_path = self.write_export_options()?;

        info!("exporting archive");
        self.runner
            .run(
                "xcodebuild",
                &[
                    "-exportArchive",
                    "-archivePath",
                    &archive_path.to_string_lossy(),
                    "-exportPath",
                    &export_path.to_string_lossy(),
                    "-exportOptionsPlist",
                    &options_path.to_string_lossy(),
                ],
            )
            .await?;

        let app_path = export_path.join(format!("{}.app", self.ctx.config.app_name));
        if !app_path.exists() {
            return Err(PackagingError::AppNotFound(app_path));
        }

        // The export step signs with whatever the plist selects; the final
        // clean-and-sign happens later, in the DMG staging location.
        Ok(app_path)
    }

    /// Temporary build configuration selecting the signing team. Written into
    /// the archive directory so it survives for post-mortem inspection.
    fn write_signing_xcconfig(&self) -> Result<PathBuf> {
        let content = format!(
            "// Temporary build configuration for release signing\n\
             DEVELOPMENT_TEAM = {}\n\
             CODE_SIGN_STYLE = Automatic\n\
             \n\
             // Apple Development for the archive; the export step picks the\n\
             // Developer ID from the export options plist\n\
             CODE_SIGN_IDENTITY = Apple Development\n",
            self.ctx.env.team_id
        );

        let path = self.ctx.archive_dir.join("release_signing.xcconfig");
        std::fs::write(&path, content)?;
        Ok(path)
    }

    fn write_export_options(&self) -> Result<PathBuf> {
        let content = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>method</key>
    <string>developer-id</string>
    <key>teamID</key>
    <string>{}</string>
    <key>signingStyle</key>
    <string>automatic</string>
    <key>uploadBitcode</key>
    <false/>
    <key>uploadSymbols</key>
    <true/>
    <key>compileBitcode</key>
    <false/>
    <key>signingCertificate</key>
    <string>Developer ID Application</string>
</dict>
</plist>"#,
            self.ctx.env.team_id
        );

        let path = self.ctx.archive_dir.join("ExportOptions.plist");
        std::fs::write(&path, content)?;
        Ok(path)
    }
}
