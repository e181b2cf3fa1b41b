//! Disk image assembly and signing

use std::path::{Path, PathBuf};

use tracing::info;

use slipway_core::{CommandRunner, RunContext};

use crate::error::Result;
use crate::sign::CodeSigner;

/// Assembles the distributable disk image: `<AppName>/<AppName>.app` inside
/// a compressed UDBZ image, itself cleaned and signed.
pub struct DiskImageBuilder<'a> {
    ctx: &'a RunContext,
    runner: &'a CommandRunner,
}

impl<'a> DiskImageBuilder<'a> {
    pub fn new(ctx: &'a RunContext, runner: &'a CommandRunner) -> Self {
        Self { ctx, runner }
    }

    /// Stage the app, clean-and-sign it in its final location, create the
    /// image and sign that too. Returns the image path. The signed app is
    /// copied back next to the image so the archive directory keeps a
    /// distributable bundle.
    pub async fn package(
        &self,
        app_path: &Path,
        identity: &str,
        marketing_version: &str,
    ) -> Result<PathBuf> {
        let app_name = &self.ctx.config.app_name;
        let dmg_path = self.ctx.dmg_path(marketing_version);

        let staging = self.ctx.archive_dir.join("dmg_contents");
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        let product_folder = staging.join(app_name);
        std::fs::create_dir_all(&product_folder)?;

        // cp -a preserves symlinks and metadata; frameworks are full of both.
        let staged_app = product_folder.join(format!("{app_name}.app"));
        self.runner
            .run(
                "cp",
                &[
                    "-a",
                    &app_path.to_string_lossy(),
                    &staged_app.to_string_lossy(),
                ],
            )
            .await?;

        // Sign in the final on-image location so sealed resource paths match.
        let signer = CodeSigner::new(self.runner, identity);
        signer.ensure_signed(&staged_app).await?;

        if dmg_path.exists() {
            std::fs::remove_file(&dmg_path)?;
        }

        info!(dmg = %dmg_path.display(), "creating disk image");
        self.runner
            .run(
                "hdiutil",
                &[
                    "create",
                    "-srcfolder",
                    &product_folder.to_string_lossy(),
                    "-format",
                    "UDBZ",
                    &dmg_path.to_string_lossy(),
                ],
            )
            .await?;

        self.sign_image(&dmg_path, identity).await?;

        // Keep the signed bundle next to the image.
        let archived_app = self.ctx.archive_dir.join(format!("{app_name}.app"));
        if archived_app.exists() {
            std::fs::remove_dir_all(&archived_app)?;
        }
        self.runner
            .run(
                "cp",
                &[
                    "-a",
                    &staged_app.to_string_lossy(),
                    &archived_app.to_string_lossy(),
                ],
            )
            .await?;

        std::fs::remove_dir_all(&staging)?;

        info!(dmg = %dmg_path.display(), "disk image created and signed");
        Ok(dmg_path)
    }

    async fn sign_image(&self, dmg_path: &Path, identity: &str) -> Result<()> {
        let dmg_str = dmg_path.to_string_lossy();
        self.runner.run("xattr", &["-c", &dmg_str]).await?;
        self.runner
            .run(
                "codesign",
                &[
                    "--force",
                    "--deep",
                    "--sign",
                    identity,
                    "--options",
                    "runtime",
                    &dmg_str,
                ],
            )
            .await?;
        Ok(())
    }
}
