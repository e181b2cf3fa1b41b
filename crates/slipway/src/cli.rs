//! Command-line definition

use std::path::PathBuf;

use clap::Parser;

use slipway_core::IncrementKind;

/// Slipway - build, notarize and publish a macOS app release
#[derive(Debug, Parser)]
#[command(name = "slipway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Version increment to apply (major, minor, patch, or skip to reuse
    /// the current version numbers)
    #[arg(value_name = "INCREMENT")]
    pub increment: IncrementKind,

    /// Directory where the archive, export and disk image are produced
    #[arg(value_name = "ARCHIVE_DIR")]
    pub archive_dir: PathBuf,

    /// Path to the release configuration file
    #[arg(long, default_value = "release.yaml")]
    pub config: PathBuf,

    /// Sentry organization for debug-symbol upload
    #[arg(long, requires = "sentry_project")]
    pub sentry_org: Option<String>,

    /// Sentry project for debug-symbol upload
    #[arg(long, requires = "sentry_org")]
    pub sentry_project: Option<String>,

    /// Skip Sparkle update signing and the appcast update (useful when the
    /// EdDSA key is not accessible)
    #[arg(long)]
    pub skip_sparkle: bool,

    /// Skip the interactive pre-release checklist confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print the full error chain on failure
    #[arg(long)]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_increment_and_archive_dir() {
        let cli = Cli::try_parse_from(["slipway", "minor", "build"]).unwrap();
        assert_eq!(cli.increment, IncrementKind::Minor);
        assert_eq!(cli.archive_dir, PathBuf::from("build"));
        assert_eq!(cli.config, PathBuf::from("release.yaml"));
        assert!(!cli.skip_sparkle);
    }

    #[test]
    fn rejects_unknown_increment() {
        assert!(Cli::try_parse_from(["slipway", "prerelease", "build"]).is_err());
    }

    #[test]
    fn sentry_flags_come_in_pairs() {
        assert!(Cli::try_parse_from(["slipway", "patch", "build", "--sentry-org", "acme"]).is_err());
        let cli = Cli::try_parse_from([
            "slipway",
            "patch",
            "build",
            "--sentry-org",
            "acme",
            "--sentry-project",
            "app",
        ])
        .unwrap();
        assert_eq!(cli.sentry_org.as_deref(), Some("acme"));
        assert_eq!(cli.sentry_project.as_deref(), Some("app"));
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["slipway", "patch", "build", "-q", "-v"]).is_err());
    }
}
