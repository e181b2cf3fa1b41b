//! Run-scoped context passed explicitly into every component

use std::path::PathBuf;

use crate::config::ReleaseConfig;

/// Kind of version increment requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncrementKind {
    /// Build +100, MAJOR+1, minor and patch reset
    Major,
    /// Build +10, MINOR+1, patch reset
    Minor,
    /// Build +1, PATCH+1
    Patch,
    /// Keep the current version numbers
    Skip,
}

impl IncrementKind {
    /// Returns the string representation of the increment kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
            Self::Skip => "skip",
        }
    }
}

impl std::fmt::Display for IncrementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IncrementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            "skip" => Ok(Self::Skip),
            _ => Err(format!("Unknown increment kind: {s}")),
        }
    }
}

/// Environment-derived release settings, resolved once during validation.
#[derive(Debug, Clone)]
pub struct ReleaseEnv {
    /// Apple Team ID used for code signing (APPLE_TEAM_ID, required)
    pub team_id: String,
    /// Keychain profile for notarytool (APPLE_KEYCHAIN_PROFILE)
    pub keychain_profile: String,
    /// Sentry auth token, gates symbol upload (SENTRY_AUTH_TOKEN)
    pub sentry_auth_token: Option<String>,
}

/// Sentry upload target from the command line.
#[derive(Debug, Clone)]
pub struct SentryTarget {
    pub org: String,
    pub project: String,
}

/// Everything a pipeline phase needs, constructed once in main.
///
/// Components take `&RunContext` instead of reading process-wide globals, so
/// there is no hidden cross-module state.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: ReleaseConfig,
    pub env: ReleaseEnv,
    pub increment: IncrementKind,
    /// Directory where archives, exports and the disk image are produced
    pub archive_dir: PathBuf,
    /// Bypass Sparkle signing and the appcast update
    pub skip_sparkle: bool,
    pub sentry: Option<SentryTarget>,
    pub verbose: bool,
    pub quiet: bool,
    pub debug: bool,
    /// Skip the interactive checklist confirmation
    pub assume_yes: bool,
}

impl RunContext {
    /// Path to the packaged disk image for a marketing version.
    pub fn dmg_path(&self, marketing_version: &str) -> PathBuf {
        self.archive_dir.join(self.config.dmg_name(marketing_version))
    }

    /// Path to the built .xcarchive.
    pub fn xcarchive_path(&self) -> PathBuf {
        self.archive_dir
            .join(format!("{}.xcarchive", self.config.app_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_kind_round_trip() {
        for kind in [
            IncrementKind::Major,
            IncrementKind::Minor,
            IncrementKind::Patch,
            IncrementKind::Skip,
        ] {
            assert_eq!(kind.as_str().parse::<IncrementKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_increment_kind_rejects_unknown() {
        assert!("prerelease".parse::<IncrementKind>().is_err());
    }
}
