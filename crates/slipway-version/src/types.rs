//! Version pair type

use std::fmt;

/// The two build identifiers carried by a release: the monotonically
/// increasing build counter and the user-facing MAJOR.MINOR.PATCH string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPair {
    /// CURRENT_PROJECT_VERSION
    pub build: u64,
    /// MARKETING_VERSION, always `\d+.\d+.\d+`
    pub marketing: String,
}

impl VersionPair {
    pub fn new(build: u64, marketing: impl Into<String>) -> Self {
        Self {
            build,
            marketing: marketing.into(),
        }
    }

    /// Tag name for this version, e.g. `v1.2.3`.
    pub fn tag(&self) -> String {
        format!("v{}", self.marketing)
    }

    /// Versioned changelog/feed header, e.g. `Version 1.2.3 (42)`.
    pub fn header(&self) -> String {
        format!("Version {} ({})", self.marketing, self.build)
    }
}

impl fmt::Display for VersionPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.marketing, self.build)
    }
}
