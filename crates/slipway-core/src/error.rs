//! Error types shared across the slipway crates

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using ReleaseError
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for release operations
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Pre-release validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// External command errors
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Version descriptor errors
    #[error(transparent)]
    Version(#[from] VersionError),

    /// Changelog errors
    #[error(transparent)]
    Changelog(#[from] ChangelogError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The run was interrupted by the user
    #[error("Interrupted")]
    Interrupted,

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found. The message carries a full example so
    /// the operator can create one without consulting the docs.
    #[error(
        "Configuration file not found at {0}\n\n\
         Create a 'release.yaml' in your project root, for example:\n\n\
         app_name: \"YourApp\"\n\
         bundle_identifier: \"com.yourcompany.YourApp\"\n\
         xcode_project: \"YourApp/YourApp.xcodeproj\"\n\
         scheme: \"YourApp\"\n\
         website_url: \"https://www.yourapp.com/\"\n\
         github_owner: \"yourusername\"\n\
         github_repo: \"YourApp\"\n\
         minimum_system_version: \"15.0\"  # optional\n\n\
         or pass a custom path with --config <path>."
    )]
    NotFound(PathBuf),

    /// Configuration file exists but is empty
    #[error("Configuration file is empty: {0}")]
    Empty(PathBuf),

    /// Required field missing or blank
    #[error("Missing or empty configuration field: {0}")]
    MissingField(&'static str),

    /// YAML parsing error
    #[error("Failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

/// Pre-release validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Required tools are not installed
    #[error("Missing required tools:\n{}", .0.iter().map(|t| format!("  - {t}")).collect::<Vec<_>>().join("\n"))]
    MissingTools(Vec<String>),

    /// Required environment variables are not set
    #[error("Missing required environment variables:\n{}", .0.iter().map(|v| format!("  - {v}")).collect::<Vec<_>>().join("\n"))]
    MissingEnv(Vec<String>),

    /// The operator declined the pre-release checklist
    #[error("Release cancelled")]
    Cancelled,
}

/// External command errors
#[derive(Debug, Error)]
pub enum CommandError {
    /// Command ran and exited non-zero
    #[error("Command failed: {program} (exit {code:?})\n{stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Command could not be spawned at all
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl CommandError {
    /// The stderr captured from a failed command, if any.
    pub fn stderr(&self) -> &str {
        match self {
            Self::Failed { stderr, .. } => stderr,
            Self::Spawn { .. } => "",
        }
    }
}

/// Version descriptor errors
#[derive(Debug, Error)]
pub enum VersionError {
    /// No build-settings block matched the bundle identifier
    #[error("Could not find version numbers for bundle identifier {0}")]
    NotFound(String),

    /// Marketing version does not match MAJOR.MINOR.PATCH
    #[error("Invalid marketing version format: {0}. Expected X.Y.Z format.")]
    InvalidFormat(String),

    /// Unbalanced braces in the project descriptor
    #[error("Malformed project descriptor: unbalanced braces at byte {0}")]
    MalformedDescriptor(usize),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Changelog errors
#[derive(Debug, Error)]
pub enum ChangelogError {
    /// The document has no "## Unreleased" header
    #[error("Could not find '## Unreleased' section in the changelog")]
    MissingSection,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReleaseError {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }
}
