//! Packaging error types

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using PackagingError
pub type Result<T> = std::result::Result<T, PackagingError>;

/// Errors raised while building, signing, imaging or notarizing an artifact
#[derive(Debug, Error)]
pub enum PackagingError {
    /// The exported app bundle was not where the export step put it
    #[error("Exported app not found at {0}")]
    AppNotFound(PathBuf),

    /// The packaged disk image was not where the packaging step put it
    #[error("Disk image not found at {0}")]
    DmgNotFound(PathBuf),

    /// No Developer ID Application certificate matched the team
    #[error("Could not find Developer ID Application certificate for team {0}")]
    IdentityNotFound(String),

    /// The final deep signature check failed
    #[error("Signature verification failed: {0}")]
    VerificationFailed(String),

    /// Notarization reached a terminal non-accepted status
    #[error("Notarization failed with status '{status}': {message}")]
    NotarizationRejected {
        status: String,
        message: String,
        /// Detailed issue log fetched after rejection, when available.
        /// A failed log fetch never masks the rejection itself.
        log: Option<String>,
    },

    /// notarytool produced output we could not interpret
    #[error("Could not parse notarytool response: {0}")]
    NotarizationResponse(String),

    /// An external tool failed
    #[error(transparent)]
    Tool(#[from] slipway_core::error::ReleaseError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
