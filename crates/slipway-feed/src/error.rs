//! Error types for update signing and appcast maintenance

use std::path::PathBuf;

use thiserror::Error;

use crate::signature::KeychainFailure;

pub type Result<T> = std::result::Result<T, FeedError>;

/// Errors raised while reading or rewriting the appcast feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Could not find channel element in appcast.xml")]
    ChannelNotFound,

    #[error("Failed to parse appcast XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while producing the Sparkle EdDSA signature for a
/// disk image.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Sparkle sign_update tool not found at {0}")]
    ToolMissing(PathBuf),

    /// sign_update could not reach the EdDSA private key. Signing cannot
    /// proceed without the key, so the message carries the remediation
    /// steps for the classified failure.
    #[error("Sparkle signing failed: unable to access EdDSA key in Keychain ({0})\n{}", .0.guidance())]
    KeychainAccess(KeychainFailure),

    #[error("Could not parse sign_update output: {0}")]
    Parse(String),

    #[error(transparent)]
    Tool(#[from] slipway_core::ReleaseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
