//! Error types for the publication steps

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PublishError>;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Could not find release URL in gh output")]
    ReleaseUrlMissing,

    #[error(transparent)]
    Tool(#[from] slipway_core::ReleaseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
