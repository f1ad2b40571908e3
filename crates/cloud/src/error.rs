//! Error types for catalog access.

use thiserror::Error;

/// Errors produced while searching a STAC catalog or fetching assets.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("item {item} has no '{asset}' asset")]
    MissingAsset { item: String, asset: String },

    #[error("cannot decode {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error("core error: {0}")]
    Core(#[from] forestwatch_core::Error),
}

/// Result alias for cloud operations.
pub type Result<T> = std::result::Result<T, CloudError>;

/// At the `SceneSource` seam every transport or catalog failure means the
/// imagery source is unavailable; core errors pass through unchanged.
impl From<CloudError> for forestwatch_core::Error {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::Core(e) => e,
            other => forestwatch_core::Error::SourceUnavailable(other.to_string()),
        }
    }
}
