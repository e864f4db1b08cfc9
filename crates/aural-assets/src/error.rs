//! Asset error types.

use std::path::PathBuf;

use aural_common::AssetId;
use thiserror::Error;

/// Errors raised while loading, saving or resolving assets.
#[derive(Debug, Error)]
pub enum AssetError {
    /// Reading or writing an asset file failed.
    #[error("IO error on '{path}': {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An asset file is not a valid record.
    #[error("Failed to parse asset '{path}': {message}")]
    Parse {
        /// File involved.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A record could not be serialized.
    #[error("Failed to serialize asset: {0}")]
    Serialize(String),

    /// No asset is registered under the id.
    #[error("Unknown asset: {0}")]
    UnknownAsset(AssetId),

    /// An asset is already registered under the id.
    #[error("Asset already registered: {0}")]
    DuplicateAsset(AssetId),

    /// The asset is not loaded.
    #[error("Asset not loaded: {0}")]
    NotLoaded(AssetId),

    /// The asset has no definition file to save to.
    #[error("Asset has no definition file: {0}")]
    NoDefinitionFile(AssetId),
}

/// Result type for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;
