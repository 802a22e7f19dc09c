use std::io;
use std::path::PathBuf;

use geosync_core::catalog::{CatalogError, FeatureSetId, StyleId};
use geosync_core::remote::RemoteError;
use geosync_core::styles::StyleError;
use geosync_core::sync::SyncError;
use geosync_core::upload::UploadError;

/// A convenience [`Result`] for the geosync application.
pub type GeosyncResult<T> = Result<T, GeosyncError>;

#[derive(thiserror::Error, Debug)]
pub enum GeosyncError {
    #[error(transparent)]
    ConfigFileError(#[from] crate::config::ConfigFileError),

    #[error(transparent)]
    LoggingError(#[from] crate::logging::LoggingError),

    #[error(transparent)]
    CatalogError(#[from] CatalogError),

    #[error(transparent)]
    RemoteError(#[from] RemoteError),

    #[error(transparent)]
    SyncError(#[from] SyncError),

    #[error(transparent)]
    UploadError(#[from] UploadError),

    #[error(transparent)]
    StyleError(#[from] StyleError),

    #[error("Unable to read {1}: {0}")]
    InputReadError(#[source] io::Error, PathBuf),

    #[error("File {1} is not valid JSON: {0}")]
    InputParseError(#[source] serde_json::Error, PathBuf),

    #[error("Unable to derive a layer name from {0}, use --name")]
    NoLayerName(PathBuf),

    #[error("Feature set {0} does not exist")]
    FeatureSetNotFound(FeatureSetId),

    #[error("Style {1} of feature set {0} does not exist")]
    StyleNotFound(FeatureSetId, StyleId),

    #[error("Unable to write the output: {0}")]
    OutputError(#[source] serde_json::Error),
}
