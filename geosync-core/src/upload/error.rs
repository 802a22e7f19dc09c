use crate::catalog::CatalogError;

/// Result type for manual uploads.
pub type UploadResult<T> = Result<T, UploadError>;

/// Reasons an upload is refused. Nothing is written when one occurs.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum UploadError {
    /// The document is not a feature collection.
    #[error("Uploaded document has no \"features\" array")]
    MissingFeatures,

    /// Every candidate layer name is taken.
    #[error("No free layer name for {0:?}: every name up to {0}_{1} is taken")]
    NoFreeLayerName(String, u32),

    /// The catalog store failed.
    #[error(transparent)]
    CatalogError(#[from] CatalogError),
}
