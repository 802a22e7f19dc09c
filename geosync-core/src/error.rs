/// Errors of any `geosync-core` component.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum GeosyncCoreError {
    /// Errors converting [`geometry`](crate::geometry).
    #[error(transparent)]
    GeometryError(#[from] crate::geometry::GeometryError),

    /// Errors of the [`catalog`](crate::catalog) stores.
    #[error(transparent)]
    CatalogError(#[from] crate::catalog::CatalogError),

    /// Errors talking to [`remote`](crate::remote) APIs.
    #[error(transparent)]
    RemoteError(#[from] crate::remote::RemoteError),

    /// Errors stopping a [`sync`](crate::sync) or refresh run.
    #[error(transparent)]
    SyncError(#[from] crate::sync::SyncError),

    /// Errors refusing an [`upload`](crate::upload).
    #[error(transparent)]
    UploadError(#[from] crate::upload::UploadError),

    /// Errors resolving [`styles`](crate::styles).
    #[error(transparent)]
    StyleError(#[from] crate::styles::StyleError),
}

/// A convenience [`Result`] for `geosync-core` operations.
pub type GeosyncCoreResult<T> = Result<T, GeosyncCoreError>;
