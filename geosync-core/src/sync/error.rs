use crate::catalog::CatalogError;

/// Result type for synchronization and refresh runs.
pub type SyncResult<T> = Result<T, SyncError>;

/// Failures that stop a whole run.
///
/// Failures of individual datasets and collections are recorded in the run report instead.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    /// The catalog store failed outside of any single collection.
    #[error(transparent)]
    CatalogError(#[from] CatalogError),

    /// Another refresh holds the lease.
    #[error("Another refresh is running (lease {0:?} is held)")]
    RefreshInProgress(&'static str),
}
