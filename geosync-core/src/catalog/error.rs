#[cfg(feature = "postgres")]
use deadpool_postgres::tokio_postgres::Error as TokioPgError;
#[cfg(feature = "postgres")]
use deadpool_postgres::{BuildError, PoolError};
#[cfg(feature = "postgres")]
use semver::Version;

use crate::catalog::{DatasetId, FeatureSetId, StyleId};

/// Result type for catalog store operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised by a [`CatalogStore`](crate::catalog::CatalogStore).
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// Dataset referenced by a write does not exist.
    #[error("Dataset {0} does not exist")]
    UnknownDataset(DatasetId),

    /// Feature set referenced by a write does not exist.
    #[error("Feature set {0} does not exist")]
    UnknownFeatureSet(FeatureSetId),

    /// Style referenced by a feature set does not exist.
    #[error("Style {0} does not exist")]
    UnknownStyle(StyleId),

    /// A unique name is already taken.
    #[error("A {0} named {1:?} already exists")]
    DuplicateName(&'static str, String),

    /// The in-memory store lock was poisoned by a panicking writer.
    #[error("Catalog lock is poisoned")]
    Poisoned,

    /// A stored geometry could not be decoded.
    #[error("Stored geometry of feature {0} is not a supported simple geometry")]
    CorruptGeometry(i32),

    /// Query failure, with what was being done at the time.
    #[cfg(feature = "postgres")]
    #[error("Postgres error while {1}: {0}")]
    PostgresError(#[source] TokioPgError, &'static str),

    /// Pool could not be built.
    #[cfg(feature = "postgres")]
    #[error("Unable to build a Postgres connection pool {1}: {0}")]
    PostgresPoolBuildError(#[source] BuildError, String),

    /// No connection could be taken from the pool.
    #[cfg(feature = "postgres")]
    #[error("Unable to get a Postgres connection from the pool {1}: {0}")]
    PostgresPoolConnError(#[source] PoolError, String),

    /// Connection string could not be parsed.
    #[cfg(feature = "postgres")]
    #[error("Unable to parse connection string {1}: {0}")]
    BadConnectionString(#[source] TokioPgError, String),

    /// Server version string could not be parsed.
    #[cfg(feature = "postgres")]
    #[error("Unable to parse PostgreSQL version {1}: {0}")]
    BadPostgresVersion(#[source] semver::Error, String),

    /// `PostGIS` version string could not be parsed.
    #[cfg(feature = "postgres")]
    #[error("Unable to parse PostGIS version {1}: {0}")]
    BadPostgisVersion(#[source] semver::Error, String),

    /// Server is older than supported.
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL version {0} is too old, minimum required is {1}")]
    PostgresqlTooOld(Version, Version),

    /// `PostGIS` is older than supported.
    #[cfg(feature = "postgres")]
    #[error("PostGIS version {0} is too old, minimum required is {1}")]
    PostgisTooOld(Version, Version),

    /// The `postgis` extension is not enabled in the database.
    #[cfg(feature = "postgres")]
    #[error("PostGIS is not enabled in {0}")]
    PostgisNotEnabled(String),
}
