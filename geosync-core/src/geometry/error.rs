//! Error types for geometry and feature conversion.

use serde_json::Value;

/// Result type for geometry conversion.
pub type GeometryResult<T> = Result<T, GeometryError>;

/// Errors raised while converting a `GeoJSON` feature into its stored form.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum GeometryError {
    /// A position had fewer than two ordinates.
    #[error("Position must have at least 2 ordinates, got {0}")]
    InvalidPosition(usize),

    /// The geometry kind has no stored representation.
    #[error("Geometry type {0} is not supported")]
    UnsupportedType(&'static str),

    /// A linear ring or line string is too short to be valid.
    #[error("{0} must have at least {1} positions, got {2}")]
    TooFewPositions(&'static str, usize, usize),

    /// The `timestamp` property could not be read as a Unix epoch.
    #[error("Property timestamp={0} is not a Unix epoch value")]
    InvalidTimestamp(Value),
}
