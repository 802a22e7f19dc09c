/// Result type for style resolution.
pub type StyleResult<T> = Result<T, StyleError>;

/// Errors raised while resolving a style.
#[non_exhaustive]
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum StyleError {
    /// A colormap endpoint is not a hex color.
    #[error("Invalid color {0:?}, expected #rgb, #rrggbb or #rrggbbaa")]
    InvalidColor(String),
}
