use reqwest::StatusCode;

/// Result type for remote requests.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Failures talking to a remote OGC API.
///
/// Every variant is isolated to the dataset or collection being processed.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum RemoteError {
    /// The HTTP client could not be constructed.
    #[error("Unable to build HTTP client: {0}")]
    ClientBuildError(#[source] reqwest::Error),

    /// A URL (configured or advertised by the remote) is not valid.
    #[error("Invalid URL {1}: {0}")]
    InvalidUrl(#[source] url::ParseError, String),

    /// Connection, TLS or timeout failure.
    #[error("Request to {1} failed: {0}")]
    RequestError(#[source] reqwest::Error, String),

    /// The remote answered with a non-success status.
    #[error("{1} responded with HTTP {0}")]
    StatusError(StatusCode, String),

    /// The body was not the JSON document expected.
    #[error("Unable to decode the response of {1}: {0}")]
    DecodeError(#[source] serde_json::Error, String),

    /// A document lacks a link needed to continue.
    #[error("Document at {1} has no link with rel={0:?}")]
    MissingLink(&'static str, String),
}
