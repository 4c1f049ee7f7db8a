use thiserror::Error;

pub type Result<T> = std::result::Result<T, DownloadError>;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("Unrecognized host: {0}")]
    UnrecognizedHost(String),

    #[error("Unrecognized path: {0}")]
    UnrecognizedPath(String),

    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("HTTP {status}: {reason}")]
    HttpStatus { status: u16, reason: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Malformed timing: attribute '{attribute}' has value {value:?}")]
    MalformedTiming { attribute: String, value: String },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}
