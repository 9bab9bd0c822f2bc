use thiserror::Error;

/// Error handling for capture, feature extraction and configuration.
#[derive(Error, Debug)]
pub enum TrackmeError {
    /// An error occurred while parsing data.
    ///
    /// This variant is used when a decoding operation fails.
    /// The associated string provides additional context about the error.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An unsupported protocol was encountered.
    ///
    /// The associated string specifies the unsupported protocol.
    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// A packet that is not relevant for fingerprinting was encountered.
    #[error("Invalid package: {0}")]
    UnexpectedPackage(String),

    /// The capture interface could not be opened.
    ///
    /// This is the only fatal error of the capture pipeline.
    #[error("Capture unavailable: {0}")]
    Capture(String),

    /// A configuration value is out of range.
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Request-scoped failures returned to the router.
///
/// These are rendered as a JSON error body and never abort request handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("TLS details not available")]
    TlsNotAvailable,

    #[error("failed to encode response: {0}")]
    Encoding(String),
}

impl From<serde_json::Error> for RouteError {
    fn from(err: serde_json::Error) -> Self {
        RouteError::Encoding(err.to_string())
    }
}

impl RouteError {
    /// HTTP status code used when rendering the error.
    pub fn status(&self) -> u16 {
        match self {
            RouteError::TlsNotAvailable => 400,
            RouteError::Encoding(_) => 500,
        }
    }
}
