//! Error types for status publishing

use thiserror::Error;

/// Configuration problems detected while validating publisher parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("server URL is missing or blank")]
    MissingServerUrl,

    #[error("server URL is not a valid URL: {0}")]
    InvalidServerUrl(String),

    #[error("authentication type is missing")]
    MissingAuthType,

    #[error("unrecognized authentication type: {0}")]
    UnknownAuthType(String),

    #[error("{auth} authentication requires parameter '{key}'")]
    MissingCredential { auth: &'static str, key: &'static str },

    #[error("unrecognized report-on value: {0}")]
    UnknownReportOn(String),

    #[error("unrecognized configuration key: {0}")]
    UnknownKey(String),
}

/// A repository URL that cannot be split into owner and repository name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse repository url '{uri}': {reason}")]
pub struct IdentityError {
    pub uri: String,
    pub reason: String,
}

impl IdentityError {
    pub(crate) fn new(uri: &str, reason: impl Into<String>) -> Self {
        Self {
            uri: uri.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure of a single remote API call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status code.
    #[error("remote returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The requested object does not exist on the remote side.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),

    /// The client could not be constructed.
    #[error("client setup failed: {0}")]
    Setup(String),
}

/// Umbrella error for publisher operations.
#[derive(Error, Debug)]
pub enum PublisherError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("repository identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("remote API error: {0}")]
    Api(#[from] ApiError),
}

/// Result type for publisher operations
pub type Result<T> = std::result::Result<T, PublisherError>;
