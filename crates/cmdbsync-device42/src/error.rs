//! Device42 client errors.

use thiserror::Error;

/// Errors raised while reading from Device42.
#[derive(Debug, Error)]
pub enum Device42Error {
    /// The HTTP client could not be built.
    #[error("invalid Device42 client configuration: {0}")]
    InvalidConfig(String),

    /// The request never produced a response.
    #[error("Device42 request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Device42 answered with a non-success status.
    #[error("Device42 HTTP {status} ({method} {path}): {body}")]
    Status {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    /// The response body was not the expected JSON.
    #[error("failed to parse Device42 response from {path}: {message}")]
    Parse { path: String, message: String },
}

impl Device42Error {
    /// HTTP status of the failed request, if the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type for Device42 operations.
pub type Device42Result<T> = Result<T, Device42Error>;
