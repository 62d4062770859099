//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading or validating the mapping file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The mapping file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The mapping file is not well-formed or does not match the expected layout.
    #[error("failed to parse config: {0}")]
    Parse(#[from] quick_xml::DeError),

    /// A value in the mapping file is present but not acceptable.
    #[error("invalid config ({context}): {message}")]
    Invalid { context: String, message: String },
}

impl ConfigError {
    /// Create an invalid-value error.
    pub fn invalid(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
