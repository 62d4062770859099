//! Sync error types.

use cmdbsync_core::ConfigError;
use cmdbsync_device42::Device42Error;
use cmdbsync_freshservice::FreshServiceError;
use thiserror::Error;

/// Errors that can occur during synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Device42 error.
    #[error("Source error: {0}")]
    Source(#[from] Device42Error),

    /// Freshservice error.
    #[error("Target error: {0}")]
    Target(#[from] FreshServiceError),

    /// Target-system metadata the task depends on does not exist.
    #[error("Missing target metadata: {what}")]
    MissingMetadata { what: String },

    /// Contracts cannot be created without an approver.
    #[error("No contract approver: {reason}")]
    MissingApprover { reason: String },

    /// A source record cannot be processed.
    #[error("Record '{record}': {message}")]
    Record { record: String, message: String },
}

impl SyncError {
    /// Create a missing-metadata error.
    pub fn missing_metadata(what: impl Into<String>) -> Self {
        Self::MissingMetadata { what: what.into() }
    }

    /// Create a missing-approver error.
    pub fn missing_approver(reason: impl Into<String>) -> Self {
        Self::MissingApprover {
            reason: reason.into(),
        }
    }

    /// Create a record error.
    pub fn record(record: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Record {
            record: record.into(),
            message: message.into(),
        }
    }

    /// Whether the target rejected a write because a unique value is taken.
    #[must_use]
    pub fn is_duplicate_value(&self) -> bool {
        matches!(self, Self::Target(e) if e.is_duplicate_value())
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
