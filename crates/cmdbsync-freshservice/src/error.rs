//! Freshservice client errors.

use serde_json::Value;
use thiserror::Error;

/// Errors raised by the Freshservice client.
#[derive(Debug, Error)]
pub enum FreshServiceError {
    /// The HTTP client could not be built.
    #[error("invalid Freshservice client configuration: {0}")]
    InvalidConfig(String),

    /// The request never produced a response.
    #[error("Freshservice request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A unique field (serial number, item id) already holds this value.
    #[error("Freshservice duplicate value ({method} {path}): {body}")]
    DuplicateValue {
        method: String,
        path: String,
        body: String,
    },

    /// Freshservice answered with a non-success status.
    #[error("Freshservice HTTP {status} ({method} {path}): {body}")]
    Status {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    /// The response body was not the expected JSON.
    #[error("unexpected Freshservice response from {path}: {message}")]
    UnexpectedResponse { path: String, message: String },

    /// The integration-name token could not be signed.
    #[error("failed to sign integration token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl FreshServiceError {
    /// Create an unexpected-response error.
    pub fn unexpected(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this is a duplicate-value conflict.
    #[must_use]
    pub fn is_duplicate_value(&self) -> bool {
        matches!(self, Self::DuplicateValue { .. })
    }

    /// HTTP status of the failed request, if the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::DuplicateValue { .. } => Some(400),
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Fields whose uniqueness violations are reported as duplicate values.
const UNIQUE_FIELDS: [&str; 2] = ["serial_number", "item_id"];

/// Whether a 400 response body describes a uniqueness violation on a
/// serial number or item id.
#[must_use]
pub fn is_duplicate_value_body(body: &str) -> bool {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return false;
    };
    if json.get("description").and_then(Value::as_str) != Some("Validation failed") {
        return false;
    }
    let Some(errors) = json.get("errors").and_then(Value::as_array) else {
        return false;
    };
    errors.iter().any(|error| {
        let field = error.get("field").and_then(Value::as_str).unwrap_or_default();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim();
        UNIQUE_FIELDS.contains(&field) && matches!(message, "must be unique" | "is not unique")
    })
}

/// Result type for Freshservice operations.
pub type FreshServiceResult<T> = Result<T, FreshServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_duplicate_serial_number() {
        let body = json!({
            "description": "Validation failed",
            "errors": [{"field": "serial_number", "message": " must be unique", "code": "duplicate_value"}]
        });
        assert!(is_duplicate_value_body(&body.to_string()));
    }

    #[test]
    fn test_duplicate_item_id_not_unique() {
        let body = json!({
            "description": "Validation failed",
            "errors": [
                {"field": "name", "message": "can't be blank"},
                {"field": "item_id", "message": " is not unique"}
            ]
        });
        assert!(is_duplicate_value_body(&body.to_string()));
    }

    #[test]
    fn test_other_validation_errors_are_not_duplicates() {
        let body = json!({
            "description": "Validation failed",
            "errors": [{"field": "name", "message": " must be unique"}]
        });
        assert!(!is_duplicate_value_body(&body.to_string()));

        let body = json!({
            "description": "Bad request",
            "errors": [{"field": "serial_number", "message": " must be unique"}]
        });
        assert!(!is_duplicate_value_body(&body.to_string()));

        assert!(!is_duplicate_value_body("not json"));
    }

    #[test]
    fn test_classifier() {
        let err = FreshServiceError::DuplicateValue {
            method: "POST".to_string(),
            path: "api/v2/assets".to_string(),
            body: String::new(),
        };
        assert!(err.is_duplicate_value());
        assert_eq!(err.status(), Some(400));

        let err = FreshServiceError::unexpected("api/v2/assets", "missing 'asset'");
        assert!(!err.is_duplicate_value());
        assert_eq!(err.status(), None);
    }
}
