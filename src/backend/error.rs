//! Client Error Types
//!
//! Every backend call ends in one of these. The `Display` text is what a user
//! sees in a banner, so server-reported messages are surfaced verbatim.

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when talking to the dashboard backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// No response was received
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    /// The backend answered with an error status
    #[error("{message}")]
    Server { status: u16, message: String },

    /// A success response whose body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The HTTP client could not be built
    #[error("Client configuration error: {0}")]
    Config(String),
}

impl BackendError {
    /// Human-readable message suitable for a banner or transcript entry
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// HTTP status for server-reported failures
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build a server error from a raw error body, falling back to `fallback`
    /// when the body carries no usable message.
    pub fn from_body(status: u16, body: &str, fallback: impl FnOnce() -> String) -> Self {
        let message = extract_error_message(body).unwrap_or_else(fallback);
        BackendError::Server { status, message }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Network(e.to_string())
        }
    }
}

/// Pull a message out of a JSON error body.
///
/// Looks at `detail` first, then `error`. `detail` may be a validation list
/// (`[{"msg": ...}]`); `error` may be an object with a `message` field.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    if let Some(detail) = value.get("detail") {
        if let Some(message) = message_from(detail) {
            return Some(message);
        }
    }

    value.get("error").and_then(message_from)
}

fn message_from(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("msg"))
            .and_then(|m| m.as_str())
            .map(str::to_string),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(map) => map.get("msg").and_then(|m| m.as_str()).map(str::to_string),
                    _ => None,
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_string() {
        let body = r#"{"detail": "Only .xlsx files are supported."}"#;
        assert_eq!(
            extract_error_message(body).as_deref(),
            Some("Only .xlsx files are supported.")
        );
    }

    #[test]
    fn test_detail_wins_over_error() {
        let body = r#"{"detail": "from detail", "error": "from error"}"#;
        assert_eq!(extract_error_message(body).as_deref(), Some("from detail"));
    }

    #[test]
    fn test_error_string_and_object() {
        assert_eq!(
            extract_error_message(r#"{"error": "boom"}"#).as_deref(),
            Some("boom")
        );
        assert_eq!(
            extract_error_message(r#"{"error": {"code": "X", "message": "nested"}}"#).as_deref(),
            Some("nested")
        );
    }

    #[test]
    fn test_validation_list() {
        let body = r#"{"detail": [{"loc": ["body", "question"], "msg": "field required"}]}"#;
        assert_eq!(extract_error_message(body).as_deref(), Some("field required"));
    }

    #[test]
    fn test_unusable_bodies() {
        assert_eq!(extract_error_message("Internal Server Error"), None);
        assert_eq!(extract_error_message(r#"{"detail": ""}"#), None);
        assert_eq!(extract_error_message(r#"{"status": "bad"}"#), None);
    }

    #[test]
    fn test_from_body_fallback() {
        let err = BackendError::from_body(500, "<html>", || "Upload failed".to_string());
        assert_eq!(err.user_message(), "Upload failed");
        assert_eq!(err.status(), Some(500));
    }
}
