//! API error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unexpected empty response from API")]
    EmptyResponse,
}

impl ApiError {
    /// True when the failure is a not-found style response rather than a
    /// genuine transport or server error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }
}

/// Pull a human-readable message out of an error response body.
///
/// The server answers with either a bare JSON string, an object carrying a
/// `message` or `error` field, or free-form text. Anything else is truncated
/// and shown as-is.
pub fn extract_error_message(body: &str, status: u16) -> String {
    if body.trim().is_empty() {
        return format!("API error ({})", status);
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(s) = value.as_str() {
            return s.to_string();
        }
        for key in ["message", "error"] {
            if let Some(s) = value.get(key).and_then(|v| v.as_str()) {
                return s.to_string();
            }
        }
    }

    if body.len() > 500 {
        let mut end = 500;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
