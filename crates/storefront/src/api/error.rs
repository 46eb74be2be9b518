//! Failure taxonomy for backend calls.
//!
//! Every non-2xx answer is mapped onto a closed set of kinds so callers can
//! decide what to do (clear the token, show field errors, ask the user to
//! wait) without looking at status codes.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::shapes;

/// Number of characters of a non-JSON body kept for diagnostics.
pub const BODY_PREVIEW_CHARS: usize = 200;

/// Closed classification of backend failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    SessionExpiredCsrf,
    ValidationFailed,
    RateLimited,
    UnexpectedContentType,
    Generic,
    /// The request never produced an HTTP response.
    Transport,
}

/// A single field-level validation message from a 422 response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Errors that can occur when calling the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP 401: the token is missing, expired or revoked.
    #[error("Unauthenticated: {message}")]
    Unauthenticated { message: String },

    /// HTTP 403: authenticated but not allowed.
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// HTTP 419: CSRF/session token expired on the backend.
    #[error("Session expired, please refresh and sign in again")]
    SessionExpiredCsrf,

    /// HTTP 422: request rejected with field errors.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        message: String,
        fields: Vec<FieldError>,
    },

    /// HTTP 429: surfaced after one fixed pause.
    #[error("Too many requests, please wait a moment and try again")]
    RateLimited { retry_after: Option<u64> },

    /// The response declared (or carried) something other than JSON.
    #[error("Unexpected content type '{content_type}' (HTTP {status}): {preview}")]
    UnexpectedContentType {
        status: u16,
        content_type: String,
        preview: String,
    },

    /// Any other non-2xx status.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// Connection-level failure.
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The request exceeded the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The body claimed to be JSON but did not parse.
    #[error("Invalid JSON in response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request URL could not be built.
    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err)
        }
    }
}

impl ApiError {
    /// Classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated { .. } => ErrorKind::Unauthenticated,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::SessionExpiredCsrf => ErrorKind::SessionExpiredCsrf,
            Self::ValidationFailed { .. } => ErrorKind::ValidationFailed,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::UnexpectedContentType { .. } => ErrorKind::UnexpectedContentType,
            Self::Http { .. } | Self::Decode(_) => ErrorKind::Generic,
            Self::Network(_) | Self::Timeout | Self::InvalidUrl(_) => ErrorKind::Transport,
        }
    }

    /// Whether the stored token should be dropped and the user sent to sign in.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthenticated { .. })
    }

    /// HTTP status, when the backend answered at all.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthenticated { .. } => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::SessionExpiredCsrf => Some(419),
            Self::ValidationFailed { .. } => Some(422),
            Self::RateLimited { .. } => Some(429),
            Self::UnexpectedContentType { status, .. } | Self::Http { status, .. } => {
                Some(*status)
            }
            Self::Network(_) | Self::Timeout | Self::Decode(_) | Self::InvalidUrl(_) => None,
        }
    }

    /// The most specific message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated { .. } => "Please sign in to continue.".to_string(),
            Self::Forbidden { message }
            | Self::ValidationFailed { message, .. }
            | Self::Http { message, .. } => message.clone(),
            Self::SessionExpiredCsrf => {
                "Your session has expired. Please refresh the page and sign in again.".to_string()
            }
            Self::RateLimited { .. } => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            Self::UnexpectedContentType { .. } | Self::Decode(_) => {
                "The server returned an unexpected response. Please try again later.".to_string()
            }
            Self::Network(_) | Self::InvalidUrl(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            Self::Timeout => "The server took too long to respond. Please try again.".to_string(),
        }
    }
}

/// Map a non-2xx response onto the taxonomy.
///
/// `body` is the parsed JSON body when there was one; the message is taken
/// from it when available, otherwise `HTTP {status}: {reason}` is used.
#[must_use]
pub fn classify(status: StatusCode, body: Option<&Value>, retry_after: Option<u64>) -> ApiError {
    let backend_message = body.and_then(shapes::backend_message);
    let fallback = || {
        format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown Status")
        )
    };

    match status.as_u16() {
        401 => ApiError::Unauthenticated {
            message: backend_message.unwrap_or_else(fallback),
        },
        403 => ApiError::Forbidden {
            message: backend_message.unwrap_or_else(fallback),
        },
        419 => ApiError::SessionExpiredCsrf,
        422 => {
            let fields = body.map(field_errors).unwrap_or_default();
            let message = if fields.is_empty() {
                backend_message.unwrap_or_else(fallback)
            } else {
                fields
                    .iter()
                    .map(|f| f.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            ApiError::ValidationFailed { message, fields }
        }
        429 => ApiError::RateLimited { retry_after },
        code => ApiError::Http {
            status: code,
            message: backend_message.unwrap_or_else(fallback),
        },
    }
}

/// Extract field errors from a 422 body.
///
/// Accepts `{"errors": {"field": ["msg", ...]}}`, `{"errors": {"field": "msg"}}`
/// and `{"errors": ["msg", ...]}`.
fn field_errors(body: &Value) -> Vec<FieldError> {
    let Some(errors) = body.get("errors") else {
        return Vec::new();
    };

    let text = |v: &Value| v.as_str().map(str::trim).filter(|s| !s.is_empty()).map(String::from);

    match errors {
        Value::Object(map) => map
            .iter()
            .flat_map(|(field, messages)| {
                let messages: Vec<String> = match messages {
                    Value::Array(items) => items.iter().filter_map(text).collect(),
                    other => text(other).into_iter().collect(),
                };
                messages.into_iter().map(|message| FieldError {
                    field: field.clone(),
                    message,
                })
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(text)
            .map(|message| FieldError {
                field: String::new(),
                message,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// First `BODY_PREVIEW_CHARS` characters of a body, for error messages.
#[must_use]
pub fn body_preview(body: &str) -> String {
    let trimmed = body.trim();
    let mut preview: String = trimmed.chars().take(BODY_PREVIEW_CHARS).collect();
    if trimmed.chars().count() > BODY_PREVIEW_CHARS {
        preview.push('…');
    }
    preview
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_classify_401_uses_backend_message() {
        let err = classify(
            StatusCode::UNAUTHORIZED,
            Some(&json!({"message": "Unauthenticated."})),
            None,
        );
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
        assert!(err.is_auth_failure());
        assert_eq!(err.to_string(), "Unauthenticated: Unauthenticated.");
    }

    #[test]
    fn test_classify_403_keeps_message() {
        let err = classify(
            StatusCode::FORBIDDEN,
            Some(&json!({"success": false, "message": "Account suspended"})),
            None,
        );
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(!err.is_auth_failure());
        assert_eq!(err.user_message(), "Account suspended");
    }

    #[test]
    fn test_classify_419() {
        let status = StatusCode::from_u16(419).unwrap_or(StatusCode::IM_A_TEAPOT);
        let err = classify(status, None, None);
        assert_eq!(err.kind(), ErrorKind::SessionExpiredCsrf);
        assert_eq!(err.status(), Some(419));
    }

    #[test]
    fn test_classify_422_concatenates_field_errors() {
        let body = json!({
            "success": false,
            "message": "The given data was invalid.",
            "errors": {
                "city": ["The city field is required."],
                "phone": ["The phone field is required.", "The phone format is invalid."]
            }
        });
        let err = classify(StatusCode::UNPROCESSABLE_ENTITY, Some(&body), None);

        let ApiError::ValidationFailed { message, fields } = &err else {
            panic!("expected ValidationFailed, got {err:?}");
        };
        assert_eq!(fields.len(), 3);
        assert_eq!(
            message,
            "The city field is required.; The phone field is required.; The phone format is invalid."
        );
    }

    #[test]
    fn test_classify_422_without_field_map_uses_message() {
        let body = json!({"success": false, "message": "Coupon expired"});
        let err = classify(StatusCode::UNPROCESSABLE_ENTITY, Some(&body), None);
        assert_eq!(err.user_message(), "Coupon expired");
    }

    #[test]
    fn test_classify_422_error_list() {
        let body = json!({"errors": ["Out of stock", ""]});
        let err = classify(StatusCode::UNPROCESSABLE_ENTITY, Some(&body), None);
        assert_eq!(err.user_message(), "Out of stock");
    }

    #[test]
    fn test_classify_429_carries_retry_after() {
        let err = classify(StatusCode::TOO_MANY_REQUESTS, None, Some(7));
        assert!(matches!(err, ApiError::RateLimited { retry_after: Some(7) }));
    }

    #[test]
    fn test_classify_generic_fallback_message() {
        let err = classify(StatusCode::INTERNAL_SERVER_ERROR, Some(&json!({})), None);
        assert_eq!(err.kind(), ErrorKind::Generic);
        assert_eq!(err.to_string(), "HTTP 500: Internal Server Error");
    }

    #[test]
    fn test_classify_generic_prefers_backend_message() {
        let err = classify(
            StatusCode::NOT_FOUND,
            Some(&json!({"error": "Order not found"})),
            None,
        );
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.user_message(), "Order not found");
    }

    #[test]
    fn test_body_preview_truncates() {
        let html = format!("<html>{}</html>", "x".repeat(500));
        let preview = body_preview(&html);
        assert_eq!(preview.chars().count(), BODY_PREVIEW_CHARS + 1);
        assert!(preview.starts_with("<html>"));
        assert_eq!(body_preview("  short  "), "short");
    }
}
