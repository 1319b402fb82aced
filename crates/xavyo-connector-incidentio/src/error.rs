//! Error types for the incident.io connector.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using `IncidentIoError`.
pub type IncidentIoResult<T> = Result<T, IncidentIoError>;

/// Maximum number of characters of a non-JSON error body kept in a message.
pub const RAW_BODY_MESSAGE_LIMIT: usize = 200;

/// Marker appended to a raw error body that was cut at [`RAW_BODY_MESSAGE_LIMIT`].
pub const TRUNCATION_MARKER: &str = "... (truncated)";

/// Field-level detail attached to a validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub message: String,
}

/// Structured error returned by the upstream API for any non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Effective status code. The body's `status` wins over the HTTP status when non-zero.
    pub status: u16,
    /// Upstream error type, e.g. `not_found` or `validation_error`.
    pub error_type: String,
    pub message: String,
    pub request_id: Option<String>,
    pub field_errors: Vec<FieldError>,
}

/// Wire shape of the upstream error envelope.
#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default, rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    errors: Option<Vec<FieldError>>,
}

impl ApiError {
    /// Decodes an error body received with `http_status`.
    ///
    /// A body that is not valid JSON becomes the message, cut to
    /// [`RAW_BODY_MESSAGE_LIMIT`] characters.
    #[must_use]
    pub fn from_response(http_status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<ErrorEnvelope>(body) {
            Ok(envelope) => {
                let status = match envelope.status {
                    Some(s) if s != 0 => s,
                    _ => http_status,
                };
                let message = envelope
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| canonical_reason(status));
                Self {
                    status,
                    error_type: envelope.error_type.unwrap_or_default(),
                    message,
                    request_id: envelope.request_id.filter(|r| !r.is_empty()),
                    field_errors: envelope.errors.unwrap_or_default(),
                }
            }
            Err(_) => {
                let raw = String::from_utf8_lossy(body);
                let message = if raw.trim().is_empty() {
                    canonical_reason(http_status)
                } else {
                    truncate_message(raw.trim())
                };
                Self {
                    status: http_status,
                    error_type: String::new(),
                    message,
                    request_id: None,
                    field_errors: Vec::new(),
                }
            }
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        self.status == 403
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    #[must_use]
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if !self.error_type.is_empty() {
            write!(f, " ({})", self.error_type)?;
        }
        write!(f, ": {}", self.message)?;
        for field in &self.field_errors {
            write!(f, "; {}: {}", field.field, field.message)?;
        }
        if let Some(request_id) = &self.request_id {
            write!(f, " [request_id={request_id}]")?;
        }
        Ok(())
    }
}

fn canonical_reason(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map_or_else(|| format!("HTTP {status}"), str::to_string)
}

fn truncate_message(raw: &str) -> String {
    if raw.chars().count() <= RAW_BODY_MESSAGE_LIMIT {
        return raw.to_string();
    }
    let mut cut: String = raw.chars().take(RAW_BODY_MESSAGE_LIMIT).collect();
    cut.push_str(TRUNCATION_MARKER);
    cut
}

/// Errors that can occur when talking to the incident.io API.
#[derive(Debug, Error)]
pub enum IncidentIoError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request rejected before it was sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 401 from the API.
    #[error("Authentication error: {0}")]
    Authentication(ApiError),

    /// 403 from the API.
    #[error("Forbidden: {0}")]
    Forbidden(ApiError),

    /// 404 from the API.
    #[error("Not found: {0}")]
    NotFound(ApiError),

    /// 400 or 422 from the API.
    #[error("Validation error: {0}")]
    Validation(ApiError),

    /// A single 429 response. Retried by the client; surfaces only through classification.
    #[error("Rate limited: {0}")]
    RateLimited(ApiError),

    /// 5xx from the API.
    #[error("Server error: {0}")]
    Server(ApiError),

    /// Any other non-2xx status.
    #[error("API error: {0}")]
    Api(ApiError),

    /// Connection failure or timeout.
    #[error("Network error: {0}")]
    Network(String),

    /// Malformed or truncated body on a 2xx response.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Response body larger than the configured cap.
    #[error("Response body exceeds {limit} bytes")]
    SizeExceeded { limit: usize },

    /// The API answered with a redirect, which is never followed.
    #[error("Redirect blocked: HTTP {status} to {}", .location.as_deref().unwrap_or("<no location>"))]
    RedirectBlocked {
        status: u16,
        location: Option<String>,
    },

    /// Still rate limited after the final attempt.
    #[error("Rate limit retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: ApiError },

    /// A list endpoint kept returning a cursor past the page cap.
    #[error("Pagination exceeded {max_pages} pages")]
    PaginationExceeded { max_pages: usize },

    /// The caller's cancellation token fired.
    #[error("Operation cancelled")]
    Cancelled,

    /// An error annotated with the operation that produced it.
    #[error("{operation}: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: Box<IncidentIoError>,
    },
}

impl IncidentIoError {
    /// Maps a decoded API error onto the taxonomy by its effective status.
    #[must_use]
    pub fn from_api_error(error: ApiError) -> Self {
        match error.status {
            401 => Self::Authentication(error),
            403 => Self::Forbidden(error),
            404 => Self::NotFound(error),
            400 | 422 => Self::Validation(error),
            429 => Self::RateLimited(error),
            500..=599 => Self::Server(error),
            _ => Self::Api(error),
        }
    }

    /// Wraps the error with an operation name such as `"list schedules"`.
    #[must_use]
    pub fn with_operation(self, operation: &'static str) -> Self {
        Self::Operation {
            operation,
            source: Box::new(self),
        }
    }

    /// Wraps the error with `operation` unless it already carries one.
    #[must_use]
    pub fn or_operation(self, operation: &'static str) -> Self {
        match self {
            Self::Operation { .. } => self,
            other => other.with_operation(operation),
        }
    }

    /// The innermost error, looking through operation annotations.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// The structured API error carried by the root error, if any.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self.root() {
            Self::Authentication(e)
            | Self::Forbidden(e)
            | Self::NotFound(e)
            | Self::Validation(e)
            | Self::RateLimited(e)
            | Self::Server(e)
            | Self::Api(e) => Some(e),
            Self::RetryExhausted { last, .. } => Some(last),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound(_))
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_parsing() {
        let body = br#"{
            "type": "validation_error",
            "status": 422,
            "message": "Invalid request",
            "request_id": "req-123",
            "errors": [{"field": "page_size", "message": "must be positive"}]
        }"#;

        let error = ApiError::from_response(422, body);
        assert_eq!(error.status, 422);
        assert_eq!(error.error_type, "validation_error");
        assert_eq!(error.message, "Invalid request");
        assert_eq!(error.request_id.as_deref(), Some("req-123"));
        assert_eq!(error.field_errors.len(), 1);
        assert_eq!(error.field_errors[0].field, "page_size");
    }

    #[test]
    fn test_body_status_overrides_http_status() {
        let body = br#"{"type": "not_found", "status": 404, "message": "gone"}"#;
        let error = ApiError::from_response(500, body);
        assert_eq!(error.status, 404);
        assert!(matches!(
            IncidentIoError::from_api_error(error),
            IncidentIoError::NotFound(_)
        ));
    }

    #[test]
    fn test_zero_or_missing_body_status_keeps_http_status() {
        let zero = ApiError::from_response(503, br#"{"status": 0, "message": "down"}"#);
        assert_eq!(zero.status, 503);

        let missing = ApiError::from_response(502, br#"{"message": "bad gateway"}"#);
        assert_eq!(missing.status, 502);
    }

    #[test]
    fn test_non_json_body_becomes_message() {
        let error = ApiError::from_response(500, b"Internal Server Error - not JSON");
        assert_eq!(error.status, 500);
        assert_eq!(error.message, "Internal Server Error - not JSON");
        assert!(error.error_type.is_empty());
    }

    #[test]
    fn test_long_non_json_body_is_truncated() {
        let body = "x".repeat(500);
        let error = ApiError::from_response(502, body.as_bytes());
        assert!(error.message.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            error.message.chars().count(),
            RAW_BODY_MESSAGE_LIMIT + TRUNCATION_MARKER.chars().count()
        );
    }

    #[test]
    fn test_body_at_limit_is_not_truncated() {
        let body = "é".repeat(RAW_BODY_MESSAGE_LIMIT);
        let error = ApiError::from_response(500, body.as_bytes());
        assert_eq!(error.message, body);
    }

    #[test]
    fn test_empty_body_uses_canonical_reason() {
        let error = ApiError::from_response(503, b"");
        assert_eq!(error.message, "Service Unavailable");
    }

    #[test]
    fn test_helper_predicates() {
        let not_found = ApiError::from_response(404, br#"{"message": "Not found"}"#);
        assert!(not_found.is_not_found());
        assert!(!not_found.is_unauthorized());

        let unauthorized = ApiError::from_response(401, br#"{"message": "Unauthorized"}"#);
        assert!(unauthorized.is_unauthorized());

        let limited = ApiError::from_response(429, br#"{"message": "Too many requests"}"#);
        assert!(limited.is_rate_limited());

        let server = ApiError::from_response(502, b"");
        assert!(server.is_server_error());
    }

    #[test]
    fn test_status_classification() {
        let classify = |status: u16| {
            IncidentIoError::from_api_error(ApiError::from_response(status, b"{}"))
        };
        assert!(matches!(classify(401), IncidentIoError::Authentication(_)));
        assert!(matches!(classify(403), IncidentIoError::Forbidden(_)));
        assert!(matches!(classify(404), IncidentIoError::NotFound(_)));
        assert!(matches!(classify(400), IncidentIoError::Validation(_)));
        assert!(matches!(classify(422), IncidentIoError::Validation(_)));
        assert!(matches!(classify(429), IncidentIoError::RateLimited(_)));
        assert!(matches!(classify(500), IncidentIoError::Server(_)));
        assert!(matches!(classify(418), IncidentIoError::Api(_)));
    }

    #[test]
    fn test_operation_wrapping() {
        let error = IncidentIoError::from_api_error(ApiError::from_response(
            404,
            br#"{"type": "not_found", "status": 404, "message": "Schedule missing"}"#,
        ))
        .with_operation("get schedule");

        let text = error.to_string();
        assert!(text.starts_with("get schedule: Not found: HTTP 404"), "{text}");
        assert!(error.is_not_found());
        assert_eq!(error.api_error().map(|e| e.status), Some(404));
    }

    #[test]
    fn test_or_operation_keeps_innermost_name() {
        let error = IncidentIoError::Network("reset".into())
            .with_operation("list schedules")
            .or_operation("sync");
        assert!(error.to_string().starts_with("list schedules: "));

        let bare = IncidentIoError::PaginationExceeded { max_pages: 100 }.or_operation("list users");
        assert_eq!(bare.to_string(), "list users: Pagination exceeded 100 pages");
    }

    #[test]
    fn test_redirect_display() {
        let error = IncidentIoError::RedirectBlocked {
            status: 301,
            location: Some("https://elsewhere.example/v2/schedules".into()),
        };
        assert_eq!(
            error.to_string(),
            "Redirect blocked: HTTP 301 to https://elsewhere.example/v2/schedules"
        );
    }
}
