//! Error Handling Module
//!
//! A single [`OmniError`] type covers caller mistakes (validation, constraint
//! violations, unsupported parameters), registry lookups, stream lifecycle
//! misuse and provider failures mapped from HTTP status codes.
//!
//! Nothing in this crate retries. [`OmniError::is_retryable`] and
//! [`OmniError::category`] only classify so that an outer policy layer can decide.
//!
//! # Example
//!
//! ```rust
//! use omnigen::error::{ApiErrorKind, ErrorCategory, OmniError};
//! use omnigen::types::Provider;
//! use reqwest::header::HeaderMap;
//!
//! let err = omnigen::error::classify_http_error(
//!     Provider::OpenAI,
//!     429,
//!     r#"{"error":{"message":"You exceeded your current quota"}}"#,
//!     &HeaderMap::new(),
//! );
//! assert!(matches!(err, OmniError::Api { kind: ApiErrorKind::QuotaExceeded, .. }));
//! assert_eq!(err.category(), ErrorCategory::Quota);
//! ```

use crate::types::{Capability, Provider};
use reqwest::header::HeaderMap;
use serde_json::Value;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, OmniError>;

/// Kind of a status-mapped provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    InvalidRequest,
    Authentication,
    /// Access denied, usually a region or plan restriction.
    Forbidden,
    NotFound,
    RateLimit,
    QuotaExceeded,
    Server,
    Overloaded,
    Other,
}

impl ApiErrorKind {
    fn label(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid request",
            Self::Authentication => "authentication failed",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::RateLimit => "rate limit exceeded",
            Self::QuotaExceeded => "quota exceeded",
            Self::Server => "server error",
            Self::Overloaded => "overloaded",
            Self::Other => "api error",
        }
    }
}

/// Coarse classification used by callers to pick a retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller supplied something invalid; never worth retrying.
    Caller,
    Authentication,
    RateLimit,
    Quota,
    Server,
    Network,
    Stream,
    Parse,
    Unknown,
}

#[derive(Debug, Error)]
pub enum OmniError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    ConstraintViolation(String),

    #[error("Parameter '{parameter}' is not supported by model '{model_id}'")]
    UnsupportedParameter { parameter: String, model_id: String },

    #[error("Model '{model_id}' not found for provider {provider}")]
    ModelNotFound { model_id: String, provider: String },

    #[error("Model '{model_id}' does not support capability '{capability}'")]
    UnsupportedCapability {
        model_id: String,
        capability: Capability,
    },

    #[error("No client registered for {capability} with provider {provider}")]
    ClientNotFound {
        capability: Capability,
        provider: Provider,
    },

    #[error("Streaming not supported for model '{model_id}'")]
    StreamingNotSupported { model_id: String },

    #[error("Stream not exhausted. Consume all chunks before accessing .output")]
    StreamNotExhausted,

    #[error("Stream completed but no chunks were produced")]
    StreamEmpty,

    #[error("Stream error: {0}")]
    Stream(String),

    #[error(
        "Provider {provider} has no credentials configured. Set the appropriate environment variable or pass api_key parameter."
    )]
    MissingCredentials { provider: Provider },

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("{provider} {label} (HTTP {status}): {message}{trace}", label = .kind.label(), trace = trace_suffix(.trace_id))]
    Api {
        provider: Provider,
        kind: ApiErrorKind,
        status: u16,
        message: String,
        trace_id: Option<String>,
    },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Response parse error: {0}")]
    ResponseParse(String),

    #[error("{0}")]
    TaskFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

fn trace_suffix(trace_id: &Option<String>) -> String {
    trace_id
        .as_ref()
        .map(|id| format!(" (trace_id: {id})"))
        .unwrap_or_default()
}

impl OmniError {
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::ConstraintViolation(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::ResponseParse(message.into())
    }

    /// Provider-reported HTTP status, if this error came from one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn trace_id(&self) -> Option<&str> {
        match self {
            Self::Api { trace_id, .. } => trace_id.as_deref(),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_)
            | Self::ConstraintViolation(_)
            | Self::UnsupportedParameter { .. }
            | Self::ModelNotFound { .. }
            | Self::UnsupportedCapability { .. }
            | Self::ClientNotFound { .. }
            | Self::StreamingNotSupported { .. }
            | Self::StreamNotExhausted
            | Self::UnsupportedProvider(_)
            | Self::Configuration(_) => ErrorCategory::Caller,
            Self::MissingCredentials { .. } => ErrorCategory::Authentication,
            Self::Api { kind, .. } => match kind {
                ApiErrorKind::InvalidRequest | ApiErrorKind::NotFound => ErrorCategory::Caller,
                ApiErrorKind::Authentication | ApiErrorKind::Forbidden => {
                    ErrorCategory::Authentication
                }
                ApiErrorKind::RateLimit => ErrorCategory::RateLimit,
                ApiErrorKind::QuotaExceeded => ErrorCategory::Quota,
                ApiErrorKind::Server | ApiErrorKind::Overloaded => ErrorCategory::Server,
                ApiErrorKind::Other => ErrorCategory::Unknown,
            },
            Self::Http(_) | Self::Timeout(_) | Self::WebSocket(_) => ErrorCategory::Network,
            Self::StreamEmpty | Self::Stream(_) => ErrorCategory::Stream,
            Self::ResponseParse(_) | Self::Serialization(_) => ErrorCategory::Parse,
            Self::TaskFailed(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether an outer policy layer could reasonably retry this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit | ErrorCategory::Server | ErrorCategory::Network
        )
    }
}

impl From<reqwest::Error> for OmniError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for OmniError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "websocket")]
impl From<tokio_tungstenite::tungstenite::Error> for OmniError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

const TRACE_HEADERS: [&str; 5] = [
    "x-request-id",
    "request-id",
    "x-trace-id",
    "x-goog-request-id",
    "x-openai-request-id",
];

fn header_val(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Pull a human-readable message out of a provider error body.
fn extract_message(body: &Value) -> Option<String> {
    let candidates = [
        body.pointer("/error/message"),
        body.get("error").filter(|v| v.is_string()),
        body.get("message"),
        body.get("detail").filter(|v| v.is_string()),
        body.pointer("/detail/message"),
        body.pointer("/base_resp/status_msg"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().map(str::to_string))
}

/// Map an unsuccessful HTTP response to an [`OmniError::Api`].
///
/// Rate limit and quota exhaustion share status 429 on most providers; the
/// message decides which one it is.
pub fn classify_http_error(
    provider: Provider,
    status: u16,
    body_text: &str,
    headers: &HeaderMap,
) -> OmniError {
    let parsed: Option<Value> = serde_json::from_str(body_text).ok();

    let message = parsed
        .as_ref()
        .and_then(extract_message)
        .unwrap_or_else(|| {
            let sample = body_text.trim().chars().take(200).collect::<String>();
            if sample.is_empty() {
                format!("HTTP {status}")
            } else {
                sample
            }
        });

    let trace_id = parsed
        .as_ref()
        .and_then(|v| v.get("trace_id").and_then(Value::as_str).map(str::to_string))
        .or_else(|| TRACE_HEADERS.iter().find_map(|k| header_val(headers, k)));

    let lower = message.to_lowercase();
    let quota_hint = ["quota", "credits", "billing", "insufficient balance"]
        .iter()
        .any(|k| lower.contains(k));

    let kind = match status {
        400 | 413 | 415 | 422 => ApiErrorKind::InvalidRequest,
        401 => ApiErrorKind::Authentication,
        402 => ApiErrorKind::QuotaExceeded,
        403 if quota_hint => ApiErrorKind::QuotaExceeded,
        403 => ApiErrorKind::Forbidden,
        404 => ApiErrorKind::NotFound,
        429 if quota_hint => ApiErrorKind::QuotaExceeded,
        429 => ApiErrorKind::RateLimit,
        503 | 529 => ApiErrorKind::Overloaded,
        500..=599 => ApiErrorKind::Server,
        _ => ApiErrorKind::Other,
    };

    OmniError::Api {
        provider,
        kind,
        status,
        message,
        trace_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn rate_limit_and_quota_are_distinguished_by_message() {
        let headers = HeaderMap::new();
        let rate = classify_http_error(
            Provider::Mureka,
            429,
            r#"{"error":{"message":"Too many requests"}}"#,
            &headers,
        );
        let quota = classify_http_error(
            Provider::Mureka,
            429,
            r#"{"error":{"message":"Not enough credits"}}"#,
            &headers,
        );
        assert!(matches!(
            rate,
            OmniError::Api {
                kind: ApiErrorKind::RateLimit,
                ..
            }
        ));
        assert!(rate.is_retryable());
        assert!(matches!(
            quota,
            OmniError::Api {
                kind: ApiErrorKind::QuotaExceeded,
                ..
            }
        ));
        assert!(!quota.is_retryable());
    }

    #[test]
    fn trace_id_comes_from_body_or_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("req_123"));
        let err = classify_http_error(Provider::OpenAI, 500, "boom", &headers);
        assert_eq!(err.trace_id(), Some("req_123"));
        assert_eq!(err.status_code(), Some(500));
        assert!(err.to_string().ends_with("(trace_id: req_123)"));

        let err = classify_http_error(
            Provider::Mureka,
            403,
            r#"{"message":"Region not supported","trace_id":"t-9"}"#,
            &HeaderMap::new(),
        );
        assert_eq!(err.trace_id(), Some("t-9"));
        assert!(matches!(
            err,
            OmniError::Api {
                kind: ApiErrorKind::Forbidden,
                ..
            }
        ));
    }

    #[test]
    fn overloaded_and_server_errors() {
        let headers = HeaderMap::new();
        let err = classify_http_error(Provider::Anthropic, 503, "", &headers);
        assert!(matches!(
            err,
            OmniError::Api {
                kind: ApiErrorKind::Overloaded,
                ..
            }
        ));
        assert!(err.to_string().contains("HTTP 503"));
        let err = classify_http_error(Provider::Anthropic, 502, "<html>bad gateway</html>", &headers);
        assert_eq!(err.category(), ErrorCategory::Server);
    }

    #[test]
    fn caller_errors_are_not_retryable() {
        let err = OmniError::constraint("Must be between 0 and 2, got 3");
        assert_eq!(err.category(), ErrorCategory::Caller);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Must be between 0 and 2, got 3");
    }
}
