//! Error classification (C1).
//!
//! Every fallible operation in this crate eventually produces a [`ClassifiedError`]:
//! a closed, tagged [`ErrorKind`] plus a human message and an optional cause. The
//! classifier ([`classify`]) never panics and is referentially transparent for the
//! same [`ClassifiableFailure`] shape — it is the single place that decides whether
//! a failure is worth retrying.

use std::fmt;
use std::time::Duration;

/// Closed set of error classifications.
///
/// Default retryability: `RateLimited | Timeout | Network | ServiceUnavailable | Internal`
/// are retryable; everything else is not. Individual [`ClassifiedError`] instances
/// may still override this via explicit construction (an adapter that knows better).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimited,
    Timeout,
    Network,
    ServiceUnavailable,
    Auth,
    InvalidInput,
    NotFound,
    QuotaExceeded,
    Parse,
    Internal,
    Unknown,
}

impl ErrorKind {
    /// Default retryability for this kind, absent any adapter override.
    pub fn default_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited
                | ErrorKind::Timeout
                | ErrorKind::Network
                | ErrorKind::ServiceUnavailable
                | ErrorKind::Internal
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Network => "network",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::Auth => "auth",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::Parse => "parse",
            ErrorKind::Internal => "internal",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A classified failure carrying everything downstream code needs: what kind it
/// is, whether it's worth another attempt, and enough context for a user-facing
/// message.
#[derive(Debug, Clone, thiserror::Error, serde::Serialize, serde::Deserialize)]
#[error("{kind}: {message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub http_status: Option<u16>,
    pub cause: Option<String>,
    pub retryable: bool,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let retryable = kind.default_retryable();
        Self {
            kind,
            message: message.into(),
            http_status: None,
            cause: None,
            retryable,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Hint shown to the end user for a retryable failure.
    pub fn retry_hint(&self) -> Option<&'static str> {
        self.retryable.then_some("this error may be temporary")
    }

    /// The environment variable that would resolve an auth/quota failure, if known.
    pub fn missing_key_hint(&self, capability: &str) -> Option<String> {
        matches!(self.kind, ErrorKind::Auth | ErrorKind::QuotaExceeded)
            .then(|| format!("check the API key configured for the \"{capability}\" capability"))
    }
}

/// Shape of a failure as it reaches the classifier. Rust has no single
/// "whatever was thrown" value, so the possible failure surfaces named in the
/// distilled spec (null, abort token, OS socket code, HTTP status, raw string)
/// are represented as variants of one enum instead of dynamic dispatch.
#[derive(Debug, Clone)]
pub enum ClassifiableFailure<'a> {
    /// The call was cancelled (deadline elapsed or shutdown in progress).
    Cancelled,
    /// A `reqwest` transport-level error (connect refused, DNS failure, timeout, etc).
    Transport(&'a reqwest::Error),
    /// An HTTP response was received with a non-2xx status and an optional body.
    HttpStatus { status: u16, body: Option<&'a str> },
    /// A raw message with no other structure (JSON decode failure, provider-specific text).
    Message(&'a str),
}

/// Classify a failure into a single [`ClassifiedError`]. Never panics.
pub fn classify(failure: ClassifiableFailure<'_>) -> ClassifiedError {
    match failure {
        ClassifiableFailure::Cancelled => {
            ClassifiedError::new(ErrorKind::Timeout, "operation cancelled")
        }
        ClassifiableFailure::Transport(err) => classify_transport(err),
        ClassifiableFailure::HttpStatus { status, body } => classify_status(status, body),
        ClassifiableFailure::Message(msg) => classify_message(msg),
    }
}

fn classify_transport(err: &reqwest::Error) -> ClassifiedError {
    if err.is_timeout() {
        return ClassifiedError::new(ErrorKind::Timeout, "request timed out")
            .with_cause(err.to_string());
    }
    if err.is_connect() {
        return ClassifiedError::new(ErrorKind::Network, "connection failed")
            .with_cause(err.to_string());
    }
    if let Some(status) = err.status() {
        return classify_status(status.as_u16(), None).with_cause(err.to_string());
    }
    classify_message(&err.to_string())
}

fn classify_status(status: u16, body: Option<&str>) -> ClassifiedError {
    let (kind, retryable) = match status {
        400 => (ErrorKind::InvalidInput, false),
        401 => (ErrorKind::Auth, false),
        403 => (ErrorKind::QuotaExceeded, false),
        404 => (ErrorKind::NotFound, false),
        408 => (ErrorKind::Timeout, true),
        429 => (ErrorKind::RateLimited, true),
        500 => (ErrorKind::Internal, true),
        502 | 503 => (ErrorKind::ServiceUnavailable, true),
        504 => (ErrorKind::Timeout, true),
        510 => (ErrorKind::ServiceUnavailable, true),
        s if s >= 500 => (ErrorKind::ServiceUnavailable, true),
        _ => (ErrorKind::Unknown, false),
    };
    let message = match body {
        Some(b) if !b.is_empty() => format!("HTTP {status}: {}", truncate(b, 300)),
        _ => format!("HTTP {status}"),
    };
    ClassifiedError::new(kind, message)
        .with_status(status)
        .retryable(retryable)
}

fn classify_message(msg: &str) -> ClassifiedError {
    let lower = msg.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        return ClassifiedError::new(ErrorKind::Timeout, truncate(msg, 300));
    }
    if lower.contains("econnrefused") || lower.contains("enotfound") || lower.contains("econnreset")
    {
        return ClassifiedError::new(ErrorKind::Network, truncate(msg, 300));
    }
    if lower.contains("api_key") || lower.contains("api key") || lower.contains("invalid api") {
        return ClassifiedError::new(ErrorKind::Auth, truncate(msg, 300));
    }
    if lower.contains("json") || lower.contains("parse") || lower.contains("unexpected token") {
        return ClassifiedError::new(ErrorKind::Parse, truncate(msg, 300));
    }
    ClassifiedError::new(ErrorKind::Unknown, truncate(msg, 300))
}

/// Truncate `s` to at most `max` bytes, snapping to the nearest char
/// boundary so a multibyte character straddling `max` is never sliced
/// mid-codepoint (which would panic — the classifier must never raise).
fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let end = s
            .char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .take_while(|&end| end <= max)
            .last()
            .unwrap_or(0);
        format!("{}...", &s[..end])
    }
}

/// Sleep duration for retry attempt `i` (0-indexed), per [`crate::retry::RetryPolicy`].
/// Exposed here because classification and backoff share the same "never exceed
/// max_delay" clamp described in the data model.
pub fn clamp_delay(delay: Duration, max_delay: Duration) -> Duration {
    delay.min(max_delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_dispatch_table_matches_spec() {
        assert_eq!(classify_status(400, None).kind, ErrorKind::InvalidInput);
        assert_eq!(classify_status(401, None).kind, ErrorKind::Auth);
        assert_eq!(classify_status(403, None).kind, ErrorKind::QuotaExceeded);
        assert_eq!(classify_status(404, None).kind, ErrorKind::NotFound);
        assert_eq!(classify_status(408, None).kind, ErrorKind::Timeout);
        assert_eq!(classify_status(429, None).kind, ErrorKind::RateLimited);
        assert_eq!(classify_status(500, None).kind, ErrorKind::Internal);
        assert_eq!(classify_status(502, None).kind, ErrorKind::ServiceUnavailable);
        assert_eq!(classify_status(503, None).kind, ErrorKind::ServiceUnavailable);
        assert_eq!(classify_status(504, None).kind, ErrorKind::Timeout);
        assert_eq!(classify_status(510, None).kind, ErrorKind::ServiceUnavailable);
        assert_eq!(classify_status(599, None).kind, ErrorKind::ServiceUnavailable);
        assert_eq!(classify_status(418, None).kind, ErrorKind::Unknown);
    }

    #[test]
    fn retryability_follows_default_table() {
        assert!(classify_status(429, None).retryable);
        assert!(classify_status(500, None).retryable);
        assert!(!classify_status(400, None).retryable);
        assert!(!classify_status(401, None).retryable);
        assert!(!classify_status(403, None).retryable);
        assert!(!classify_status(404, None).retryable);
    }

    #[test]
    fn message_heuristics_detect_auth_and_parse() {
        assert_eq!(classify_message("Invalid API key provided").kind, ErrorKind::Auth);
        assert_eq!(classify_message("Unexpected token < in JSON").kind, ErrorKind::Parse);
        assert_eq!(classify_message("request timed out after 30s").kind, ErrorKind::Timeout);
        assert_eq!(classify_message("totally unrelated failure").kind, ErrorKind::Unknown);
    }

    #[test]
    fn cancelled_is_timeout_and_retryable() {
        let c = classify(ClassifiableFailure::Cancelled);
        assert_eq!(c.kind, ErrorKind::Timeout);
        assert!(c.retryable);
    }

    #[test]
    fn classification_is_total_and_never_panics() {
        let long = "a very very long message ".repeat(50);
        let inputs = ["", long.as_str(), "JSON"];
        for msg in inputs {
            let _ = classify(ClassifiableFailure::Message(msg));
        }
    }

    #[test]
    fn multibyte_message_straddling_truncation_boundary_does_not_panic() {
        // Each "é" is 2 bytes; 299 of them (598 bytes) plus a trailing ASCII
        // char lands the 300-byte cut mid-codepoint unless truncation snaps
        // to a char boundary.
        let long = format!("{}x", "é".repeat(299));
        let c = classify_message(&long);
        assert!(c.message.is_char_boundary(c.message.len()));
    }

    #[test]
    fn long_message_is_truncated_safely() {
        let long = "x".repeat(1000);
        let c = classify_message(&long);
        assert!(c.message.len() < 400);
    }

    #[test]
    fn retry_hint_present_only_when_retryable() {
        let retryable = classify_status(429, None);
        assert!(retryable.retry_hint().is_some());
        let permanent = classify_status(401, None);
        assert!(permanent.retry_hint().is_none());
    }
}
