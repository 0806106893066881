//! Error normalization
//!
//! Transport failures never leave a resource accessor as-is. They are turned
//! into a [`NormalizedError`] by [`normalize`], which picks a display message
//! and keeps the original [`TransportError`] around for diagnostics.

use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// Error body returned by the management API on non-2xx responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RemoteErrorPayload {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: String,
}

impl RemoteErrorPayload {
    /// Parse an error body, returning `None` unless it carries a message or details
    pub fn parse(body: &str) -> Option<Self> {
        let payload: Self = serde_json::from_str(body).ok()?;
        if payload.message.is_empty() && payload.details.is_empty() {
            return None;
        }
        Some(payload)
    }

    /// Most specific text in the payload
    pub fn summary(&self) -> &str {
        if self.details.is_empty() {
            &self.message
        } else {
            &self.details
        }
    }
}

/// Failure raised by the HTTP transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid request URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to send request to {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("API request failed: {status}")]
    Status {
        url: String,
        status: StatusCode,
        payload: Option<RemoteErrorPayload>,
    },

    #[error("failed to parse response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TransportError {
    /// HTTP status of the response, when one was received
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Structured error body sent by the remote side
    pub fn payload(&self) -> Option<&RemoteErrorPayload> {
        match self {
            Self::Status { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }
}

/// The only error type handed to the query layer and to callers
///
/// Instances are created exclusively by [`normalize`].
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct NormalizedError {
    message: String,
    details: Option<String>,
    #[source]
    cause: Arc<TransportError>,
}

impl NormalizedError {
    /// Message meant for display
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Text from the remote error payload, if there was one
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// The transport failure this error was built from
    pub fn cause(&self) -> &TransportError {
        &self.cause
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.cause.status()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Short user-facing hint derived from the HTTP status
    pub fn hint(&self) -> Option<&'static str> {
        let status = self.status()?;
        let hint = match status.as_u16() {
            400 => "Invalid request. Check your parameters.",
            401 => "Authentication failed. Check your API key.",
            403 => "Permission denied. Check your access rights on this environment.",
            404 => "Resource not found.",
            409 => "Resource conflict. The resource may already exist or be in use.",
            429 => "Rate limit exceeded. Please try again later.",
            500..=599 => "The server is temporarily unavailable. Please try again.",
            _ => return None,
        };
        Some(hint)
    }
}

/// Convert a transport failure into a [`NormalizedError`]
///
/// The message is the context when one is supplied, otherwise the remote
/// payload text, otherwise the cause's own message.
pub fn normalize(cause: TransportError, context: Option<&str>) -> NormalizedError {
    let details = cause
        .payload()
        .map(|payload| payload.summary().to_string())
        .filter(|summary| !summary.is_empty());

    let message = match (context.filter(|c| !c.is_empty()), &details) {
        (Some(context), _) => context.to_string(),
        (None, Some(details)) => details.clone(),
        (None, None) => cause.to_string(),
    };

    NormalizedError {
        message,
        details,
        cause: Arc::new(cause),
    }
}

/// Normalization helpers for transport results
pub trait ResultExt<T> {
    /// Normalize the error with a lazily built context message
    fn with_context<F>(self, context: F) -> Result<T, NormalizedError>
    where
        F: FnOnce() -> String;

    /// Normalize the error without context
    fn normalized(self) -> Result<T, NormalizedError>;
}

impl<T> ResultExt<T> for Result<T, TransportError> {
    fn with_context<F>(self, context: F) -> Result<T, NormalizedError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|cause| normalize(cause, Some(&context())))
    }

    fn normalized(self) -> Result<T, NormalizedError> {
        self.map_err(|cause| normalize(cause, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    fn status_error(status: u16, body: &str) -> TransportError {
        TransportError::Status {
            url: "http://localhost/api/stacks".to_string(),
            status: StatusCode::from_u16(status).unwrap(),
            payload: RemoteErrorPayload::parse(body),
        }
    }

    #[test]
    fn test_context_wins_over_payload() {
        let err = normalize(
            status_error(500, r#"{"message":"boom","details":"disk full"}"#),
            Some("Unable to retrieve stacks"),
        );
        assert_eq!(err.message(), "Unable to retrieve stacks");
        assert_eq!(err.details(), Some("disk full"));
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_payload_used_without_context() {
        let err = normalize(status_error(404, r#"{"message":"Stack not found"}"#), None);
        assert_eq!(err.message(), "Stack not found");
        assert_eq!(err.hint(), Some("Resource not found."));
    }

    #[test]
    fn test_falls_back_to_cause_message() {
        let err = normalize(status_error(502, "<html>bad gateway</html>"), None);
        assert_eq!(err.message(), "API request failed: 502 Bad Gateway");
        assert!(err.details().is_none());
    }

    #[test]
    fn test_empty_context_is_ignored() {
        let err = normalize(TransportError::InvalidRequest("missing name".into()), Some(""));
        assert_eq!(err.message(), "invalid request: missing name");
    }

    #[test]
    fn test_cause_stays_inspectable() {
        let err = normalize(status_error(401, "{}"), Some("Unable to retrieve environments"));
        assert!(err.is_unauthorized());
        let source = err.source().expect("normalized errors keep their cause");
        assert_eq!(source.to_string(), "API request failed: 401 Unauthorized");
    }

    #[test]
    fn test_with_context_is_lazy_on_success() {
        let ok: Result<u32, TransportError> = Ok(3);
        let value = ok
            .with_context(|| panic!("context must not be built on success"))
            .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn test_payload_parse_rejects_empty_objects() {
        assert!(RemoteErrorPayload::parse("{}").is_none());
        assert!(RemoteErrorPayload::parse("not json").is_none());
        let payload = RemoteErrorPayload::parse(r#"{"message":"m"}"#).unwrap();
        assert_eq!(payload.summary(), "m");
    }
}
