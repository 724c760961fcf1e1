//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context.

use crate::validation::ValidationErrors;
use std::fmt;
use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the GitLab MCP server.
#[derive(Error, Debug)]
pub enum Error {
    /// Fatal startup errors (missing token, bad base URL, broken registry).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A tool call arrived without an arguments object.
    #[error("Arguments are required")]
    MissingArguments,

    /// No handler is registered under this name.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Aggregated argument validation failure.
    #[error("{0}")]
    Validation(ValidationErrors),

    /// Resource the handler looked for does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Target already exists (e.g. fork into a namespace holding the project).
    #[error("{0}")]
    Conflict(String),

    /// GitLab answered with a non-success status.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The HTTP call itself failed (DNS, connect, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// GitLab answered 2xx but the body did not match the expected model.
    #[error("unexpected response from GitLab: {0}")]
    InvalidResponse(String),

    /// Internal errors.
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification of a non-success GitLab response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    NotFound,
    RateLimited,
    InvalidRequest,
    Generic,
}

impl BackendErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendErrorKind::NotFound => "NOT_FOUND",
            BackendErrorKind::RateLimited => "RATE_LIMITED",
            BackendErrorKind::InvalidRequest => "INVALID_REQUEST",
            BackendErrorKind::Generic => "BACKEND_ERROR",
        }
    }
}

/// Phrase GitLab puts in 403 bodies when the per-user API quota is spent.
pub const RATE_LIMIT_PHRASE: &str = "User API Key Rate limit exceeded";

/// Non-success GitLab response, classified once at the client boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl BackendError {
    /// Classify a response by status code and body.
    pub fn classify(status: u16, status_text: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        let kind = match status {
            403 if body.contains(RATE_LIMIT_PHRASE) => BackendErrorKind::RateLimited,
            429 => BackendErrorKind::RateLimited,
            400 => BackendErrorKind::InvalidRequest,
            404 => BackendErrorKind::NotFound,
            _ => BackendErrorKind::Generic,
        };
        Self {
            kind,
            status,
            status_text: status_text.into(),
            body,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == BackendErrorKind::NotFound
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            BackendErrorKind::RateLimited => write!(
                f,
                "GitLab API Rate Limit Exceeded, please try again later: {}",
                self.body
            ),
            BackendErrorKind::InvalidRequest => write!(f, "Invalid request: {}", self.body),
            BackendErrorKind::NotFound | BackendErrorKind::Generic => write!(
                f,
                "GitLab API error: {} {}\n{}",
                self.status, self.status_text, self.body
            ),
        }
    }
}

impl std::error::Error for BackendError {}

impl Error {
    /// Stable machine-readable kind, surfaced in MCP error data.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "CONFIGURATION",
            Error::MissingArguments => "MISSING_ARGUMENTS",
            Error::UnknownTool(_) => "UNKNOWN_TOOL",
            Error::Validation(_) => "VALIDATION",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Conflict(_) => "CONFLICT",
            Error::Backend(e) => e.kind.as_str(),
            Error::Transport(_) => "TRANSPORT",
            Error::InvalidResponse(_) => "INVALID_RESPONSE",
            Error::Internal(_) => "INTERNAL",
            Error::Serialization(_) => "SERIALIZATION",
            Error::Io(_) => "IO",
        }
    }

    /// JSON-RPC error code for the MCP layer.
    pub fn rpc_code(&self) -> i64 {
        match self {
            Error::MissingArguments | Error::UnknownTool(_) | Error::Validation(_) => -32602,
            _ => -32603,
        }
    }

    /// True for both the domain not-found and a tagged backend 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Backend(e) => e.is_not_found(),
            _ => false,
        }
    }
}

// Convenience constructors
impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn validation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation(ValidationErrors::single(path, reason))
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_needs_phrase() {
        let limited = BackendError::classify(403, "Forbidden", "User API Key Rate limit exceeded");
        assert_eq!(limited.kind, BackendErrorKind::RateLimited);
        assert!(limited.to_string().contains("try again later"));

        let forbidden = BackendError::classify(403, "Forbidden", "{\"message\":\"403 Forbidden\"}");
        assert_eq!(forbidden.kind, BackendErrorKind::Generic);
    }

    #[test]
    fn test_classify_status_codes() {
        assert_eq!(BackendError::classify(400, "Bad Request", "").kind, BackendErrorKind::InvalidRequest);
        assert_eq!(BackendError::classify(404, "Not Found", "").kind, BackendErrorKind::NotFound);
        assert_eq!(BackendError::classify(429, "Too Many Requests", "").kind, BackendErrorKind::RateLimited);
        assert_eq!(BackendError::classify(500, "Internal Server Error", "").kind, BackendErrorKind::Generic);
    }

    #[test]
    fn test_invalid_request_keeps_body_verbatim() {
        let err = Error::from(BackendError::classify(400, "Bad Request", "{\"message\":{\"title\":[\"is too long\"]}}"));
        assert_eq!(err.to_string(), "Invalid request: {\"message\":{\"title\":[\"is too long\"]}}");
        assert_eq!(err.kind(), "INVALID_REQUEST");
    }

    #[test]
    fn test_generic_message_has_status_and_body() {
        let err = Error::from(BackendError::classify(502, "Bad Gateway", "upstream down"));
        assert_eq!(err.to_string(), "GitLab API error: 502 Bad Gateway\nupstream down");
    }

    #[test]
    fn test_rpc_codes() {
        assert_eq!(Error::MissingArguments.rpc_code(), -32602);
        assert_eq!(Error::UnknownTool("x".into()).rpc_code(), -32602);
        assert_eq!(Error::Transport("boom".into()).rpc_code(), -32603);
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::not_found("File not found: a.txt").is_not_found());
        assert!(Error::from(BackendError::classify(404, "Not Found", "")).is_not_found());
        assert!(!Error::internal("x").is_not_found());
    }
}
