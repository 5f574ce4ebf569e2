//! Error types for CampusChat
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling. Transport and API errors
//! are separate enums because the chat session matches on their variants to
//! decide whether a failure is transient.

use thiserror::Error;

/// Classified transport-level failure.
///
/// Produced by the HTTP transport stack. The variants carry the failure
/// class the chat session needs for its retry decisions: timeouts, DNS
/// failures, and connection drops are transient; anything else is surfaced
/// without an automatic retry.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request did not complete within the configured deadline
    #[error("request timed out")]
    Timeout,

    /// Host name resolution failed
    #[error("failed to resolve host: {0}")]
    Dns(String),

    /// The connection could not be established (refused, reset, no route)
    #[error("connection failed: {0}")]
    Connect(String),

    /// The connection was established but reading or writing failed
    #[error("i/o failure during request: {0}")]
    Io(String),

    /// Any other transport-level failure (malformed request, TLS setup, ...)
    #[error("transport failure: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether the session layer treats this failure class as transient.
    ///
    /// Transient failures are retried by the session with user-visible
    /// progress messages; non-transient ones are reported once.
    pub fn is_transient(&self) -> bool {
        !matches!(self, TransportError::Other(_))
    }
}

/// Error from one logical exchange against the conversational endpoint
#[derive(Error, Debug)]
pub enum ApiError {
    /// The transport gave up after exhausting its own retry budget
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The endpoint answered with a non-success HTTP status
    #[error("server returned error ({status}): {body}")]
    Status {
        /// HTTP status code of the final response
        status: u16,
        /// Response body text, surfaced verbatim to the user
        body: String,
    },

    /// The chat payload failed to encode, or the response body did not
    /// decode as a chat response
    #[error("invalid chat message payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Main error type for CampusChat operations
///
/// This enum encompasses the errors that can occur during configuration
/// loading, transport construction, and CLI command execution. Failures
/// inside a running chat session never escape as errors; they terminate in
/// a diagnostic chat message instead.
#[derive(Error, Debug)]
pub enum CampusChatError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level errors
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Chat endpoint errors
    #[error(transparent)]
    Api(#[from] ApiError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for CampusChat operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
