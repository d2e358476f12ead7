//! Error types for memrelay.

use thiserror::Error;

/// Main error type for memrelay operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error. Fatal when raised during startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A tool call is missing a required argument or carries a malformed one.
    #[error("{0}")]
    InvalidParams(String),

    /// Unknown tool or protocol method.
    #[error("Unknown tool: {0}")]
    MethodNotFound(String),

    /// The backend is still being constructed.
    #[error("Memory client is still initializing. Please try again in a moment.")]
    NotReady,

    /// Backend construction failed; the process is shutting down.
    #[error("Memory client failed to initialize")]
    InitializationFailed,

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A backend endpoint answered with a non-success status.
    #[error("{context} failed: {status} {reason} - {body}")]
    Status {
        context: String,
        status: u16,
        reason: String,
        body: String,
    },

    /// Error reported by a backend handle.
    #[error("{0}")]
    Backend(String),

    /// The active backend has no working path for an operation.
    #[error("backend does not support {operation}: {cause}")]
    Unsupported { operation: String, cause: String },

    /// Embedding provider error.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// In-process store error.
    #[error("Store error: {0}")]
    Store(#[from] crate::sqlite::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a failed write may still have been applied by the backend.
    ///
    /// Timeouts and failures while reading a response happen after the
    /// request left the process, so the backend may have stored the record.
    pub fn may_have_committed(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_body() || e.is_decode(),
            _ => false,
        }
    }
}
