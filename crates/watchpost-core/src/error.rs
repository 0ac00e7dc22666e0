use std::time::Duration;

use thiserror::Error;

/// Application-wide error types for Watchpost.
#[derive(Error, Debug)]
pub enum AppError {
    /// Connection-level failure (DNS, refused, reset, body transfer).
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out after the given deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// The target URL could not be parsed or has an unsupported scheme.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fetched content could not be interpreted in the selected mode.
    #[error("Content format error: {0}")]
    ContentFormat(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Client(String),

    /// Local I/O failure.
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// Anything the lower layers could not classify.
    #[error("{0}")]
    Internal(String),

    /// A shutdown signal interrupted the operation.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Closed classification of every [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    ContentFormat,
    Configuration,
    Fatal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Network(_) | AppError::Timeout(_) | AppError::HttpStatus { .. } => {
                ErrorKind::Transient
            }
            AppError::ContentFormat(_) => ErrorKind::ContentFormat,
            AppError::InvalidUrl(_) | AppError::Config(_) => ErrorKind::Configuration,
            AppError::Client(_) | AppError::Io(_) | AppError::Internal(_) | AppError::Cancelled => {
                ErrorKind::Fatal
            }
        }
    }

    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Returns true if this error must terminate the monitor loop.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AppError::Cancelled) && self.kind() == ErrorKind::Fatal
    }

    /// Human-readable failure class used in notifications.
    pub fn describe_failure(&self, url: &str) -> String {
        match self {
            AppError::HttpStatus { status, .. } => {
                format!("HTTP {status} error occurred while checking {url}")
            }
            AppError::Network(msg) => {
                format!("Network error occurred while checking {url}: {msg}")
            }
            AppError::Timeout(after) => {
                format!("Timeout error occurred while checking {url}: no response within {after:?}")
            }
            other => format!("Unexpected error occurred while checking {url}: {other}"),
        }
    }
}
