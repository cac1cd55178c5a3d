//! Error types for the widget pipeline.

use std::sync::Arc;

use thiserror::Error;

/// The main error type for the widget pipeline.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The configuration was rejected before any worker was spawned
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// The issuer handed out every permitted identifier
    #[error("ID issuer exhausted")]
    IssuerExhausted,

    /// The issuer was stopped and no longer grants identifiers
    #[error("ID issuer closed")]
    IssuerClosed,

    /// A producer could not hand off a widget because every consumer is gone
    #[error("Item channel closed while delivering widget {id}")]
    ItemChannelClosed { id: u64 },

    /// A report sink failed to accept a report
    #[error("Report sink error: {0}")]
    Sink(Arc<dyn std::error::Error + Send + Sync>),

    /// An I/O error from a file-backed sink
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// A worker task panicked or was cancelled
    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    /// The blocking entry point could not start a runtime
    #[error("Runtime error: {0}")]
    Runtime(String),
}

// Convenience constructors
impl Error {
    /// Create an invalid configuration error
    pub fn invalid<S: Into<String>>(reason: S) -> Self {
        Error::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Create a sink error from any error type
    pub fn sink<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Sink(Arc::new(error))
    }

    /// Whether this error is one of the benign "no more work" conditions
    pub fn is_termination(&self) -> bool {
        matches!(self, Error::IssuerExhausted | Error::IssuerClosed)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::TaskPanicked(e.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;
