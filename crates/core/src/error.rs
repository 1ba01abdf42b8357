//! Error types shared across the tgrun workspace.

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the shared core layer.
///
/// Subsystem crates define their own error enums and wrap these where a
/// filesystem or cancellation failure bubbles up through them.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// User-facing configuration problem (bad flag value, invalid path, ...).
    #[error("Configuration error: {message}")]
    #[diagnostic(code(tgrun::core::configuration))]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// I/O failure with operation context.
    #[error("I/O error during {operation}: {source}")]
    #[diagnostic(code(tgrun::core::io))]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Path involved in the failed operation, if any.
        path: Option<Box<Path>>,
        /// Description of the operation that failed.
        operation: String,
    },

    /// The run was cancelled by the caller or a signal.
    #[error("Run cancelled")]
    #[diagnostic(code(tgrun::core::cancelled))]
    Cancelled,

    /// A blocking operation exceeded its deadline.
    #[error("Operation timed out after {seconds} seconds")]
    #[diagnostic(code(tgrun::core::timeout))]
    Timeout {
        /// Seconds elapsed before the deadline fired.
        seconds: u64,
    },

    /// A strict control set to `error` rejected a deprecated behavior.
    #[error("Strict control '{control}': {message}")]
    #[diagnostic(code(tgrun::core::strict_control))]
    StrictControl {
        /// Name of the control that fired.
        control: String,
        /// What the rejected behavior was.
        message: String,
    },
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an I/O error with path and operation context.
    pub fn io(source: std::io::Error, path: Option<PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.map(PathBuf::into_boxed_path),
            operation: operation.into(),
        }
    }

    /// Whether this error is the cooperative-cancellation sentinel.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
