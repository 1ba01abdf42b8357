//! Error types for stack composition.

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for stack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while expanding stack files.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// No stack file at the given directory.
    #[error("No {} found in {}", tgrun_core::paths::STACK_FILENAME, dir.display())]
    #[diagnostic(code(tgrun::stack::not_found))]
    NotFound {
        /// The directory searched.
        dir: Box<Path>,
    },

    /// A unit block is invalid.
    #[error("Unit \"{name}\" in {}: {cause}", file.display())]
    #[diagnostic(code(tgrun::stack::unit))]
    Unit {
        /// Block label.
        name: String,
        /// The stack file.
        file: Box<Path>,
        /// What is wrong.
        cause: String,
    },

    /// Filesystem failure.
    #[error("I/O error during {operation}: {source}")]
    #[diagnostic(code(tgrun::stack::io))]
    Io {
        /// The underlying error.
        #[source]
        source: std::io::Error,
        /// What was being done.
        operation: String,
    },

    /// Expression evaluation failed inside the stack file.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] tgrun_config::Error),
}

impl Error {
    /// Create a unit-block error.
    pub fn unit(
        name: impl Into<String>,
        file: impl Into<PathBuf>,
        cause: impl Into<String>,
    ) -> Self {
        Self::Unit {
            name: name.into(),
            file: file.into().into_boxed_path(),
            cause: cause.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            operation: operation.into(),
        }
    }
}
