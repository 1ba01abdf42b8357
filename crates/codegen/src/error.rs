//! Error types for file generation.

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while materializing generated files.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The target exists and the policy is `error`, or ownership of the
    /// existing file cannot be established.
    #[error("Refusing to generate {}: file exists", path.display())]
    #[diagnostic(
        code(tgrun::codegen::file_exists),
        help("set if_exists to overwrite, overwrite_terragrunt, or skip to allow replacement")
    )]
    GenerateFileExists {
        /// The conflicting target path.
        path: Box<Path>,
    },

    /// The target path escapes the unit's working directory.
    #[error("Generated file path {} escapes the working directory", path.display())]
    #[diagnostic(code(tgrun::codegen::path_escape))]
    PathEscapesWorkingDir {
        /// The offending path.
        path: Box<Path>,
    },

    /// Filesystem failure.
    #[error("I/O error during {operation}: {source}")]
    #[diagnostic(code(tgrun::codegen::io))]
    Io {
        /// The underlying error.
        #[source]
        source: std::io::Error,
        /// What was being done.
        operation: String,
    },
}

impl Error {
    /// Create a file-exists error.
    pub fn exists(path: impl Into<PathBuf>) -> Self {
        Self::GenerateFileExists {
            path: path.into().into_boxed_path(),
        }
    }

    /// Create an I/O error with operation context.
    pub fn io(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            operation: operation.into(),
        }
    }
}
