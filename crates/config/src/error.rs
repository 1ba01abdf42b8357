//! Error types for configuration evaluation.

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for configuration evaluation.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing and evaluating unit configurations.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The file is not syntactically valid HCL.
    #[error("Parse error in {}: {message}", path.display())]
    #[diagnostic(code(tgrun::config::parse))]
    Parse {
        /// File that failed to parse.
        path: Box<Path>,
        /// Parser diagnostic, including location.
        message: String,
    },

    /// An `include` block could not be resolved.
    #[error("Include '{label}' in {}: {cause}", path.display())]
    #[diagnostic(code(tgrun::config::include))]
    IncludeResolution {
        /// Label of the include block.
        label: String,
        /// File containing the include block.
        path: Box<Path>,
        /// What went wrong.
        cause: String,
    },

    /// A function call in an expression failed.
    #[error("Function {function} failed in {}: {cause}", path.display())]
    #[diagnostic(code(tgrun::config::function))]
    Function {
        /// Name of the failing function.
        function: String,
        /// File containing the call.
        path: Box<Path>,
        /// Why it failed.
        cause: String,
    },

    /// A dependency's outputs were needed but its state does not exist and
    /// no mock applies under the current action.
    #[error(
        "Dependency {} of {} has no outputs: it has not been applied, and mock outputs do not apply to this command",
        producer.display(),
        dependent.display()
    )]
    #[diagnostic(
        code(tgrun::config::dependency_not_applied),
        help("apply the dependency first, or declare mock_outputs with the command in mock_outputs_allowed_terraform_commands")
    )]
    DependencyNotApplied {
        /// The unit whose evaluation required the outputs.
        dependent: Box<Path>,
        /// The producer unit lacking state.
        producer: Box<Path>,
    },

    /// A reference cycle in evaluation (locals or config reads).
    #[error("Cyclic reference: {}", chain.join(" -> "))]
    #[diagnostic(code(tgrun::config::cyclic_reference))]
    CyclicReference {
        /// The reference chain, first element repeated at the end.
        chain: Vec<String>,
    },

    /// An expression referenced a local that is not defined.
    #[error("Undefined local '{name}' referenced in {}", path.display())]
    #[diagnostic(code(tgrun::config::undefined_local))]
    UndefinedLocal {
        /// The missing local's name.
        name: String,
        /// File containing the reference.
        path: Box<Path>,
    },

    /// Any other expression-evaluation failure.
    #[error("Evaluation error in {}: {message}", path.display())]
    #[diagnostic(code(tgrun::config::evaluation))]
    Evaluation {
        /// File being evaluated.
        path: Box<Path>,
        /// Evaluator diagnostic.
        message: String,
    },

    /// I/O failure while reading configuration.
    #[error("I/O error reading {}: {source}", path.display())]
    #[diagnostic(code(tgrun::config::io))]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// File or directory involved.
        path: Box<Path>,
    },

    /// Shared core failure (cancellation, strict control).
    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] tgrun_core::Error),
}

impl Error {
    /// Create a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into().into_boxed_path(),
            message: message.into(),
        }
    }

    /// Create an include-resolution error.
    pub fn include(
        label: impl Into<String>,
        path: impl Into<PathBuf>,
        cause: impl Into<String>,
    ) -> Self {
        Self::IncludeResolution {
            label: label.into(),
            path: path.into().into_boxed_path(),
            cause: cause.into(),
        }
    }

    /// Create a function error.
    pub fn function(
        function: impl Into<String>,
        path: impl Into<PathBuf>,
        cause: impl Into<String>,
    ) -> Self {
        Self::Function {
            function: function.into(),
            path: path.into().into_boxed_path(),
            cause: cause.into(),
        }
    }

    /// Create a dependency-not-applied error.
    pub fn dependency_not_applied(
        dependent: impl Into<PathBuf>,
        producer: impl Into<PathBuf>,
    ) -> Self {
        Self::DependencyNotApplied {
            dependent: dependent.into().into_boxed_path(),
            producer: producer.into().into_boxed_path(),
        }
    }

    /// Create an evaluation error.
    pub fn evaluation(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Evaluation {
            path: path.into().into_boxed_path(),
            message: message.into(),
        }
    }

    /// Create an I/O error with the involved path.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into().into_boxed_path(),
        }
    }

    /// Whether this is the dependency-not-applied case, which callers treat
    /// specially when deciding between mocks and hard failure.
    #[must_use]
    pub fn is_dependency_not_applied(&self) -> bool {
        matches!(self, Self::DependencyNotApplied { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_reference_names_the_chain() {
        let err = Error::CyclicReference {
            chain: vec!["local.a".into(), "local.b".into(), "local.a".into()],
        };
        assert_eq!(err.to_string(), "Cyclic reference: local.a -> local.b -> local.a");
    }

    #[test]
    fn dependency_not_applied_is_queryable() {
        let err = Error::dependency_not_applied("/stack/b", "/stack/a");
        assert!(err.is_dependency_not_applied());
        assert!(err.to_string().contains("/stack/a"));
        assert!(err.to_string().contains("/stack/b"));
    }
}
