//! Error types for scheduling and execution.

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while executing units.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The downstream binary exited non-zero (after retries, if any).
    #[error("{action} failed in {} with exit code {exit_code}", unit.display())]
    #[diagnostic(code(tgrun::runner::execution))]
    Execution {
        /// The unit that failed.
        unit: Box<Path>,
        /// The action being executed.
        action: String,
        /// Final exit code.
        exit_code: i32,
        /// Tail of the captured stderr.
        stderr: String,
    },

    /// A hook command failed.
    #[error("Hook '{name}' failed in {}: {cause}", unit.display())]
    #[diagnostic(code(tgrun::runner::hook))]
    Hook {
        /// Hook label.
        name: String,
        /// The unit the hook belongs to.
        unit: Box<Path>,
        /// Why it failed.
        cause: String,
    },

    /// The module source could not be materialized.
    #[error("Cannot materialize source '{source_ref}' for {}: {cause}", unit.display())]
    #[diagnostic(code(tgrun::runner::source))]
    Source {
        /// The declared source.
        source_ref: String,
        /// The unit.
        unit: Box<Path>,
        /// Why it failed.
        cause: String,
    },

    /// Failed to spawn or talk to a subprocess.
    #[error("Subprocess error during {operation}: {source}")]
    #[diagnostic(code(tgrun::runner::subprocess))]
    Subprocess {
        /// The underlying error.
        #[source]
        source: std::io::Error,
        /// What was being run.
        operation: String,
    },

    /// One or more units failed across a run-all.
    #[error("{} unit(s) failed", failures.len())]
    #[diagnostic(code(tgrun::runner::run_failed))]
    RunFailed {
        /// Each failing unit with its error, sources preserved.
        #[related]
        failures: Vec<Error>,
    },

    /// Remote-state layer failure (pre-flight).
    #[error(transparent)]
    #[diagnostic(transparent)]
    Backend(#[from] tgrun_backend::Error),

    /// Configuration evaluation failure (pre-flight).
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] tgrun_config::Error),

    /// Graph construction failure.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] tgrun_graph::Error),

    /// Code generation failure (pre-flight).
    #[error(transparent)]
    #[diagnostic(transparent)]
    Codegen(#[from] tgrun_codegen::Error),

    /// Shared core failure.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] tgrun_core::Error),
}

impl Error {
    /// Create an execution error, keeping the last lines of stderr.
    pub fn execution(
        unit: impl Into<PathBuf>,
        action: impl Into<String>,
        exit_code: i32,
        stderr: &str,
    ) -> Self {
        const KEEP_LINES: usize = 20;
        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(KEEP_LINES)..].join("\n");
        Self::Execution {
            unit: unit.into().into_boxed_path(),
            action: action.into(),
            exit_code,
            stderr: tail,
        }
    }

    /// Create a hook error.
    pub fn hook(
        name: impl Into<String>,
        unit: impl Into<PathBuf>,
        cause: impl Into<String>,
    ) -> Self {
        Self::Hook {
            name: name.into(),
            unit: unit.into().into_boxed_path(),
            cause: cause.into(),
        }
    }

    /// Whether the run was interrupted by cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Core(tgrun_core::Error::Cancelled))
    }
}
