//! Error types for discovery and graph construction.

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while discovering units and building the dependency graph.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The dependency relation contains a cycle.
    #[error("Dependency cycle: {}", format_cycle(cycle))]
    #[diagnostic(code(tgrun::graph::cycle))]
    CyclicDependency {
        /// Every vertex on the cycle, first repeated at the end.
        cycle: Vec<PathBuf>,
    },

    /// A declared dependency points at a directory with no configuration.
    #[error("{} depends on {}, which has no {}", dependent.display(), missing.display(), tgrun_core::paths::CONFIG_FILENAME)]
    #[diagnostic(code(tgrun::graph::missing_dependency))]
    MissingDependency {
        /// The unit declaring the dependency.
        dependent: Box<Path>,
        /// The directory that is not a unit.
        missing: Box<Path>,
    },

    /// An include/exclude filter pattern is not a valid glob.
    #[error("Invalid filter pattern '{pattern}': {cause}")]
    #[diagnostic(code(tgrun::graph::filter))]
    Filter {
        /// The offending pattern.
        pattern: String,
        /// Glob compiler diagnostic.
        cause: String,
    },

    /// Filesystem failure during the discovery walk.
    #[error("Discovery failed under {}: {source}", root.display())]
    #[diagnostic(code(tgrun::graph::walk))]
    Walk {
        /// The walk root.
        root: Box<Path>,
        /// The underlying error.
        #[source]
        source: walkdir::Error,
    },

    /// Configuration evaluation failed for a discovered unit.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] tgrun_config::Error),

    /// Shared core failure.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] tgrun_core::Error),
}

fn format_cycle(cycle: &[PathBuf]) -> String {
    cycle
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl Error {
    /// Create a missing-dependency error.
    pub fn missing_dependency(dependent: impl Into<PathBuf>, missing: impl Into<PathBuf>) -> Self {
        Self::MissingDependency {
            dependent: dependent.into().into_boxed_path(),
            missing: missing.into().into_boxed_path(),
        }
    }
}
