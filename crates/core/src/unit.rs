//! Units and their execution lifecycle.

use crate::config::UnitConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One executable configuration node: a directory with a config file.
#[derive(Debug, Clone)]
pub struct Unit {
    /// Absolute path of the unit directory.
    pub path: PathBuf,
    /// Evaluated configuration.
    pub config: UnitConfig,
    /// Whether the unit lies outside the discovered queue (pulled in as a
    /// dependency of an in-queue unit).
    pub external: bool,
}

impl Unit {
    /// Create an in-queue unit.
    #[must_use]
    pub fn new(path: PathBuf, config: UnitConfig) -> Self {
        Self {
            path,
            config,
            external: false,
        }
    }

    /// Absolute paths of declared dependencies.
    pub fn dependency_paths(&self) -> impl Iterator<Item = &Path> {
        self.config.dependency_paths().map(PathBuf::as_path)
    }

    /// Short display name: the path relative to the given root when possible.
    #[must_use]
    pub fn display_name(&self, root: &Path) -> String {
        self.path
            .strip_prefix(root)
            .map_or_else(|_| self.path.display().to_string(), |rel| {
                if rel.as_os_str().is_empty() {
                    ".".to_string()
                } else {
                    rel.display().to_string()
                }
            })
    }
}

/// Lifecycle state of a unit within one run.
///
/// `Pending → Ready → Running` and from there to exactly one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitStatus {
    /// Waiting on unfinished dependencies.
    Pending,
    /// All dependencies satisfied; eligible for a worker.
    Ready,
    /// A worker is executing the unit.
    Running,
    /// Downstream command completed successfully.
    Succeeded,
    /// Downstream command, hook, or pre-flight step failed.
    Failed,
    /// Excluded before execution; counts as success for scheduling.
    Skipped,
    /// Single-unit `no_run` early exit; no subprocess was spawned.
    EarlyExited,
    /// Never ran because a transitive dependency failed.
    SkippedDependencyFailure,
    /// The run was cancelled before or during execution.
    Cancelled,
}

impl UnitStatus {
    /// Whether the unit has reached a terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Ready | Self::Running)
    }

    /// Whether dependents may proceed after this state.
    ///
    /// Skips count as success: successors run against the producer's
    /// last-known (or mock) outputs.
    #[must_use]
    pub fn unblocks_dependents(self) -> bool {
        matches!(self, Self::Succeeded | Self::Skipped | Self::EarlyExited)
    }

    /// Whether this state makes the whole run fail.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::EarlyExited => "early-exited",
            Self::SkippedDependencyFailure => "skipped-due-to-dependency-failure",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnitConfig;

    #[test]
    fn terminal_states() {
        assert!(!UnitStatus::Pending.is_terminal());
        assert!(!UnitStatus::Running.is_terminal());
        assert!(UnitStatus::Succeeded.is_terminal());
        assert!(UnitStatus::SkippedDependencyFailure.is_terminal());
        assert!(UnitStatus::Cancelled.is_terminal());
    }

    #[test]
    fn skipped_unblocks_dependents() {
        assert!(UnitStatus::Skipped.unblocks_dependents());
        assert!(UnitStatus::Succeeded.unblocks_dependents());
        assert!(!UnitStatus::Failed.unblocks_dependents());
        assert!(!UnitStatus::SkippedDependencyFailure.unblocks_dependents());
    }

    #[test]
    fn dependency_failure_status_spelling() {
        assert_eq!(
            UnitStatus::SkippedDependencyFailure.to_string(),
            "skipped-due-to-dependency-failure"
        );
    }

    #[test]
    fn display_name_is_relative_when_possible() {
        let unit = Unit::new(PathBuf::from("/stack/app1"), UnitConfig::default());
        assert_eq!(unit.display_name(Path::new("/stack")), "app1");
        assert_eq!(unit.display_name(Path::new("/elsewhere")), "/stack/app1");
    }
}
