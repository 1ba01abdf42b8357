//! Run reports: the terminal status of every unit, and the exit code.

use crate::error::Error;
use crate::executor::UnitRunResult;
use tgrun_core::{Action, UnitStatus};

/// Aggregate outcome of a run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunReport {
    /// The action that was executed.
    pub action: String,
    /// Per-unit results, sorted by unit path.
    pub results: Vec<UnitRunResult>,
}

impl RunReport {
    /// Build a report from collected results.
    #[must_use]
    pub fn new(action: &Action, mut results: Vec<UnitRunResult>) -> Self {
        results.sort_by(|a, b| a.dir.cmp(&b.dir));
        Self {
            action: action.name().to_string(),
            results,
        }
    }

    /// Whether no unit failed.
    #[must_use]
    pub fn success(&self) -> bool {
        !self
            .results
            .iter()
            .any(|result| result.status.is_failure() || result.status == UnitStatus::Cancelled)
    }

    /// Process exit code: 0 on success, 1 on any failure or cancellation,
    /// 2 passed through when the downstream reported pending changes.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if !self.success() {
            return 1;
        }
        if self.results.iter().any(|result| result.changes_pending) {
            return 2;
        }
        0
    }

    /// Count of units in a given status.
    #[must_use]
    pub fn count(&self, status: UnitStatus) -> usize {
        self.results
            .iter()
            .filter(|result| result.status == status)
            .count()
    }

    /// Aggregate the failed units into one error, each source preserved.
    #[must_use]
    pub fn failure(&self) -> Option<Error> {
        let failures: Vec<Error> = self
            .results
            .iter()
            .filter(|result| result.status.is_failure())
            .map(|result| {
                Error::execution(
                    &result.dir,
                    &self.action,
                    result.exit_code.unwrap_or(1),
                    result.error.as_deref().unwrap_or_default(),
                )
            })
            .collect();
        if failures.is_empty() {
            None
        } else {
            Some(Error::RunFailed { failures })
        }
    }

    /// One-line human summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {} succeeded, {} failed, {} skipped, {} excluded-skips, {} cancelled (of {})",
            self.action,
            self.count(UnitStatus::Succeeded),
            self.count(UnitStatus::Failed),
            self.count(UnitStatus::SkippedDependencyFailure),
            self.count(UnitStatus::Skipped) + self.count(UnitStatus::EarlyExited),
            self.count(UnitStatus::Cancelled),
            self.results.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn result(dir: &str, status: UnitStatus) -> UnitRunResult {
        UnitRunResult::unexecuted(PathBuf::from(dir), status)
    }

    #[test]
    fn exit_codes() {
        let ok = RunReport::new(
            &Action::Apply,
            vec![result("/s/a", UnitStatus::Succeeded)],
        );
        assert_eq!(ok.exit_code(), 0);
        assert!(ok.success());

        let failed = RunReport::new(
            &Action::Apply,
            vec![
                result("/s/a", UnitStatus::Succeeded),
                result("/s/b", UnitStatus::Failed),
            ],
        );
        assert_eq!(failed.exit_code(), 1);

        let mut pending = result("/s/a", UnitStatus::Succeeded);
        pending.changes_pending = true;
        let diff = RunReport::new(&Action::Plan, vec![pending]);
        assert_eq!(diff.exit_code(), 2);
    }

    #[test]
    fn results_are_sorted_by_path() {
        let report = RunReport::new(
            &Action::Plan,
            vec![
                result("/s/b", UnitStatus::Succeeded),
                result("/s/a", UnitStatus::Succeeded),
            ],
        );
        assert!(report.results[0].dir < report.results[1].dir);
    }

    #[test]
    fn failure_aggregates_each_failed_unit() {
        let mut failed = result("/s/b", UnitStatus::Failed);
        failed.error = Some("apply failed in /s/b with exit code 1".to_string());
        let report = RunReport::new(
            &Action::Apply,
            vec![result("/s/a", UnitStatus::Succeeded), failed],
        );
        let aggregated = report.failure().unwrap();
        match aggregated {
            Error::RunFailed { failures } => assert_eq!(failures.len(), 1),
            other => panic!("expected RunFailed, got {other}"),
        }

        let clean = RunReport::new(&Action::Apply, vec![result("/s/a", UnitStatus::Succeeded)]);
        assert!(clean.failure().is_none());
    }

    #[test]
    fn summary_counts_statuses() {
        let report = RunReport::new(
            &Action::Plan,
            vec![
                result("/s/a", UnitStatus::Succeeded),
                result("/s/b", UnitStatus::Failed),
                result("/s/c", UnitStatus::SkippedDependencyFailure),
                result("/s/d", UnitStatus::Skipped),
            ],
        );
        let summary = report.summary();
        assert!(summary.contains("1 succeeded"));
        assert!(summary.contains("1 failed"));
        assert!(summary.contains("(of 4)"));
    }
}
