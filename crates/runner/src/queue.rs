//! The run queue: unit lifecycle tracking and readiness bookkeeping.
//!
//! The queue owns every unit's [`UnitStatus`] for the run. Completion of a
//! unit releases its successors; failure marks every transitive successor
//! as skipped. For destructive actions the edge direction is reversed at
//! construction, so "successor" below always means "runs after".

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tgrun_core::UnitStatus;
use tgrun_graph::UnitGraph;

#[derive(Debug)]
struct Entry {
    status: UnitStatus,
    /// Units that must reach a terminal state before this one starts.
    blockers_remaining: usize,
    /// Units waiting on this one.
    successors: Vec<PathBuf>,
    /// Excluded by filters or exclude blocks; scheduled as a skip.
    excluded: bool,
    /// External to the queue; may be reported instead of executed.
    external: bool,
}

/// Mutable run state over an immutable graph.
#[derive(Debug)]
pub struct RunQueue {
    entries: HashMap<PathBuf, Entry>,
    ready: VecDeque<PathBuf>,
}

impl RunQueue {
    /// Build the queue from a graph. With `reverse`, dependents run before
    /// their dependencies (destroy ordering).
    #[must_use]
    pub fn new(graph: &UnitGraph, reverse: bool) -> Self {
        let mut entries = HashMap::new();
        let mut ready = VecDeque::new();

        for node in graph.units() {
            let (blockers, successors) = if reverse {
                (graph.dependents_of(&node.dir), graph.dependencies_of(&node.dir))
            } else {
                (graph.dependencies_of(&node.dir), graph.dependents_of(&node.dir))
            };
            let entry = Entry {
                status: if blockers.is_empty() {
                    UnitStatus::Ready
                } else {
                    UnitStatus::Pending
                },
                blockers_remaining: blockers.len(),
                successors,
                excluded: node.excluded,
                external: node.external,
            };
            if entry.blockers_remaining == 0 {
                ready.push_back(node.dir.clone());
            }
            entries.insert(node.dir.clone(), entry);
        }

        // Deterministic start order among the initially ready.
        let mut initial: Vec<PathBuf> = ready.into();
        initial.sort();
        Self {
            entries,
            ready: initial.into(),
        }
    }

    /// Take the next ready unit, marking it running.
    pub fn claim_next(&mut self) -> Option<(PathBuf, ClaimedUnit)> {
        let dir = self.ready.pop_front()?;
        let entry = self.entries.get_mut(&dir)?;
        entry.status = UnitStatus::Running;
        Some((
            dir,
            ClaimedUnit {
                excluded: entry.excluded,
                external: entry.external,
            },
        ))
    }

    /// Record a terminal status for a unit and release or skip successors.
    ///
    /// Returns the number of successors transitioned by failure
    /// propagation.
    pub fn complete(&mut self, dir: &Path, status: UnitStatus) -> usize {
        debug_assert!(status.is_terminal(), "complete() requires a terminal status");
        let Some(entry) = self.entries.get_mut(dir) else {
            return 0;
        };
        entry.status = status;
        let successors = entry.successors.clone();

        if status.unblocks_dependents() {
            for successor in &successors {
                self.release_one(successor);
            }
            0
        } else {
            // Failure (or cancellation): every transitive successor that has
            // not finished is skipped, deterministically.
            self.skip_transitive_successors(&successors)
        }
    }

    fn release_one(&mut self, dir: &Path) {
        let Some(entry) = self.entries.get_mut(dir) else {
            return;
        };
        entry.blockers_remaining = entry.blockers_remaining.saturating_sub(1);
        if entry.blockers_remaining == 0 && entry.status == UnitStatus::Pending {
            entry.status = UnitStatus::Ready;
            self.ready.push_back(dir.to_path_buf());
        }
    }

    fn skip_transitive_successors(&mut self, roots: &[PathBuf]) -> usize {
        let mut skipped = 0;
        let mut stack: Vec<PathBuf> = roots.to_vec();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        while let Some(dir) = stack.pop() {
            if !seen.insert(dir.clone()) {
                continue;
            }
            let Some(entry) = self.entries.get_mut(&dir) else {
                continue;
            };
            if entry.status.is_terminal() || entry.status == UnitStatus::Running {
                continue;
            }
            entry.status = UnitStatus::SkippedDependencyFailure;
            skipped += 1;
            let successors = entry.successors.clone();
            stack.extend(successors);
        }
        // Drop skipped units from the ready list.
        self.ready.retain(|dir| {
            self.entries
                .get(dir)
                .is_some_and(|entry| entry.status == UnitStatus::Ready)
        });
        skipped
    }

    /// Transition every non-terminal unit to `Cancelled`.
    pub fn cancel_pending(&mut self) {
        for entry in self.entries.values_mut() {
            if !entry.status.is_terminal() && entry.status != UnitStatus::Running {
                entry.status = UnitStatus::Cancelled;
            }
        }
        self.ready.clear();
    }

    /// Whether every unit has reached a terminal state.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.entries.values().all(|entry| entry.status.is_terminal())
    }

    /// Whether no unit is ready right now (workers may still be running).
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.ready.is_empty()
    }

    /// Current status of one unit.
    #[must_use]
    pub fn status(&self, dir: &Path) -> Option<UnitStatus> {
        self.entries.get(dir).map(|entry| entry.status)
    }

    /// All final statuses, sorted by unit path.
    #[must_use]
    pub fn statuses(&self) -> Vec<(PathBuf, UnitStatus)> {
        let mut all: Vec<(PathBuf, UnitStatus)> = self
            .entries
            .iter()
            .map(|(dir, entry)| (dir.clone(), entry.status))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Flags the scheduler needs about a claimed unit.
#[derive(Debug, Clone, Copy)]
pub struct ClaimedUnit {
    /// Scheduled as a skip rather than an execution.
    pub excluded: bool,
    /// External to the queue.
    pub external: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tgrun_config::Evaluator;
    use tgrun_core::{Action, RunContext, paths};
    use tgrun_graph::DiscoveryOptions;

    /// Build a queue over a real graph: `edges` as (producer, consumer).
    fn queue_from(units: &[&str], edges: &[(&str, &str)], reverse: bool) -> (TempDir, RunQueue) {
        let tmp = TempDir::new().unwrap();
        let mut deps: HashMap<&str, Vec<&str>> = HashMap::new();
        for (producer, consumer) in edges.iter().copied() {
            deps.entry(consumer).or_default().push(producer);
        }
        for unit in units.iter().copied() {
            let dir = tmp.path().join(unit);
            fs::create_dir_all(&dir).unwrap();
            let mut config = String::new();
            for producer in deps.get(unit).into_iter().flatten() {
                config.push_str(&format!(
                    "dependency \"{producer}\" {{\n  config_path = \"../{producer}\"\n  skip_outputs = true\n}}\n"
                ));
            }
            fs::write(dir.join(paths::CONFIG_FILENAME), config).unwrap();
        }
        let evaluator = Evaluator::new(RunContext::new(tmp.path(), Action::Apply));
        let graph = tgrun_graph::UnitGraph::build(&evaluator, &DiscoveryOptions::default()).unwrap();
        let queue = RunQueue::new(&graph, reverse);
        (tmp, queue)
    }

    fn dir(tmp: &TempDir, unit: &str) -> PathBuf {
        paths::normalize(&tmp.path().join(unit))
    }

    #[test]
    fn chain_releases_in_order() {
        let (tmp, mut queue) = queue_from(&["a", "b", "c"], &[("a", "b"), ("b", "c")], false);

        let (first, _) = queue.claim_next().unwrap();
        assert_eq!(first, dir(&tmp, "a"));
        assert!(queue.claim_next().is_none(), "b and c still blocked");

        queue.complete(&first, UnitStatus::Succeeded);
        let (second, _) = queue.claim_next().unwrap();
        assert_eq!(second, dir(&tmp, "b"));
        queue.complete(&second, UnitStatus::Succeeded);
        let (third, _) = queue.claim_next().unwrap();
        assert_eq!(third, dir(&tmp, "c"));
        queue.complete(&third, UnitStatus::Succeeded);
        assert!(queue.is_done());
    }

    #[test]
    fn failure_skips_transitive_successors_only() {
        // x -> y -> z, plus independent sibling s.
        let (tmp, mut queue) = queue_from(&["x", "y", "z", "s"], &[("x", "y"), ("y", "z")], false);

        let mut claimed = Vec::new();
        while let Some((unit_dir, _)) = queue.claim_next() {
            claimed.push(unit_dir);
        }
        assert_eq!(claimed.len(), 2, "x and s start together");

        let skipped = queue.complete(&dir(&tmp, "x"), UnitStatus::Failed);
        assert_eq!(skipped, 2);
        assert_eq!(
            queue.status(&dir(&tmp, "y")),
            Some(UnitStatus::SkippedDependencyFailure)
        );
        assert_eq!(
            queue.status(&dir(&tmp, "z")),
            Some(UnitStatus::SkippedDependencyFailure)
        );

        // The sibling is unaffected and completes normally.
        queue.complete(&dir(&tmp, "s"), UnitStatus::Succeeded);
        assert!(queue.is_done());
    }

    #[test]
    fn skip_counts_as_success_for_scheduling() {
        let (tmp, mut queue) = queue_from(&["a", "b"], &[("a", "b")], false);
        let (first, _) = queue.claim_next().unwrap();
        queue.complete(&first, UnitStatus::Skipped);
        let (second, _) = queue.claim_next().unwrap();
        assert_eq!(second, dir(&tmp, "b"));
    }

    #[test]
    fn reverse_ordering_for_destroy() {
        let (tmp, mut queue) = queue_from(&["a", "b"], &[("a", "b")], true);
        // b depends on a; under destroy, b must tear down first.
        let (first, _) = queue.claim_next().unwrap();
        assert_eq!(first, dir(&tmp, "b"));
        queue.complete(&first, UnitStatus::Succeeded);
        let (second, _) = queue.claim_next().unwrap();
        assert_eq!(second, dir(&tmp, "a"));
    }

    #[test]
    fn cancel_pending_freezes_the_queue() {
        let (tmp, mut queue) = queue_from(&["a", "b", "c"], &[("a", "b"), ("b", "c")], false);
        let (first, _) = queue.claim_next().unwrap();
        queue.cancel_pending();
        assert_eq!(queue.status(&dir(&tmp, "b")), Some(UnitStatus::Cancelled));
        assert_eq!(queue.status(&dir(&tmp, "c")), Some(UnitStatus::Cancelled));
        // The running unit still finishes and records its real status.
        queue.complete(&first, UnitStatus::Succeeded);
        assert!(queue.is_done());
    }

    #[test]
    fn diamond_waits_for_both_parents() {
        let (tmp, mut queue) = queue_from(
            &["base", "left", "right", "top"],
            &[("base", "left"), ("base", "right"), ("left", "top"), ("right", "top")],
            false,
        );
        let (base, _) = queue.claim_next().unwrap();
        assert_eq!(base, dir(&tmp, "base"));
        queue.complete(&base, UnitStatus::Succeeded);

        let (p1, _) = queue.claim_next().unwrap();
        let (p2, _) = queue.claim_next().unwrap();
        assert!(queue.claim_next().is_none(), "top waits for both");
        queue.complete(&p1, UnitStatus::Succeeded);
        assert!(queue.claim_next().is_none());
        queue.complete(&p2, UnitStatus::Succeeded);
        let (top, _) = queue.claim_next().unwrap();
        assert_eq!(top, dir(&tmp, "top"));
    }
}
