//! Queue schedulers: the streaming worker pool and the level-batch
//! experiment, both behind one trait chosen at startup.

use crate::executor::{UnitExecutor, UnitRunResult};
use crate::queue::RunQueue;
use crate::report::RunReport;
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tgrun_core::experiment::Experiment;
use tgrun_core::{Experiments, ExternalMode, UnitStatus};
use tgrun_graph::UnitGraph;
use tokio::task::JoinSet;

/// A strategy for driving an action across the graph.
#[async_trait]
pub trait QueueScheduler: Send + Sync {
    /// Scheduler name, for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Execute the run to completion and report every unit's status.
    async fn run(&self, graph: &UnitGraph, executor: Arc<UnitExecutor>) -> RunReport;
}

/// Pick the scheduler for this process: the worker pool unless the
/// runner-pool experiment asks for level batching.
#[must_use]
pub fn scheduler_for(experiments: &Experiments) -> Box<dyn QueueScheduler> {
    if experiments.is_enabled(Experiment::RunnerPool) {
        Box::new(RunnerPoolScheduler)
    } else {
        Box::new(WorkerPoolScheduler)
    }
}

/// Streaming ready-set scheduler: units start the moment their last
/// prerequisite finishes, bounded by the run's parallelism.
pub struct WorkerPoolScheduler;

#[async_trait]
impl QueueScheduler for WorkerPoolScheduler {
    fn name(&self) -> &'static str {
        "worker-pool"
    }

    async fn run(&self, graph: &UnitGraph, executor: Arc<UnitExecutor>) -> RunReport {
        let run = executor.run().clone();
        let mut queue = RunQueue::new(graph, run.action.is_destructive());
        let mut results: Vec<UnitRunResult> = Vec::with_capacity(queue.len());
        let mut join_set: JoinSet<UnitRunResult> = JoinSet::new();
        let mut active = 0usize;

        tracing::info!(
            scheduler = self.name(),
            units = queue.len(),
            parallelism = run.parallelism,
            action = run.action.name(),
            "Starting run"
        );

        loop {
            if run.token.is_cancelled() {
                queue.cancel_pending();
            }

            // Fill the pool from the ready set.
            while active < run.parallelism && !run.token.is_cancelled() {
                let Some((dir, claimed)) = queue.claim_next() else {
                    break;
                };
                let runnable = !claimed.excluded
                    && !(claimed.external && run.external_mode != ExternalMode::Include);
                if !runnable {
                    tracing::debug!(unit = %dir.display(), "Skipping unit (excluded or external)");
                    queue.complete(&dir, UnitStatus::Skipped);
                    results.push(UnitRunResult::unexecuted(dir, UnitStatus::Skipped));
                    continue;
                }

                let task_executor = Arc::clone(&executor);
                join_set.spawn(async move { task_executor.execute(&dir, false).await });
                active += 1;
            }

            if active == 0 {
                break;
            }

            // Wait for one completion, then release successors.
            let Some(joined) = join_set.join_next().await else {
                break;
            };
            active -= 1;
            let result = joined.unwrap_or_else(|join_err| {
                tracing::error!(error = %join_err, "Worker panicked");
                UnitRunResult::unexecuted(PathBuf::new(), UnitStatus::Failed)
            });
            let skipped = queue.complete(&result.dir, result.status);
            if skipped > 0 {
                tracing::warn!(
                    unit = %result.dir.display(),
                    dependents_skipped = skipped,
                    "Failure propagated to dependents"
                );
            }
            results.push(result);
        }

        finalize(&run.action, queue, results)
    }
}

/// Level-batch scheduler behind the `runner-pool` experiment: each
/// dependency level runs as one bounded-concurrency batch.
pub struct RunnerPoolScheduler;

#[async_trait]
impl QueueScheduler for RunnerPoolScheduler {
    fn name(&self) -> &'static str {
        "runner-pool"
    }

    async fn run(&self, graph: &UnitGraph, executor: Arc<UnitExecutor>) -> RunReport {
        let run = executor.run().clone();
        let mut levels = graph.parallel_levels();
        if run.action.is_destructive() {
            levels.reverse();
        }

        tracing::info!(
            scheduler = self.name(),
            levels = levels.len(),
            parallelism = run.parallelism,
            "Starting level-batched run"
        );

        let mut results: Vec<UnitRunResult> = Vec::new();
        let mut terminal: HashMap<PathBuf, UnitStatus> = HashMap::new();

        for level in levels {
            let mut batch = Vec::new();
            for dir in level {
                if run.token.is_cancelled() {
                    terminal.insert(dir.clone(), UnitStatus::Cancelled);
                    results.push(UnitRunResult::unexecuted(dir, UnitStatus::Cancelled));
                    continue;
                }

                let blockers = if run.action.is_destructive() {
                    graph.dependents_of(&dir)
                } else {
                    graph.dependencies_of(&dir)
                };
                let blocked = blockers.iter().any(|blocker| {
                    terminal.get(blocker).copied().is_some_and(|status| {
                        !status.unblocks_dependents()
                    })
                });
                if blocked {
                    terminal.insert(dir.clone(), UnitStatus::SkippedDependencyFailure);
                    results.push(UnitRunResult::unexecuted(
                        dir,
                        UnitStatus::SkippedDependencyFailure,
                    ));
                    continue;
                }

                let runnable = graph
                    .node(&dir)
                    .is_some_and(|node| !node.excluded && node.is_runnable(run.external_mode));
                if !runnable {
                    terminal.insert(dir.clone(), UnitStatus::Skipped);
                    results.push(UnitRunResult::unexecuted(dir, UnitStatus::Skipped));
                    continue;
                }
                batch.push(dir);
            }

            let executed: Vec<UnitRunResult> = futures::stream::iter(batch)
                .map(|dir| {
                    let task_executor = Arc::clone(&executor);
                    async move { task_executor.execute(&dir, false).await }
                })
                .buffer_unordered(run.parallelism.max(1))
                .collect()
                .await;

            for result in executed {
                terminal.insert(result.dir.clone(), result.status);
                results.push(result);
            }
        }

        RunReport::new(&run.action, results)
    }
}

/// Fold queue leftovers (cancelled/skipped entries that never produced a
/// worker result) into the report.
fn finalize(
    action: &tgrun_core::Action,
    queue: RunQueue,
    mut results: Vec<UnitRunResult>,
) -> RunReport {
    let reported: std::collections::HashSet<PathBuf> =
        results.iter().map(|result| result.dir.clone()).collect();
    for (dir, status) in queue.statuses() {
        if !reported.contains(&dir) {
            results.push(UnitRunResult::unexecuted(dir, status));
        }
    }
    let report = RunReport::new(action, results);
    tracing::info!("{}", report.summary());
    report
}
