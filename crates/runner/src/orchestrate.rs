//! Top-level run wiring: discovery, graph, scheduler, report.

use crate::error::Result;
use crate::executor::UnitExecutor;
use crate::report::RunReport;
use crate::scheduler::scheduler_for;
use std::path::PathBuf;
use std::sync::Arc;
use tgrun_backend::BackendRegistry;
use tgrun_config::Evaluator;
use tgrun_core::{RemoteStateSpec, RunContext, paths};
use tgrun_graph::{DiscoveryOptions, UnitGraph};

/// Drive the action across every unit under the working directory.
pub async fn run_all(
    run: RunContext,
    options: &DiscoveryOptions,
    registry: Arc<BackendRegistry>,
) -> Result<RunReport> {
    let evaluator = Arc::new(Evaluator::new(run.clone()));
    let graph = UnitGraph::build(&evaluator, options)?;
    if graph.is_empty() {
        tracing::warn!(
            working_dir = %run.working_dir.display(),
            "No units found under the working directory"
        );
        return Ok(RunReport::new(&run.action, Vec::new()));
    }

    // Shared backing stores must key their state distinctly.
    let specs: Vec<(PathBuf, RemoteStateSpec)> = graph
        .units()
        .filter_map(|node| {
            node.partial
                .remote_state
                .clone()
                .map(|spec| (node.dir.clone(), spec))
        })
        .collect();
    tgrun_backend::check_key_collisions(&specs).map_err(crate::error::Error::Backend)?;

    let scheduler = scheduler_for(&run.experiments);
    let executor = Arc::new(UnitExecutor::new(run, evaluator, registry));
    Ok(scheduler.run(&graph, executor).await)
}

/// Execute the single unit at the working directory.
pub async fn run_single(run: RunContext, registry: Arc<BackendRegistry>) -> Result<RunReport> {
    let unit_dir = paths::normalize(&run.working_dir);
    let action = run.action.clone();
    let evaluator = Arc::new(Evaluator::new(run.clone()));
    let executor = UnitExecutor::new(run, evaluator, registry);
    let result = executor.execute(&unit_dir, true).await;
    Ok(RunReport::new(&action, vec![result]))
}
