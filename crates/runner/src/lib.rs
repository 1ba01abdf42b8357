//! Scheduling and execution of units.
//!
//! The run queue tracks every unit's lifecycle; schedulers drive the
//! action across the graph in topological order with bounded parallelism
//! and deterministic failure propagation; the executor performs each
//! unit's pre-flight side effects (remote state, source materialization,
//! file generation, hooks) and invokes the downstream binary through the
//! shim with retry.

/// Error types.
pub mod error;
/// Per-unit execution.
pub mod executor;
/// Hook execution.
pub mod hooks;
/// Top-level run wiring.
pub mod orchestrate;
/// The run queue state machine.
pub mod queue;
/// Run reports.
pub mod report;
/// Retry classification.
pub mod retry;
/// Queue schedulers.
pub mod scheduler;
/// The downstream subprocess shim.
pub mod shim;
/// Module-source materialization.
pub mod source;

pub use error::{Error, Result};
pub use executor::{UnitExecutor, UnitRunResult};
pub use orchestrate::{run_all, run_single};
pub use queue::RunQueue;
pub use report::RunReport;
pub use scheduler::{QueueScheduler, RunnerPoolScheduler, WorkerPoolScheduler, scheduler_for};
pub use shim::{Flavor, Invocation, Outcome, Shim};
