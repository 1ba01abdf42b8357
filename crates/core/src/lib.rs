//! Core types and utilities shared across the tgrun workspace.
//!
//! Everything downstream crates agree on lives here: the error taxonomy,
//! the evaluated configuration model, unit lifecycle states, the run
//! context with its output cache, strict controls, and experiments.

/// Downstream actions and their scheduling properties.
pub mod action;
/// Output and evaluation caches.
pub mod cache;
/// The evaluated per-unit configuration model.
pub mod config;
/// The explicit per-run context.
pub mod context;
/// Shared error types.
pub mod error;
/// Experiment flags.
pub mod experiment;
/// Well-known filenames and path helpers.
pub mod paths;
/// Remote-state specs.
pub mod remote;
/// Strict controls.
pub mod strict;
/// Units and lifecycle states.
pub mod unit;

pub use action::Action;
pub use cache::{CachedOutputs, OutputCache, fingerprint};
pub use config::{
    DependencySpec, ExcludeSpec, ExtraArguments, GenerateFileSpec, HookSpec, IfExists,
    RetryPolicy, TerraformConfig, UnitConfig,
};
pub use context::{ExternalMode, RunContext, default_parallelism};
pub use error::{Error, Result};
pub use experiment::{Experiment, Experiments};
pub use remote::{BackendKind, RemoteStateGenerate, RemoteStateSpec};
pub use strict::{ControlLevel, StrictControl, StrictControls};
pub use unit::{Unit, UnitStatus};
