//! The explicit per-run context threaded through every subsystem.
//!
//! There are no ambient globals: the evaluator, graph builder, scheduler,
//! and backends all receive a [`RunContext`] carrying the action, the
//! cancellation token, the shared output cache, and run-wide knobs. The
//! context is built once before the scheduler starts and is read-only
//! afterwards, except for the explicit cache-invalidation methods.

use crate::action::Action;
use crate::cache::{CachedOutputs, OutputCache};
use crate::experiment::Experiments;
use crate::strict::StrictControls;
use hcl::Value;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// How dependencies outside the discovered queue are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExternalMode {
    /// Leave external units out entirely.
    #[default]
    Ignore,
    /// Report external units in the plan but never execute them.
    PlanOnly,
    /// Pull external units into the queue and execute them.
    Include,
}

/// Context for one invocation, from CLI parse to exit.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Root directory of the run.
    pub working_dir: PathBuf,
    /// The downstream action being executed.
    pub action: Action,
    /// Passthrough arguments after `--`.
    pub extra_args: Vec<String>,
    /// Whether this is a run-all invocation across the queue.
    pub run_all: bool,
    /// Maximum concurrently running units.
    pub parallelism: usize,
    /// Suppress interactive prompts.
    pub non_interactive: bool,
    /// Run `init` automatically before the first action in a unit.
    pub auto_init: bool,
    /// Honor per-unit retry policies.
    pub auto_retry: bool,
    /// Local module source overriding each unit's `terraform.source`.
    pub source_override: Option<PathBuf>,
    /// Re-materialize cached sources even when present.
    pub source_update: bool,
    /// Path to the downstream binary.
    pub tf_path: PathBuf,
    /// Provider plugin cache directory handed to the downstream binary.
    pub provider_cache_dir: Option<PathBuf>,
    /// Feature-flag overrides from `--feature KEY=VAL`.
    pub features: IndexMap<String, Value>,
    /// Strict-control settings.
    pub strict: StrictControls,
    /// Enabled experiments.
    pub experiments: Experiments,
    /// External-dependency handling.
    pub external_mode: ExternalMode,
    /// Cooperative cancellation token, observed at every suspension point.
    pub token: CancellationToken,
    cache: Arc<OutputCache>,
}

impl RunContext {
    /// Create a context with defaults for everything but dir and action.
    #[must_use]
    pub fn new(working_dir: impl Into<PathBuf>, action: Action) -> Self {
        Self {
            working_dir: working_dir.into(),
            action,
            extra_args: Vec::new(),
            run_all: false,
            parallelism: default_parallelism(),
            non_interactive: false,
            auto_init: true,
            auto_retry: true,
            source_override: None,
            source_update: false,
            tf_path: PathBuf::from("terraform"),
            provider_cache_dir: None,
            features: IndexMap::new(),
            strict: StrictControls::new(),
            experiments: Experiments::none(),
            external_mode: ExternalMode::Ignore,
            token: CancellationToken::new(),
            cache: Arc::new(OutputCache::new()),
        }
    }

    /// Builder-style run-all toggle.
    #[must_use]
    pub fn with_run_all(mut self, run_all: bool) -> Self {
        self.run_all = run_all;
        self
    }

    /// Builder-style parallelism override.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Builder-style downstream-binary override.
    #[must_use]
    pub fn with_tf_path(mut self, tf_path: impl Into<PathBuf>) -> Self {
        self.tf_path = tf_path.into();
        self
    }

    /// Read cached outputs for a producer unit.
    #[must_use]
    pub fn outputs(&self, unit_path: &Path) -> Option<CachedOutputs> {
        self.cache.get(unit_path)
    }

    /// Store outputs for a producer unit.
    pub fn store_outputs(&self, unit_path: &Path, outputs: CachedOutputs) {
        self.cache.insert(unit_path, outputs);
    }

    /// Explicitly drop cached outputs for a unit. Called after an
    /// apply/destroy completes on it, never as a hidden side effect.
    pub fn invalidate_outputs(&self, unit_path: &Path) {
        self.cache.invalidate(unit_path);
    }

    /// Handle to the shared output cache.
    #[must_use]
    pub fn output_cache(&self) -> Arc<OutputCache> {
        Arc::clone(&self.cache)
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Default worker count: one per available CPU.
#[must_use]
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}
