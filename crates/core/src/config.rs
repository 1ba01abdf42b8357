//! The evaluated per-unit configuration model.
//!
//! The evaluator in `tgrun-config` produces one [`UnitConfig`] per unit;
//! every other subsystem consumes it read-only. Mapping-valued fields use
//! insertion-order-preserving maps so code generation stays deterministic.

use crate::remote::RemoteStateSpec;
use hcl::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Fully evaluated configuration of a single unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitConfig {
    /// Input variables forwarded to the downstream binary (`TF_VAR_*`).
    pub inputs: IndexMap<String, Value>,
    /// Declared dependencies on other units.
    pub dependencies: Vec<DependencySpec>,
    /// Remote-state backend spec, if the unit declares one.
    pub remote_state: Option<RemoteStateSpec>,
    /// Files to materialize into the working directory before running.
    pub generate: Vec<GenerateFileSpec>,
    /// Downstream invocation settings (source, extra args, hooks).
    pub terraform: TerraformConfig,
    /// Exclusion rule, if declared.
    pub exclude: Option<ExcludeSpec>,
    /// Evaluated feature flags, by name.
    pub feature_flags: IndexMap<String, Value>,
    /// Retry policy for downstream invocations.
    pub retry: RetryPolicy,
    /// Evaluated locals, exposed to configs read via `read_terragrunt_config`.
    pub locals: IndexMap<String, Value>,
}

impl UnitConfig {
    /// Paths of all declared dependencies, in declaration order.
    pub fn dependency_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.dependencies.iter().map(|dep| &dep.config_path)
    }

    /// Look up a dependency block by its label.
    #[must_use]
    pub fn dependency(&self, name: &str) -> Option<&DependencySpec> {
        self.dependencies.iter().find(|dep| dep.name == name)
    }

    /// The extra-argument blocks applying to an action.
    #[must_use]
    pub fn extra_arguments_for(&self, action: &str) -> Vec<&ExtraArguments> {
        self.terraform
            .extra_arguments
            .iter()
            .filter(|extra| extra.commands.iter().any(|cmd| cmd == action))
            .collect()
    }
}

/// A `dependency "<name>"` block after evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Block label; referenced as `dependency.<name>.outputs` in expressions.
    pub name: String,
    /// Absolute path of the producer unit's directory.
    pub config_path: PathBuf,
    /// Skip reading outputs entirely (the edge still orders execution).
    pub skip_outputs: bool,
    /// Stand-in outputs used when the producer has no state yet.
    pub mock_outputs: Option<Value>,
    /// Actions for which mock outputs may substitute for real ones.
    pub mock_outputs_allowed_commands: Vec<String>,
}

impl DependencySpec {
    /// Whether mocks may stand in for outputs under the given action.
    #[must_use]
    pub fn mocks_allowed_for(&self, action: &str) -> bool {
        self.mock_outputs.is_some()
            && self
                .mock_outputs_allowed_commands
                .iter()
                .any(|cmd| cmd == action)
    }
}

/// The `terraform { ... }` block: how the downstream binary is invoked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerraformConfig {
    /// Module source to materialize into the cache dir before running.
    pub source: Option<String>,
    /// Extra CLI arguments keyed to specific downstream commands.
    pub extra_arguments: Vec<ExtraArguments>,
    /// Hooks executed before the downstream command.
    pub before_hooks: Vec<HookSpec>,
    /// Hooks executed after the downstream command.
    pub after_hooks: Vec<HookSpec>,
}

/// An `extra_arguments "<name>"` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraArguments {
    /// Block label; used for include-merge identity.
    pub name: String,
    /// Downstream commands the arguments apply to.
    pub commands: Vec<String>,
    /// Arguments appended to the downstream invocation.
    pub arguments: Vec<String>,
    /// Environment variables set for the invocation.
    pub env_vars: IndexMap<String, String>,
}

/// A `before_hook`/`after_hook "<name>"` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookSpec {
    /// Block label; used for include-merge identity.
    pub name: String,
    /// Downstream commands that trigger this hook.
    pub commands: Vec<String>,
    /// Command line to execute (program followed by arguments).
    pub execute: Vec<String>,
    /// Working directory override; defaults to the unit's working directory.
    pub working_dir: Option<PathBuf>,
    /// For after-hooks: fire even when the downstream command failed.
    pub run_on_error: bool,
}

impl HookSpec {
    /// Whether the hook fires for the given action.
    #[must_use]
    pub fn applies_to(&self, action: &str) -> bool {
        self.commands.iter().any(|cmd| cmd == action)
    }
}

/// Retry policy for failed downstream invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total invocation attempts, including the first (>= 1).
    pub max_attempts: u32,
    /// Seconds slept between attempts.
    pub sleep_between_seconds: u64,
    /// Regex patterns matched against stderr to classify transient failures.
    pub retryable_patterns: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            sleep_between_seconds: 0,
            retryable_patterns: Vec::new(),
        }
    }
}

impl RetryPolicy {
    /// Whether any retry behavior is configured at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 1 && !self.retryable_patterns.is_empty()
    }
}

/// The `exclude { ... }` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExcludeSpec {
    /// Condition gating the whole block.
    pub condition: bool,
    /// Actions the exclusion applies to.
    pub actions: Vec<String>,
    /// In single-unit mode: exit early with `Skipped` instead of running.
    pub no_run: bool,
    /// In run-all mode: also exclude transitive in-queue dependencies.
    pub exclude_dependencies: bool,
}

impl ExcludeSpec {
    /// Whether the block matches the given action at all.
    #[must_use]
    pub fn matches(&self, action: &str) -> bool {
        self.condition && self.actions.iter().any(|a| a == action)
    }

    /// Run-all exclusion: `no_run` is deliberately ignored here.
    #[must_use]
    pub fn excludes_in_run_all(&self, action: &str) -> bool {
        self.matches(action)
    }

    /// Single-unit early exit: only when `no_run` is set as well.
    #[must_use]
    pub fn skips_single_run(&self, action: &str) -> bool {
        self.matches(action) && self.no_run
    }
}

/// Policy for a generated file that already exists on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IfExists {
    /// Replace any existing file.
    Overwrite,
    /// Replace only files carrying the generation signature.
    #[default]
    OverwriteTerragrunt,
    /// Leave existing content untouched.
    Skip,
    /// Fail the unit before any subprocess is spawned.
    Error,
}

impl IfExists {
    /// The configuration-surface spelling of this policy.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overwrite => "overwrite",
            Self::OverwriteTerragrunt => "overwrite_terragrunt",
            Self::Skip => "skip",
            Self::Error => "error",
        }
    }
}

impl FromStr for IfExists {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "overwrite" => Ok(Self::Overwrite),
            "overwrite_terragrunt" => Ok(Self::OverwriteTerragrunt),
            "skip" => Ok(Self::Skip),
            "error" => Ok(Self::Error),
            other => Err(format!(
                "unknown if_exists value '{other}' (expected overwrite, overwrite_terragrunt, skip, or error)"
            )),
        }
    }
}

/// A `generate "<name>"` block after evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateFileSpec {
    /// Block label.
    pub name: String,
    /// Target path, relative to the unit's working directory.
    pub path: PathBuf,
    /// What to do when the target file already exists.
    pub if_exists: IfExists,
    /// Comment leader used for the signature line.
    pub comment_prefix: String,
    /// Suppress the signature comment entirely.
    pub disable_signature: bool,
    /// File contents.
    pub contents: String,
}

impl GenerateFileSpec {
    /// Default comment leader for generated files.
    pub const DEFAULT_COMMENT_PREFIX: &'static str = "# ";
}
