//! The command-line surface.

use crate::tracing::{LogFormat, LogLevel};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Orchestrates IaC units: evaluates configuration, derives the dependency
/// graph, and drives the downstream binary across the stack.
#[derive(Debug, Parser)]
#[command(name = "tgrun", version, about, propagate_version = true)]
pub struct Cli {
    /// Global flags, valid on every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// The verb to execute.
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Flags shared by every verb.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Root directory of the run.
    #[arg(long, global = true, default_value = ".")]
    pub working_dir: PathBuf,

    /// Log verbosity.
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::KeyValue)]
    pub log_format: LogFormat,

    /// Never prompt; assume safe defaults.
    #[arg(long, global = true)]
    pub non_interactive: bool,

    /// Maximum concurrently running units (default: CPU count).
    #[arg(long, global = true, value_name = "N")]
    pub parallelism: Option<usize>,

    /// Restrict the queue to units matching this glob. Repeatable.
    #[arg(long = "queue-include-dir", global = true, value_name = "GLOB")]
    pub queue_include_dir: Vec<String>,

    /// Drop units matching this glob from the queue. Repeatable.
    #[arg(long = "queue-exclude-dir", global = true, value_name = "GLOB")]
    pub queue_exclude_dir: Vec<String>,

    /// Queue exactly the include globs; do not pull in dependencies.
    #[arg(long, global = true)]
    pub queue_strict_include: bool,

    /// Execute external dependencies instead of ignoring them.
    #[arg(long, global = true, conflicts_with = "queue_ignore_external")]
    pub queue_include_external: bool,

    /// Silently ignore external dependencies.
    #[arg(long, global = true)]
    pub queue_ignore_external: bool,

    /// Feature-flag override as KEY=VALUE. Repeatable.
    #[arg(long = "feature", global = true, value_name = "KEY=VALUE")]
    pub feature: Vec<String>,

    /// Promote every strict control to an error.
    #[arg(long, global = true)]
    pub strict_mode: bool,

    /// Promote one named strict control to an error. Repeatable.
    #[arg(long = "strict-control", global = true, value_name = "NAME")]
    pub strict_control: Vec<String>,

    /// Local module source overriding every unit's terraform.source.
    #[arg(long, global = true, value_name = "PATH")]
    pub source: Option<PathBuf>,

    /// Re-materialize cached module sources.
    #[arg(long, global = true)]
    pub source_update: bool,

    /// Do not run init automatically before the first action in a unit.
    #[arg(long, global = true)]
    pub no_auto_init: bool,

    /// Ignore per-unit retry policies.
    #[arg(long, global = true)]
    pub no_auto_retry: bool,

    /// Path to the downstream binary; the basename selects the flavor.
    #[arg(long, global = true, env = "TG_TF_PATH")]
    pub tf_path: Option<PathBuf>,
}

/// All verbs.
#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Show the execution plan.
    Plan(ActionArgs),
    /// Apply the configuration.
    Apply(ActionArgs),
    /// Destroy managed infrastructure (reverse dependency order).
    Destroy(ActionArgs),
    /// Read unit outputs.
    Output(ActionArgs),
    /// Validate the downstream configuration.
    Validate(ActionArgs),
    /// Initialize the unit's backend and providers.
    Init(ActionArgs),
    /// Reconcile state with reality.
    Refresh(ActionArgs),
    /// Run an arbitrary downstream action.
    Run(RunArgs),
    /// Stack composition: generate, run, or clean materialized units.
    Stack {
        /// Stack operation.
        #[command(subcommand)]
        command: StackCommand,
    },
    /// List discovered units and their dependencies.
    Find(FindArgs),
    /// Operate on a unit's remote-state backend.
    Backend {
        /// Backend operation.
        #[command(subcommand)]
        command: BackendCommand,
    },
    /// Configuration-file tooling.
    Hcl {
        /// HCL operation.
        #[command(subcommand)]
        command: HclCommand,
    },
}

/// Arguments common to the well-known verbs.
#[derive(Debug, Clone, Args, Default)]
pub struct ActionArgs {
    /// Run across every unit under the working directory.
    #[arg(long)]
    pub all: bool,

    /// Arguments passed through to the downstream binary.
    #[arg(last = true, value_name = "ARGS")]
    pub passthrough: Vec<String>,
}

/// `run [--all] <action> [-- args...]`.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Run across every unit under the working directory.
    #[arg(long)]
    pub all: bool,

    /// The downstream action to execute.
    pub action: String,

    /// Arguments passed through to the downstream binary.
    #[arg(last = true, value_name = "ARGS")]
    pub passthrough: Vec<String>,
}

/// Stack operations.
#[derive(Debug, Subcommand)]
pub enum StackCommand {
    /// Expand unit templates into `.terragrunt-stack/`.
    Generate,
    /// Generate, then run an action across the materialized stack.
    Run {
        /// The downstream action to execute.
        action: String,
        /// Arguments passed through to the downstream binary.
        #[arg(last = true, value_name = "ARGS")]
        passthrough: Vec<String>,
    },
    /// Remove the `.terragrunt-stack/` materialization.
    Clean,
}

/// `find` output options.
#[derive(Debug, Clone, Args)]
pub struct FindArgs {
    /// Emit a JSON array instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Backend operations on the unit at the working directory.
#[derive(Debug, Subcommand)]
pub enum BackendCommand {
    /// Create or repair the unit's backing store.
    Bootstrap,
    /// Remove the unit's state object from its store.
    Delete,
    /// Move the unit's state to another unit's backend spec.
    Migrate {
        /// Directory of the unit whose remote-state spec is the target.
        #[arg(long, value_name = "DIR")]
        destination: PathBuf,
    },
}

/// HCL tooling.
#[derive(Debug, Subcommand)]
pub enum HclCommand {
    /// Parse and pass-1-evaluate every discovered configuration.
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn plan_all_with_passthrough() {
        let cli = parse(&[
            "tgrun",
            "plan",
            "--all",
            "--working-dir",
            "/stack",
            "--",
            "-detailed-exitcode",
        ]);
        match cli.command {
            CliCommand::Plan(args) => {
                assert!(args.all);
                assert_eq!(args.passthrough, vec!["-detailed-exitcode"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.global.working_dir, PathBuf::from("/stack"));
    }

    #[test]
    fn run_all_arbitrary_action() {
        let cli = parse(&["tgrun", "run", "--all", "state", "--", "list"]);
        match cli.command {
            CliCommand::Run(args) => {
                assert!(args.all);
                assert_eq!(args.action, "state");
                assert_eq!(args.passthrough, vec!["list"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn queue_filters_are_repeatable() {
        let cli = parse(&[
            "tgrun",
            "apply",
            "--queue-include-dir",
            "envs/prod/**",
            "--queue-include-dir",
            "shared",
            "--queue-exclude-dir",
            "**/legacy",
            "--queue-strict-include",
        ]);
        assert_eq!(cli.global.queue_include_dir.len(), 2);
        assert_eq!(cli.global.queue_exclude_dir.len(), 1);
        assert!(cli.global.queue_strict_include);
    }

    #[test]
    fn external_flags_conflict() {
        let err = Cli::try_parse_from([
            "tgrun",
            "plan",
            "--queue-include-external",
            "--queue-ignore-external",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn stack_and_backend_subcommands_parse() {
        let cli = parse(&["tgrun", "stack", "run", "apply"]);
        assert!(matches!(
            cli.command,
            CliCommand::Stack {
                command: StackCommand::Run { .. }
            }
        ));

        let cli = parse(&["tgrun", "backend", "migrate", "--destination", "../other"]);
        assert!(matches!(
            cli.command,
            CliCommand::Backend {
                command: BackendCommand::Migrate { .. }
            }
        ));
    }
}
