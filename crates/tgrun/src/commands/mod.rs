//! Command handlers and run-context construction.

/// Backend operations.
pub mod backend;
/// Unit listing.
pub mod find;
/// HCL tooling.
pub mod hcl;
/// The run path shared by every downstream verb.
pub mod run;
/// Stack composition commands.
pub mod stack;

use crate::cli::{Cli, CliCommand, GlobalArgs};
use std::path::PathBuf;
use tgrun_core::paths;
use tgrun_core::strict::{ControlLevel, StrictControl, StrictControls};
use tgrun_core::{Action, Experiments, ExternalMode, RunContext};
use tgrun_graph::DiscoveryOptions;
use tokio_util::sync::CancellationToken;

/// Exit code for configuration or execution errors.
pub const EXIT_FAILURE: i32 = 1;

/// Route a parsed invocation to its handler and return the exit code.
pub async fn dispatch(cli: Cli, token: CancellationToken) -> i32 {
    let global = cli.global.clone();
    let result = match cli.command {
        CliCommand::Plan(args) => run::action(&global, Action::Plan, args, token).await,
        CliCommand::Apply(args) => run::action(&global, Action::Apply, args, token).await,
        CliCommand::Destroy(args) => run::action(&global, Action::Destroy, args, token).await,
        CliCommand::Output(args) => run::action(&global, Action::Output, args, token).await,
        CliCommand::Validate(args) => run::action(&global, Action::Validate, args, token).await,
        CliCommand::Init(args) => run::action(&global, Action::Init, args, token).await,
        CliCommand::Refresh(args) => run::action(&global, Action::Refresh, args, token).await,
        CliCommand::Run(args) => run::arbitrary(&global, args, token).await,
        CliCommand::Stack { command } => stack::execute(&global, command, token).await,
        CliCommand::Find(args) => find::execute(&global, &args, token),
        CliCommand::Backend { command } => backend::execute(&global, command, token).await,
        CliCommand::Hcl { command } => hcl::execute(&global, command, token),
    };

    match result {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            EXIT_FAILURE
        }
    }
}

/// Build the run context from global flags and the chosen action.
pub fn build_context(
    global: &GlobalArgs,
    action: Action,
    run_all: bool,
    passthrough: Vec<String>,
    token: CancellationToken,
) -> miette::Result<RunContext> {
    let strict = build_strict_controls(global)?;
    check_deprecated_env(&strict)?;

    let mut run = RunContext::new(global.working_dir.clone(), action)
        .with_run_all(run_all)
        .with_tf_path(resolve_tf_path(global, &strict)?);
    run.extra_args = passthrough;
    run.non_interactive = global.non_interactive;
    run.auto_init = !global.no_auto_init;
    run.auto_retry = !global.no_auto_retry;
    run.source_override = global.source.clone();
    run.source_update = global.source_update;
    run.strict = strict;
    run.experiments = Experiments::from_env();
    run.external_mode = external_mode(global);
    run.token = token;
    if let Some(parallelism) = global.parallelism {
        run = run.with_parallelism(parallelism);
    }
    if provider_cache_enabled() {
        run.provider_cache_dir = Some(
            run.working_dir
                .join(paths::CACHE_DIR_NAME)
                .join("providers"),
        );
    }

    for entry in &global.feature {
        let (key, value) = entry.split_once('=').ok_or_else(|| {
            miette::miette!("--feature takes KEY=VALUE, got '{entry}'")
        })?;
        run.features.insert(key.to_string(), parse_flag_value(value));
    }

    Ok(run)
}

/// Discovery options from the queue flags.
#[must_use]
pub fn discovery_options(global: &GlobalArgs) -> DiscoveryOptions {
    DiscoveryOptions {
        include_dirs: global.queue_include_dir.clone(),
        exclude_dirs: global.queue_exclude_dir.clone(),
        strict_include: global.queue_strict_include,
    }
}

fn build_strict_controls(global: &GlobalArgs) -> miette::Result<StrictControls> {
    let mut strict = if global.strict_mode {
        StrictControls::strict_mode()
    } else {
        StrictControls::new()
    };
    for name in &global.strict_control {
        let control: StrictControl = name
            .parse()
            .map_err(|cause: String| miette::miette!("{cause}"))?;
        strict.set(control, ControlLevel::Error);
    }
    Ok(strict)
}

/// Deprecated `TERRAGRUNT_*` variables are accepted with a warning unless
/// the control forbids them.
fn check_deprecated_env(strict: &StrictControls) -> miette::Result<()> {
    for (key, _) in std::env::vars() {
        if key.starts_with(paths::DEPRECATED_ENV_PREFIX) {
            let replacement = format!(
                "{}{}",
                paths::ENV_PREFIX,
                key.trim_start_matches(paths::DEPRECATED_ENV_PREFIX)
            );
            strict
                .check(
                    StrictControl::DeprecatedEnvVars,
                    format!("{key} is deprecated; use {replacement}"),
                )
                .map_err(miette::Report::new)?;
        }
    }
    Ok(())
}

fn resolve_tf_path(global: &GlobalArgs, strict: &StrictControls) -> miette::Result<PathBuf> {
    if let Some(tf_path) = &global.tf_path {
        return Ok(tf_path.clone());
    }
    if let Ok(deprecated) = std::env::var("TERRAGRUNT_TF_PATH") {
        strict
            .check(
                StrictControl::DeprecatedEnvVars,
                "TERRAGRUNT_TF_PATH is deprecated; use TG_TF_PATH",
            )
            .map_err(miette::Report::new)?;
        return Ok(PathBuf::from(deprecated));
    }
    Ok(PathBuf::from("terraform"))
}

fn external_mode(global: &GlobalArgs) -> ExternalMode {
    if global.queue_include_external {
        ExternalMode::Include
    } else if global.queue_ignore_external {
        ExternalMode::Ignore
    } else {
        ExternalMode::PlanOnly
    }
}

fn provider_cache_enabled() -> bool {
    std::env::var("TG_PROVIDER_CACHE")
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Feature values accept bools and integers; anything else is a string.
fn parse_flag_value(raw: &str) -> ::hcl::Value {
    match raw {
        "true" => ::hcl::Value::from(true),
        "false" => ::hcl::Value::from(false),
        _ => raw
            .parse::<i64>()
            .map_or_else(|_| ::hcl::Value::from(raw), ::hcl::Value::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global() -> GlobalArgs {
        use clap::Parser;
        crate::cli::Cli::try_parse_from(["tgrun", "plan"]).unwrap().global
    }

    #[test]
    fn feature_values_are_typed() {
        assert_eq!(parse_flag_value("true"), ::hcl::Value::from(true));
        assert_eq!(parse_flag_value("42"), ::hcl::Value::from(42));
        assert_eq!(parse_flag_value("blue"), ::hcl::Value::from("blue"));
    }

    #[test]
    fn context_defaults() {
        let run = build_context(
            &global(),
            Action::Plan,
            true,
            vec!["-detailed-exitcode".to_string()],
            CancellationToken::new(),
        )
        .unwrap();
        assert!(run.run_all);
        assert!(run.auto_init);
        assert_eq!(run.extra_args, vec!["-detailed-exitcode"]);
        assert_eq!(run.external_mode, ExternalMode::PlanOnly);
    }

    #[test]
    fn strict_control_names_are_validated() {
        let mut args = global();
        args.strict_control = vec!["no-such-control".to_string()];
        assert!(build_strict_controls(&args).is_err());

        args.strict_control = vec!["deprecated-env-vars".to_string()];
        let strict = build_strict_controls(&args).unwrap();
        assert_eq!(
            strict.level(StrictControl::DeprecatedEnvVars),
            ControlLevel::Error
        );
    }
}
