//! The run path: single-unit and run-all execution of downstream verbs.

use crate::cli::{ActionArgs, GlobalArgs, RunArgs};
use crate::commands::{build_context, discovery_options};
use std::str::FromStr;
use std::sync::Arc;
use tgrun_backend::BackendRegistry;
use tgrun_core::Action;
use tgrun_runner::RunReport;
use tokio_util::sync::CancellationToken;

/// Execute one of the well-known verbs.
pub async fn action(
    global: &GlobalArgs,
    action: Action,
    args: ActionArgs,
    token: CancellationToken,
) -> miette::Result<i32> {
    execute(global, action, args.all, args.passthrough, token).await
}

/// Execute an arbitrary verb via `run [--all] <action>`.
pub async fn arbitrary(
    global: &GlobalArgs,
    args: RunArgs,
    token: CancellationToken,
) -> miette::Result<i32> {
    let action = Action::from_str(&args.action).unwrap_or(Action::Other(args.action.clone()));
    execute(global, action, args.all, args.passthrough, token).await
}

async fn execute(
    global: &GlobalArgs,
    action: Action,
    all: bool,
    passthrough: Vec<String>,
    token: CancellationToken,
) -> miette::Result<i32> {
    let run = build_context(global, action, all, passthrough, token)?;

    if run.action.is_destructive() && run.run_all && !run.non_interactive && !confirm_destroy(&run)? {
        println!("Aborted.");
        return Ok(crate::commands::EXIT_FAILURE);
    }

    let registry = Arc::new(BackendRegistry::with_defaults(&run.experiments));

    let report = if all {
        tgrun_runner::run_all(run, &discovery_options(global), registry).await?
    } else {
        tgrun_runner::run_single(run, registry).await?
    };

    render(&report, all);
    Ok(report.exit_code())
}

/// Ask before tearing down a whole stack.
fn confirm_destroy(run: &tgrun_core::RunContext) -> miette::Result<bool> {
    use std::io::Write;

    print!(
        "About to destroy every unit under {}. Type 'yes' to continue: ",
        run.working_dir.display()
    );
    std::io::stdout()
        .flush()
        .map_err(|err| miette::miette!("cannot prompt: {err}"))?;
    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .map_err(|err| miette::miette!("cannot read confirmation: {err}"))?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

/// Human rendering of the report on stdout; logs carry the detail.
pub fn render(report: &RunReport, all: bool) {
    if all {
        for result in &report.results {
            println!("{:<48} {}", result.dir.display(), result.status);
        }
    }
    println!("{}", report.summary());
    if let Some(failure) = report.failure() {
        eprintln!("{:?}", miette::Report::new(failure));
    }
}
