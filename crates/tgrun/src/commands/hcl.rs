//! Configuration-file tooling.

use crate::cli::{GlobalArgs, HclCommand};
use crate::commands::build_context;
use tgrun_config::Evaluator;
use tgrun_core::{Action, paths};
use tgrun_graph::discover_units;
use tokio_util::sync::CancellationToken;

/// Execute an HCL tooling command.
pub fn execute(
    global: &GlobalArgs,
    command: HclCommand,
    token: CancellationToken,
) -> miette::Result<i32> {
    match command {
        HclCommand::Validate => validate(global, token),
    }
}

/// Parse and pass-1-evaluate every discovered configuration, reporting all
/// failures rather than stopping at the first.
fn validate(global: &GlobalArgs, token: CancellationToken) -> miette::Result<i32> {
    let run = build_context(
        global,
        Action::Other("hcl-validate".to_string()),
        true,
        Vec::new(),
        token,
    )?;
    let root = paths::normalize(&run.working_dir);
    let units = discover_units(&root)?;
    let evaluator = Evaluator::new(run);

    let mut failures = 0usize;
    for unit_dir in &units {
        match evaluator.evaluate_partial(unit_dir) {
            Ok(_) => {
                tracing::debug!(unit = %unit_dir.display(), "Configuration valid");
            }
            Err(err) => {
                failures += 1;
                eprintln!("{:?}", miette::Report::new(err));
            }
        }
    }

    println!(
        "Checked {} configuration(s), {} invalid",
        units.len(),
        failures
    );
    Ok(i32::from(failures > 0))
}
