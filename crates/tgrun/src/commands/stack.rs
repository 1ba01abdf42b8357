//! Stack composition commands.

use crate::cli::{GlobalArgs, StackCommand};
use crate::commands::{build_context, discovery_options};
use std::str::FromStr;
use std::sync::Arc;
use tgrun_backend::BackendRegistry;
use tgrun_core::Action;
use tgrun_stack::StackFile;
use tokio_util::sync::CancellationToken;

/// Execute a stack operation rooted at the working directory.
pub async fn execute(
    global: &GlobalArgs,
    command: StackCommand,
    token: CancellationToken,
) -> miette::Result<i32> {
    match command {
        StackCommand::Generate => {
            let stack = StackFile::load(&global.working_dir)?;
            let generated = tgrun_stack::generate(&stack)?;
            println!("Generated {} unit(s) in {}", generated.len(), stack.output_dir().display());
            Ok(0)
        }
        StackCommand::Run {
            action,
            passthrough,
        } => {
            let stack = StackFile::load(&global.working_dir)?;
            tgrun_stack::generate(&stack)?;

            let action = Action::from_str(&action).unwrap_or(Action::Other(action));
            let mut run = build_context(global, action, true, passthrough, token)?;
            // Generated units are the queue; everything else is untouched.
            run.working_dir = stack.output_dir();
            let registry = Arc::new(BackendRegistry::with_defaults(&run.experiments));
            let report =
                tgrun_runner::run_all(run, &discovery_options(global), registry).await?;
            crate::commands::run::render(&report, true);
            Ok(report.exit_code())
        }
        StackCommand::Clean => {
            tgrun_stack::clean(&global.working_dir)?;
            Ok(0)
        }
    }
}
