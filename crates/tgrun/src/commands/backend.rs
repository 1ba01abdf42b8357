//! Backend operations: bootstrap, delete, migrate.

use crate::cli::{BackendCommand, GlobalArgs};
use crate::commands::build_context;
use std::path::Path;
use tgrun_backend::BackendRegistry;
use tgrun_config::Evaluator;
use tgrun_core::{Action, RemoteStateSpec, RunContext, paths};
use tokio_util::sync::CancellationToken;

/// Execute a backend operation for the unit at the working directory.
pub async fn execute(
    global: &GlobalArgs,
    command: BackendCommand,
    token: CancellationToken,
) -> miette::Result<i32> {
    let verb = match &command {
        BackendCommand::Bootstrap => "bootstrap",
        BackendCommand::Delete => "delete",
        BackendCommand::Migrate { .. } => "migrate",
    };
    let run = build_context(
        global,
        Action::Other(format!("backend-{verb}")),
        false,
        Vec::new(),
        token,
    )?;
    let unit_dir = paths::normalize(&run.working_dir);
    let registry = BackendRegistry::with_defaults(&run.experiments);

    let spec = remote_state_of(&run, &unit_dir)?;
    let backend = registry.get(spec.backend)?;

    match command {
        BackendCommand::Bootstrap => {
            backend.bootstrap(&run, &unit_dir, &spec).await?;
            println!("Backend '{}' ready", spec.backend);
        }
        BackendCommand::Delete => {
            backend.delete(&run, &unit_dir, &spec).await?;
            println!("State removed from backend '{}'", spec.backend);
        }
        BackendCommand::Migrate { destination } => {
            let dest_dir = paths::resolve(&unit_dir, &destination);
            let target = remote_state_of(&run, &dest_dir)?;
            if target.backend != spec.backend {
                return Err(miette::miette!(
                    "cannot migrate between backend kinds {} and {}",
                    spec.backend,
                    target.backend
                ));
            }
            backend.migrate(&run, &unit_dir, &spec, &target).await?;
            println!(
                "State migrated to the backend of {}",
                dest_dir.display()
            );
        }
    }
    Ok(0)
}

fn remote_state_of(run: &RunContext, unit_dir: &Path) -> miette::Result<RemoteStateSpec> {
    let evaluator = Evaluator::new(run.clone());
    let partial = evaluator.evaluate_partial(unit_dir)?;
    partial.remote_state.ok_or_else(|| {
        miette::miette!(
            "{} declares no resolvable remote_state block",
            unit_dir.display()
        )
    })
}
