//! Per-unit execution: the pre-flight side effects and the downstream run.

use crate::error::{Error, Result};
use crate::hooks::{self, HookKind};
use crate::retry::RetrySet;
use crate::shim::{self, Invocation, Shim};
use crate::source;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tgrun_backend::BackendRegistry;
use tgrun_config::Evaluator;
use tgrun_core::config::UnitConfig;
use tgrun_core::{RetryPolicy, RunContext, UnitStatus};

/// Final record of one unit's execution.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UnitRunResult {
    /// Unit directory.
    pub dir: PathBuf,
    /// Terminal status.
    pub status: UnitStatus,
    /// Downstream invocation attempts (0 when nothing was spawned).
    pub attempts: u32,
    /// Final downstream exit code, when a subprocess ran.
    pub exit_code: Option<i32>,
    /// Wall-clock milliseconds.
    pub duration_ms: u64,
    /// `plan -detailed-exitcode` reported pending changes.
    pub changes_pending: bool,
    /// Error rendering, when the unit failed.
    pub error: Option<String>,
}

impl UnitRunResult {
    /// A result for a unit that never ran.
    #[must_use]
    pub fn unexecuted(dir: PathBuf, status: UnitStatus) -> Self {
        Self {
            dir,
            status,
            attempts: 0,
            exit_code: None,
            duration_ms: 0,
            changes_pending: false,
            error: None,
        }
    }
}

/// Executes single units against the run context.
pub struct UnitExecutor {
    run: RunContext,
    evaluator: Arc<Evaluator>,
    registry: Arc<BackendRegistry>,
    shim: Shim,
}

impl UnitExecutor {
    /// Build an executor sharing the run's evaluator and backend registry.
    #[must_use]
    pub fn new(run: RunContext, evaluator: Arc<Evaluator>, registry: Arc<BackendRegistry>) -> Self {
        let shim = Shim::new(&run.tf_path);
        Self {
            run,
            evaluator,
            registry,
            shim,
        }
    }

    /// The run context.
    #[must_use]
    pub fn run(&self) -> &RunContext {
        &self.run
    }

    /// Execute one unit to a terminal status. Errors are folded into the
    /// result; only the caller decides whether they end the whole run.
    pub async fn execute(&self, unit_dir: &Path, single_mode: bool) -> UnitRunResult {
        let start = Instant::now();
        let result = self.try_execute(unit_dir, single_mode).await;
        match result {
            Ok(mut outcome) => {
                outcome.duration_ms = start.elapsed().as_millis() as u64;
                outcome
            }
            Err(err) => {
                let status = if err.is_cancelled() {
                    UnitStatus::Cancelled
                } else {
                    UnitStatus::Failed
                };
                let exit_code = match &err {
                    Error::Execution { exit_code, .. } => Some(*exit_code),
                    _ => None,
                };
                tracing::error!(unit = %unit_dir.display(), error = %err, "Unit failed");
                UnitRunResult {
                    dir: unit_dir.to_path_buf(),
                    status,
                    attempts: 0,
                    exit_code,
                    duration_ms: start.elapsed().as_millis() as u64,
                    changes_pending: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn try_execute(&self, unit_dir: &Path, single_mode: bool) -> Result<UnitRunResult> {
        let action = self.run.action.clone();
        let config = self.evaluator.evaluate(unit_dir).await?;

        if single_mode {
            if let Some(exclude) = &config.exclude {
                if exclude.skips_single_run(action.name()) {
                    tracing::info!(unit = %unit_dir.display(), "Unit excludes itself (no_run); exiting early");
                    return Ok(UnitRunResult::unexecuted(
                        unit_dir.to_path_buf(),
                        UnitStatus::EarlyExited,
                    ));
                }
            }
        }

        self.ensure_remote_state(unit_dir, &config).await?;
        let workdir = source::prepare_working_dir(
            &self.run,
            unit_dir,
            config.terraform.source.as_deref(),
        )?;
        self.generate_files(&workdir, &config)?;

        hooks::run_hooks(
            HookKind::Before,
            &config.terraform.before_hooks,
            action.name(),
            &workdir,
            false,
            &self.run.token,
        )
        .await?;

        if self.run.auto_init
            && action != tgrun_core::Action::Init
            && !workdir.join(".terraform").is_dir()
        {
            let init_outcome = self
                .shim
                .invoke(&self.run.token, self.invocation(tgrun_core::Action::Init, &workdir, &config))
                .await?;
            if !init_outcome.success() {
                return Err(Error::execution(
                    unit_dir,
                    "init",
                    init_outcome.exit_code,
                    &init_outcome.stderr,
                ));
            }
        }

        let retry = if self.run.auto_retry {
            RetrySet::compile(&config.retry)?
        } else {
            RetrySet::compile(&RetryPolicy::default())?
        };

        let invocation = self.invocation(action.clone(), &workdir, &config);
        let shim = &self.shim;
        let token = &self.run.token;
        let (outcome, attempts) = retry
            .run(|| {
                let invocation = invocation.clone();
                async move { shim.invoke(token, invocation).await }
            })
            .await?;

        let command_failed = !outcome.success();
        hooks::run_hooks(
            HookKind::After,
            &config.terraform.after_hooks,
            action.name(),
            &workdir,
            command_failed,
            &self.run.token,
        )
        .await?;

        if command_failed {
            return Err(Error::execution(
                unit_dir,
                action.name(),
                outcome.exit_code,
                &outcome.stderr,
            ));
        }

        if action.mutates_state() {
            // Post-apply/destroy values must be re-read, never served stale.
            self.evaluator.invalidate(unit_dir);
        }

        Ok(UnitRunResult {
            dir: unit_dir.to_path_buf(),
            status: UnitStatus::Succeeded,
            attempts,
            exit_code: Some(outcome.exit_code),
            duration_ms: 0,
            changes_pending: outcome.changes_pending,
            error: None,
        })
    }

    async fn ensure_remote_state(&self, unit_dir: &Path, config: &UnitConfig) -> Result<()> {
        let Some(spec) = &config.remote_state else {
            return Ok(());
        };
        let backend = self.registry.get(spec.backend)?;
        backend.validate(spec)?;
        if spec.disable_bootstrap {
            tracing::debug!(unit = %unit_dir.display(), "Remote-state bootstrap disabled");
            return Ok(());
        }
        backend.bootstrap(&self.run, unit_dir, spec).await?;
        Ok(())
    }

    fn generate_files(&self, workdir: &Path, config: &UnitConfig) -> Result<()> {
        let mut specs = config.generate.clone();
        if let Some(remote) = &config.remote_state {
            if let Some(backend_file) = tgrun_codegen::backend_generate_spec(remote) {
                specs.push(backend_file);
            }
        }
        if specs.is_empty() {
            return Ok(());
        }
        tgrun_codegen::materialize(workdir, &specs)?;
        Ok(())
    }

    fn invocation(
        &self,
        action: tgrun_core::Action,
        workdir: &Path,
        config: &UnitConfig,
    ) -> Invocation {
        let mut args = Vec::new();
        let mut env = shim::input_env(&config.inputs);
        for extra in config.extra_arguments_for(action.name()) {
            args.extend(extra.arguments.iter().cloned());
            env.extend(
                extra
                    .env_vars
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone())),
            );
        }
        args.extend(self.run.extra_args.iter().cloned());
        if let Some(cache_dir) = &self.run.provider_cache_dir {
            env.push((
                "TF_PLUGIN_CACHE_DIR".to_string(),
                cache_dir.to_string_lossy().into_owned(),
            ));
        }

        Invocation {
            action,
            args,
            working_dir: workdir.to_path_buf(),
            env,
            deadline: None,
        }
    }
}
