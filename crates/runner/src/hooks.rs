//! Before/after hook execution.

use crate::error::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tgrun_core::HookSpec;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// When a hook set runs relative to the downstream command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Before the downstream command.
    Before,
    /// After the downstream command.
    After,
}

/// Captured result of one hook.
#[derive(Debug, Clone)]
pub struct HookOutcome {
    /// Hook label.
    pub name: String,
    /// Exit code.
    pub exit_code: i32,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Run the hooks of one kind that match the action.
///
/// Before-hooks abort on first failure. After-hooks honor `run_on_error`:
/// when `command_failed` is set, only hooks with `run_on_error` fire, and a
/// failing after-hook is reported but does not mask the original failure.
pub async fn run_hooks(
    kind: HookKind,
    hooks: &[HookSpec],
    action: &str,
    unit_dir: &Path,
    command_failed: bool,
    token: &CancellationToken,
) -> Result<Vec<HookOutcome>> {
    let mut outcomes = Vec::new();

    for hook in hooks {
        if !hook.applies_to(action) {
            continue;
        }
        if kind == HookKind::After && command_failed && !hook.run_on_error {
            tracing::debug!(hook = hook.name, "Skipping after-hook: command failed");
            continue;
        }

        let outcome = run_one(hook, unit_dir, token).await?;
        let failed = outcome.exit_code != 0;
        tracing::info!(
            hook = hook.name,
            exit = outcome.exit_code,
            duration_ms = outcome.duration_ms,
            "Hook finished"
        );
        outcomes.push(outcome);

        if failed {
            if kind == HookKind::Before {
                return Err(Error::hook(
                    &hook.name,
                    unit_dir,
                    format!("exit code {}", outcomes.last().map_or(-1, |o| o.exit_code)),
                ));
            }
            // After-hook failures are reported but never mask the command
            // outcome.
            tracing::warn!(hook = hook.name, "After-hook failed");
        }
    }

    Ok(outcomes)
}

async fn run_one(
    hook: &HookSpec,
    unit_dir: &Path,
    token: &CancellationToken,
) -> Result<HookOutcome> {
    let Some((program, args)) = hook.execute.split_first() else {
        return Err(Error::hook(&hook.name, unit_dir, "empty execute list"));
    };
    let workdir = hook
        .working_dir
        .as_ref()
        .map_or_else(|| unit_dir.to_path_buf(), |dir| unit_dir.join(dir));

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(&workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(hook = hook.name, program, workdir = %workdir.display(), "Running hook");
    let start = Instant::now();
    let output = tokio::select! {
        () = token.cancelled() => return Err(tgrun_core::Error::Cancelled.into()),
        result = command.output() => result.map_err(|err| Error::Subprocess {
            source: err,
            operation: format!("hook '{}' ({program})", hook.name),
        })?,
    };

    Ok(HookOutcome {
        name: hook.name.clone(),
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn hook(name: &str, commands: &[&str], execute: &[&str], run_on_error: bool) -> HookSpec {
        HookSpec {
            name: name.to_string(),
            commands: commands.iter().map(|s| (*s).to_string()).collect(),
            execute: execute.iter().map(|s| (*s).to_string()).collect(),
            working_dir: None,
            run_on_error,
        }
    }

    #[tokio::test]
    async fn hooks_fire_only_for_matching_actions() {
        let tmp = tempfile::tempdir().unwrap();
        let hooks = vec![
            hook("on-plan", &["plan"], &["true"], false),
            hook("on-apply", &["apply"], &["true"], false),
        ];
        let outcomes = run_hooks(
            HookKind::Before,
            &hooks,
            "plan",
            tmp.path(),
            false,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].name, "on-plan");
    }

    #[tokio::test]
    async fn before_hook_failure_aborts() {
        let tmp = tempfile::tempdir().unwrap();
        let hooks = vec![
            hook("fails", &["plan"], &["false"], false),
            hook("never-runs", &["plan"], &["true"], false),
        ];
        let err = run_hooks(
            HookKind::Before,
            &hooks,
            "plan",
            tmp.path(),
            false,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("fails"));
    }

    #[tokio::test]
    async fn after_hooks_honor_run_on_error() {
        let tmp = tempfile::tempdir().unwrap();
        let hooks = vec![
            hook("always", &["apply"], &["true"], true),
            hook("on-success-only", &["apply"], &["true"], false),
        ];

        let after_failure = run_hooks(
            HookKind::After,
            &hooks,
            "apply",
            tmp.path(),
            true,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(after_failure.len(), 1);
        assert_eq!(after_failure[0].name, "always");

        let after_success = run_hooks(
            HookKind::After,
            &hooks,
            "apply",
            tmp.path(),
            false,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(after_success.len(), 2);
    }

    #[tokio::test]
    async fn hook_output_is_captured() {
        let tmp = tempfile::tempdir().unwrap();
        let hooks = vec![hook("echoes", &["plan"], &["echo", "hello"], false)];
        let outcomes = run_hooks(
            HookKind::Before,
            &hooks,
            "plan",
            tmp.path(),
            false,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcomes[0].stdout.trim(), "hello");
    }
}
