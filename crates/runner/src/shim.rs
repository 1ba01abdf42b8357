//! The downstream subprocess shim.
//!
//! Invokes the IaC binary with a working directory, augmented environment,
//! and passthrough arguments; streams output while capturing it; honors
//! cancellation and per-invocation deadlines with graceful termination.

use crate::error::{Error, Result};
use hcl::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tgrun_core::Action;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Grace period between the termination signal and a hard kill.
const TERMINATION_GRACE: Duration = Duration::from_secs(10);

/// Which downstream flavor the binary is, by basename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// HashiCorp Terraform.
    Terraform,
    /// OpenTofu.
    OpenTofu,
}

impl Flavor {
    /// Detect the flavor from the binary path's basename.
    #[must_use]
    pub fn from_binary(binary: &Path) -> Self {
        let basename = binary
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        if basename.contains("tofu") {
            Self::OpenTofu
        } else {
            Self::Terraform
        }
    }
}

/// One downstream invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// The verb.
    pub action: Action,
    /// Arguments after the verb.
    pub args: Vec<String>,
    /// Working directory (the materialized unit directory).
    pub working_dir: PathBuf,
    /// Extra environment entries.
    pub env: Vec<(String, String)>,
    /// Optional wall-clock deadline.
    pub deadline: Option<Duration>,
}

/// Result of one downstream invocation.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Process exit code.
    pub exit_code: i32,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Wall-clock duration.
    pub duration: Duration,
    /// `plan -detailed-exitcode` reported pending changes (exit 2).
    pub changes_pending: bool,
}

impl Outcome {
    /// Whether the invocation counts as successful.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0 || self.changes_pending
    }
}

/// The downstream binary, flavor-aware.
#[derive(Debug, Clone)]
pub struct Shim {
    binary: PathBuf,
    flavor: Flavor,
}

impl Shim {
    /// Shim over the given binary path.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        let binary = binary.into();
        let flavor = Flavor::from_binary(&binary);
        Self { binary, flavor }
    }

    /// The detected flavor.
    #[must_use]
    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// Run the downstream binary, streaming and capturing output.
    ///
    /// Cancellation and deadline expiry terminate the subprocess with a
    /// signal, a grace period, then a kill.
    pub async fn invoke(&self, token: &CancellationToken, invocation: Invocation) -> Result<Outcome> {
        let mut command = Command::new(&self.binary);
        command
            .arg(invocation.action.name())
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &invocation.env {
            command.env(key, value);
        }

        tracing::info!(
            binary = %self.binary.display(),
            action = invocation.action.name(),
            workdir = %invocation.working_dir.display(),
            "Invoking downstream binary"
        );

        let start = Instant::now();
        let mut child = command.spawn().map_err(|err| Error::Subprocess {
            source: err,
            operation: format!("spawn {} {}", self.binary.display(), invocation.action),
        })?;

        let stdout_task = stream_lines(child.stdout.take(), "stdout");
        let stderr_task = stream_lines(child.stderr.take(), "stderr");

        let deadline = invocation.deadline.unwrap_or(Duration::MAX);
        let status = tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::warn!(action = invocation.action.name(), "Cancellation requested; terminating subprocess");
                terminate(&mut child).await;
                return Err(tgrun_core::Error::Cancelled.into());
            }
            () = tokio::time::sleep(deadline), if invocation.deadline.is_some() => {
                tracing::warn!(action = invocation.action.name(), "Deadline expired; terminating subprocess");
                terminate(&mut child).await;
                return Err(tgrun_core::Error::Timeout { seconds: deadline.as_secs() }.into());
            }
            status = child.wait() => status.map_err(|err| Error::Subprocess {
                source: err,
                operation: format!("wait for {}", invocation.action),
            })?,
        };

        let stdout = stdout_task.await.unwrap_or_default().join("\n");
        let stderr = stderr_task.await.unwrap_or_default().join("\n");
        let exit_code = status.code().unwrap_or(-1);
        let changes_pending = exit_code == 2
            && invocation.action.honors_detailed_exitcode()
            && invocation.args.iter().any(|arg| arg == "-detailed-exitcode");

        let outcome = Outcome {
            exit_code,
            stdout,
            stderr,
            duration: start.elapsed(),
            changes_pending,
        };
        tracing::debug!(
            action = invocation.action.name(),
            exit = outcome.exit_code,
            changes_pending = outcome.changes_pending,
            duration_ms = outcome.duration.as_millis() as u64,
            "Downstream invocation finished"
        );
        Ok(outcome)
    }
}

/// Stream a pipe line-by-line into the log while collecting it.
fn stream_lines<R>(
    pipe: Option<R>,
    channel: &'static str,
) -> tokio::task::JoinHandle<Vec<String>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = Vec::new();
        if let Some(pipe) = pipe {
            let mut reader = BufReader::new(pipe).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                tracing::info!(target: "tgrun::downstream", channel, "{line}");
                lines.push(line);
            }
        }
        lines
    })
}

/// Signal, wait out the grace period, then kill.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SIGTERM first so the downstream binary can release its state lock.
        // SAFETY: plain syscall on a pid we own.
        #[allow(unsafe_code)]
        unsafe {
            libc::kill(pid as i32, libc::SIGTERM);
        }
        if tokio::time::timeout(TERMINATION_GRACE, child.wait()).await.is_ok() {
            return;
        }
        tracing::warn!("Subprocess survived the grace period; killing");
    }
    let _ = child.kill().await;
}

/// Encode unit inputs as `TF_VAR_*` environment entries. Strings pass
/// through raw; everything else is JSON-encoded.
#[must_use]
pub fn input_env(inputs: &indexmap::IndexMap<String, Value>) -> Vec<(String, String)> {
    inputs
        .iter()
        .map(|(name, value)| {
            let encoded = match value {
                Value::String(s) => s.clone(),
                other => serde_json::to_string(other).unwrap_or_default(),
            };
            (format!("TF_VAR_{name}"), encoded)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn flavor_detection_by_basename() {
        assert_eq!(Flavor::from_binary(Path::new("/usr/bin/terraform")), Flavor::Terraform);
        assert_eq!(Flavor::from_binary(Path::new("/opt/tofu")), Flavor::OpenTofu);
        assert_eq!(Flavor::from_binary(Path::new("tofu-1.8")), Flavor::OpenTofu);
    }

    #[test]
    fn input_env_encodes_complex_values_as_json() {
        let mut inputs = IndexMap::new();
        inputs.insert("name".to_string(), Value::from("app"));
        inputs.insert("count".to_string(), Value::from(3));
        let mut tags = hcl::Map::new();
        tags.insert("env".to_string(), Value::from("prod"));
        inputs.insert("tags".to_string(), Value::Object(tags));

        let env = input_env(&inputs);
        assert_eq!(env[0], ("TF_VAR_name".to_string(), "app".to_string()));
        assert_eq!(env[1], ("TF_VAR_count".to_string(), "3".to_string()));
        assert_eq!(env[2].0, "TF_VAR_tags");
        assert_eq!(env[2].1, r#"{"env":"prod"}"#);
    }

    #[tokio::test]
    async fn invoke_captures_output_and_exit_code() {
        let tmp = tempfile::tempdir().unwrap();
        let script = tmp.path().join("fake-tf");
        std::fs::write(&script, "#!/bin/sh\necho out-$1\necho err >&2\nexit 0\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let shim = Shim::new(&script);
        let outcome = shim
            .invoke(
                &CancellationToken::new(),
                Invocation {
                    action: Action::Plan,
                    args: vec![],
                    working_dir: tmp.path().to_path_buf(),
                    env: vec![],
                    deadline: None,
                },
            )
            .await
            .unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.stdout, "out-plan");
        assert_eq!(outcome.stderr, "err");
    }

    #[tokio::test]
    async fn detailed_exitcode_two_is_success_with_changes() {
        let tmp = tempfile::tempdir().unwrap();
        let script = tmp.path().join("fake-tf");
        std::fs::write(&script, "#!/bin/sh\nexit 2\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let shim = Shim::new(&script);
        let with_flag = shim
            .invoke(
                &CancellationToken::new(),
                Invocation {
                    action: Action::Plan,
                    args: vec!["-detailed-exitcode".to_string()],
                    working_dir: tmp.path().to_path_buf(),
                    env: vec![],
                    deadline: None,
                },
            )
            .await
            .unwrap();
        assert!(with_flag.success());
        assert!(with_flag.changes_pending);

        // Without the flag, exit 2 is a plain failure.
        let without_flag = shim
            .invoke(
                &CancellationToken::new(),
                Invocation {
                    action: Action::Plan,
                    args: vec![],
                    working_dir: tmp.path().to_path_buf(),
                    env: vec![],
                    deadline: None,
                },
            )
            .await
            .unwrap();
        assert!(!without_flag.success());
        assert!(!without_flag.changes_pending);
    }

    #[tokio::test]
    async fn cancellation_terminates_subprocess() {
        let tmp = tempfile::tempdir().unwrap();
        let script = tmp.path().join("fake-tf");
        std::fs::write(&script, "#!/bin/sh\nsleep 60\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });

        let shim = Shim::new(&script);
        let started = Instant::now();
        let err = shim
            .invoke(
                &token,
                Invocation {
                    action: Action::Apply,
                    args: vec![],
                    working_dir: tmp.path().to_path_buf(),
                    env: vec![],
                    deadline: None,
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(30));
    }
}
