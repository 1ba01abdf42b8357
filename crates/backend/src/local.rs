//! Local filesystem backend: no shared store, no locking.

use crate::error::{Error, Result};
use crate::registry::Backend;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tgrun_core::{BackendKind, RemoteStateSpec, RunContext, paths};

/// State kept in a file under the unit's working directory.
#[derive(Debug, Default)]
pub struct LocalBackend;

impl LocalBackend {
    /// New local backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn state_path(unit_dir: &Path, spec: &RemoteStateSpec) -> PathBuf {
        let raw = spec.optional_str("path").unwrap_or("terraform.tfstate");
        paths::resolve(unit_dir, Path::new(raw))
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn validate(&self, spec: &RemoteStateSpec) -> Result<()> {
        if let Some(path) = spec.config.get("path") {
            if path.as_str().is_none() {
                return Err(Error::config("field 'path' must be a string"));
            }
        }
        Ok(())
    }

    async fn bootstrap(
        &self,
        _run: &RunContext,
        unit_dir: &Path,
        spec: &RemoteStateSpec,
    ) -> Result<()> {
        self.validate(spec)?;
        let state = Self::state_path(unit_dir, spec);
        if let Some(parent) = state.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|err| Error::Io {
                source: err,
                operation: format!("create state directory {}", parent.display()),
            })?;
        }
        Ok(())
    }

    async fn delete(
        &self,
        _run: &RunContext,
        unit_dir: &Path,
        spec: &RemoteStateSpec,
    ) -> Result<()> {
        let state = Self::state_path(unit_dir, spec);
        match tokio::fs::remove_file(&state).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::Io {
                source: err,
                operation: format!("delete state file {}", state.display()),
            }),
        }
    }

    async fn migrate(
        &self,
        run: &RunContext,
        unit_dir: &Path,
        from: &RemoteStateSpec,
        to: &RemoteStateSpec,
    ) -> Result<()> {
        self.bootstrap(run, unit_dir, to).await?;
        let from_path = Self::state_path(unit_dir, from);
        let to_path = Self::state_path(unit_dir, to);
        if from_path == to_path {
            return Ok(());
        }
        if !from_path.is_file() {
            return Err(Error::StoreNotFound {
                name: from_path.display().to_string(),
            });
        }
        tokio::fs::rename(&from_path, &to_path)
            .await
            .map_err(|err| Error::Io {
                source: err,
                operation: format!(
                    "move state {} -> {}",
                    from_path.display(),
                    to_path.display()
                ),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use tgrun_core::Action;

    fn local_spec(path: Option<&str>) -> RemoteStateSpec {
        let mut config = IndexMap::new();
        if let Some(p) = path {
            config.insert("path".to_string(), hcl::Value::from(p));
        }
        RemoteStateSpec {
            backend: BackendKind::Local,
            config,
            disable_bootstrap: false,
            generate: None,
        }
    }

    #[tokio::test]
    async fn bootstrap_creates_parent_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new();
        let run = RunContext::new(tmp.path(), Action::Apply);
        backend
            .bootstrap(&run, tmp.path(), &local_spec(Some("state/env/terraform.tfstate")))
            .await
            .unwrap();
        assert!(tmp.path().join("state/env").is_dir());
    }

    #[tokio::test]
    async fn delete_tolerates_missing_state() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new();
        let run = RunContext::new(tmp.path(), Action::Destroy);
        backend
            .delete(&run, tmp.path(), &local_spec(None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn migrate_moves_state_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("terraform.tfstate"), "{}").unwrap();
        let backend = LocalBackend::new();
        let run = RunContext::new(tmp.path(), Action::Apply);
        backend
            .migrate(
                &run,
                tmp.path(),
                &local_spec(None),
                &local_spec(Some("archive/terraform.tfstate")),
            )
            .await
            .unwrap();
        assert!(tmp.path().join("archive/terraform.tfstate").is_file());
        assert!(!tmp.path().join("terraform.tfstate").exists());
    }
}
