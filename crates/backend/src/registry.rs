//! The backend capability trait and the per-kind registry.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tgrun_core::experiment::Experiment;
use tgrun_core::{BackendKind, Experiments, RemoteStateSpec, RunContext};

/// The capability set every remote-state backend provides.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Which backend family this implements.
    fn kind(&self) -> BackendKind;

    /// Syntactic and provider-constraint validation of a spec. Pure.
    fn validate(&self, spec: &RemoteStateSpec) -> Result<()>;

    /// Ensure the backing store exists, is compliant, and is accessible.
    /// Idempotent: a compliant store sees read-side checks only.
    async fn bootstrap(
        &self,
        run: &RunContext,
        unit_dir: &Path,
        spec: &RemoteStateSpec,
    ) -> Result<()>;

    /// Remove the unit's state object from the store.
    async fn delete(&self, run: &RunContext, unit_dir: &Path, spec: &RemoteStateSpec)
    -> Result<()>;

    /// Move state between two specs of this backend kind.
    async fn migrate(
        &self,
        run: &RunContext,
        unit_dir: &Path,
        from: &RemoteStateSpec,
        to: &RemoteStateSpec,
    ) -> Result<()>;
}

/// Registry mapping backend kinds to implementations.
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<BackendKind, Arc<dyn Backend>>,
}

impl BackendRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the stock backends. Cloud backends run against the
    /// process's configured provider clients (unconfigured by default, in
    /// which case bootstrap reports an authentication failure); `azurerm`
    /// requires its experiment flag.
    #[must_use]
    pub fn with_defaults(experiments: &Experiments) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::local::LocalBackend::new()));
        registry.register(Arc::new(crate::s3::S3Backend::unconfigured()));
        registry.register(Arc::new(crate::gcs::GcsBackend::unconfigured()));
        if experiments.is_enabled(Experiment::AzureBackend) {
            registry.register(Arc::new(crate::azurerm::AzureRmBackend::unconfigured()));
        }
        registry
    }

    /// Register (or replace) a backend implementation.
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.backends.insert(backend.kind(), backend);
    }

    /// Look up the backend for a kind.
    pub fn get(&self, kind: BackendKind) -> Result<Arc<dyn Backend>> {
        self.backends.get(&kind).cloned().ok_or_else(|| {
            let reason = if kind == BackendKind::AzureRm {
                "enable the azure-backend experiment".to_string()
            } else {
                "no implementation registered".to_string()
            };
            Error::Unsupported {
                backend: kind.as_str().to_string(),
                reason,
            }
        })
    }
}

/// Reject two units that share a backing store without distinct state keys.
///
/// Specs of different backend kinds never collide; within a kind the
/// `(store, key)` pair must be unique.
pub fn check_key_collisions(specs: &[(PathBuf, RemoteStateSpec)]) -> Result<()> {
    let mut seen: HashMap<(BackendKind, String, String), &PathBuf> = HashMap::new();
    for (unit, spec) in specs {
        let Some(store) = spec.store_name() else {
            continue;
        };
        let key = spec.state_key().map_err(Error::config)?;
        let identity = (spec.backend, store.to_string(), key.to_string());
        if let Some(previous) = seen.get(&identity) {
            return Err(Error::KeyCollision {
                first: previous.display().to_string(),
                second: unit.display().to_string(),
                store: store.to_string(),
                key: key.to_string(),
            });
        }
        seen.insert(identity, unit);
    }
    Ok(())
}
