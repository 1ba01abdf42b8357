//! Google Cloud Storage backend.

use crate::bootstrap;
use crate::client::{StoreClient, StoreProperties, UnconfiguredClient};
use crate::error::Result;
use crate::registry::Backend;
use crate::validate;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tgrun_core::{BackendKind, RemoteStateSpec, RunContext};

/// Remote state in a GCS bucket. Locking is handled natively by the store,
/// so no separate lock client is involved.
pub struct GcsBackend {
    store: Arc<dyn StoreClient>,
}

impl GcsBackend {
    /// Backend over the given provider client.
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self { store }
    }

    /// Backend without a provider client.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self {
            store: Arc::new(UnconfiguredClient::new("gcp")),
        }
    }
}

#[async_trait]
impl Backend for GcsBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gcs
    }

    fn validate(&self, spec: &RemoteStateSpec) -> Result<()> {
        let bucket = validate::required_str(spec, "bucket")?;
        validate::check_gcs_bucket_name(bucket)?;
        validate::required_str(spec, "prefix")?;
        validate::tags_from(spec, "gcs_bucket_labels")?;
        Ok(())
    }

    async fn bootstrap(
        &self,
        _run: &RunContext,
        _unit_dir: &Path,
        spec: &RemoteStateSpec,
    ) -> Result<()> {
        self.validate(spec)?;
        let bucket = validate::required_str(spec, "bucket")?;
        let labels = validate::tags_from(spec, "gcs_bucket_labels")?;
        let desired = StoreProperties::compliant(labels);
        bootstrap::ensure_store(self.store.as_ref(), bucket, &desired).await
    }

    async fn delete(
        &self,
        _run: &RunContext,
        _unit_dir: &Path,
        spec: &RemoteStateSpec,
    ) -> Result<()> {
        self.validate(spec)?;
        let bucket = validate::required_str(spec, "bucket")?;
        let prefix = validate::required_str(spec, "prefix")?;
        tracing::info!(bucket, prefix, "Deleting state object");
        self.store.delete_object(bucket, prefix).await
    }

    async fn migrate(
        &self,
        run: &RunContext,
        unit_dir: &Path,
        from: &RemoteStateSpec,
        to: &RemoteStateSpec,
    ) -> Result<()> {
        self.validate(from)?;
        self.bootstrap(run, unit_dir, to).await?;
        let from_bucket = validate::required_str(from, "bucket")?;
        let from_prefix = validate::required_str(from, "prefix")?;
        let to_bucket = validate::required_str(to, "bucket")?;
        let to_prefix = validate::required_str(to, "prefix")?;
        self.store
            .copy_object((from_bucket, from_prefix), (to_bucket, to_prefix))
            .await?;
        self.store.delete_object(from_bucket, from_prefix).await
    }
}
