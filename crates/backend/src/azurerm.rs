//! Azure storage-container backend (experiment-gated).

use crate::bootstrap;
use crate::client::{StoreClient, StoreProperties, UnconfiguredClient};
use crate::error::Result;
use crate::registry::Backend;
use crate::validate;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tgrun_core::{BackendKind, RemoteStateSpec, RunContext};

/// Remote state in an Azure blob container. Registration is gated on the
/// `azure-backend` experiment; validation is always available.
pub struct AzureRmBackend {
    store: Arc<dyn StoreClient>,
}

impl AzureRmBackend {
    /// Backend over the given provider client.
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self { store }
    }

    /// Backend without a provider client.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self {
            store: Arc::new(UnconfiguredClient::new("azure")),
        }
    }

    /// Container addressing combines account and container name.
    fn store_id(spec: &RemoteStateSpec) -> Result<String> {
        let account = validate::required_str(spec, "storage_account_name")?;
        let container = validate::required_str(spec, "container_name")?;
        Ok(format!("{account}/{container}"))
    }
}

#[async_trait]
impl Backend for AzureRmBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::AzureRm
    }

    fn validate(&self, spec: &RemoteStateSpec) -> Result<()> {
        validate::required_str(spec, "storage_account_name")?;
        let container = validate::required_str(spec, "container_name")?;
        validate::check_container_name(container)?;
        validate::required_str(spec, "key")?;
        Ok(())
    }

    async fn bootstrap(
        &self,
        _run: &RunContext,
        _unit_dir: &Path,
        spec: &RemoteStateSpec,
    ) -> Result<()> {
        self.validate(spec)?;
        let store_id = Self::store_id(spec)?;
        let desired = StoreProperties::compliant(validate::tags_from(spec, "tags")?);
        bootstrap::ensure_store(self.store.as_ref(), &store_id, &desired).await
    }

    async fn delete(
        &self,
        _run: &RunContext,
        _unit_dir: &Path,
        spec: &RemoteStateSpec,
    ) -> Result<()> {
        self.validate(spec)?;
        let store_id = Self::store_id(spec)?;
        let key = validate::required_str(spec, "key")?;
        tracing::info!(container = store_id, key, "Deleting state blob");
        self.store.delete_object(&store_id, key).await
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
        let from_id = Self::store_id(from)?;
        let from_key = validate::required_str(from, "key")?;
        let to_id = Self::store_id(to)?;
        let to_key = validate::required_str(to, "key")?;
        self.store
            .copy_object((&from_id, from_key), (&to_id, to_key))
            .await?;
        self.store.delete_object(&from_id, from_key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryClient;
    use indexmap::IndexMap;
    use tgrun_core::Action;

    fn azure_spec(container: &str) -> RemoteStateSpec {
        let mut config = IndexMap::new();
        config.insert(
            "storage_account_name".to_string(),
            hcl::Value::from("prodstate"),
        );
        config.insert("container_name".to_string(), hcl::Value::from(container));
        config.insert("key".to_string(), hcl::Value::from("app.tfstate"));
        RemoteStateSpec {
            backend: BackendKind::AzureRm,
            config,
            disable_bootstrap: false,
            generate: None,
        }
    }

    #[test]
    fn container_name_constraints_enforced() {
        let backend = AzureRmBackend::unconfigured();
        assert!(backend.validate(&azure_spec("tfstate-prod")).is_ok());
        assert!(backend.validate(&azure_spec("Bad")).is_err());
        assert!(backend.validate(&azure_spec("a--b")).is_err());
    }

    #[tokio::test]
    async fn bootstrap_addresses_account_scoped_container() {
        let client = Arc::new(InMemoryClient::new());
        let backend = AzureRmBackend::new(client.clone());
        let run = RunContext::new("/stack", Action::Apply);
        backend
            .bootstrap(&run, Path::new("/stack/app"), &azure_spec("tfstate-prod"))
            .await
            .unwrap();
        assert!(client.store("prodstate/tfstate-prod").is_some());
    }
}
