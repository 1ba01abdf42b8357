//! S3 bucket + DynamoDB lock table backend.

use crate::bootstrap;
use crate::client::{LockClient, StoreClient, StoreProperties, UnconfiguredClient};
use crate::error::Result;
use crate::registry::Backend;
use crate::validate;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tgrun_core::{BackendKind, RemoteStateSpec, RunContext};

/// Remote state in an S3 bucket, optionally locked via a DynamoDB table.
pub struct S3Backend {
    store: Arc<dyn StoreClient>,
    lock: Arc<dyn LockClient>,
}

impl S3Backend {
    /// Backend over the given provider clients.
    pub fn new(store: Arc<dyn StoreClient>, lock: Arc<dyn LockClient>) -> Self {
        Self { store, lock }
    }

    /// Backend without provider clients; any store operation reports an
    /// authentication failure from the default credential chain.
    #[must_use]
    pub fn unconfigured() -> Self {
        let client = Arc::new(UnconfiguredClient::new("aws"));
        Self {
            store: client.clone(),
            lock: client,
        }
    }

    fn desired_properties(spec: &RemoteStateSpec) -> Result<StoreProperties> {
        let tags = validate::tags_from(spec, "s3_bucket_tags")?;
        let mut props = StoreProperties::compliant(tags);
        props.encryption = spec.bool_or("encrypt", true);
        props.access_logging_target = spec
            .optional_str("accesslogging_bucket_name")
            .map(str::to_string);
        Ok(props)
    }
}

#[async_trait]
impl Backend for S3Backend {
    fn kind(&self) -> BackendKind {
        BackendKind::S3
    }

    fn validate(&self, spec: &RemoteStateSpec) -> Result<()> {
        let bucket = validate::required_str(spec, "bucket")?;
        validate::check_s3_bucket_name(bucket)?;
        validate::required_str(spec, "key")?;
        validate::required_str(spec, "region")?;
        validate::tags_from(spec, "s3_bucket_tags")?;
        validate::tags_from(spec, "dynamodb_table_tags")?;
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
        let desired = Self::desired_properties(spec)?;
        bootstrap::ensure_store(self.store.as_ref(), bucket, &desired).await?;

        if let Some(logging_bucket) = spec.optional_str("accesslogging_bucket_name") {
            // The logging target itself needs to exist before logs flow.
            let log_props = StoreProperties::compliant(desired.tags.clone());
            bootstrap::ensure_store(self.store.as_ref(), logging_bucket, &log_props).await?;
        }

        if let Some(table) = spec.optional_str("dynamodb_table") {
            let table_tags = validate::tags_from(spec, "dynamodb_table_tags")?;
            bootstrap::ensure_lock_table(self.lock.as_ref(), table, &table_tags).await?;
        }
        Ok(())
    }

    async fn delete(
        &self,
        _run: &RunContext,
        _unit_dir: &Path,
        spec: &RemoteStateSpec,
    ) -> Result<()> {
        self.validate(spec)?;
        let bucket = validate::required_str(spec, "bucket")?;
        let key = validate::required_str(spec, "key")?;
        tracing::info!(bucket, key, "Deleting state object");
        self.store.delete_object(bucket, key).await
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
        let from_key = validate::required_str(from, "key")?;
        let to_bucket = validate::required_str(to, "bucket")?;
        let to_key = validate::required_str(to, "key")?;

        tracing::info!(
            from = format!("{from_bucket}/{from_key}"),
            to = format!("{to_bucket}/{to_key}"),
            "Migrating state object"
        );
        self.store
            .copy_object((from_bucket, from_key), (to_bucket, to_key))
            .await?;
        self.store.delete_object(from_bucket, from_key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::memory::InMemoryClient;
    use indexmap::IndexMap;
    use tgrun_core::Action;

    fn s3_spec(entries: &[(&str, hcl::Value)]) -> RemoteStateSpec {
        let mut config = IndexMap::new();
        for (key, value) in entries {
            config.insert((*key).to_string(), value.clone());
        }
        RemoteStateSpec {
            backend: BackendKind::S3,
            config,
            disable_bootstrap: false,
            generate: None,
        }
    }

    fn full_spec() -> RemoteStateSpec {
        s3_spec(&[
            ("bucket", hcl::Value::from("team-state")),
            ("key", hcl::Value::from("app/terraform.tfstate")),
            ("region", hcl::Value::from("eu-west-1")),
            ("dynamodb_table", hcl::Value::from("team-locks")),
        ])
    }

    fn backend_with_memory() -> (S3Backend, Arc<InMemoryClient>) {
        let client = Arc::new(InMemoryClient::new());
        (S3Backend::new(client.clone(), client.clone()), client)
    }

    #[test]
    fn validate_requires_bucket_key_region() {
        let (backend, _) = backend_with_memory();
        assert!(backend.validate(&full_spec()).is_ok());

        let missing = s3_spec(&[("bucket", hcl::Value::from("team-state"))]);
        let err = backend.validate(&missing).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("key"));

        let bad_name = s3_spec(&[
            ("bucket", hcl::Value::from("Bad_Bucket")),
            ("key", hcl::Value::from("k")),
            ("region", hcl::Value::from("eu-west-1")),
        ]);
        assert!(backend.validate(&bad_name).is_err());
    }

    #[tokio::test]
    async fn bootstrap_creates_bucket_and_lock_table() {
        let (backend, client) = backend_with_memory();
        let run = RunContext::new("/stack", Action::Apply);
        backend
            .bootstrap(&run, Path::new("/stack/app"), &full_spec())
            .await
            .unwrap();

        let bucket = client.store("team-state").unwrap();
        assert!(bucket.versioning);
        assert!(bucket.public_access_blocked);
        assert!(bucket.encryption);
        assert!(client.has_table("team-locks"));
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let (backend, client) = backend_with_memory();
        let run = RunContext::new("/stack", Action::Apply);
        let spec = full_spec();
        backend
            .bootstrap(&run, Path::new("/stack/app"), &spec)
            .await
            .unwrap();
        let writes = client.write_count();
        backend
            .bootstrap(&run, Path::new("/stack/app"), &spec)
            .await
            .unwrap();
        assert_eq!(client.write_count(), writes, "second bootstrap is read-only");
    }

    #[tokio::test]
    async fn creation_failure_is_store_creation() {
        let (backend, client) = backend_with_memory();
        client.deny_create("team-state");
        let run = RunContext::new("/stack", Action::Apply);
        let err = backend
            .bootstrap(&run, Path::new("/stack/app"), &full_spec())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StoreCreation { .. }));
    }

    #[tokio::test]
    async fn unconfigured_backend_reports_authentication() {
        let backend = S3Backend::unconfigured();
        let run = RunContext::new("/stack", Action::Apply);
        let err = backend
            .bootstrap(&run, Path::new("/stack/app"), &full_spec())
            .await
            .unwrap_err();
        assert!(err.is_authentication());
    }

    #[tokio::test]
    async fn migrate_moves_the_state_object() {
        let (backend, client) = backend_with_memory();
        client.seed_store("team-state", StoreProperties::compliant(IndexMap::new()));
        client.seed_object("team-state", "app/terraform.tfstate");

        let to = s3_spec(&[
            ("bucket", hcl::Value::from("new-state")),
            ("key", hcl::Value::from("app/terraform.tfstate")),
            ("region", hcl::Value::from("eu-west-1")),
        ]);
        let run = RunContext::new("/stack", Action::Apply);
        backend
            .migrate(&run, Path::new("/stack/app"), &full_spec(), &to)
            .await
            .unwrap();

        assert!(client.has_object("new-state", "app/terraform.tfstate"));
        assert!(!client.has_object("team-state", "app/terraform.tfstate"));
    }
}
