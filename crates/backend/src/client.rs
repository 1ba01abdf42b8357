//! Provider client traits.
//!
//! Cloud SDKs are collaborators behind these interfaces: the bootstrap
//! protocol is written once against them, provider crates supply real
//! implementations, and the in-memory client backs the test suite.

use crate::error::{Error, Result};
use async_trait::async_trait;
use indexmap::IndexMap;

/// Desired or observed properties of a backing store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreProperties {
    /// Object versioning enabled.
    pub versioning: bool,
    /// All public access blocked.
    pub public_access_blocked: bool,
    /// Server-side encryption enabled.
    pub encryption: bool,
    /// Access-logging target store, if configured.
    pub access_logging_target: Option<String>,
    /// Tags/labels applied to the store.
    pub tags: IndexMap<String, String>,
}

impl StoreProperties {
    /// The properties every bootstrapped store must carry.
    #[must_use]
    pub fn compliant(tags: IndexMap<String, String>) -> Self {
        Self {
            versioning: true,
            public_access_blocked: true,
            encryption: true,
            access_logging_target: None,
            tags,
        }
    }
}

/// Object-store operations a backend needs.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Whether the named store exists.
    async fn store_exists(&self, name: &str) -> Result<bool>;
    /// Create the named store with the given properties.
    async fn create_store(&self, name: &str, props: &StoreProperties) -> Result<()>;
    /// Read the store's current properties.
    async fn store_properties(&self, name: &str) -> Result<StoreProperties>;
    /// Update the store's properties in place.
    async fn update_properties(&self, name: &str, props: &StoreProperties) -> Result<()>;
    /// Whether an object exists within a store.
    async fn object_exists(&self, store: &str, key: &str) -> Result<bool>;
    /// Copy one object between stores/keys.
    async fn copy_object(&self, from: (&str, &str), to: (&str, &str)) -> Result<()>;
    /// Delete one object.
    async fn delete_object(&self, store: &str, key: &str) -> Result<()>;
}

/// Lock-table operations a backend needs.
#[async_trait]
pub trait LockClient: Send + Sync {
    /// Whether the named lock table exists.
    async fn table_exists(&self, name: &str) -> Result<bool>;
    /// Create the named lock table with tags.
    async fn create_table(&self, name: &str, tags: &IndexMap<String, String>) -> Result<()>;
}

/// A client that was never configured with credentials. Every call fails
/// with an authentication error naming the credential chain, which is what
/// a default provider chain without credentials reports.
#[derive(Debug, Clone)]
pub struct UnconfiguredClient {
    provider: &'static str,
}

impl UnconfiguredClient {
    /// Client for a named provider.
    #[must_use]
    pub fn new(provider: &'static str) -> Self {
        Self { provider }
    }

    fn unavailable(&self) -> Error {
        Error::Authentication {
            auth_method: format!("{} default credential chain", self.provider),
            cause: "no provider client is configured for this process".to_string(),
        }
    }
}

#[async_trait]
impl StoreClient for UnconfiguredClient {
    async fn store_exists(&self, _name: &str) -> Result<bool> {
        Err(self.unavailable())
    }
    async fn create_store(&self, _name: &str, _props: &StoreProperties) -> Result<()> {
        Err(self.unavailable())
    }
    async fn store_properties(&self, _name: &str) -> Result<StoreProperties> {
        Err(self.unavailable())
    }
    async fn update_properties(&self, _name: &str, _props: &StoreProperties) -> Result<()> {
        Err(self.unavailable())
    }
    async fn object_exists(&self, _store: &str, _key: &str) -> Result<bool> {
        Err(self.unavailable())
    }
    async fn copy_object(&self, _from: (&str, &str), _to: (&str, &str)) -> Result<()> {
        Err(self.unavailable())
    }
    async fn delete_object(&self, _store: &str, _key: &str) -> Result<()> {
        Err(self.unavailable())
    }
}

#[async_trait]
impl LockClient for UnconfiguredClient {
    async fn table_exists(&self, _name: &str) -> Result<bool> {
        Err(self.unavailable())
    }
    async fn create_table(&self, _name: &str, _tags: &IndexMap<String, String>) -> Result<()> {
        Err(self.unavailable())
    }
}
