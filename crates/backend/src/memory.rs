//! In-memory provider client, used by the test suites.

use crate::client::{LockClient, StoreClient, StoreProperties};
use crate::error::{Error, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct State {
    stores: HashMap<String, StoreProperties>,
    objects: HashSet<(String, String)>,
    tables: HashMap<String, IndexMap<String, String>>,
    /// Names for which creation is denied, to exercise error paths.
    deny_create: HashSet<String>,
    /// Mutating calls observed, for idempotence assertions.
    writes: u64,
}

/// A fully in-memory store + lock client.
#[derive(Debug, Default)]
pub struct InMemoryClient {
    state: Mutex<State>,
}

impl InMemoryClient {
    /// Empty client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deny creation of the named store or table.
    pub fn deny_create(&self, name: &str) {
        self.lock().deny_create.insert(name.to_string());
    }

    /// Seed an existing store with properties.
    pub fn seed_store(&self, name: &str, props: StoreProperties) {
        self.lock().stores.insert(name.to_string(), props);
    }

    /// Seed an object into a store.
    pub fn seed_object(&self, store: &str, key: &str) {
        self.lock()
            .objects
            .insert((store.to_string(), key.to_string()));
    }

    /// Properties of a store, for assertions.
    #[must_use]
    pub fn store(&self, name: &str) -> Option<StoreProperties> {
        self.lock().stores.get(name).cloned()
    }

    /// Whether the named lock table exists, for assertions.
    #[must_use]
    pub fn has_table(&self, name: &str) -> bool {
        self.lock().tables.contains_key(name)
    }

    /// Whether an object exists, for assertions.
    #[must_use]
    pub fn has_object(&self, store: &str, key: &str) -> bool {
        self.lock()
            .objects
            .contains(&(store.to_string(), key.to_string()))
    }

    /// Number of mutating calls served so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl StoreClient for InMemoryClient {
    async fn store_exists(&self, name: &str) -> Result<bool> {
        Ok(self.lock().stores.contains_key(name))
    }

    async fn create_store(&self, name: &str, props: &StoreProperties) -> Result<()> {
        let mut state = self.lock();
        if state.deny_create.contains(name) {
            return Err(Error::StoreCreation {
                name: name.to_string(),
                cause: "creation denied by policy".to_string(),
            });
        }
        state.writes += 1;
        state.stores.insert(name.to_string(), props.clone());
        Ok(())
    }

    async fn store_properties(&self, name: &str) -> Result<StoreProperties> {
        self.lock()
            .stores
            .get(name)
            .cloned()
            .ok_or_else(|| Error::StoreNotFound {
                name: name.to_string(),
            })
    }

    async fn update_properties(&self, name: &str, props: &StoreProperties) -> Result<()> {
        let mut state = self.lock();
        if !state.stores.contains_key(name) {
            return Err(Error::StoreNotFound {
                name: name.to_string(),
            });
        }
        state.writes += 1;
        state.stores.insert(name.to_string(), props.clone());
        Ok(())
    }

    async fn object_exists(&self, store: &str, key: &str) -> Result<bool> {
        Ok(self
            .lock()
            .objects
            .contains(&(store.to_string(), key.to_string())))
    }

    async fn copy_object(&self, from: (&str, &str), to: (&str, &str)) -> Result<()> {
        let mut state = self.lock();
        let source = (from.0.to_string(), from.1.to_string());
        if !state.objects.contains(&source) {
            return Err(Error::StoreNotFound {
                name: format!("{}/{}", from.0, from.1),
            });
        }
        state.writes += 1;
        state.objects.insert((to.0.to_string(), to.1.to_string()));
        Ok(())
    }

    async fn delete_object(&self, store: &str, key: &str) -> Result<()> {
        let mut state = self.lock();
        state.writes += 1;
        state.objects.remove(&(store.to_string(), key.to_string()));
        Ok(())
    }
}

#[async_trait]
impl LockClient for InMemoryClient {
    async fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.lock().tables.contains_key(name))
    }

    async fn create_table(&self, name: &str, tags: &IndexMap<String, String>) -> Result<()> {
        let mut state = self.lock();
        if state.deny_create.contains(name) {
            return Err(Error::StoreCreation {
                name: name.to_string(),
                cause: "creation denied by policy".to_string(),
            });
        }
        state.writes += 1;
        state.tables.insert(name.to_string(), tags.clone());
        Ok(())
    }
}
