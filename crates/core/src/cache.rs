//! Process-wide caches: dependency outputs and evaluated configurations.
//!
//! The output cache is read far more often than it is written (every unit
//! that depends on `D` reads `D`'s outputs), so reads take a striped lock
//! keyed on the unit-path fingerprint while invalidations serialize behind
//! a global write barrier.

use hcl::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, RwLock};

/// Number of lock stripes; power of two so the modulo folds to a mask.
const STRIPE_COUNT: usize = 16;

/// Stable fingerprint of a unit path, used as cache key.
#[must_use]
pub fn fingerprint(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hex::encode(hasher.finalize())
}

/// Cached outputs of one unit, as read from `output -json`.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedOutputs {
    /// Output name → value.
    pub values: Value,
    /// Whether these are mock outputs rather than real state reads.
    pub mocked: bool,
}

/// Process-wide map from unit-path fingerprint to that unit's outputs.
#[derive(Debug)]
pub struct OutputCache {
    stripes: Vec<Mutex<HashMap<String, CachedOutputs>>>,
    barrier: RwLock<()>,
}

impl Default for OutputCache {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stripes: (0..STRIPE_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
            barrier: RwLock::new(()),
        }
    }

    fn stripe_for(&self, key: &str) -> &Mutex<HashMap<String, CachedOutputs>> {
        // Cheap stable hash over the hex fingerprint.
        let index = key
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        &self.stripes[index % STRIPE_COUNT]
    }

    /// Read cached outputs for a unit, if present.
    pub fn get(&self, unit_path: &Path) -> Option<CachedOutputs> {
        let _read = self.barrier.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let key = fingerprint(unit_path);
        let stripe = self.stripe_for(&key).lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        stripe.get(&key).cloned()
    }

    /// Store outputs for a unit, replacing any previous entry.
    pub fn insert(&self, unit_path: &Path, outputs: CachedOutputs) {
        let _read = self.barrier.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let key = fingerprint(unit_path);
        let mut stripe = self.stripe_for(&key).lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        stripe.insert(key, outputs);
    }

    /// Drop the cached outputs for a unit.
    ///
    /// Runs under the global write barrier so no reader observes a
    /// half-invalidated view while an apply/destroy lands.
    pub fn invalidate(&self, unit_path: &Path) {
        let _write = self.barrier.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let key = fingerprint(unit_path);
        let mut stripe = self.stripe_for(&key).lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if stripe.remove(&key).is_some() {
            tracing::debug!(unit = %unit_path.display(), "Invalidated cached outputs");
        }
    }

    /// Number of cached entries, across all stripes.
    pub fn len(&self) -> usize {
        let _read = self.barrier.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.stripes
            .iter()
            .map(|stripe| stripe.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len())
            .sum()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn outputs(value: &str) -> CachedOutputs {
        CachedOutputs {
            values: Value::from(value),
            mocked: false,
        }
    }

    #[test]
    fn fingerprint_is_stable_and_distinct() {
        let a = fingerprint(Path::new("/stack/app1"));
        let b = fingerprint(Path::new("/stack/app1"));
        let c = fingerprint(Path::new("/stack/app2"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn insert_get_invalidate_round_trip() {
        let cache = OutputCache::new();
        let path = PathBuf::from("/stack/vpc");

        assert!(cache.get(&path).is_none());
        cache.insert(&path, outputs("first"));
        assert_eq!(cache.get(&path).unwrap().values, Value::from("first"));

        cache.insert(&path, outputs("second"));
        assert_eq!(cache.get(&path).unwrap().values, Value::from("second"));

        cache.invalidate(&path);
        assert!(cache.get(&path).is_none());
    }

    #[test]
    fn entries_land_in_distinct_stripes() {
        let cache = OutputCache::new();
        for i in 0..64 {
            cache.insert(&PathBuf::from(format!("/stack/unit-{i}")), outputs("x"));
        }
        assert_eq!(cache.len(), 64);
    }

    #[test]
    fn concurrent_readers_and_invalidation() {
        use std::sync::Arc;

        let cache = Arc::new(OutputCache::new());
        let path = PathBuf::from("/stack/db");
        cache.insert(&path, outputs("live"));

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let path = path.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        // Either the live value or nothing; never a torn read.
                        if let Some(hit) = cache.get(&path) {
                            assert_eq!(hit.values, Value::from("live"));
                        }
                    }
                })
            })
            .collect();

        cache.invalidate(&path);
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
