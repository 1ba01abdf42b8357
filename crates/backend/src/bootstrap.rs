//! The store bootstrap protocol, shared by every remote backend.

use crate::client::{LockClient, StoreClient, StoreProperties};
use crate::error::Result;
use indexmap::IndexMap;

/// Ensure a store exists and is compliant.
///
/// Creating a missing store applies the full desired property set. An
/// existing compliant store is left byte-identical (read-side checks only).
/// A non-compliant store is brought into compliance where doing so is safe
/// (enabling versioning/encryption, blocking public access, adding missing
/// tags); anything else is surfaced as a diagnostic and bootstrap proceeds.
pub async fn ensure_store(
    client: &dyn StoreClient,
    name: &str,
    desired: &StoreProperties,
) -> Result<()> {
    if !client.store_exists(name).await? {
        tracing::info!(store = name, "Creating backing store");
        client.create_store(name, desired).await?;
        return Ok(());
    }

    let current = client.store_properties(name).await?;
    let mut fixed = current.clone();

    if !current.versioning {
        fixed.versioning = true;
    }
    if !current.public_access_blocked {
        fixed.public_access_blocked = true;
    }
    if !current.encryption {
        fixed.encryption = true;
    }
    for (key, value) in &desired.tags {
        if !fixed.tags.contains_key(key) {
            fixed.tags.insert(key.clone(), value.clone());
        }
    }

    if let (Some(wanted), actual) = (&desired.access_logging_target, &current.access_logging_target)
    {
        if actual.as_ref() != Some(wanted) {
            // Retargeting access logs can lose audit trail; never do it
            // unattended.
            tracing::warn!(
                store = name,
                wanted = %wanted,
                actual = actual.as_deref().unwrap_or("<none>"),
                "Store access-logging target differs; leaving it unchanged"
            );
        }
    }

    if fixed != current {
        tracing::info!(store = name, "Bringing backing store into compliance");
        client.update_properties(name, &fixed).await?;
    } else {
        tracing::debug!(store = name, "Backing store already compliant");
    }
    Ok(())
}

/// Ensure the lock table exists with the required tags.
pub async fn ensure_lock_table(
    client: &dyn LockClient,
    name: &str,
    tags: &IndexMap<String, String>,
) -> Result<()> {
    if client.table_exists(name).await? {
        tracing::debug!(table = name, "Lock table present");
        return Ok(());
    }
    tracing::info!(table = name, "Creating lock table");
    client.create_table(name, tags).await
}
