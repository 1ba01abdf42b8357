//! Remote-state backends: validation, bootstrap, delete, and migrate.
//!
//! Each backend kind enforces its provider's constraints and drives the
//! shared bootstrap protocol against abstract store/lock clients. Real
//! provider clients are injected by the embedding process; the in-memory
//! client exercises the full protocol in tests.

/// Azure container backend.
pub mod azurerm;
/// The shared bootstrap protocol.
pub mod bootstrap;
/// Provider client traits.
pub mod client;
/// Error taxonomy.
pub mod error;
/// GCS bucket backend.
pub mod gcs;
/// Local filesystem backend.
pub mod local;
/// In-memory provider client for tests.
pub mod memory;
/// The backend trait and registry.
pub mod registry;
/// S3 bucket + DynamoDB backend.
pub mod s3;
/// Naming constraints and config helpers.
pub mod validate;

pub use client::{LockClient, StoreClient, StoreProperties, UnconfiguredClient};
pub use error::{Error, Result};
pub use memory::InMemoryClient;
pub use registry::{Backend, BackendRegistry, check_key_collisions};
