//! Unit discovery and dependency graph construction.
//!
//! Walks a working directory for unit configurations, applies queue
//! filters, follows dependency references (classifying out-of-queue units
//! as external), and builds a validated DAG whose topological order drives
//! the scheduler. Cycles are fatal and reported with every vertex.

/// Graph construction.
pub mod builder;
/// Filesystem discovery and queue filters.
pub mod discovery;
/// Error types.
pub mod error;

pub use builder::{UnitGraph, UnitNode};
pub use discovery::{DiscoveryOptions, QueueFilter, discover_units};
pub use error::{Error, Result};
