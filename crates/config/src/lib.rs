//! Configuration evaluation for tgrun units.
//!
//! Turns a `terragrunt.hcl` file (plus its include chain) into a fully
//! evaluated [`tgrun_core::UnitConfig`]: locals are resolved in two passes,
//! the function library is available in expressions, dependency outputs come
//! from the cache, the downstream binary, or declared mocks, and include
//! merge strategies combine parent and child configurations.

/// Dependency blocks and output resolution.
pub mod dependency;
/// Error types.
pub mod error;
/// The evaluation pipeline.
pub mod evaluator;
/// Expression helpers and coercions.
pub mod expr;
/// The expression function library.
pub mod functions;
/// Include resolution and merging.
pub mod include;
/// Locals evaluation.
pub mod locals;
/// Raw block extraction.
pub mod raw;
/// Thread-local evaluation scope.
pub mod scope;

pub use error::{Error, Result};
pub use evaluator::{Evaluator, PartialUnit, VALUES_FILENAME};
pub use include::{IncludeSpec, MergeStrategy, deep_merge_values, merge_configs};
pub use raw::RawConfig;
