//! Deterministic file generation into unit working directories.
//!
//! Materializes `generate` blocks and the backend block derived from
//! `remote_state` before the downstream binary runs. Files written here
//! carry a signature comment so later runs can tell their own output from
//! user-authored files.

/// Rendering of backend configuration blocks.
pub mod backend_block;
/// Error types.
pub mod error;
/// File materialization with `if_exists` policies.
pub mod generator;

pub use backend_block::{backend_generate_spec, render_backend_block};
pub use error::{Error, Result};
pub use generator::{GeneratedFile, GeneratedFileState, materialize, signature_line};
