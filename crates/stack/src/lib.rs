//! Stack composition: `terragrunt.stack.hcl` files instantiate unit
//! templates into `.terragrunt-stack/` trees that the scheduler then treats
//! like hand-authored units.

/// Stack file parsing and materialization.
pub mod compose;
/// Error types.
pub mod error;

pub use compose::{StackFile, UnitTemplate, clean, generate};
pub use error::{Error, Result};
