//! Error taxonomy for remote-state backends.

use miette::Diagnostic;
use thiserror::Error;

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while validating, bootstrapping, or mutating backing
/// stores. Callers match on kind: an authentication failure is handled
/// differently from a store-side validation issue.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A required configuration field is absent or mistyped.
    #[error("Backend configuration: {message}")]
    #[diagnostic(code(tgrun::backend::missing_required_config))]
    MissingRequiredConfig {
        /// What is missing or wrong.
        message: String,
    },

    /// Credentials could not be acquired.
    #[error("Authentication via {auth_method} failed: {cause}")]
    #[diagnostic(code(tgrun::backend::authentication))]
    Authentication {
        /// The credential chain or mechanism that was tried.
        auth_method: String,
        /// Why it failed.
        cause: String,
    },

    /// The store could not be created.
    #[error("Could not create store '{name}': {cause}")]
    #[diagnostic(code(tgrun::backend::store_creation))]
    StoreCreation {
        /// Store (bucket/container/table) name.
        name: String,
        /// Why creation failed.
        cause: String,
    },

    /// The store exists but violates a provider constraint.
    #[error("Store validation: {issue}")]
    #[diagnostic(code(tgrun::backend::container_validation))]
    ContainerValidation {
        /// The violated constraint.
        issue: String,
    },

    /// The store does not exist where it was required to.
    #[error("Store '{name}' not found")]
    #[diagnostic(code(tgrun::backend::store_not_found))]
    StoreNotFound {
        /// Store name.
        name: String,
    },

    /// The provider denied an operation.
    #[error("Access denied during {operation}")]
    #[diagnostic(code(tgrun::backend::access_denied))]
    AccessDenied {
        /// The denied operation.
        operation: String,
    },

    /// The backend kind is known but not enabled in this process.
    #[error("Backend '{backend}' is not enabled: {reason}")]
    #[diagnostic(code(tgrun::backend::unsupported))]
    Unsupported {
        /// Backend kind name.
        backend: String,
        /// Why it is unavailable.
        reason: String,
    },

    /// Two units share a store without distinct state keys.
    #[error("Units {first} and {second} share store '{store}' with the same key '{key}'")]
    #[diagnostic(
        code(tgrun::backend::key_collision),
        help("give each unit a distinct key within the shared store")
    )]
    KeyCollision {
        /// First unit (display path).
        first: String,
        /// Second unit (display path).
        second: String,
        /// Shared store name.
        store: String,
        /// The colliding key.
        key: String,
    },

    /// Filesystem failure in the local backend.
    #[error("I/O error during {operation}: {source}")]
    #[diagnostic(code(tgrun::backend::io))]
    Io {
        /// The underlying error.
        #[source]
        source: std::io::Error,
        /// What was being done.
        operation: String,
    },
}

impl Error {
    /// Create a missing-required-config error for a named field.
    pub fn missing_field(field: impl std::fmt::Display) -> Self {
        Self::MissingRequiredConfig {
            message: format!("missing required field '{field}'"),
        }
    }

    /// Create a missing-required-config error from a free-form message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::MissingRequiredConfig {
            message: message.into(),
        }
    }

    /// Whether this is an authentication failure.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Whether this is a validation failure (config- or store-side).
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingRequiredConfig { .. } | Self::ContainerValidation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_queries() {
        let auth = Error::Authentication {
            auth_method: "default credential chain".to_string(),
            cause: "no credentials".to_string(),
        };
        assert!(auth.is_authentication());
        assert!(!auth.is_validation());

        let missing = Error::missing_field("bucket");
        assert!(missing.is_validation());
        assert!(missing.to_string().contains("bucket"));
    }
}
