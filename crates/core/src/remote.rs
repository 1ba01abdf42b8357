//! Remote-state spec: which backend holds a unit's state, and how.

use crate::config::IfExists;
use hcl::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported remote-state backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// AWS S3 bucket + DynamoDB lock table.
    S3,
    /// Google Cloud Storage bucket.
    Gcs,
    /// Azure storage account blob container.
    #[serde(rename = "azurerm")]
    AzureRm,
    /// Local state file, no shared store.
    Local,
}

impl BackendKind {
    /// The backend name as it appears in configuration and generated files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Gcs => "gcs",
            Self::AzureRm => "azurerm",
            Self::Local => "local",
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "s3" => Ok(Self::S3),
            "gcs" => Ok(Self::Gcs),
            "azurerm" => Ok(Self::AzureRm),
            "local" => Ok(Self::Local),
            other => Err(format!(
                "unknown backend '{other}' (expected s3, gcs, azurerm, or local)"
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `remote_state { ... }` block after evaluation.
///
/// `config` keeps the user's key order; backend implementations pull typed
/// fields out of it and reject what they don't recognize.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteStateSpec {
    /// Which backend family holds the state.
    pub backend: BackendKind,
    /// Backend-specific configuration (bucket, key, region, ...).
    pub config: IndexMap<String, Value>,
    /// Skip store bootstrap entirely; only generate the backend file.
    pub disable_bootstrap: bool,
    /// Where to write the derived backend block, if requested.
    pub generate: Option<RemoteStateGenerate>,
}

impl RemoteStateSpec {
    /// Fetch a required string field from the backend config.
    pub fn required_str(&self, field: &str) -> std::result::Result<&str, String> {
        match self.config.get(field) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s),
            Some(Value::String(_)) => Err(format!("field '{field}' must not be empty")),
            Some(other) => Err(format!(
                "field '{field}' must be a string, got {}",
                value_kind(other)
            )),
            None => Err(format!("missing required field '{field}'")),
        }
    }

    /// Fetch an optional string field.
    #[must_use]
    pub fn optional_str(&self, field: &str) -> Option<&str> {
        match self.config.get(field) {
            Some(Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Fetch an optional boolean field, defaulting when absent.
    #[must_use]
    pub fn bool_or(&self, field: &str, default: bool) -> bool {
        match self.config.get(field) {
            Some(Value::Bool(b)) => *b,
            _ => default,
        }
    }

    /// The state `key` within the store. Two units may share a store iff
    /// their keys differ, so this participates in collision checks.
    pub fn state_key(&self) -> std::result::Result<&str, String> {
        match self.backend {
            BackendKind::Local => Ok(self.optional_str("path").unwrap_or("terraform.tfstate")),
            BackendKind::Gcs => self.required_str("prefix"),
            BackendKind::S3 | BackendKind::AzureRm => self.required_str("key"),
        }
    }

    /// Name of the backing store (bucket/container), when declared.
    #[must_use]
    pub fn store_name(&self) -> Option<&str> {
        match self.backend {
            BackendKind::S3 | BackendKind::Gcs => self.optional_str("bucket"),
            BackendKind::AzureRm => self.optional_str("container_name"),
            BackendKind::Local => None,
        }
    }
}

/// Generation settings nested inside `remote_state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteStateGenerate {
    /// Target path relative to the unit's working directory.
    pub path: String,
    /// Policy when the target already exists.
    pub if_exists: IfExists,
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
