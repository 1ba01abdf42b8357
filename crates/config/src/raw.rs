//! Raw (unevaluated) configuration: the block structure of one file.

use crate::error::{Error, Result};
use hcl::{Body, Expression};
use std::path::{Path, PathBuf};
use tgrun_core::paths;

/// An `include` block before evaluation.
#[derive(Debug, Clone)]
pub struct RawInclude {
    /// Block label; empty for the bare `include {}` form.
    pub label: String,
    /// Block body: `path`, `expose`, `merge_strategy`.
    pub body: Body,
}

/// A `dependency "<name>"` block before evaluation.
#[derive(Debug, Clone)]
pub struct RawDependency {
    /// Block label.
    pub name: String,
    /// Block body.
    pub body: Body,
}

/// The parsed, unevaluated structure of one configuration file.
#[derive(Debug, Clone)]
pub struct RawConfig {
    /// Path of the file.
    pub path: PathBuf,
    /// Directory containing the file.
    pub dir: PathBuf,
    /// `include` blocks, in declaration order.
    pub includes: Vec<RawInclude>,
    /// `locals` attributes, in declaration order, across all locals blocks.
    pub locals: Vec<(String, Expression)>,
    /// `dependency` blocks.
    pub dependencies: Vec<RawDependency>,
    /// The `paths` expression of a `dependencies` block, if present.
    pub dependency_paths: Option<Expression>,
    /// The `terraform` block body.
    pub terraform: Option<Body>,
    /// The `remote_state` block body.
    pub remote_state: Option<Body>,
    /// `generate "<name>"` blocks.
    pub generate: Vec<(String, Body)>,
    /// The `exclude` block body.
    pub exclude: Option<Body>,
    /// The `retry` block body.
    pub retry: Option<Body>,
    /// `feature "<name>"` blocks.
    pub features: Vec<(String, Body)>,
    /// The `inputs` attribute expression.
    pub inputs: Option<Expression>,
}

impl RawConfig {
    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|err| Error::io(err, path.to_path_buf()))?;
        Self::parse(path, &contents)
    }

    /// Parse configuration source text.
    pub fn parse(path: &Path, contents: &str) -> Result<Self> {
        let body =
            hcl::parse(contents).map_err(|err| Error::parse(path.to_path_buf(), err.to_string()))?;
        Ok(Self::from_body(path, &body))
    }

    /// Extract the known block structure from a parsed body.
    #[must_use]
    pub fn from_body(path: &Path, body: &Body) -> Self {
        let dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let mut raw = Self {
            path: path.to_path_buf(),
            dir,
            includes: Vec::new(),
            locals: Vec::new(),
            dependencies: Vec::new(),
            dependency_paths: None,
            terraform: None,
            remote_state: None,
            generate: Vec::new(),
            exclude: None,
            retry: None,
            features: Vec::new(),
            inputs: None,
        };

        for attr in body.attributes() {
            match attr.key() {
                "inputs" => raw.inputs = Some(attr.expr().clone()),
                other => {
                    tracing::debug!(path = %path.display(), attribute = other, "Ignoring unknown top-level attribute");
                }
            }
        }

        for block in body.blocks() {
            let label = block
                .labels()
                .first()
                .map(|l| l.as_str().to_string())
                .unwrap_or_default();
            match block.identifier() {
                "include" => raw.includes.push(RawInclude {
                    label,
                    body: block.body().clone(),
                }),
                "locals" => {
                    for attr in block.body().attributes() {
                        raw.locals
                            .push((attr.key().to_string(), attr.expr().clone()));
                    }
                }
                "dependency" => raw.dependencies.push(RawDependency {
                    name: label,
                    body: block.body().clone(),
                }),
                "dependencies" => {
                    raw.dependency_paths = block
                        .body()
                        .attributes()
                        .find(|attr| attr.key() == "paths")
                        .map(|attr| attr.expr().clone());
                }
                "terraform" => raw.terraform = Some(block.body().clone()),
                "remote_state" => raw.remote_state = Some(block.body().clone()),
                "generate" => raw.generate.push((label, block.body().clone())),
                "exclude" => raw.exclude = Some(block.body().clone()),
                "retry" => raw.retry = Some(block.body().clone()),
                "feature" => raw.features.push((label, block.body().clone())),
                other => {
                    tracing::warn!(path = %path.display(), block = other, "Ignoring unknown block");
                }
            }
        }

        raw
    }

    /// Path of the unit's configuration file within `dir`.
    #[must_use]
    pub fn config_file(dir: &Path) -> PathBuf {
        dir.join(paths::CONFIG_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
include "root" {
  path = find_in_parent_folders("root.hcl")
}

locals {
  env    = "prod"
  region = "eu-west-1"
}

dependency "vpc" {
  config_path = "../vpc"
}

dependencies {
  paths = ["../iam"]
}

terraform {
  source = "../../modules/app"
}

remote_state {
  backend = "s3"
  config  = {}
}

generate "provider" {
  path     = "provider.tf"
  contents = ""
}

feature "fast_path" {
  default = false
}

inputs = {
  env = local.env
}
"#;

    #[test]
    fn extracts_every_block_family() {
        let raw = RawConfig::parse(Path::new("/stack/app/terragrunt.hcl"), SAMPLE).unwrap();
        assert_eq!(raw.includes.len(), 1);
        assert_eq!(raw.includes[0].label, "root");
        assert_eq!(raw.locals.len(), 2);
        assert_eq!(raw.dependencies.len(), 1);
        assert_eq!(raw.dependencies[0].name, "vpc");
        assert!(raw.dependency_paths.is_some());
        assert!(raw.terraform.is_some());
        assert!(raw.remote_state.is_some());
        assert_eq!(raw.generate.len(), 1);
        assert_eq!(raw.features.len(), 1);
        assert!(raw.inputs.is_some());
        assert_eq!(raw.dir, PathBuf::from("/stack/app"));
    }

    #[test]
    fn parse_error_carries_path() {
        let err = RawConfig::parse(Path::new("/stack/bad/terragrunt.hcl"), "inputs = {").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("/stack/bad"));
    }

    #[test]
    fn empty_file_is_a_valid_unit() {
        let raw = RawConfig::parse(Path::new("/stack/app/terragrunt.hcl"), "").unwrap();
        assert!(raw.includes.is_empty());
        assert!(raw.inputs.is_none());
    }
}
