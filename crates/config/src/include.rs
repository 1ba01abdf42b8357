//! Include resolution and configuration merging.
//!
//! Merging is a typed operation over the evaluated configuration model, not
//! textual substitution, so key ordering inside maps survives and code
//! generation stays deterministic.

use crate::error::{Error, Result};
use crate::expr;
use hcl::Value;
use hcl::eval::Context;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tgrun_core::config::{DependencySpec, TerraformConfig, UnitConfig};

/// How a parent configuration combines with its child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// Parent is expose-only; nothing is merged.
    NoMerge,
    /// Child overrides parent at the top level.
    #[default]
    Shallow,
    /// Maps merge recursively, lists concatenate, labeled blocks merge
    /// per-field by name.
    Deep,
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "no_merge" => Ok(Self::NoMerge),
            "shallow" => Ok(Self::Shallow),
            "deep" => Ok(Self::Deep),
            other => Err(format!(
                "unknown merge_strategy '{other}' (expected no_merge, shallow, or deep)"
            )),
        }
    }
}

/// An `include` block after its own attributes have been evaluated.
#[derive(Debug, Clone)]
pub struct IncludeSpec {
    /// Block label; empty for the bare form.
    pub label: String,
    /// Absolute path of the included file.
    pub path: PathBuf,
    /// Whether the parent's evaluated values are exposed as
    /// `include.<label>`.
    pub expose: bool,
    /// Merge strategy.
    pub strategy: MergeStrategy,
}

impl IncludeSpec {
    /// Evaluate one raw include block.
    pub fn from_body(
        label: String,
        body: &hcl::Body,
        ctx: &Context,
        file: &Path,
        dir: &Path,
    ) -> Result<Self> {
        let mut path = None;
        let mut expose = false;
        let mut strategy = MergeStrategy::default();

        for attr in body.attributes() {
            let value = expr::evaluate(attr.expr(), ctx, file)?;
            match attr.key() {
                "path" => {
                    let raw = expr::as_string(&value, "include path", file)?;
                    path = Some(expr::resolve_path(dir, &raw));
                }
                "expose" => expose = expr::as_bool(&value, "expose", file)?,
                "merge_strategy" => {
                    let raw = expr::as_string(&value, "merge_strategy", file)?;
                    strategy = raw
                        .parse()
                        .map_err(|cause: String| Error::include(&label, file, cause))?;
                }
                other => {
                    return Err(Error::include(
                        &label,
                        file,
                        format!("unknown attribute '{other}'"),
                    ));
                }
            }
        }

        let path = path.ok_or_else(|| Error::include(&label, file, "missing 'path'"))?;
        if !path.is_file() {
            return Err(Error::include(
                &label,
                file,
                format!("included file {} does not exist", path.display()),
            ));
        }

        Ok(Self {
            label,
            path,
            expose,
            strategy,
        })
    }
}

/// Merge a child configuration over a parent per the given strategy,
/// returning the combined configuration. The child wins conflicts.
#[must_use]
pub fn merge_configs(parent: UnitConfig, child: UnitConfig, strategy: MergeStrategy) -> UnitConfig {
    match strategy {
        MergeStrategy::NoMerge => child,
        MergeStrategy::Shallow => merge_shallow(parent, child),
        MergeStrategy::Deep => merge_deep(parent, child),
    }
}

fn merge_shallow(parent: UnitConfig, child: UnitConfig) -> UnitConfig {
    UnitConfig {
        inputs: override_map(parent.inputs, child.inputs),
        dependencies: merge_dependency_lists(parent.dependencies, child.dependencies, false),
        remote_state: child.remote_state.or(parent.remote_state),
        generate: merge_by_key(parent.generate, child.generate, |g| g.name.clone()),
        terraform: merge_terraform(parent.terraform, child.terraform, false),
        exclude: child.exclude.or(parent.exclude),
        feature_flags: override_map(parent.feature_flags, child.feature_flags),
        retry: if child.retry == tgrun_core::RetryPolicy::default() {
            parent.retry
        } else {
            child.retry
        },
        locals: child.locals,
    }
}

fn merge_deep(parent: UnitConfig, child: UnitConfig) -> UnitConfig {
    UnitConfig {
        inputs: deep_merge_map(parent.inputs, child.inputs),
        dependencies: merge_dependency_lists(parent.dependencies, child.dependencies, true),
        remote_state: child.remote_state.or(parent.remote_state),
        generate: merge_by_key(parent.generate, child.generate, |g| g.name.clone()),
        terraform: merge_terraform(parent.terraform, child.terraform, true),
        exclude: child.exclude.or(parent.exclude),
        feature_flags: deep_merge_map(parent.feature_flags, child.feature_flags),
        retry: if child.retry == tgrun_core::RetryPolicy::default() {
            parent.retry
        } else {
            child.retry
        },
        locals: child.locals,
    }
}

/// Deep-merge two values: objects merge recursively, arrays concatenate
/// parent-then-child, everything else the child replaces.
#[must_use]
pub fn deep_merge_values(parent: Value, child: Value) -> Value {
    match (parent, child) {
        (Value::Object(parent_map), Value::Object(child_map)) => {
            let mut merged = parent_map;
            for (key, child_value) in child_map {
                match merged.shift_remove(&key) {
                    Some(parent_value) => {
                        merged.insert(key, deep_merge_values(parent_value, child_value));
                    }
                    None => {
                        merged.insert(key, child_value);
                    }
                }
            }
            Value::Object(merged)
        }
        (Value::Array(mut parent_items), Value::Array(child_items)) => {
            parent_items.extend(child_items);
            Value::Array(parent_items)
        }
        (_, child) => child,
    }
}

fn override_map(
    parent: IndexMap<String, Value>,
    child: IndexMap<String, Value>,
) -> IndexMap<String, Value> {
    let mut merged = parent;
    for (key, value) in child {
        merged.shift_remove(&key);
        merged.insert(key, value);
    }
    merged
}

fn deep_merge_map(
    parent: IndexMap<String, Value>,
    child: IndexMap<String, Value>,
) -> IndexMap<String, Value> {
    let mut merged = parent;
    for (key, child_value) in child {
        match merged.shift_remove(&key) {
            Some(parent_value) => {
                merged.insert(key, deep_merge_values(parent_value, child_value));
            }
            None => {
                merged.insert(key, child_value);
            }
        }
    }
    merged
}

fn merge_by_key<T, F: Fn(&T) -> String>(parent: Vec<T>, child: Vec<T>, key: F) -> Vec<T> {
    let mut merged: IndexMap<String, T> = parent.into_iter().map(|item| (key(&item), item)).collect();
    for item in child {
        let item_key = key(&item);
        merged.shift_remove(&item_key);
        merged.insert(item_key, item);
    }
    merged.into_values().collect()
}

/// Merge two dependency lists by block name, child-priority. With `deep`,
/// colliding blocks merge per-field; otherwise the child block replaces the
/// parent's wholesale.
pub(crate) fn merge_dependency_lists(
    parent: Vec<DependencySpec>,
    child: Vec<DependencySpec>,
    deep: bool,
) -> Vec<DependencySpec> {
    let mut merged: IndexMap<String, DependencySpec> = parent
        .into_iter()
        .map(|dep| (dep.name.clone(), dep))
        .collect();
    for child_dep in child {
        match merged.shift_remove(&child_dep.name) {
            Some(parent_dep) if deep => {
                let name = child_dep.name.clone();
                merged.insert(name, merge_dependency_fields(parent_dep, child_dep));
            }
            _ => {
                merged.insert(child_dep.name.clone(), child_dep);
            }
        }
    }
    merged.into_values().collect()
}

fn merge_dependency_fields(parent: DependencySpec, child: DependencySpec) -> DependencySpec {
    DependencySpec {
        name: child.name,
        config_path: child.config_path,
        skip_outputs: child.skip_outputs || parent.skip_outputs,
        mock_outputs: match (parent.mock_outputs, child.mock_outputs) {
            (Some(parent_mocks), Some(child_mocks)) => {
                Some(deep_merge_values(parent_mocks, child_mocks))
            }
            (parent_mocks, None) => parent_mocks,
            (None, child_mocks) => child_mocks,
        },
        mock_outputs_allowed_commands: if child.mock_outputs_allowed_commands.is_empty() {
            parent.mock_outputs_allowed_commands
        } else {
            child.mock_outputs_allowed_commands
        },
    }
}

fn merge_terraform(
    parent: TerraformConfig,
    child: TerraformConfig,
    deep: bool,
) -> TerraformConfig {
    let merge_hooks = |parent_hooks: Vec<tgrun_core::HookSpec>,
                       child_hooks: Vec<tgrun_core::HookSpec>| {
        if deep {
            // Per-field merge by name: a child hook inherits what it leaves
            // unset from the parent hook of the same name.
            let mut merged: IndexMap<String, tgrun_core::HookSpec> = parent_hooks
                .into_iter()
                .map(|hook| (hook.name.clone(), hook))
                .collect();
            for child_hook in child_hooks {
                match merged.shift_remove(&child_hook.name) {
                    Some(parent_hook) => {
                        let name = child_hook.name.clone();
                        merged.insert(
                            name,
                            tgrun_core::HookSpec {
                                name: child_hook.name,
                                commands: if child_hook.commands.is_empty() {
                                    parent_hook.commands
                                } else {
                                    child_hook.commands
                                },
                                execute: if child_hook.execute.is_empty() {
                                    parent_hook.execute
                                } else {
                                    child_hook.execute
                                },
                                working_dir: child_hook.working_dir.or(parent_hook.working_dir),
                                run_on_error: child_hook.run_on_error || parent_hook.run_on_error,
                            },
                        );
                    }
                    None => {
                        merged.insert(child_hook.name.clone(), child_hook);
                    }
                }
            }
            merged.into_values().collect()
        } else {
            merge_by_key(parent_hooks, child_hooks, |hook| hook.name.clone())
        }
    };

    TerraformConfig {
        source: child.source.or(parent.source),
        extra_arguments: merge_by_key(parent.extra_arguments, child.extra_arguments, |extra| {
            extra.name.clone()
        }),
        before_hooks: merge_hooks(parent.before_hooks, child.before_hooks),
        after_hooks: merge_hooks(parent.after_hooks, child.after_hooks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tgrun_core::config::HookSpec;

    fn value(src: &str) -> Value {
        let body = hcl::parse(&format!("x = {src}")).unwrap();
        let ctx = Context::new();
        hcl::eval::Evaluate::evaluate(body.attributes().next().unwrap().expr(), &ctx).unwrap()
    }

    #[test]
    fn merge_strategy_parses() {
        assert_eq!("no_merge".parse::<MergeStrategy>().unwrap(), MergeStrategy::NoMerge);
        assert_eq!("shallow".parse::<MergeStrategy>().unwrap(), MergeStrategy::Shallow);
        assert_eq!("deep".parse::<MergeStrategy>().unwrap(), MergeStrategy::Deep);
        assert!("merge_harder".parse::<MergeStrategy>().is_err());
    }

    #[test]
    fn deep_merge_recurses_into_objects_and_concatenates_lists() {
        let parent = value(r#"{ tags = { team = "core", env = "dev" }, ports = [80] }"#);
        let child = value(r#"{ tags = { env = "prod" }, ports = [443] }"#);
        let merged = deep_merge_values(parent, child);
        let object = merged.as_object().unwrap();
        let tags = object.get("tags").unwrap().as_object().unwrap();
        assert_eq!(tags.get("team"), Some(&Value::from("core")));
        assert_eq!(tags.get("env"), Some(&Value::from("prod")));
        let ports = object.get("ports").unwrap().as_array().unwrap();
        assert_eq!(ports.len(), 2);
    }

    #[test]
    fn shallow_inputs_override_at_top_level() {
        let mut parent = UnitConfig::default();
        parent
            .inputs
            .insert("tags".to_string(), value(r#"{ team = "core" }"#));
        parent.inputs.insert("region".to_string(), value(r#""eu""#));

        let mut child = UnitConfig::default();
        child
            .inputs
            .insert("tags".to_string(), value(r#"{ env = "prod" }"#));

        let merged = merge_configs(parent, child, MergeStrategy::Shallow);
        assert_eq!(merged.inputs.get("region"), Some(&value(r#""eu""#)));
        // Shallow: the whole tags object is the child's.
        let tags = merged.inputs.get("tags").unwrap().as_object().unwrap();
        assert!(tags.get("team").is_none());
        assert_eq!(tags.get("env"), Some(&Value::from("prod")));
    }

    #[test]
    fn deep_inputs_merge_recursively() {
        let mut parent = UnitConfig::default();
        parent
            .inputs
            .insert("tags".to_string(), value(r#"{ team = "core" }"#));

        let mut child = UnitConfig::default();
        child
            .inputs
            .insert("tags".to_string(), value(r#"{ env = "prod" }"#));

        let merged = merge_configs(parent, child, MergeStrategy::Deep);
        let tags = merged.inputs.get("tags").unwrap().as_object().unwrap();
        assert_eq!(tags.get("team"), Some(&Value::from("core")));
        assert_eq!(tags.get("env"), Some(&Value::from("prod")));
    }

    #[test]
    fn no_merge_keeps_child_untouched() {
        let mut parent = UnitConfig::default();
        parent.inputs.insert("region".to_string(), value(r#""eu""#));
        let child = UnitConfig::default();

        let merged = merge_configs(parent, child, MergeStrategy::NoMerge);
        assert!(merged.inputs.is_empty());
    }

    #[test]
    fn hooks_merge_by_name_child_wins_per_field_in_deep() {
        let parent_hook = HookSpec {
            name: "fmt".to_string(),
            commands: vec!["plan".to_string()],
            execute: vec!["tofu".to_string(), "fmt".to_string()],
            working_dir: None,
            run_on_error: false,
        };
        let child_hook = HookSpec {
            name: "fmt".to_string(),
            commands: vec![],
            execute: vec!["echo".to_string(), "skip".to_string()],
            working_dir: None,
            run_on_error: true,
        };

        let mut parent = UnitConfig::default();
        parent.terraform.before_hooks.push(parent_hook);
        let mut child = UnitConfig::default();
        child.terraform.before_hooks.push(child_hook);

        let merged = merge_configs(parent, child, MergeStrategy::Deep);
        assert_eq!(merged.terraform.before_hooks.len(), 1);
        let hook = &merged.terraform.before_hooks[0];
        // commands inherited from parent, execute and run_on_error from child
        assert_eq!(hook.commands, vec!["plan"]);
        assert_eq!(hook.execute, vec!["echo", "skip"]);
        assert!(hook.run_on_error);
    }

    #[test]
    fn child_remote_state_replaces_parent() {
        use tgrun_core::remote::{BackendKind, RemoteStateSpec};

        let mut parent = UnitConfig::default();
        parent.remote_state = Some(RemoteStateSpec {
            backend: BackendKind::S3,
            config: IndexMap::new(),
            disable_bootstrap: false,
            generate: None,
        });
        let mut child = UnitConfig::default();
        child.remote_state = Some(RemoteStateSpec {
            backend: BackendKind::Local,
            config: IndexMap::new(),
            disable_bootstrap: false,
            generate: None,
        });

        let merged = merge_configs(parent, child, MergeStrategy::Shallow);
        assert_eq!(merged.remote_state.unwrap().backend, BackendKind::Local);
    }
}
