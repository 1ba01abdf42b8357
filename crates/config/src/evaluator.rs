//! The evaluation pipeline: parse, includes, locals, dependencies, pass 2.
//!
//! Evaluation of one unit walks its include chain depth-first (parents
//! before children), evaluates each file's locals and dependency blocks in
//! pass 1, resolves dependency outputs once for the merged dependency set,
//! then evaluates the remaining blocks of every file in pass 2 and folds the
//! chain into a single [`UnitConfig`] per the include merge strategies.

use crate::dependency;
use crate::error::{Error, Result};
use crate::expr;
use crate::functions;
use crate::include::{self, IncludeSpec, MergeStrategy};
use crate::locals;
use crate::raw::RawConfig;
use crate::scope::{self, Scope};
use hcl::Value;
use hcl::eval::Context;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tgrun_core::config::{
    DependencySpec, ExcludeSpec, ExtraArguments, GenerateFileSpec, HookSpec, IfExists,
    RetryPolicy, TerraformConfig, UnitConfig,
};
use tgrun_core::remote::{BackendKind, RemoteStateGenerate, RemoteStateSpec};
use tgrun_core::{RunContext, paths};

/// Filename holding per-unit values written by stack generation.
pub const VALUES_FILENAME: &str = "terragrunt.values.hcl";

/// The subset of configuration the graph builder needs, computable without
/// resolving dependency outputs.
#[derive(Debug, Clone)]
pub struct PartialUnit {
    /// Unit directory.
    pub dir: PathBuf,
    /// Merged dependency blocks.
    pub dependencies: Vec<DependencySpec>,
    /// Ordering-only dependency paths from a `dependencies` block.
    pub extra_dependency_paths: Vec<PathBuf>,
    /// Evaluated exclude block, if any.
    pub exclude: Option<ExcludeSpec>,
    /// The remote-state spec, when it evaluates without dependency
    /// outputs. Used for cross-unit store/key collision checks.
    pub remote_state: Option<RemoteStateSpec>,
}

impl PartialUnit {
    /// All dependency paths, declared blocks first.
    #[must_use]
    pub fn all_dependency_paths(&self) -> Vec<PathBuf> {
        let mut all: Vec<PathBuf> = self
            .dependencies
            .iter()
            .map(|dep| dep.config_path.clone())
            .collect();
        for path in &self.extra_dependency_paths {
            if !all.contains(path) {
                all.push(path.clone());
            }
        }
        all
    }
}

/// One file of an include chain after pass-1 evaluation.
#[derive(Debug)]
struct PreparedFile {
    raw: RawConfig,
    scope: Scope,
    locals: IndexMap<String, Value>,
    features: IndexMap<String, Value>,
    dependencies: Vec<DependencySpec>,
    extra_dependency_paths: Vec<PathBuf>,
    exclude: Option<ExcludeSpec>,
    /// `include.<label>` object visible to this file's expressions.
    include_var: hcl::Map<String, Value>,
    /// `values` object for stack-generated units.
    values_var: Option<Value>,
}

/// A fully prepared include chain: parents in merge order, then the unit.
#[derive(Debug)]
struct PreparedChain {
    parents: Vec<(MergeStrategy, PreparedFile)>,
    unit: PreparedFile,
}

/// Memoizing configuration evaluator for one run.
pub struct Evaluator {
    run: RunContext,
    cache: Mutex<HashMap<(PathBuf, String), Arc<UnitConfig>>>,
}

impl Evaluator {
    /// Create an evaluator bound to a run context.
    #[must_use]
    pub fn new(run: RunContext) -> Self {
        Self {
            run,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The run context this evaluator serves.
    #[must_use]
    pub fn run(&self) -> &RunContext {
        &self.run
    }

    /// Fully evaluate the unit rooted at `unit_dir`, resolving dependency
    /// outputs. Results are memoized per `(unit_dir, action)`.
    pub async fn evaluate(&self, unit_dir: &Path) -> Result<Arc<UnitConfig>> {
        let key = (unit_dir.to_path_buf(), self.run.action.name().to_string());
        if let Some(cached) = self
            .cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(cached));
        }

        let chain = prepare_chain(unit_dir, &self.run)?;

        let merged_deps = merged_dependencies(&chain);
        let mut resolved = Vec::with_capacity(merged_deps.len());
        for dep in &merged_deps {
            let outputs = dependency::resolve_outputs(&self.run, dep, unit_dir).await?;
            resolved.push((dep.name.clone(), outputs));
        }
        let dependency_var = dependency::dependency_variable(&resolved);

        let config = fold_chain(&chain, Some(&dependency_var), merged_deps)?;
        validate(&config, unit_dir)?;

        let config = Arc::new(config);
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key, Arc::clone(&config));
        Ok(config)
    }

    /// Pass-1-only evaluation for discovery: dependency paths and the
    /// exclude decision, without touching any producer state.
    pub fn evaluate_partial(&self, unit_dir: &Path) -> Result<PartialUnit> {
        let chain = prepare_chain(unit_dir, &self.run)?;
        let dependencies = merged_dependencies(&chain);
        let mut extra_dependency_paths: Vec<PathBuf> = Vec::new();
        let chain_extras = chain
            .parents
            .iter()
            .flat_map(|(_, parent)| parent.extra_dependency_paths.iter())
            .chain(chain.unit.extra_dependency_paths.iter());
        for path in chain_extras {
            if !extra_dependency_paths.contains(path) {
                extra_dependency_paths.push(path.clone());
            }
        }

        let exclude = chain
            .unit
            .exclude
            .clone()
            .or_else(|| chain.parents.iter().rev().find_map(|(_, p)| p.exclude.clone()));

        Ok(PartialUnit {
            dir: unit_dir.to_path_buf(),
            dependencies,
            extra_dependency_paths,
            exclude,
            remote_state: partial_remote_state(&chain),
        })
    }

    /// Drop a memoized evaluation, forcing re-evaluation on next access.
    /// Called when an apply/destroy completes on the unit.
    pub fn invalidate(&self, unit_dir: &Path) {
        let key = (unit_dir.to_path_buf(), self.run.action.name().to_string());
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&key);
        self.run.invalidate_outputs(unit_dir);
    }
}

/// Prepare the include chain for a unit directory.
fn prepare_chain(unit_dir: &Path, run: &RunContext) -> Result<PreparedChain> {
    let file = RawConfig::config_file(unit_dir);
    let mut parents = Vec::new();
    let unit = prepare_file(&file, None, run, &mut parents)?;
    Ok(PreparedChain { parents, unit })
}

/// Pass-1-evaluate one file, recursing into its includes first.
fn prepare_file(
    file: &Path,
    origin: Option<&Scope>,
    run: &RunContext,
    parents_out: &mut Vec<(MergeStrategy, PreparedFile)>,
) -> Result<PreparedFile> {
    let raw = RawConfig::load(file)?;
    let mut file_scope = match origin {
        Some(origin_scope) => origin_scope.for_parent(file.to_path_buf()),
        None => Scope::for_unit(file.to_path_buf()),
    };

    // Includes: evaluate the block attributes with functions only, then
    // recurse. The scope stack rejects include cycles with the full chain.
    let includes = scope::with_scope(file_scope.clone(), || {
        let mut ctx = Context::new();
        functions::install(&mut ctx);
        raw.includes
            .iter()
            .map(|raw_include| {
                IncludeSpec::from_body(
                    raw_include.label.clone(),
                    &raw_include.body,
                    &ctx,
                    file,
                    &raw.dir,
                )
            })
            .collect::<Result<Vec<_>>>()
    })?;

    for spec in &includes {
        let parent_dir = spec
            .path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        file_scope
            .include_dirs
            .insert(spec.label.clone(), parent_dir);
    }

    let mut include_var = hcl::Map::new();
    for spec in &includes {
        let parent = scope::with_scope(file_scope.clone(), || {
            prepare_file(&spec.path, Some(&file_scope), run, parents_out)
        })?;
        if spec.expose {
            include_var.insert(spec.label.clone(), exposed_object(&spec.path, &parent));
        }
        if spec.strategy != MergeStrategy::NoMerge {
            parents_out.push((spec.strategy, parent));
        }
    }

    // Feature flags: block defaults, overridden by the run's `--feature`.
    let mut features = IndexMap::new();
    scope::with_scope::<_, Error>(file_scope.clone(), || {
        let mut ctx = Context::new();
        functions::install(&mut ctx);
        for (name, body) in &raw.features {
            let default = body
                .attributes()
                .find(|attr| attr.key() == "default")
                .map(|attr| expr::evaluate(attr.expr(), &ctx, file))
                .transpose()?
                .unwrap_or(Value::Null);
            features.insert(name.clone(), default);
        }
        Ok(())
    })?;
    for (name, value) in &run.features {
        if features.contains_key(name) {
            features.insert(name.clone(), value.clone());
        }
    }

    // Stack-generated values apply to the unit file only.
    let values_var = if origin.is_none() {
        load_values_file(&raw.dir)?
    } else {
        None
    };

    // Locals, then the pass-1-visible blocks.
    let (evaluated_locals, dependencies, extra_dependency_paths, exclude) =
        scope::with_scope::<_, Error>(file_scope.clone(), || {
            let mut ctx = Context::new();
            functions::install(&mut ctx);
            ctx.declare_var("include", Value::Object(include_var.clone()));
            ctx.declare_var("feature", feature_variable(&features));
            if let Some(values) = &values_var {
                ctx.declare_var("values", values.clone());
            }

            let evaluated_locals = locals::evaluate(&raw.locals, &mut ctx, file)?;

            let dependencies = raw
                .dependencies
                .iter()
                .map(|raw_dep| dependency::from_raw(raw_dep, &ctx, file, &raw.dir))
                .collect::<Result<Vec<_>>>()?;

            let extra_dependency_paths = match &raw.dependency_paths {
                Some(paths_expr) => {
                    let value = expr::evaluate(paths_expr, &ctx, file)?;
                    expr::as_string_list(&value, "dependencies.paths", file)?
                        .into_iter()
                        .map(|raw_path| paths::resolve(&raw.dir, Path::new(&raw_path)))
                        .collect()
                }
                None => Vec::new(),
            };

            let exclude = raw
                .exclude
                .as_ref()
                .map(|body| evaluate_exclude(body, &ctx, file))
                .transpose()?;

            Ok((evaluated_locals, dependencies, extra_dependency_paths, exclude))
        })?;

    Ok(PreparedFile {
        raw,
        scope: file_scope,
        locals: evaluated_locals,
        features,
        dependencies,
        extra_dependency_paths,
        exclude,
        include_var,
        values_var,
    })
}

/// Merge dependency declarations across the chain, parents first.
fn merged_dependencies(chain: &PreparedChain) -> Vec<DependencySpec> {
    let mut merged: Vec<DependencySpec> = Vec::new();
    for (strategy, parent) in &chain.parents {
        merged = include::merge_dependency_lists(
            merged,
            parent.dependencies.clone(),
            *strategy == MergeStrategy::Deep,
        );
    }
    include::merge_dependency_lists(merged, chain.unit.dependencies.clone(), true)
}

/// Pass-2-evaluate every file and fold the chain into one configuration.
fn fold_chain(
    chain: &PreparedChain,
    dependency_var: Option<&Value>,
    merged_deps: Vec<DependencySpec>,
) -> Result<UnitConfig> {
    let mut config = evaluate_file(&chain.unit, dependency_var)?;
    for (strategy, parent) in chain.parents.iter().rev() {
        let parent_config = evaluate_file(parent, dependency_var)?;
        config = include::merge_configs(parent_config, config, *strategy);
    }
    config.dependencies = merged_deps;
    Ok(config)
}

/// Evaluate the pass-2 blocks of one prepared file.
fn evaluate_file(prepared: &PreparedFile, dependency_var: Option<&Value>) -> Result<UnitConfig> {
    let file = prepared.raw.path.clone();
    scope::with_scope::<_, Error>(prepared.scope.clone(), || {
        let mut ctx = Context::new();
        functions::install(&mut ctx);
        ctx.declare_var("include", Value::Object(prepared.include_var.clone()));
        ctx.declare_var("feature", feature_variable(&prepared.features));
        locals::declare(&mut ctx, &prepared.locals);
        if let Some(values) = &prepared.values_var {
            ctx.declare_var("values", values.clone());
        }
        if let Some(deps) = dependency_var {
            ctx.declare_var("dependency", deps.clone());
        }

        let inputs = match &prepared.raw.inputs {
            Some(inputs_expr) => {
                let value = expr::evaluate(inputs_expr, &ctx, &file)?;
                expr::as_object(&value, "inputs", &file)?
            }
            None => IndexMap::new(),
        };

        let terraform = match &prepared.raw.terraform {
            Some(body) => evaluate_terraform(body, &ctx, &file)?,
            None => TerraformConfig::default(),
        };

        let remote_state = prepared
            .raw
            .remote_state
            .as_ref()
            .map(|body| evaluate_remote_state(body, &ctx, &file))
            .transpose()?;

        let generate = prepared
            .raw
            .generate
            .iter()
            .map(|(name, body)| evaluate_generate(name, body, &ctx, &file))
            .collect::<Result<Vec<_>>>()?;

        let retry = match &prepared.raw.retry {
            Some(body) => evaluate_retry(body, &ctx, &file)?,
            None => RetryPolicy::default(),
        };

        Ok(UnitConfig {
            inputs,
            dependencies: prepared.dependencies.clone(),
            remote_state,
            generate,
            terraform,
            exclude: prepared.exclude.clone(),
            feature_flags: prepared.features.clone(),
            retry,
            locals: prepared.locals.clone(),
        })
    })
}

fn evaluate_terraform(body: &hcl::Body, ctx: &Context, file: &Path) -> Result<TerraformConfig> {
    let mut terraform = TerraformConfig::default();

    for attr in body.attributes() {
        match attr.key() {
            "source" => {
                let value = expr::evaluate(attr.expr(), ctx, file)?;
                terraform.source = Some(expr::as_string(&value, "terraform.source", file)?);
            }
            other => {
                tracing::debug!(path = %file.display(), attribute = other, "Ignoring terraform attribute");
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
            "extra_arguments" => {
                terraform
                    .extra_arguments
                    .push(evaluate_extra_arguments(&label, block.body(), ctx, file)?);
            }
            "before_hook" => {
                terraform
                    .before_hooks
                    .push(evaluate_hook(&label, block.body(), ctx, file)?);
            }
            "after_hook" => {
                terraform
                    .after_hooks
                    .push(evaluate_hook(&label, block.body(), ctx, file)?);
            }
            other => {
                tracing::warn!(path = %file.display(), block = other, "Ignoring unknown terraform block");
            }
        }
    }

    Ok(terraform)
}

fn evaluate_extra_arguments(
    name: &str,
    body: &hcl::Body,
    ctx: &Context,
    file: &Path,
) -> Result<ExtraArguments> {
    let mut extra = ExtraArguments {
        name: name.to_string(),
        commands: Vec::new(),
        arguments: Vec::new(),
        env_vars: IndexMap::new(),
    };
    for attr in body.attributes() {
        let value = expr::evaluate(attr.expr(), ctx, file)?;
        match attr.key() {
            "commands" => extra.commands = expr::as_string_list(&value, "commands", file)?,
            "arguments" => extra.arguments = expr::as_string_list(&value, "arguments", file)?,
            "env_vars" => {
                extra.env_vars = expr::as_object(&value, "env_vars", file)?
                    .into_iter()
                    .map(|(key, env_value)| {
                        expr::as_string(&env_value, "env_vars value", file)
                            .map(|string_value| (key, string_value))
                    })
                    .collect::<Result<IndexMap<_, _>>>()?;
            }
            other => {
                tracing::warn!(path = %file.display(), attribute = other, "Ignoring extra_arguments attribute");
            }
        }
    }
    Ok(extra)
}

fn evaluate_hook(name: &str, body: &hcl::Body, ctx: &Context, file: &Path) -> Result<HookSpec> {
    let mut hook = HookSpec {
        name: name.to_string(),
        commands: Vec::new(),
        execute: Vec::new(),
        working_dir: None,
        run_on_error: false,
    };
    for attr in body.attributes() {
        let value = expr::evaluate(attr.expr(), ctx, file)?;
        match attr.key() {
            "commands" => hook.commands = expr::as_string_list(&value, "commands", file)?,
            "execute" => hook.execute = expr::as_string_list(&value, "execute", file)?,
            "working_dir" => {
                let raw = expr::as_string(&value, "working_dir", file)?;
                hook.working_dir = Some(PathBuf::from(raw));
            }
            "run_on_error" => hook.run_on_error = expr::as_bool(&value, "run_on_error", file)?,
            other => {
                tracing::warn!(path = %file.display(), attribute = other, "Ignoring hook attribute");
            }
        }
    }
    Ok(hook)
}

fn evaluate_remote_state(body: &hcl::Body, ctx: &Context, file: &Path) -> Result<RemoteStateSpec> {
    let mut backend = None;
    let mut config = IndexMap::new();
    let mut disable_bootstrap = false;
    let mut generate = None;

    for attr in body.attributes() {
        let value = expr::evaluate(attr.expr(), ctx, file)?;
        match attr.key() {
            "backend" => {
                let raw = expr::as_string(&value, "backend", file)?;
                backend = Some(
                    raw.parse::<BackendKind>()
                        .map_err(|cause| Error::evaluation(file, cause))?,
                );
            }
            "config" => config = expr::as_object(&value, "remote_state.config", file)?,
            "disable_bootstrap" => {
                disable_bootstrap = expr::as_bool(&value, "disable_bootstrap", file)?;
            }
            "generate" => {
                let object = expr::as_object(&value, "remote_state.generate", file)?;
                let path = object
                    .get("path")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        Error::evaluation(file, "remote_state.generate requires a 'path' string")
                    })?
                    .to_string();
                let if_exists = match object.get("if_exists").and_then(Value::as_str) {
                    Some(raw) => raw
                        .parse::<IfExists>()
                        .map_err(|cause| Error::evaluation(file, cause))?,
                    None => IfExists::default(),
                };
                generate = Some(RemoteStateGenerate { path, if_exists });
            }
            other => {
                tracing::warn!(path = %file.display(), attribute = other, "Ignoring remote_state attribute");
            }
        }
    }

    let backend = backend
        .ok_or_else(|| Error::evaluation(file, "remote_state requires a 'backend' string"))?;
    Ok(RemoteStateSpec {
        backend,
        config,
        disable_bootstrap,
        generate,
    })
}

fn evaluate_generate(
    name: &str,
    body: &hcl::Body,
    ctx: &Context,
    file: &Path,
) -> Result<GenerateFileSpec> {
    let mut path = None;
    let mut if_exists = IfExists::default();
    let mut comment_prefix = GenerateFileSpec::DEFAULT_COMMENT_PREFIX.to_string();
    let mut disable_signature = false;
    let mut contents = None;

    for attr in body.attributes() {
        let value = expr::evaluate(attr.expr(), ctx, file)?;
        match attr.key() {
            "path" => path = Some(PathBuf::from(expr::as_string(&value, "path", file)?)),
            "if_exists" => {
                let raw = expr::as_string(&value, "if_exists", file)?;
                if_exists = raw
                    .parse()
                    .map_err(|cause: String| Error::evaluation(file, cause))?;
            }
            "comment_prefix" => {
                comment_prefix = expr::as_string(&value, "comment_prefix", file)?;
            }
            "disable_signature" => {
                disable_signature = expr::as_bool(&value, "disable_signature", file)?;
            }
            "contents" => contents = Some(expr::as_string(&value, "contents", file)?),
            other => {
                tracing::warn!(path = %file.display(), attribute = other, "Ignoring generate attribute");
            }
        }
    }

    Ok(GenerateFileSpec {
        name: name.to_string(),
        path: path.ok_or_else(|| {
            Error::evaluation(file, format!("generate \"{name}\" is missing 'path'"))
        })?,
        if_exists,
        comment_prefix,
        disable_signature,
        contents: contents.ok_or_else(|| {
            Error::evaluation(file, format!("generate \"{name}\" is missing 'contents'"))
        })?,
    })
}

fn evaluate_retry(body: &hcl::Body, ctx: &Context, file: &Path) -> Result<RetryPolicy> {
    let mut retry = RetryPolicy::default();
    for attr in body.attributes() {
        let value = expr::evaluate(attr.expr(), ctx, file)?;
        match attr.key() {
            "max_attempts" => {
                retry.max_attempts = u32::try_from(expr::as_u64(&value, "max_attempts", file)?)
                    .map_err(|_| Error::evaluation(file, "max_attempts out of range"))?;
            }
            "sleep_between_seconds" => {
                retry.sleep_between_seconds = expr::as_u64(&value, "sleep_between_seconds", file)?;
            }
            "retryable_patterns" => {
                retry.retryable_patterns =
                    expr::as_string_list(&value, "retryable_patterns", file)?;
            }
            other => {
                tracing::warn!(path = %file.display(), attribute = other, "Ignoring retry attribute");
            }
        }
    }
    Ok(retry)
}

fn evaluate_exclude(body: &hcl::Body, ctx: &Context, file: &Path) -> Result<ExcludeSpec> {
    let mut exclude = ExcludeSpec::default();
    for attr in body.attributes() {
        let value = expr::evaluate(attr.expr(), ctx, file)?;
        match attr.key() {
            "if" => exclude.condition = expr::as_bool(&value, "exclude.if", file)?,
            "actions" => exclude.actions = expr::as_string_list(&value, "exclude.actions", file)?,
            "no_run" => exclude.no_run = expr::as_bool(&value, "exclude.no_run", file)?,
            "exclude_dependencies" => {
                exclude.exclude_dependencies =
                    expr::as_bool(&value, "exclude.exclude_dependencies", file)?;
            }
            other => {
                tracing::warn!(path = %file.display(), attribute = other, "Ignoring exclude attribute");
            }
        }
    }
    Ok(exclude)
}

/// Best-effort remote-state evaluation without dependency outputs, for
/// collision checks at graph time. A spec that genuinely needs dependency
/// outputs is left out here and evaluated in full at execution time.
fn partial_remote_state(chain: &PreparedChain) -> Option<RemoteStateSpec> {
    let files = std::iter::once(&chain.unit).chain(chain.parents.iter().rev().map(|(_, p)| p));
    for prepared in files {
        let Some(body) = &prepared.raw.remote_state else {
            continue;
        };
        let file = prepared.raw.path.clone();
        let result = scope::with_scope::<_, Error>(prepared.scope.clone(), || {
            let mut ctx = Context::new();
            functions::install(&mut ctx);
            ctx.declare_var("include", Value::Object(prepared.include_var.clone()));
            ctx.declare_var("feature", feature_variable(&prepared.features));
            locals::declare(&mut ctx, &prepared.locals);
            if let Some(values) = &prepared.values_var {
                ctx.declare_var("values", values.clone());
            }
            evaluate_remote_state(body, &ctx, &file)
        });
        match result {
            Ok(spec) => return Some(spec),
            Err(err) => {
                tracing::debug!(
                    path = %file.display(),
                    error = %err,
                    "remote_state not resolvable before dependency outputs"
                );
                return None;
            }
        }
    }
    None
}

/// The `feature` variable: `{ name = { value = <v> } }`.
fn feature_variable(features: &IndexMap<String, Value>) -> Value {
    let mut object = hcl::Map::new();
    for (name, value) in features {
        let mut entry = hcl::Map::new();
        entry.insert("value".to_string(), value.clone());
        object.insert(name.clone(), Value::Object(entry));
    }
    Value::Object(object)
}

/// The `include.<label>` exposure: path plus the parent's locals.
fn exposed_object(path: &Path, parent: &PreparedFile) -> Value {
    let mut object = hcl::Map::new();
    object.insert(
        "path".to_string(),
        Value::from(path.to_string_lossy().into_owned()),
    );
    let locals_object: hcl::Map<String, Value> = parent
        .locals
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    object.insert("locals".to_string(), Value::Object(locals_object));
    Value::Object(object)
}

/// Read `terragrunt.values.hcl` if stack generation placed one in the unit.
fn load_values_file(dir: &Path) -> Result<Option<Value>> {
    let path = dir.join(VALUES_FILENAME);
    if !path.is_file() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|err| Error::io(err, path.clone()))?;
    let body = hcl::parse(&contents).map_err(|err| Error::parse(path.clone(), err.to_string()))?;
    let ctx = Context::new();
    let mut object = hcl::Map::new();
    for attr in body.attributes() {
        let value = expr::evaluate(attr.expr(), &ctx, &path)?;
        object.insert(attr.key().to_string(), value);
    }
    Ok(Some(Value::Object(object)))
}

fn validate(config: &UnitConfig, unit_dir: &Path) -> Result<()> {
    if config.retry.max_attempts < 1 {
        return Err(Error::evaluation(
            unit_dir,
            "retry.max_attempts must be at least 1",
        ));
    }
    for pattern in &config.retry.retryable_patterns {
        // Compile early so a bad pattern is a configuration error, not a
        // runtime surprise after the first failure.
        regex::Regex::new(pattern).map_err(|err| {
            Error::evaluation(
                unit_dir,
                format!("invalid retryable pattern '{pattern}': {err}"),
            )
        })?;
    }
    Ok(())
}

/// Partial, synchronous read of another configuration file, for the
/// `read_terragrunt_config` function. Dependency outputs are not resolved;
/// expressions referencing them fail.
pub(crate) fn read_config_for_function(target: &Path) -> std::result::Result<Value, String> {
    let file = if target.is_dir() {
        RawConfig::config_file(target)
    } else {
        target.to_path_buf()
    };
    if !file.is_file() {
        return Err(format!("{} does not exist", file.display()));
    }

    let read = || -> Result<Value> {
        let unit_dir = file
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let run = RunContext::new(unit_dir, tgrun_core::Action::Other("read".to_string()));
        let mut parents = Vec::new();
        let prepared = prepare_file(&file, None, &run, &mut parents)?;
        let chain = PreparedChain {
            parents,
            unit: prepared,
        };
        let merged_deps = merged_dependencies(&chain);
        let config = fold_chain(&chain, None, merged_deps)?;

        let mut object = hcl::Map::new();
        object.insert(
            "path".to_string(),
            Value::from(file.to_string_lossy().into_owned()),
        );
        let locals_object: hcl::Map<String, Value> =
            config.locals.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        object.insert("locals".to_string(), Value::Object(locals_object));
        let inputs_object: hcl::Map<String, Value> =
            config.inputs.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        object.insert("inputs".to_string(), Value::Object(inputs_object));
        Ok(Value::Object(object))
    };

    read().map_err(|err| err.to_string())
}
