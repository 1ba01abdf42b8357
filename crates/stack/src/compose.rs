//! Stack file parsing and template expansion.

use crate::error::{Error, Result};
use hcl::Value;
use hcl::eval::Context;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tgrun_config::{expr, functions, locals, scope};
use tgrun_core::paths;

/// One `unit "<name>"` block of a stack file.
#[derive(Debug, Clone)]
pub struct UnitTemplate {
    /// Block label.
    pub name: String,
    /// Template directory holding the unit's files.
    pub source: PathBuf,
    /// Target path under `.terragrunt-stack/`.
    pub path: PathBuf,
    /// Values materialized into the instantiated unit.
    pub values: IndexMap<String, Value>,
}

/// A parsed stack composition file.
#[derive(Debug, Clone)]
pub struct StackFile {
    /// The stack file's path.
    pub file: PathBuf,
    /// Directory containing the stack file.
    pub dir: PathBuf,
    /// Unit templates, in declaration order.
    pub units: Vec<UnitTemplate>,
}

impl StackFile {
    /// Load and evaluate the stack file in `dir`.
    ///
    /// The stack file supports `locals` and the expression function
    /// library; each unit block's attributes are evaluated against them.
    pub fn load(dir: &Path) -> Result<Self> {
        let file = dir.join(paths::STACK_FILENAME);
        if !file.is_file() {
            return Err(Error::NotFound {
                dir: dir.to_path_buf().into_boxed_path(),
            });
        }
        let contents = std::fs::read_to_string(&file)
            .map_err(|err| Error::io(err, format!("read {}", file.display())))?;
        let body = hcl::parse(&contents)
            .map_err(|err| tgrun_config::Error::parse(file.clone(), err.to_string()))?;

        let raw_locals: Vec<(String, hcl::Expression)> = body
            .blocks()
            .filter(|block| block.identifier() == "locals")
            .flat_map(|block| {
                block
                    .body()
                    .attributes()
                    .map(|attr| (attr.key().to_string(), attr.expr().clone()))
                    .collect::<Vec<_>>()
            })
            .collect();

        let units = scope::with_scope(scope::Scope::for_unit(file.clone()), || {
            let mut ctx = Context::new();
            functions::install(&mut ctx);
            locals::evaluate(&raw_locals, &mut ctx, &file)?;

            let mut units = Vec::new();
            for block in body.blocks().filter(|block| block.identifier() == "unit") {
                let name = block
                    .labels()
                    .first()
                    .map(|label| label.as_str().to_string())
                    .unwrap_or_default();
                units.push(evaluate_unit_block(&name, block.body(), &ctx, &file, dir)?);
            }
            Ok::<_, Error>(units)
        })?;

        Ok(Self {
            file,
            dir: dir.to_path_buf(),
            units,
        })
    }

    /// The materialization root for this stack.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.dir.join(paths::STACK_DIR_NAME)
    }
}

fn evaluate_unit_block(
    name: &str,
    body: &hcl::Body,
    ctx: &Context,
    file: &Path,
    dir: &Path,
) -> Result<UnitTemplate> {
    if name.is_empty() {
        return Err(Error::unit("", file, "unit blocks require a label"));
    }

    let mut source = None;
    let mut target = None;
    let mut values = IndexMap::new();

    for attr in body.attributes() {
        let value = expr::evaluate(attr.expr(), ctx, file).map_err(Error::Config)?;
        match attr.key() {
            "source" => {
                let raw = expr::as_string(&value, "unit.source", file).map_err(Error::Config)?;
                source = Some(paths::resolve(dir, Path::new(&raw)));
            }
            "path" => {
                let raw = expr::as_string(&value, "unit.path", file).map_err(Error::Config)?;
                target = Some(PathBuf::from(raw));
            }
            "values" => {
                values = expr::as_object(&value, "unit.values", file).map_err(Error::Config)?;
            }
            other => {
                return Err(Error::unit(name, file, format!("unknown attribute '{other}'")));
            }
        }
    }

    let source = source.ok_or_else(|| Error::unit(name, file, "missing 'source'"))?;
    let path = target.unwrap_or_else(|| PathBuf::from(name));
    if path.is_absolute() || path.components().any(|c| c == std::path::Component::ParentDir) {
        return Err(Error::unit(
            name,
            file,
            format!("path '{}' must stay under the stack directory", path.display()),
        ));
    }
    if !source.join(paths::CONFIG_FILENAME).is_file() {
        return Err(Error::unit(
            name,
            file,
            format!("source {} is not a unit template", source.display()),
        ));
    }

    Ok(UnitTemplate {
        name: name.to_string(),
        source,
        path,
        values,
    })
}

/// Expand every unit template into `.terragrunt-stack/`, returning the
/// instantiated unit directories.
pub fn generate(stack: &StackFile) -> Result<Vec<PathBuf>> {
    let output_root = stack.output_dir();
    let mut generated = Vec::with_capacity(stack.units.len());

    for unit in &stack.units {
        let target = output_root.join(&unit.path);
        if target.is_dir() {
            std::fs::remove_dir_all(&target)
                .map_err(|err| Error::io(err, format!("clear {}", target.display())))?;
        }
        copy_template(&unit.source, &target)?;

        if !unit.values.is_empty() {
            let values_file = target.join(tgrun_config::VALUES_FILENAME);
            let rendered = render_values(&unit.values);
            std::fs::write(&values_file, rendered)
                .map_err(|err| Error::io(err, format!("write {}", values_file.display())))?;
        }

        tracing::info!(
            unit = unit.name,
            target = %target.display(),
            "Instantiated stack unit"
        );
        generated.push(target);
    }
    Ok(generated)
}

/// Remove the stack materialization directory.
pub fn clean(stack_dir: &Path) -> Result<()> {
    let output_root = stack_dir.join(paths::STACK_DIR_NAME);
    match std::fs::remove_dir_all(&output_root) {
        Ok(()) => {
            tracing::info!(dir = %output_root.display(), "Removed stack materialization");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(Error::io(err, format!("remove {}", output_root.display()))),
    }
}

/// Render the values file: one attribute per entry, declaration order.
fn render_values(values: &IndexMap<String, Value>) -> String {
    let body: hcl::Map<String, Value> = values
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    hcl::to_string(&body).unwrap_or_default()
}

fn copy_template(source: &Path, target: &Path) -> Result<()> {
    std::fs::create_dir_all(target)
        .map_err(|err| Error::io(err, format!("create {}", target.display())))?;
    let entries = std::fs::read_dir(source)
        .map_err(|err| Error::io(err, format!("read {}", source.display())))?;
    for entry in entries {
        let entry = entry.map_err(|err| Error::io(err, format!("read {}", source.display())))?;
        let name = entry.file_name();
        if name.to_str().is_some_and(paths::is_skipped_dir) {
            continue;
        }
        let from = entry.path();
        let to = target.join(&name);
        let file_type = entry
            .file_type()
            .map_err(|err| Error::io(err, format!("stat {}", from.display())))?;
        if file_type.is_dir() {
            copy_template(&from, &to)?;
        } else if file_type.is_file() {
            std::fs::copy(&from, &to)
                .map_err(|err| Error::io(err, format!("copy {}", from.display())))?;
        }
    }
    Ok(())
}
