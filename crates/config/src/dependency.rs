//! Dependency blocks: evaluation and output resolution.
//!
//! Outputs come from, in order of preference: the in-process cache (a
//! sibling already ran or was read this run), the downstream binary invoked
//! in the producer's directory, or the declared mocks when the current
//! action is allowlisted.

use crate::error::{Error, Result};
use crate::expr;
use crate::raw::RawDependency;
use hcl::Value;
use hcl::eval::Context;
use std::path::Path;
use std::process::Stdio;
use tgrun_core::config::DependencySpec;
use tgrun_core::strict::StrictControl;
use tgrun_core::{CachedOutputs, RunContext, paths};
use tokio::process::Command;

/// Evaluate one raw `dependency` block.
pub fn from_raw(
    raw: &RawDependency,
    ctx: &Context,
    file: &Path,
    dir: &Path,
) -> Result<DependencySpec> {
    let mut config_path = None;
    let mut skip_outputs = false;
    let mut mock_outputs = None;
    let mut mock_outputs_allowed_commands = Vec::new();

    for attr in raw.body.attributes() {
        let value = expr::evaluate(attr.expr(), ctx, file)?;
        match attr.key() {
            "config_path" => {
                let raw_path = expr::as_string(&value, "config_path", file)?;
                config_path = Some(paths::resolve(dir, Path::new(&raw_path)));
            }
            "skip_outputs" => skip_outputs = expr::as_bool(&value, "skip_outputs", file)?,
            "mock_outputs" => mock_outputs = Some(value),
            "mock_outputs_allowed_terraform_commands" => {
                mock_outputs_allowed_commands = expr::as_string_list(
                    &value,
                    "mock_outputs_allowed_terraform_commands",
                    file,
                )?;
            }
            other => {
                tracing::warn!(
                    path = %file.display(),
                    dependency = raw.name,
                    attribute = other,
                    "Ignoring unknown dependency attribute"
                );
            }
        }
    }

    let config_path = config_path.ok_or_else(|| {
        Error::evaluation(
            file,
            format!("dependency \"{}\" is missing config_path", raw.name),
        )
    })?;

    Ok(DependencySpec {
        name: raw.name.clone(),
        config_path,
        skip_outputs,
        mock_outputs,
        mock_outputs_allowed_commands,
    })
}

/// Resolve the outputs of one dependency for the dependent unit.
pub async fn resolve_outputs(
    run: &RunContext,
    dep: &DependencySpec,
    dependent: &Path,
) -> Result<Value> {
    if dep.skip_outputs {
        // The edge still orders execution; mocks satisfy any references.
        return Ok(dep
            .mock_outputs
            .clone()
            .unwrap_or_else(|| Value::Object(hcl::Map::new())));
    }

    if let Some(cached) = run.outputs(&dep.config_path) {
        tracing::debug!(
            producer = %dep.config_path.display(),
            mocked = cached.mocked,
            "Serving dependency outputs from cache"
        );
        return Ok(cached.values);
    }

    match read_outputs_via_downstream(run, &dep.config_path).await? {
        Some(outputs) if !is_empty_object(&outputs) => {
            run.store_outputs(
                &dep.config_path,
                CachedOutputs {
                    values: outputs.clone(),
                    mocked: false,
                },
            );
            Ok(outputs)
        }
        applied => {
            // Unapplied producer, or applied with no outputs at all.
            if dep.mocks_allowed_for(run.action.name()) {
                if run.action.mutates_state() {
                    run.strict.check(
                        StrictControl::MockOutputsOnApply,
                        format!(
                            "mock outputs of {} substitute on '{}'",
                            dep.config_path.display(),
                            run.action
                        ),
                    )?;
                }
                tracing::debug!(
                    producer = %dep.config_path.display(),
                    dependent = %dependent.display(),
                    "Using mock outputs"
                );
                return Ok(dep
                    .mock_outputs
                    .clone()
                    .unwrap_or_else(|| Value::Object(hcl::Map::new())));
            }
            match applied {
                Some(outputs) => Ok(outputs),
                None => Err(Error::dependency_not_applied(dependent, &*dep.config_path)),
            }
        }
    }
}

/// Build the `dependency` variable object from resolved outputs.
#[must_use]
pub fn dependency_variable(resolved: &[(String, Value)]) -> Value {
    let mut object = hcl::Map::new();
    for (name, outputs) in resolved {
        let mut entry = hcl::Map::new();
        entry.insert("outputs".to_string(), outputs.clone());
        object.insert(name.clone(), Value::Object(entry));
    }
    Value::Object(object)
}

/// Run `output -json` in the producer's directory.
///
/// `Ok(None)` means the producer has no usable state (the downstream binary
/// failed); the caller decides between mocks and a hard error.
async fn read_outputs_via_downstream(run: &RunContext, producer: &Path) -> Result<Option<Value>> {
    if !producer.join(paths::CONFIG_FILENAME).is_file() {
        return Ok(None);
    }

    let mut command = Command::new(&run.tf_path);
    command
        .arg("output")
        .arg("-json")
        .current_dir(producer)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(
        producer = %producer.display(),
        binary = %run.tf_path.display(),
        "Reading dependency outputs via downstream binary"
    );

    let output = tokio::select! {
        () = run.token.cancelled() => return Err(tgrun_core::Error::Cancelled.into()),
        result = command.output() => match result {
            Ok(output) => output,
            Err(err) => {
                // Cannot read state at all; the caller falls back to mocks
                // or reports the producer as unapplied.
                tracing::warn!(
                    producer = %producer.display(),
                    binary = %run.tf_path.display(),
                    error = %err,
                    "Downstream binary unavailable for output read"
                );
                return Ok(None);
            }
        },
    };

    if !output.status.success() {
        tracing::debug!(
            producer = %producer.display(),
            code = output.status.code(),
            "Downstream output read failed; treating producer as unapplied"
        );
        return Ok(None);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(stdout.trim())
        .map_err(|err| Error::evaluation(producer, format!("invalid output JSON: {err}")))?;
    Ok(Some(flatten_output_values(parsed, producer)?))
}

/// `output -json` wraps each output in `{value, type, sensitive}`; strip the
/// wrapper and keep the values.
fn flatten_output_values(parsed: serde_json::Value, producer: &Path) -> Result<Value> {
    let serde_json::Value::Object(entries) = parsed else {
        return Err(Error::evaluation(
            producer,
            "output JSON is not an object".to_string(),
        ));
    };
    let mut outputs = hcl::Map::new();
    for (name, entry) in entries {
        let value = match entry {
            serde_json::Value::Object(ref wrapper) if wrapper.contains_key("value") => {
                wrapper["value"].clone()
            }
            other => other,
        };
        outputs.insert(name, expr::json_to_value(value, producer)?);
    }
    Ok(Value::Object(outputs))
}

fn is_empty_object(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.is_empty())
}
