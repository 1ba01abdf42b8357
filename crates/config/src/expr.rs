//! Expression evaluation helpers and coercions over `hcl::Value`.

use crate::error::{Error, Result};
use hcl::eval::{Context, Evaluate};
use hcl::{Expression, Value};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Evaluate one expression, mapping evaluator failures onto our taxonomy.
pub fn evaluate(expr: &Expression, ctx: &Context, path: &Path) -> Result<Value> {
    expr.evaluate(ctx).map_err(|err| from_eval_error(&err, path))
}

/// Translate an `hcl` evaluation error, pulling out function failures so
/// they carry the function name.
pub fn from_eval_error(err: &hcl::eval::Error, path: &Path) -> Error {
    use hcl::eval::ErrorKind;

    match err.kind() {
        ErrorKind::FuncCall(name, cause) => {
            Error::function(name.to_string(), path, cause.to_string())
        }
        _ => Error::evaluation(path, err.to_string()),
    }
}

/// Coerce a value to a string, rejecting everything else.
pub fn as_string(value: &Value, what: &str, path: &Path) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::evaluation(path, format!("{what} must be a string, got {}", kind(value))))
}

/// Coerce a value to a boolean.
pub fn as_bool(value: &Value, what: &str, path: &Path) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| Error::evaluation(path, format!("{what} must be a bool, got {}", kind(value))))
}

/// Coerce a value to a non-negative integer.
pub fn as_u64(value: &Value, what: &str, path: &Path) -> Result<u64> {
    value
        .as_u64()
        .ok_or_else(|| {
            Error::evaluation(
                path,
                format!("{what} must be a non-negative integer, got {}", kind(value)),
            )
        })
}

/// Coerce a value to a list of strings.
pub fn as_string_list(value: &Value, what: &str, path: &Path) -> Result<Vec<String>> {
    let items = value.as_array().ok_or_else(|| {
        Error::evaluation(path, format!("{what} must be a list of strings, got {}", kind(value)))
    })?;
    items
        .iter()
        .map(|item| as_string(item, what, path))
        .collect()
}

/// Coerce a value to an ordered string→value map.
pub fn as_object(value: &Value, what: &str, path: &Path) -> Result<IndexMap<String, Value>> {
    match value {
        Value::Object(map) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        other => Err(Error::evaluation(
            path,
            format!("{what} must be an object, got {}", kind(other)),
        )),
    }
}

/// Human name of a value's kind, for diagnostics.
#[must_use]
pub fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Collect the names of `local.<name>` references inside an expression.
///
/// Best effort: anything missed surfaces later as an evaluation error; the
/// collection only drives ordering and cycle reporting.
pub fn collect_local_refs(expr: &Expression, out: &mut Vec<String>) {
    match expr {
        Expression::Array(items) => {
            for item in items {
                collect_local_refs(item, out);
            }
        }
        Expression::Object(object) => {
            for (key, value) in object {
                if let hcl::ObjectKey::Expression(key_expr) = key {
                    collect_local_refs(key_expr, out);
                }
                collect_local_refs(value, out);
            }
        }
        Expression::TemplateExpr(template_expr) => {
            if let Ok(template) = hcl::Template::from_expr(template_expr) {
                collect_template_refs(&template, out);
            }
        }
        Expression::Parenthesis(inner) => collect_local_refs(inner, out),
        Expression::Traversal(traversal) => {
            if let Expression::Variable(var) = &traversal.expr {
                if var.as_str() == "local" {
                    if let Some(hcl::TraversalOperator::GetAttr(ident)) =
                        traversal.operators.first()
                    {
                        out.push(ident.to_string());
                    }
                }
            } else {
                collect_local_refs(&traversal.expr, out);
            }
            for operator in &traversal.operators {
                if let hcl::TraversalOperator::Index(index_expr) = operator {
                    collect_local_refs(index_expr, out);
                }
            }
        }
        Expression::FuncCall(call) => {
            for arg in &call.args {
                collect_local_refs(arg, out);
            }
        }
        Expression::Conditional(cond) => {
            collect_local_refs(&cond.cond_expr, out);
            collect_local_refs(&cond.true_expr, out);
            collect_local_refs(&cond.false_expr, out);
        }
        Expression::Operation(operation) => match operation.as_ref() {
            hcl::Operation::Unary(unary) => collect_local_refs(&unary.expr, out),
            hcl::Operation::Binary(binary) => {
                collect_local_refs(&binary.lhs_expr, out);
                collect_local_refs(&binary.rhs_expr, out);
            }
        },
        Expression::ForExpr(for_expr) => {
            collect_local_refs(&for_expr.collection_expr, out);
            collect_local_refs(&for_expr.value_expr, out);
            if let Some(key_expr) = &for_expr.key_expr {
                collect_local_refs(key_expr, out);
            }
            if let Some(cond_expr) = &for_expr.cond_expr {
                collect_local_refs(cond_expr, out);
            }
        }
        _ => {}
    }
}

fn collect_template_refs(template: &hcl::Template, out: &mut Vec<String>) {
    for element in template.elements() {
        match element {
            hcl::template::Element::Interpolation(interp) => {
                collect_local_refs(&interp.expr, out);
            }
            hcl::template::Element::Directive(directive) => match &**directive {
                hcl::template::Directive::If(if_dir) => {
                    collect_local_refs(&if_dir.cond_expr, out);
                    collect_template_refs(&if_dir.true_template, out);
                    if let Some(false_template) = &if_dir.false_template {
                        collect_template_refs(false_template, out);
                    }
                }
                hcl::template::Directive::For(for_dir) => {
                    collect_local_refs(&for_dir.collection_expr, out);
                    collect_template_refs(&for_dir.template, out);
                }
            },
            hcl::template::Element::Literal(_) => {}
        }
    }
}

/// Convert a deserialized JSON/YAML value into the configuration model.
pub fn json_to_value(json: serde_json::Value, path: &Path) -> Result<Value> {
    hcl::to_value(&json).map_err(|err| Error::evaluation(path, err.to_string()))
}

/// Resolve a possibly relative path string against a base directory.
#[must_use]
pub fn resolve_path(base_dir: &Path, raw: &str) -> PathBuf {
    tgrun_core::paths::resolve(base_dir, Path::new(raw))
}
