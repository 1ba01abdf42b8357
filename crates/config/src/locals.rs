//! Two-pass evaluation of `locals`, with reference-cycle detection.

use crate::error::{Error, Result};
use crate::expr;
use hcl::eval::Context;
use hcl::{Expression, Value};
use indexmap::{IndexMap, IndexSet};
use std::path::Path;

/// Evaluate a file's locals against the given context.
///
/// Locals may reference each other; evaluation order is derived from the
/// reference graph. A reference to an undefined local fails, and a cycle
/// fails with the full chain.
pub fn evaluate(
    raw_locals: &[(String, Expression)],
    ctx: &mut Context,
    file: &Path,
) -> Result<IndexMap<String, Value>> {
    if raw_locals.is_empty() {
        return Ok(IndexMap::new());
    }

    let defined: IndexSet<&str> = raw_locals.iter().map(|(name, _)| name.as_str()).collect();
    let mut refs: IndexMap<&str, Vec<String>> = IndexMap::new();
    for (name, expression) in raw_locals {
        let mut found = Vec::new();
        expr::collect_local_refs(expression, &mut found);
        for reference in &found {
            if !defined.contains(reference.as_str()) {
                return Err(Error::UndefinedLocal {
                    name: reference.clone(),
                    path: file.to_path_buf().into_boxed_path(),
                });
            }
        }
        refs.insert(name.as_str(), found);
    }

    let order = evaluation_order(&refs)?;

    let expressions: IndexMap<&str, &Expression> = raw_locals
        .iter()
        .map(|(name, expression)| (name.as_str(), expression))
        .collect();

    let mut evaluated: IndexMap<String, Value> = IndexMap::new();
    for name in order {
        declare(ctx, &evaluated);
        let expression = expressions[name.as_str()];
        let value = expr::evaluate(expression, ctx, file)?;
        evaluated.insert(name, value);
    }

    // Preserve declaration order in the exposed map.
    let mut ordered = IndexMap::new();
    for (name, _) in raw_locals {
        if let Some(value) = evaluated.shift_remove(name) {
            ordered.insert(name.clone(), value);
        }
    }
    declare(ctx, &ordered);
    Ok(ordered)
}

/// Declare the `local` variable from the evaluated map.
pub fn declare(ctx: &mut Context, locals: &IndexMap<String, Value>) {
    let object: hcl::Map<String, Value> = locals
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    ctx.declare_var("local", Value::Object(object));
}

/// Topological order over the reference graph, via colored DFS.
///
/// On a back-edge the chain from the first on-stack occurrence is reported.
fn evaluation_order<'a>(refs: &'a IndexMap<&'a str, Vec<String>>) -> Result<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut colors: IndexMap<&str, Color> =
        refs.keys().map(|name| (*name, Color::White)).collect();
    let mut order = Vec::with_capacity(refs.len());

    fn visit<'a>(
        name: &'a str,
        refs: &'a IndexMap<&'a str, Vec<String>>,
        colors: &mut IndexMap<&'a str, Color>,
        stack: &mut Vec<&'a str>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        colors.insert(name, Color::Gray);
        stack.push(name);

        for reference in &refs[name] {
            let reference = reference.as_str();
            // Unknown names were rejected before ordering.
            let Some(entry) = refs.get_key_value(reference) else {
                continue;
            };
            let reference = *entry.0;
            match colors[reference] {
                Color::White => visit(reference, refs, colors, stack, order)?,
                Color::Gray => {
                    let start = stack
                        .iter()
                        .position(|on_stack| *on_stack == reference)
                        .unwrap_or(0);
                    let mut chain: Vec<String> = stack[start..]
                        .iter()
                        .map(|entry| format!("local.{entry}"))
                        .collect();
                    chain.push(format!("local.{reference}"));
                    return Err(Error::CyclicReference { chain });
                }
                Color::Black => {}
            }
        }

        stack.pop();
        colors.insert(name, Color::Black);
        order.push(name.to_string());
        Ok(())
    }

    let names: Vec<&str> = refs.keys().copied().collect();
    for name in names {
        if colors[name] == Color::White {
            let mut stack = Vec::new();
            visit(name, refs, &mut colors, &mut stack, &mut order)?;
        }
    }
    Ok(order)
}
