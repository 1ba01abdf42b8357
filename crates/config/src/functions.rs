//! The expression function library.
//!
//! A fixed set of pure functions available in unit configurations. Arity and
//! argument types are enforced through the evaluator's parameter
//! declarations; anything beyond that (missing files, malformed timestamps)
//! is reported as a function failure carrying the function name.

use crate::scope;
use hcl::Value;
use hcl::eval::{Context, FuncArgs, FuncDef, ParamType};
use std::path::{Path, PathBuf};
use tgrun_core::paths;

/// Register the full function library into an evaluation context.
pub fn install(ctx: &mut Context) {
    ctx.declare_func(
        "find_in_parent_folders",
        FuncDef::builder()
            .variadic_param(ParamType::String)
            .build(find_in_parent_folders),
    );
    ctx.declare_func(
        "path_relative_to_include",
        FuncDef::builder()
            .variadic_param(ParamType::String)
            .build(path_relative_to_include),
    );
    ctx.declare_func("get_repo_root", FuncDef::builder().build(get_repo_root));
    ctx.declare_func(
        "get_terragrunt_dir",
        FuncDef::builder().build(get_terragrunt_dir),
    );
    ctx.declare_func(
        "get_original_terragrunt_dir",
        FuncDef::builder().build(get_original_terragrunt_dir),
    );
    ctx.declare_func(
        "get_env",
        FuncDef::builder()
            .param(ParamType::String)
            .variadic_param(ParamType::String)
            .build(get_env),
    );
    ctx.declare_func(
        "yamldecode",
        FuncDef::builder().param(ParamType::String).build(yamldecode),
    );
    ctx.declare_func(
        "jsondecode",
        FuncDef::builder().param(ParamType::String).build(jsondecode),
    );
    ctx.declare_func(
        "read_terragrunt_config",
        FuncDef::builder()
            .param(ParamType::String)
            .build(read_terragrunt_config),
    );
    ctx.declare_func(
        "read_tfvars_file",
        FuncDef::builder()
            .param(ParamType::String)
            .build(read_tfvars_file),
    );
    ctx.declare_func(
        "get_aws_account_id",
        FuncDef::builder().build(get_aws_account_id),
    );
    ctx.declare_func("get_platform", FuncDef::builder().build(get_platform));
    ctx.declare_func(
        "startswith",
        FuncDef::builder()
            .param(ParamType::String)
            .param(ParamType::String)
            .build(startswith),
    );
    ctx.declare_func(
        "endswith",
        FuncDef::builder()
            .param(ParamType::String)
            .param(ParamType::String)
            .build(endswith),
    );
    ctx.declare_func(
        "strcontains",
        FuncDef::builder()
            .param(ParamType::String)
            .param(ParamType::String)
            .build(strcontains),
    );
    ctx.declare_func(
        "timecmp",
        FuncDef::builder()
            .param(ParamType::String)
            .param(ParamType::String)
            .build(timecmp),
    );
}

type FuncResult = Result<Value, String>;

fn str_arg(args: &FuncArgs, index: usize) -> Result<String, String> {
    args[index]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| format!("argument {} must be a string", index + 1))
}

fn find_in_parent_folders(args: FuncArgs) -> FuncResult {
    if args.len() > 1 {
        return Err(format!("expected at most 1 argument, got {}", args.len()));
    }
    let scope = scope::require("find_in_parent_folders")?;
    let target = if args.len() == 1 {
        str_arg(&args, 0)?
    } else {
        paths::CONFIG_FILENAME.to_string()
    };

    let mut dir = scope.dir.parent().map(Path::to_path_buf);
    while let Some(candidate_dir) = dir {
        let candidate = candidate_dir.join(&target);
        if candidate.is_file() {
            return Ok(Value::from(candidate.to_string_lossy().into_owned()));
        }
        dir = candidate_dir.parent().map(Path::to_path_buf);
    }
    Err(format!(
        "'{target}' not found in any parent of {}",
        scope.dir.display()
    ))
}

fn path_relative_to_include(args: FuncArgs) -> FuncResult {
    if args.len() > 1 {
        return Err(format!("expected at most 1 argument, got {}", args.len()));
    }
    let scope = scope::require("path_relative_to_include")?;
    let include_dir = if args.len() == 1 {
        let label = str_arg(&args, 0)?;
        scope
            .include_dirs
            .get(&label)
            .cloned()
            .ok_or_else(|| format!("no include block labeled '{label}'"))?
    } else {
        scope
            .include_dirs
            .values()
            .next()
            .cloned()
            .ok_or_else(|| "the configuration has no include block".to_string())?
    };
    let relative = paths::relative_from(&scope.original_dir, &include_dir);
    Ok(Value::from(relative.to_string_lossy().into_owned()))
}

fn get_repo_root(_args: FuncArgs) -> FuncResult {
    let scope = scope::require("get_repo_root")?;
    let mut dir = Some(scope.dir.as_path());
    while let Some(candidate) = dir {
        if candidate.join(".git").exists() {
            return Ok(Value::from(candidate.to_string_lossy().into_owned()));
        }
        dir = candidate.parent();
    }
    Err(format!(
        "no repository root (.git) found above {}",
        scope.dir.display()
    ))
}

fn get_terragrunt_dir(_args: FuncArgs) -> FuncResult {
    let scope = scope::require("get_terragrunt_dir")?;
    Ok(Value::from(scope.dir.to_string_lossy().into_owned()))
}

fn get_original_terragrunt_dir(_args: FuncArgs) -> FuncResult {
    let scope = scope::require("get_original_terragrunt_dir")?;
    Ok(Value::from(scope.original_dir.to_string_lossy().into_owned()))
}

fn get_env(args: FuncArgs) -> FuncResult {
    if args.len() > 2 {
        return Err(format!("expected at most 2 arguments, got {}", args.len()));
    }
    let name = str_arg(&args, 0)?;
    match std::env::var(&name) {
        Ok(value) => Ok(Value::from(value)),
        Err(_) if args.len() == 2 => Ok(args[1].clone()),
        Err(_) => Err(format!("environment variable '{name}' is not set")),
    }
}

fn yamldecode(args: FuncArgs) -> FuncResult {
    let input = str_arg(&args, 0)?;
    let json: serde_json::Value =
        serde_yaml::from_str(&input).map_err(|err| format!("invalid YAML: {err}"))?;
    hcl::to_value(&json).map_err(|err| err.to_string())
}

fn jsondecode(args: FuncArgs) -> FuncResult {
    let input = str_arg(&args, 0)?;
    let json: serde_json::Value =
        serde_json::from_str(&input).map_err(|err| format!("invalid JSON: {err}"))?;
    hcl::to_value(&json).map_err(|err| err.to_string())
}

fn read_terragrunt_config(args: FuncArgs) -> FuncResult {
    let scope = scope::require("read_terragrunt_config")?;
    let raw = str_arg(&args, 0)?;
    let target = resolve_against(&scope.dir, &raw);
    crate::evaluator::read_config_for_function(&target)
}

fn read_tfvars_file(args: FuncArgs) -> FuncResult {
    let scope = scope::require("read_tfvars_file")?;
    let raw = str_arg(&args, 0)?;
    let target = resolve_against(&scope.dir, &raw);
    let contents = std::fs::read_to_string(&target)
        .map_err(|err| format!("cannot read {}: {err}", target.display()))?;
    let body = hcl::parse(&contents).map_err(|err| format!("invalid tfvars: {err}"))?;

    // tfvars files carry literal values only; evaluate against an empty
    // context so any reference or call fails loudly.
    let ctx = Context::new();
    let mut object = hcl::Map::new();
    for attr in body.attributes() {
        let value = hcl::eval::Evaluate::evaluate(attr.expr(), &ctx)
            .map_err(|err| format!("in {}: {err}", target.display()))?;
        object.insert(attr.key().to_string(), value);
    }
    Ok(Value::Object(object))
}

fn get_aws_account_id(_args: FuncArgs) -> FuncResult {
    let scope = scope::require("get_aws_account_id")?;
    scope.aws_account_id.map(Value::from).ok_or_else(|| {
        "account identity unavailable; export TG_AWS_ACCOUNT_ID or configure a credential source"
            .to_string()
    })
}

fn get_platform(_args: FuncArgs) -> FuncResult {
    Ok(Value::from(std::env::consts::OS))
}

fn startswith(args: FuncArgs) -> FuncResult {
    Ok(Value::from(str_arg(&args, 0)?.starts_with(&str_arg(&args, 1)?)))
}

fn endswith(args: FuncArgs) -> FuncResult {
    Ok(Value::from(str_arg(&args, 0)?.ends_with(&str_arg(&args, 1)?)))
}

fn strcontains(args: FuncArgs) -> FuncResult {
    Ok(Value::from(str_arg(&args, 0)?.contains(&str_arg(&args, 1)?)))
}

fn timecmp(args: FuncArgs) -> FuncResult {
    let lhs = parse_timestamp(&str_arg(&args, 0)?)?;
    let rhs = parse_timestamp(&str_arg(&args, 1)?)?;
    let ordering = match lhs.cmp(&rhs) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    };
    Ok(Value::from(ordering))
}

fn parse_timestamp(raw: &str) -> Result<chrono::DateTime<chrono::FixedOffset>, String> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map_err(|err| format!("'{raw}' is not an RFC 3339 timestamp: {err}"))
}

fn resolve_against(base: &Path, raw: &str) -> PathBuf {
    let candidate = Path::new(raw);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        paths::normalize(&base.join(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{Scope, with_scope};
    use hcl::eval::Evaluate;

    fn eval_in(dir: &Path, expr_src: &str) -> Result<Value, crate::error::Error> {
        let mut ctx = Context::new();
        install(&mut ctx);
        let body = hcl::parse(&format!("x = {expr_src}")).unwrap();
        let attr = body.attributes().next().unwrap();
        let expr = attr.expr().clone();
        with_scope(Scope::for_unit(dir.join(paths::CONFIG_FILENAME)), || {
            expr.evaluate(&ctx)
                .map_err(|err| crate::expr::from_eval_error(&err, dir))
        })
    }

    #[test]
    fn get_terragrunt_dir_returns_scope_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let value = eval_in(tmp.path(), "get_terragrunt_dir()").unwrap();
        assert_eq!(value, Value::from(tmp.path().to_string_lossy().into_owned()));
    }

    #[test]
    fn find_in_parent_folders_walks_up() {
        let tmp = tempfile::tempdir().unwrap();
        let child = tmp.path().join("envs/prod/app");
        std::fs::create_dir_all(&child).unwrap();
        std::fs::write(tmp.path().join("root.hcl"), "").unwrap();

        let value = eval_in(&child, r#"find_in_parent_folders("root.hcl")"#).unwrap();
        let found = value.as_str().unwrap().to_string();
        assert!(found.ends_with("root.hcl"));

        let err = eval_in(&child, r#"find_in_parent_folders("absent.hcl")"#).unwrap_err();
        assert!(err.to_string().contains("find_in_parent_folders"));
    }

    #[test]
    fn get_env_uses_default_when_unset() {
        let tmp = tempfile::tempdir().unwrap();
        let value = eval_in(tmp.path(), r#"get_env("TGRUN_SURELY_UNSET_VAR", "fallback")"#).unwrap();
        assert_eq!(value, Value::from("fallback"));

        let err = eval_in(tmp.path(), r#"get_env("TGRUN_SURELY_UNSET_VAR")"#).unwrap_err();
        assert!(err.to_string().contains("is not set"));
    }

    #[test]
    fn decode_functions_produce_objects() {
        let tmp = tempfile::tempdir().unwrap();
        let value = eval_in(tmp.path(), r#"jsondecode("{\"a\": 1, \"b\": [true]}")"#).unwrap();
        assert_eq!(value.as_object().unwrap().get("a"), Some(&Value::from(1)));

        let value = eval_in(tmp.path(), "yamldecode(\"key: value\")").unwrap();
        assert_eq!(
            value.as_object().unwrap().get("key"),
            Some(&Value::from("value"))
        );
    }

    #[test]
    fn string_predicates() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(
            eval_in(tmp.path(), r#"startswith("env-prod", "env-")"#).unwrap(),
            Value::from(true)
        );
        assert_eq!(
            eval_in(tmp.path(), r#"endswith("env-prod", "dev")"#).unwrap(),
            Value::from(false)
        );
        assert_eq!(
            eval_in(tmp.path(), r#"strcontains("env-prod", "v-p")"#).unwrap(),
            Value::from(true)
        );
    }

    #[test]
    fn timecmp_orders_timestamps() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(
            eval_in(
                tmp.path(),
                r#"timecmp("2024-01-01T00:00:00Z", "2024-06-01T00:00:00Z")"#
            )
            .unwrap(),
            Value::from(-1)
        );
        assert_eq!(
            eval_in(
                tmp.path(),
                r#"timecmp("2024-06-01T02:00:00+02:00", "2024-06-01T00:00:00Z")"#
            )
            .unwrap(),
            Value::from(0)
        );
        let err = eval_in(tmp.path(), r#"timecmp("yesterday", "today")"#).unwrap_err();
        assert!(err.to_string().contains("RFC 3339"));
    }

    #[test]
    fn read_tfvars_file_parses_literals() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("common.tfvars"),
            "region = \"eu-west-1\"\ncount  = 3\n",
        )
        .unwrap();
        let value = eval_in(tmp.path(), r#"read_tfvars_file("common.tfvars")"#).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.get("region"), Some(&Value::from("eu-west-1")));
        assert_eq!(object.get("count"), Some(&Value::from(3)));
    }

    #[test]
    fn get_platform_matches_host() {
        let tmp = tempfile::tempdir().unwrap();
        let value = eval_in(tmp.path(), "get_platform()").unwrap();
        assert_eq!(value, Value::from(std::env::consts::OS));
    }
}
