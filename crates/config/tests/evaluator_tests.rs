//! End-to-end evaluation tests over real directory trees.

use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tgrun_config::Evaluator;
use tgrun_core::config::IfExists;
use tgrun_core::remote::BackendKind;
use tgrun_core::{Action, RunContext};

fn write_unit(root: &Path, rel: &str, contents: &str) {
    let dir = root.join(rel);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("terragrunt.hcl"), contents).unwrap();
}

fn evaluator(root: &Path, action: Action) -> Evaluator {
    Evaluator::new(RunContext::new(root, action))
}

#[tokio::test]
async fn evaluates_locals_inputs_and_blocks() {
    let tmp = TempDir::new().unwrap();
    write_unit(
        tmp.path(),
        "app",
        r#"
locals {
  env      = "prod"
  replicas = 3
}

terraform {
  source = "../modules/app"

  extra_arguments "common" {
    commands  = ["plan", "apply"]
    arguments = ["-compact-warnings"]
  }
}

retry {
  max_attempts          = 5
  sleep_between_seconds = 0
  retryable_patterns    = ["My own little error"]
}

inputs = {
  env      = local.env
  replicas = local.replicas
  name     = "app-${local.env}"
}
"#,
    );

    let evaluator = evaluator(tmp.path(), Action::Plan);
    let config = evaluator.evaluate(&tmp.path().join("app")).await.unwrap();

    assert_eq!(config.inputs.get("env"), Some(&hcl::Value::from("prod")));
    assert_eq!(config.inputs.get("replicas"), Some(&hcl::Value::from(3)));
    assert_eq!(config.inputs.get("name"), Some(&hcl::Value::from("app-prod")));
    assert_eq!(config.terraform.source.as_deref(), Some("../modules/app"));
    assert_eq!(config.terraform.extra_arguments.len(), 1);
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.retryable_patterns, vec!["My own little error"]);
}

#[tokio::test]
async fn include_shallow_merge_child_wins() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("root.hcl"),
        r#"
locals {
  region = "eu-west-1"
}

remote_state {
  backend = "s3"
  config = {
    bucket = "shared-state"
    key    = "default/terraform.tfstate"
    region = local.region
  }
}

inputs = {
  region = local.region
  owner  = "platform"
}
"#,
    )
    .unwrap();
    write_unit(
        tmp.path(),
        "app",
        r#"
include "root" {
  path   = find_in_parent_folders("root.hcl")
  expose = true
}

inputs = {
  owner = "app-team"
  env   = include.root.locals.region
}
"#,
    );

    let evaluator = evaluator(tmp.path(), Action::Plan);
    let config = evaluator.evaluate(&tmp.path().join("app")).await.unwrap();

    // Parent's region survives, child's owner wins, exposure works.
    assert_eq!(config.inputs.get("region"), Some(&hcl::Value::from("eu-west-1")));
    assert_eq!(config.inputs.get("owner"), Some(&hcl::Value::from("app-team")));
    assert_eq!(config.inputs.get("env"), Some(&hcl::Value::from("eu-west-1")));

    let remote = config.remote_state.as_ref().unwrap();
    assert_eq!(remote.backend, BackendKind::S3);
    assert_eq!(remote.required_str("bucket").unwrap(), "shared-state");
}

#[tokio::test]
async fn mock_outputs_respect_command_allowlist() {
    let tmp = TempDir::new().unwrap();
    write_unit(tmp.path(), "a", "");
    write_unit(
        tmp.path(),
        "b",
        r#"
dependency "a" {
  config_path = "../a"

  mock_outputs = {
    truth = "The answer is 0"
  }
  mock_outputs_allowed_terraform_commands = ["plan"]
}

inputs = {
  truth = dependency.a.outputs.truth
}
"#,
    );

    // Under plan, the mock substitutes for the unapplied producer. The
    // producer directory exists but the downstream binary does not, so the
    // output read fails and the mock path is taken.
    let plan_evaluator = Evaluator::new(
        RunContext::new(tmp.path(), Action::Plan).with_tf_path("/nonexistent/terraform"),
    );
    let config = plan_evaluator.evaluate(&tmp.path().join("b")).await.unwrap();
    assert_eq!(
        config.inputs.get("truth"),
        Some(&hcl::Value::from("The answer is 0"))
    );

    // Under apply, the same configuration is a hard error.
    let apply_evaluator = Evaluator::new(
        RunContext::new(tmp.path(), Action::Apply).with_tf_path("/nonexistent/terraform"),
    );
    let err = apply_evaluator
        .evaluate(&tmp.path().join("b"))
        .await
        .unwrap_err();
    assert!(err.is_dependency_not_applied());
}

#[tokio::test]
async fn generate_blocks_evaluate_with_defaults() {
    let tmp = TempDir::new().unwrap();
    write_unit(
        tmp.path(),
        "app",
        r#"
generate "provider" {
  path      = "provider.tf"
  if_exists = "overwrite"
  contents  = <<EOF
provider "aws" {
  region = "eu-west-1"
}
EOF
}

generate "versions" {
  path     = "versions.tf"
  contents = "# pinned"
}
"#,
    );

    let evaluator = evaluator(tmp.path(), Action::Plan);
    let config = evaluator.evaluate(&tmp.path().join("app")).await.unwrap();

    assert_eq!(config.generate.len(), 2);
    let provider = &config.generate[0];
    assert_eq!(provider.if_exists, IfExists::Overwrite);
    assert!(provider.contents.contains("provider \"aws\""));
    let versions = &config.generate[1];
    assert_eq!(versions.if_exists, IfExists::OverwriteTerragrunt);
}

#[tokio::test]
async fn exclude_and_dependency_paths_visible_partially() {
    let tmp = TempDir::new().unwrap();
    write_unit(tmp.path(), "vpc", "");
    write_unit(
        tmp.path(),
        "app",
        r#"
dependency "vpc" {
  config_path = "../vpc"
  skip_outputs = true
}

dependencies {
  paths = ["../iam"]
}

exclude {
  if      = true
  actions = ["destroy"]
  no_run  = true
}
"#,
    );

    let evaluator = evaluator(tmp.path(), Action::Destroy);
    let partial = evaluator.evaluate_partial(&tmp.path().join("app")).unwrap();

    let paths = partial.all_dependency_paths();
    assert_eq!(paths.len(), 2);
    assert!(paths[0].ends_with("vpc"));
    assert!(paths[1].ends_with("iam"));

    let exclude = partial.exclude.unwrap();
    assert!(exclude.skips_single_run("destroy"));
    assert!(!exclude.skips_single_run("plan"));
}

#[tokio::test]
async fn feature_flags_overridable_from_run() {
    let tmp = TempDir::new().unwrap();
    write_unit(
        tmp.path(),
        "app",
        r#"
feature "fast_path" {
  default = false
}

inputs = {
  fast = feature.fast_path.value
}
"#,
    );

    let evaluator = evaluator(tmp.path(), Action::Plan);
    let config = evaluator.evaluate(&tmp.path().join("app")).await.unwrap();
    assert_eq!(config.inputs.get("fast"), Some(&hcl::Value::from(false)));

    let mut run = RunContext::new(tmp.path(), Action::Plan);
    run.features
        .insert("fast_path".to_string(), hcl::Value::from(true));
    let overridden = Evaluator::new(run);
    let config = overridden.evaluate(&tmp.path().join("app")).await.unwrap();
    assert_eq!(config.inputs.get("fast"), Some(&hcl::Value::from(true)));
}

#[tokio::test]
async fn evaluation_is_memoized_per_action() {
    let tmp = TempDir::new().unwrap();
    write_unit(tmp.path(), "app", "inputs = { a = 1 }\n");

    let evaluator = evaluator(tmp.path(), Action::Plan);
    let first = evaluator.evaluate(&tmp.path().join("app")).await.unwrap();

    // Rewrite the file; the memoized config must still be served.
    write_unit(tmp.path(), "app", "inputs = { a = 2 }\n");
    let second = evaluator.evaluate(&tmp.path().join("app")).await.unwrap();
    assert_eq!(first.inputs, second.inputs);

    // Invalidation forces re-evaluation.
    evaluator.invalidate(&tmp.path().join("app"));
    let third = evaluator.evaluate(&tmp.path().join("app")).await.unwrap();
    assert_eq!(third.inputs.get("a"), Some(&hcl::Value::from(2)));
}

#[tokio::test]
async fn include_cycles_are_reported() {
    let tmp = TempDir::new().unwrap();
    let a_dir = tmp.path().join("a");
    let b_dir = tmp.path().join("b");
    fs::create_dir_all(&a_dir).unwrap();
    fs::create_dir_all(&b_dir).unwrap();
    fs::write(
        a_dir.join("terragrunt.hcl"),
        "include \"b\" {\n  path = \"../b/terragrunt.hcl\"\n}\n",
    )
    .unwrap();
    fs::write(
        b_dir.join("terragrunt.hcl"),
        "include \"a\" {\n  path = \"../a/terragrunt.hcl\"\n}\n",
    )
    .unwrap();

    let evaluator = evaluator(tmp.path(), Action::Plan);
    let err = evaluator.evaluate(&a_dir).await.unwrap_err();
    assert!(matches!(err, tgrun_config::Error::CyclicReference { .. }));
}

#[tokio::test]
async fn bad_retry_pattern_is_fatal_at_evaluation() {
    let tmp = TempDir::new().unwrap();
    write_unit(
        tmp.path(),
        "app",
        r#"
retry {
  max_attempts       = 3
  retryable_patterns = ["(unclosed"]
}
"#,
    );

    let evaluator = evaluator(tmp.path(), Action::Plan);
    let err = evaluator.evaluate(&tmp.path().join("app")).await.unwrap_err();
    assert!(err.to_string().contains("retryable pattern"));
}
