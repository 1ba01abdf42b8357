//! Rendering of the backend block derived from `remote_state`.
//!
//! Key order inside every mapping is lexicographic so two runs over the
//! same spec produce byte-identical files regardless of how the user
//! ordered their configuration.

use hcl::Value;
use tgrun_core::RemoteStateSpec;
use tgrun_core::config::GenerateFileSpec;

/// Render the `terraform { backend "<kind>" { ... } }` block for a spec.
#[must_use]
pub fn render_backend_block(spec: &RemoteStateSpec) -> String {
    let mut out = String::from("terraform {\n");
    out.push_str(&format!("  backend \"{}\" {{\n", spec.backend.as_str()));

    let mut keys: Vec<&String> = spec.config.keys().collect();
    keys.sort();
    let width = keys.iter().map(|k| k.len()).max().unwrap_or(0);
    for key in keys {
        let value = &spec.config[key.as_str()];
        out.push_str(&format!(
            "    {key:<width$} = {}\n",
            render_value(value, 2),
        ));
    }

    out.push_str("  }\n}\n");
    out
}

/// Build the generate-file spec for a remote-state block, if the spec asks
/// for one.
#[must_use]
pub fn backend_generate_spec(spec: &RemoteStateSpec) -> Option<GenerateFileSpec> {
    let generate = spec.generate.as_ref()?;
    Some(GenerateFileSpec {
        name: "backend".to_string(),
        path: std::path::PathBuf::from(&generate.path),
        if_exists: generate.if_exists,
        comment_prefix: GenerateFileSpec::DEFAULT_COMMENT_PREFIX.to_string(),
        disable_signature: false,
        contents: render_backend_block(spec),
    })
}

/// Render one configuration value as HCL, maps sorted lexicographically.
fn render_value(value: &Value, indent: usize) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            if items.is_empty() {
                return "[]".to_string();
            }
            let rendered: Vec<String> = items
                .iter()
                .map(|item| render_value(item, indent + 1))
                .collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Object(map) => {
            if map.is_empty() {
                return "{}".to_string();
            }
            let pad = "  ".repeat(indent + 1);
            let close_pad = "  ".repeat(indent);
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = String::from("{\n");
            for key in keys {
                out.push_str(&format!(
                    "{pad}{} = {}\n",
                    quote(key),
                    render_value(&map[key.as_str()], indent + 1)
                ));
            }
            out.push_str(&format!("{close_pad}}}"));
            out
        }
    }
}

/// HCL string literal quoting; JSON escaping is a compatible subset.
fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use tgrun_core::BackendKind;
    use tgrun_core::config::IfExists;
    use tgrun_core::remote::RemoteStateGenerate;

    fn spec() -> RemoteStateSpec {
        // Deliberately unsorted declaration order.
        let mut config = IndexMap::new();
        config.insert("region".to_string(), Value::from("eu-west-1"));
        config.insert("bucket".to_string(), Value::from("team-state"));
        config.insert("key".to_string(), Value::from("app/terraform.tfstate"));
        config.insert("encrypt".to_string(), Value::from(true));
        let mut tags = hcl::Map::new();
        tags.insert("zone".to_string(), Value::from("b"));
        tags.insert("app".to_string(), Value::from("a"));
        config.insert("s3_bucket_tags".to_string(), Value::Object(tags));
        RemoteStateSpec {
            backend: BackendKind::S3,
            config,
            disable_bootstrap: false,
            generate: Some(RemoteStateGenerate {
                path: "backend.tf".to_string(),
                if_exists: IfExists::OverwriteTerragrunt,
            }),
        }
    }

    #[test]
    fn keys_are_sorted_lexicographically() {
        let rendered = render_backend_block(&spec());
        let bucket_pos = rendered.find("bucket").unwrap();
        let encrypt_pos = rendered.find("encrypt").unwrap();
        let key_pos = rendered.find("\"app/terraform.tfstate\"").unwrap();
        let region_pos = rendered.find("region").unwrap();
        assert!(bucket_pos < encrypt_pos);
        assert!(encrypt_pos < key_pos);
        assert!(key_pos < region_pos);
        // Nested maps sorted too.
        assert!(rendered.find("\"app\"").unwrap() < rendered.find("\"zone\"").unwrap());
    }

    #[test]
    fn rendering_is_deterministic() {
        assert_eq!(render_backend_block(&spec()), render_backend_block(&spec()));
    }

    #[test]
    fn block_shape_is_valid_hcl() {
        let rendered = render_backend_block(&spec());
        assert!(rendered.starts_with("terraform {\n  backend \"s3\" {\n"));
        assert!(rendered.ends_with("  }\n}\n"));
        assert!(hcl::parse(&rendered).is_ok());
    }

    #[test]
    fn generate_spec_carries_policy_and_contents() {
        let generated = backend_generate_spec(&spec()).unwrap();
        assert_eq!(generated.if_exists, IfExists::OverwriteTerragrunt);
        assert!(generated.contents.contains("backend \"s3\""));
        assert!(backend_generate_spec(&RemoteStateSpec {
            generate: None,
            ..spec()
        })
        .is_none());
    }
}
