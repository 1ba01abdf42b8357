//! Provider naming constraints and config helpers.

use crate::error::{Error, Result};
use hcl::Value;
use indexmap::IndexMap;
use tgrun_core::RemoteStateSpec;

/// S3 bucket naming: 3-63 characters of lowercase letters, digits, dots,
/// and hyphens, starting and ending alphanumeric.
pub fn check_s3_bucket_name(name: &str) -> Result<()> {
    check_length(name, 3, 63, "bucket")?;
    check_edges(name, "bucket")?;
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '.' || *c == '-'))
    {
        return Err(Error::ContainerValidation {
            issue: format!("bucket name '{name}' contains invalid character '{bad}'"),
        });
    }
    Ok(())
}

/// GCS bucket naming: 3-63 characters of lowercase letters, digits, dots,
/// hyphens, and underscores, starting and ending alphanumeric.
pub fn check_gcs_bucket_name(name: &str) -> Result<()> {
    check_length(name, 3, 63, "bucket")?;
    check_edges(name, "bucket")?;
    if let Some(bad) = name.chars().find(|c| {
        !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '_')
    }) {
        return Err(Error::ContainerValidation {
            issue: format!("bucket name '{name}' contains invalid character '{bad}'"),
        });
    }
    Ok(())
}

/// Azure container naming: 3-63 characters of lowercase letters, digits,
/// and single hyphens, starting and ending alphanumeric.
pub fn check_container_name(name: &str) -> Result<()> {
    check_length(name, 3, 63, "container")?;
    check_edges(name, "container")?;
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(Error::ContainerValidation {
            issue: format!("container name '{name}' contains invalid character '{bad}'"),
        });
    }
    if name.contains("--") {
        return Err(Error::ContainerValidation {
            issue: format!("container name '{name}' contains consecutive hyphens"),
        });
    }
    Ok(())
}

fn check_length(name: &str, min: usize, max: usize, what: &str) -> Result<()> {
    if name.len() < min || name.len() > max {
        return Err(Error::ContainerValidation {
            issue: format!(
                "{what} name '{name}' must be {min}-{max} characters, got {}",
                name.len()
            ),
        });
    }
    Ok(())
}

fn check_edges(name: &str, what: &str) -> Result<()> {
    let ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !ok(name.chars().next()) || !ok(name.chars().next_back()) {
        return Err(Error::ContainerValidation {
            issue: format!("{what} name '{name}' must start and end alphanumeric"),
        });
    }
    Ok(())
}

/// Extract a string→string tag map from a config field, if declared.
pub fn tags_from(spec: &RemoteStateSpec, field: &str) -> Result<IndexMap<String, String>> {
    let mut tags = IndexMap::new();
    let Some(value) = spec.config.get(field) else {
        return Ok(tags);
    };
    let Value::Object(entries) = value else {
        return Err(Error::config(format!("field '{field}' must be an object")));
    };
    for (key, tag_value) in entries {
        let Some(tag) = tag_value.as_str() else {
            return Err(Error::config(format!(
                "tag '{key}' in '{field}' must be a string"
            )));
        };
        tags.insert(key.clone(), tag.to_string());
    }
    Ok(tags)
}

/// Fetch a required string out of the spec, as a backend error.
pub fn required_str<'a>(spec: &'a RemoteStateSpec, field: &str) -> Result<&'a str> {
    spec.required_str(field).map_err(Error::config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_names() {
        assert!(check_s3_bucket_name("my-state.bucket-01").is_ok());
        assert!(check_s3_bucket_name("ab").is_err());
        assert!(check_s3_bucket_name("Has-Caps").is_err());
        assert!(check_s3_bucket_name("-leading").is_err());
        assert!(check_s3_bucket_name("under_score").is_err());
    }

    #[test]
    fn gcs_names_allow_underscores() {
        assert!(check_gcs_bucket_name("my_state_bucket").is_ok());
        assert!(check_gcs_bucket_name("_leading").is_err());
    }

    #[test]
    fn container_names_are_strict() {
        assert!(check_container_name("tfstate-prod").is_ok());
        assert!(check_container_name("tf..state").is_err());
        assert!(check_container_name("double--hyphen").is_err());
        assert!(check_container_name("UPPER").is_err());
    }
}
