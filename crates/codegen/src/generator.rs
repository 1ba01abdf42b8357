//! File materialization with `if_exists` policies and signatures.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tgrun_core::config::{GenerateFileSpec, IfExists};
use tgrun_core::paths;

/// What happened to one target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedFileState {
    /// The file was written (created or replaced).
    Written,
    /// The policy was `skip` and the file already existed.
    Skipped,
}

/// Outcome record for one generate block.
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    /// Absolute target path.
    pub path: PathBuf,
    /// What happened.
    pub state: GeneratedFileState,
}

/// The signature comment identifying files written by this system.
///
/// Stable across runs for the same target name, so regenerated files stay
/// byte-identical.
#[must_use]
pub fn signature_line(comment_prefix: &str, target_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"tgrun-generated:");
    hasher.update(target_name.as_bytes());
    let digest = hex::encode(&hasher.finalize()[..8]);
    format!("{comment_prefix}Generated by tgrun. Sig: {digest}")
}

/// Materialize every generate block into the unit's working directory.
///
/// Specs are processed in declaration order; the first failure aborts and
/// nothing further is written.
pub fn materialize(unit_dir: &Path, specs: &[GenerateFileSpec]) -> Result<Vec<GeneratedFile>> {
    let mut results = Vec::with_capacity(specs.len());
    for spec in specs {
        results.push(materialize_one(unit_dir, spec)?);
    }
    Ok(results)
}

fn materialize_one(unit_dir: &Path, spec: &GenerateFileSpec) -> Result<GeneratedFile> {
    let target = paths::resolve(unit_dir, &spec.path);
    if !paths::is_within(&target, unit_dir) {
        return Err(Error::PathEscapesWorkingDir {
            path: target.into_boxed_path(),
        });
    }

    let exists = target.exists();
    if exists {
        match spec.if_exists {
            IfExists::Error => return Err(Error::exists(&target)),
            IfExists::Skip => {
                tracing::debug!(path = %target.display(), "Generate skipped: file exists");
                return Ok(GeneratedFile {
                    path: target,
                    state: GeneratedFileState::Skipped,
                });
            }
            IfExists::Overwrite => {}
            IfExists::OverwriteTerragrunt => {
                if !written_by_us(&target, spec)? {
                    // Cannot prove the existing file is ours; replacing it
                    // could destroy user-authored content.
                    return Err(Error::exists(&target));
                }
            }
        }
    }

    let contents = render(spec);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|err| Error::io(err, format!("create {}", parent.display())))?;
    }
    std::fs::write(&target, contents)
        .map_err(|err| Error::io(err, format!("write {}", target.display())))?;
    tracing::debug!(path = %target.display(), "Generated file");

    Ok(GeneratedFile {
        path: target,
        state: GeneratedFileState::Written,
    })
}

/// Full file contents: signature line (unless disabled) plus the payload.
fn render(spec: &GenerateFileSpec) -> String {
    if spec.disable_signature {
        return spec.contents.clone();
    }
    let target_name = spec.path.to_string_lossy();
    let mut out = signature_line(&spec.comment_prefix, &target_name);
    out.push('\n');
    out.push_str(&spec.contents);
    out
}

/// Whether the existing file carries our signature for this target.
fn written_by_us(target: &Path, spec: &GenerateFileSpec) -> Result<bool> {
    let existing = std::fs::read_to_string(target)
        .map_err(|err| Error::io(err, format!("read {}", target.display())))?;
    let expected = signature_line(&spec.comment_prefix, &spec.path.to_string_lossy());
    Ok(existing.lines().next() == Some(expected.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn spec(path: &str, if_exists: IfExists, contents: &str) -> GenerateFileSpec {
        GenerateFileSpec {
            name: "test".to_string(),
            path: PathBuf::from(path),
            if_exists,
            comment_prefix: GenerateFileSpec::DEFAULT_COMMENT_PREFIX.to_string(),
            disable_signature: false,
            contents: contents.to_string(),
        }
    }

    #[test]
    fn writes_signed_file() {
        let tmp = TempDir::new().unwrap();
        let results = materialize(
            tmp.path(),
            &[spec("backend.tf", IfExists::OverwriteTerragrunt, "terraform {}\n")],
        )
        .unwrap();
        assert_eq!(results[0].state, GeneratedFileState::Written);

        let written = std::fs::read_to_string(tmp.path().join("backend.tf")).unwrap();
        assert!(written.starts_with("# Generated by tgrun. Sig: "));
        assert!(written.ends_with("terraform {}\n"));
    }

    #[test]
    fn generation_is_byte_identical_across_runs() {
        let tmp = TempDir::new().unwrap();
        let file_spec = spec("provider.tf", IfExists::OverwriteTerragrunt, "provider {}\n");
        materialize(tmp.path(), std::slice::from_ref(&file_spec)).unwrap();
        let first = std::fs::read(tmp.path().join("provider.tf")).unwrap();
        materialize(tmp.path(), std::slice::from_ref(&file_spec)).unwrap();
        let second = std::fs::read(tmp.path().join("provider.tf")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn error_policy_rejects_existing_unsigned_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("backend.tf"), "user content\n").unwrap();

        let err =
            materialize(tmp.path(), &[spec("backend.tf", IfExists::Error, "x")]).unwrap_err();
        match err {
            Error::GenerateFileExists { path } => assert!(path.ends_with("backend.tf")),
            other => panic!("expected file-exists, got {other}"),
        }
    }

    #[test]
    fn overwrite_terragrunt_refuses_foreign_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("main.tf"), "hand written\n").unwrap();

        let err = materialize(
            tmp.path(),
            &[spec("main.tf", IfExists::OverwriteTerragrunt, "generated\n")],
        )
        .unwrap_err();
        assert!(matches!(err, Error::GenerateFileExists { .. }));

        // Plain overwrite replaces it regardless.
        materialize(tmp.path(), &[spec("main.tf", IfExists::Overwrite, "generated\n")]).unwrap();
        let replaced = std::fs::read_to_string(tmp.path().join("main.tf")).unwrap();
        assert!(replaced.contains("generated"));
    }

    #[test]
    fn overwrite_terragrunt_replaces_own_output() {
        let tmp = TempDir::new().unwrap();
        let v1 = spec("backend.tf", IfExists::OverwriteTerragrunt, "v1\n");
        materialize(tmp.path(), std::slice::from_ref(&v1)).unwrap();

        let v2 = spec("backend.tf", IfExists::OverwriteTerragrunt, "v2\n");
        let results = materialize(tmp.path(), std::slice::from_ref(&v2)).unwrap();
        assert_eq!(results[0].state, GeneratedFileState::Written);
        let written = std::fs::read_to_string(tmp.path().join("backend.tf")).unwrap();
        assert!(written.contains("v2"));
    }

    #[test]
    fn skip_leaves_existing_content() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("versions.tf"), "pinned\n").unwrap();

        let results =
            materialize(tmp.path(), &[spec("versions.tf", IfExists::Skip, "new")]).unwrap();
        assert_eq!(results[0].state, GeneratedFileState::Skipped);
        let untouched = std::fs::read_to_string(tmp.path().join("versions.tf")).unwrap();
        assert_eq!(untouched, "pinned\n");
    }

    #[test]
    fn disable_signature_writes_raw_contents() {
        let tmp = TempDir::new().unwrap();
        let mut raw = spec("raw.tf", IfExists::Overwrite, "only this\n");
        raw.disable_signature = true;
        materialize(tmp.path(), &[raw]).unwrap();
        let written = std::fs::read_to_string(tmp.path().join("raw.tf")).unwrap();
        assert_eq!(written, "only this\n");
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let err = materialize(
            tmp.path(),
            &[spec("../outside.tf", IfExists::Overwrite, "x")],
        )
        .unwrap_err();
        assert!(matches!(err, Error::PathEscapesWorkingDir { .. }));
    }
}
