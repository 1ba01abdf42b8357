//! Module-source materialization into the unit's cache directory.
//!
//! Local directory sources are copied into
//! `<unit>/.terragrunt-cache/<fingerprint>/` and the downstream binary runs
//! there. Remote getter URLs are not fetched by this layer.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tgrun_core::{RunContext, paths};

/// Resolve the working directory for a unit: its own directory when no
/// source is declared, otherwise the materialized source tree.
pub fn prepare_working_dir(
    run: &RunContext,
    unit_dir: &Path,
    source: Option<&str>,
) -> Result<PathBuf> {
    let override_path = run.source_override.as_deref();
    let source = match (override_path, source) {
        (Some(overridden), _) => Some(overridden.to_string_lossy().into_owned()),
        (None, Some(declared)) => Some(declared.to_string()),
        (None, None) => return Ok(unit_dir.to_path_buf()),
    };
    let Some(source) = source else {
        return Ok(unit_dir.to_path_buf());
    };

    if looks_remote(&source) {
        return Err(Error::Source {
            source_ref: source,
            unit: unit_dir.to_path_buf().into_boxed_path(),
            cause: "remote getter URLs are not supported; use a local path".to_string(),
        });
    }

    let origin = paths::resolve(unit_dir, Path::new(&source));
    if !origin.is_dir() {
        return Err(Error::Source {
            source_ref: source,
            unit: unit_dir.to_path_buf().into_boxed_path(),
            cause: format!("{} is not a directory", origin.display()),
        });
    }

    let target = cache_dir_for(unit_dir, &source);
    if target.is_dir() && !run.source_update {
        tracing::debug!(workdir = %target.display(), "Reusing materialized source");
        return Ok(target);
    }

    if target.is_dir() {
        std::fs::remove_dir_all(&target).map_err(|err| Error::Subprocess {
            source: err,
            operation: format!("clear stale source cache {}", target.display()),
        })?;
    }
    copy_tree(&origin, &target)?;
    tracing::info!(
        source = source.as_str(),
        workdir = %target.display(),
        "Materialized module source"
    );
    Ok(target)
}

/// Cache path for a source string, stable per `(unit, source)`.
#[must_use]
pub fn cache_dir_for(unit_dir: &Path, source: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let digest = hex::encode(&hasher.finalize()[..8]);
    unit_dir.join(paths::CACHE_DIR_NAME).join(digest)
}

fn looks_remote(source: &str) -> bool {
    source.contains("://") || source.split_once("::").is_some()
}

fn copy_tree(origin: &Path, target: &Path) -> Result<()> {
    let copy_err = |err: std::io::Error, what: &Path| Error::Subprocess {
        source: err,
        operation: format!("copy source tree entry {}", what.display()),
    };

    std::fs::create_dir_all(target).map_err(|err| copy_err(err, target))?;
    let entries = std::fs::read_dir(origin).map_err(|err| copy_err(err, origin))?;
    for entry in entries {
        let entry = entry.map_err(|err| copy_err(err, origin))?;
        let name = entry.file_name();
        if name
            .to_str()
            .is_some_and(paths::is_skipped_dir)
        {
            continue;
        }
        let from = entry.path();
        let to = target.join(&name);
        let file_type = entry.file_type().map_err(|err| copy_err(err, &from))?;
        if file_type.is_dir() {
            copy_tree(&from, &to)?;
        } else if file_type.is_file() {
            std::fs::copy(&from, &to).map_err(|err| copy_err(err, &from))?;
        }
        // Symlinks are intentionally not followed.
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tgrun_core::Action;

    fn module(root: &Path) -> PathBuf {
        let module_dir = root.join("modules/app");
        std::fs::create_dir_all(module_dir.join("sub")).unwrap();
        std::fs::write(module_dir.join("main.tf"), "resource {}\n").unwrap();
        std::fs::write(module_dir.join("sub/extra.tf"), "# extra\n").unwrap();
        module_dir
    }

    #[test]
    fn no_source_runs_in_unit_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let run = RunContext::new(tmp.path(), Action::Plan);
        let unit = tmp.path().join("app");
        std::fs::create_dir_all(&unit).unwrap();
        assert_eq!(prepare_working_dir(&run, &unit, None).unwrap(), unit);
    }

    #[test]
    fn local_source_is_copied_into_cache() {
        let tmp = tempfile::tempdir().unwrap();
        module(tmp.path());
        let unit = tmp.path().join("app");
        std::fs::create_dir_all(&unit).unwrap();

        let run = RunContext::new(tmp.path(), Action::Plan);
        let workdir = prepare_working_dir(&run, &unit, Some("../modules/app")).unwrap();
        assert!(workdir.starts_with(unit.join(paths::CACHE_DIR_NAME)));
        assert!(workdir.join("main.tf").is_file());
        assert!(workdir.join("sub/extra.tf").is_file());
    }

    #[test]
    fn cache_is_reused_unless_update_requested() {
        let tmp = tempfile::tempdir().unwrap();
        let module_dir = module(tmp.path());
        let unit = tmp.path().join("app");
        std::fs::create_dir_all(&unit).unwrap();

        let run = RunContext::new(tmp.path(), Action::Plan);
        let workdir = prepare_working_dir(&run, &unit, Some("../modules/app")).unwrap();
        std::fs::write(module_dir.join("main.tf"), "changed\n").unwrap();

        let cached = prepare_working_dir(&run, &unit, Some("../modules/app")).unwrap();
        assert_eq!(cached, workdir);
        let contents = std::fs::read_to_string(cached.join("main.tf")).unwrap();
        assert_eq!(contents, "resource {}\n", "stale copy served from cache");

        let mut updating = RunContext::new(tmp.path(), Action::Plan);
        updating.source_update = true;
        let refreshed = prepare_working_dir(&updating, &unit, Some("../modules/app")).unwrap();
        let contents = std::fs::read_to_string(refreshed.join("main.tf")).unwrap();
        assert_eq!(contents, "changed\n");
    }

    #[test]
    fn remote_sources_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let run = RunContext::new(tmp.path(), Action::Plan);
        let unit = tmp.path().join("app");
        std::fs::create_dir_all(&unit).unwrap();

        for remote in ["git::https://example.com/mod.git", "https://example.com/m.zip"] {
            let err = prepare_working_dir(&run, &unit, Some(remote)).unwrap_err();
            assert!(matches!(err, Error::Source { .. }), "{remote}");
        }
    }

    #[test]
    fn source_override_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let module_dir = module(tmp.path());
        let unit = tmp.path().join("app");
        std::fs::create_dir_all(&unit).unwrap();

        let mut run = RunContext::new(tmp.path(), Action::Plan);
        run.source_override = Some(module_dir);
        let workdir = prepare_working_dir(&run, &unit, Some("../does/not/exist")).unwrap();
        assert!(workdir.join("main.tf").is_file());
    }
}
