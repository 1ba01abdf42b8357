//! Unit discovery: walk the tree, apply queue filters.

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tgrun_core::paths;
use walkdir::WalkDir;

/// Queue filters applied to discovered unit paths.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// `--queue-include-dir` globs, against root-relative paths.
    pub include_dirs: Vec<String>,
    /// `--queue-exclude-dir` globs, against root-relative paths.
    pub exclude_dirs: Vec<String>,
    /// Restrict the queue to exactly the include union; without this,
    /// dependencies of included units are pulled in as well.
    pub strict_include: bool,
}

impl DiscoveryOptions {
    /// Whether any include filter is configured.
    #[must_use]
    pub fn has_includes(&self) -> bool {
        !self.include_dirs.is_empty()
    }
}

/// Compiled filter set.
#[derive(Debug)]
pub struct QueueFilter {
    includes: Option<GlobSet>,
    excludes: Option<GlobSet>,
    root: PathBuf,
}

impl QueueFilter {
    /// Compile the filter globs.
    pub fn compile(root: &Path, options: &DiscoveryOptions) -> Result<Self> {
        Ok(Self {
            includes: build_globset(&options.include_dirs)?,
            excludes: build_globset(&options.exclude_dirs)?,
            root: root.to_path_buf(),
        })
    }

    /// Whether the unit at `dir` passes the include filter.
    #[must_use]
    pub fn included(&self, dir: &Path) -> bool {
        match &self.includes {
            Some(set) => {
                let rel = self.relative(dir);
                set.is_match(&rel)
            }
            None => true,
        }
    }

    /// Whether the unit at `dir` is rejected by the exclude filter.
    #[must_use]
    pub fn excluded(&self, dir: &Path) -> bool {
        match &self.excludes {
            Some(set) => {
                let rel = self.relative(dir);
                set.is_match(&rel)
            }
            None => false,
        }
    }

    fn relative(&self, dir: &Path) -> PathBuf {
        paths::normalize(dir)
            .strip_prefix(paths::normalize(&self.root))
            .map_or_else(|_| dir.to_path_buf(), Path::to_path_buf)
    }
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|err| Error::Filter {
            pattern: pattern.clone(),
            cause: err.to_string(),
        })?;
        builder.add(glob);
    }
    let set = builder.build().map_err(|err| Error::Filter {
        pattern: patterns.join(", "),
        cause: err.to_string(),
    })?;
    Ok(Some(set))
}

/// Walk `root` and return every directory containing a unit configuration,
/// in sorted order. Cache and VCS directories are skipped.
pub fn discover_units(root: &Path) -> Result<Vec<PathBuf>> {
    let mut units = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            // The walk root may itself be a cache-named directory (e.g. a
            // stack materialization); only prune below it.
            entry.depth() == 0
                || !(entry.file_type().is_dir()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(paths::is_skipped_dir))
        });

    for entry in walker {
        let entry = entry.map_err(|source| Error::Walk {
            root: root.to_path_buf().into_boxed_path(),
            source,
        })?;
        if entry.file_type().is_file() && entry.file_name() == paths::CONFIG_FILENAME {
            if let Some(dir) = entry.path().parent() {
                tracing::debug!(unit = %dir.display(), "Discovered unit");
                units.push(paths::normalize(dir));
            }
        }
    }

    units.sort();
    units.dedup();
    Ok(units)
}
