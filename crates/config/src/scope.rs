//! Evaluation scope for the expression function library.
//!
//! The function library is registered as plain function pointers, so the
//! per-file context they need (which file is being evaluated, which unit
//! started the evaluation, include directories) is carried in a thread-local
//! scope stack. Evaluation of one file is synchronous and confined to one
//! thread, and nested entries model `read_terragrunt_config` recursion; the
//! stack doubles as the cycle detector for evaluation-time reads.

use crate::error::Error;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::path::{Path, PathBuf};

/// Maximum nesting of evaluation-time config reads.
pub const MAX_READ_DEPTH: usize = 32;

/// Context for the file currently being evaluated on this thread.
#[derive(Debug, Clone)]
pub struct Scope {
    /// The file being evaluated.
    pub file: PathBuf,
    /// Directory of that file.
    pub dir: PathBuf,
    /// Directory of the unit whose evaluation started the stack.
    pub original_dir: PathBuf,
    /// Include label → directory of the included file.
    pub include_dirs: IndexMap<String, PathBuf>,
    /// Account identity injected by the caller, if known.
    pub aws_account_id: Option<String>,
}

impl Scope {
    /// Scope for a top-level unit evaluation.
    #[must_use]
    pub fn for_unit(file: PathBuf) -> Self {
        let dir = file.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self {
            original_dir: dir.clone(),
            file,
            dir,
            include_dirs: IndexMap::new(),
            aws_account_id: std::env::var("TG_AWS_ACCOUNT_ID").ok(),
        }
    }

    /// Scope for an included parent file, keeping the child as origin.
    #[must_use]
    pub fn for_parent(&self, file: PathBuf) -> Self {
        let dir = file.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self {
            file,
            dir,
            original_dir: self.original_dir.clone(),
            include_dirs: self.include_dirs.clone(),
            aws_account_id: self.aws_account_id.clone(),
        }
    }
}

thread_local! {
    static STACK: RefCell<Vec<Scope>> = const { RefCell::new(Vec::new()) };
}

/// Run `f` with `scope` pushed onto the thread's evaluation stack.
///
/// Detects read cycles: pushing a file already on the stack fails with the
/// full chain. Evaluation code propagates errors instead of panicking, so
/// the pop is not panic-guarded.
pub fn with_scope<T, E>(scope: Scope, f: impl FnOnce() -> std::result::Result<T, E>) -> std::result::Result<T, E>
where
    E: From<Error>,
{
    STACK.with(|stack| {
        let mut borrowed = stack.borrow_mut();
        if borrowed.len() >= MAX_READ_DEPTH {
            return Err(Error::evaluation(
                &scope.file,
                format!("configuration reads nested deeper than {MAX_READ_DEPTH} levels"),
            ));
        }
        if borrowed.iter().any(|existing| existing.file == scope.file) {
            let mut chain: Vec<String> = borrowed
                .iter()
                .map(|existing| existing.file.display().to_string())
                .collect();
            chain.push(scope.file.display().to_string());
            return Err(Error::CyclicReference { chain });
        }
        borrowed.push(scope);
        Ok(())
    })?;

    let result = f();
    STACK.with(|stack| {
        stack.borrow_mut().pop();
    });
    result
}

/// The innermost scope, if evaluation is in progress on this thread.
#[must_use]
pub fn current() -> Option<Scope> {
    STACK.with(|stack| stack.borrow().last().cloned())
}

/// The innermost scope, or a function-library error naming the caller.
pub fn require(function: &str) -> std::result::Result<Scope, String> {
    current().ok_or_else(|| format!("{function} called outside configuration evaluation"))
}
