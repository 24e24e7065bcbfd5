//! Executable replacement and staging-file removal
//!
//! The installed executable may still be held open for a moment by the
//! process that just exited, so both operations run under a bounded retry
//! policy. Replacement never writes into the destination in place: the
//! source is copied next to the destination first and then renamed over it,
//! which leaves the original untouched if any step fails.

use hopper_core::retry::{ClosurePredicate, RetryError, RetryExecutor, TracingObserver};
use hopper_core::types::{RetryPolicy, UpdaterConfig};
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ReplaceError;

const REPLACE_OPERATION: &str = "replace";
const REMOVE_OPERATION: &str = "remove";

/// File system calls a [`FileReplacer`] is built from
pub trait FileOps: Send + Sync {
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// [`FileOps`] backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileOps;

impl FileOps for StdFileOps {
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::copy(from, to).map(|_| ())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Replaces and removes files with bounded retries
#[derive(Clone)]
pub struct FileReplacer {
    replace_policy: RetryPolicy,
    remove_policy: RetryPolicy,
    ops: Arc<dyn FileOps>,
}

impl fmt::Debug for FileReplacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileReplacer")
            .field("replace_policy", &self.replace_policy)
            .field("remove_policy", &self.remove_policy)
            .finish_non_exhaustive()
    }
}

impl FileReplacer {
    pub fn new(replace_policy: RetryPolicy, remove_policy: RetryPolicy) -> Self {
        Self {
            replace_policy,
            remove_policy,
            ops: Arc::new(StdFileOps),
        }
    }

    /// Use the `replace` and `remove` retry policies from the configuration
    pub fn from_config(config: &UpdaterConfig) -> Self {
        Self::new(
            config.retry_policy(REPLACE_OPERATION),
            config.retry_policy(REMOVE_OPERATION),
        )
    }

    /// Route file system calls through `ops`
    pub fn with_file_ops(mut self, ops: Arc<dyn FileOps>) -> Self {
        self.ops = ops;
        self
    }

    pub fn replace_policy(&self) -> &RetryPolicy {
        &self.replace_policy
    }

    pub fn remove_policy(&self) -> &RetryPolicy {
        &self.remove_policy
    }

    /// Copy `source` over `destination`
    ///
    /// A missing `source` fails on the first attempt.
    pub async fn replace(&self, source: &Path, destination: &Path) -> Result<(), ReplaceError> {
        info!("Replacing {:?} with {:?}", destination, source);
        self.retry(&self.replace_policy, REPLACE_OPERATION, destination, || {
            self.replace_once(source, destination)
        })
        .await
    }

    /// Delete `path`; a file that is already gone counts as removed
    pub async fn remove(&self, path: &Path) -> Result<(), ReplaceError> {
        info!("Removing {:?}", path);
        self.retry(&self.remove_policy, REMOVE_OPERATION, path, || {
            match self.ops.remove_file(path) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("{:?} already removed", path);
                    Ok(())
                }
                other => other,
            }
        })
        .await
    }

    fn replace_once(&self, source: &Path, destination: &Path) -> io::Result<()> {
        let temp = temp_sibling(destination);

        let result = self
            .ops
            .copy(source, &temp)
            .and_then(|_| self.ops.rename(&temp, destination));
        if result.is_err() {
            let _ = self.ops.remove_file(&temp);
        }
        result
    }

    async fn retry<T, F>(
        &self,
        policy: &RetryPolicy,
        operation: &'static str,
        path: &Path,
        mut op: F,
    ) -> Result<T, ReplaceError>
    where
        F: FnMut() -> io::Result<T>,
    {
        RetryExecutor::<io::Error, _, _>::new(policy.clone())
            .with_predicate(ClosurePredicate::new(is_transient))
            .with_observer(TracingObserver::new(operation))
            .execute(|| std::future::ready(op()))
            .await
            .map_err(|err| {
                let (attempts, source) = match err {
                    RetryError::Exhausted {
                        attempts, source, ..
                    } => (attempts, source),
                    RetryError::NonRetryable(source) => (1, source),
                    RetryError::Cancelled {
                        attempts,
                        last_error,
                    } => (
                        attempts,
                        last_error.unwrap_or_else(|| io::Error::other("no attempt was made")),
                    ),
                };
                ReplaceError {
                    operation,
                    path: path.to_path_buf(),
                    attempts,
                    source,
                }
            })
    }
}

/// A missing file will not appear by waiting
fn is_transient(err: &io::Error) -> bool {
    err.kind() != io::ErrorKind::NotFound
}

/// Sibling of `destination` that receives the copy before the rename
fn temp_sibling(destination: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(destination.file_name().unwrap_or_default());
    name.push(".new");
    destination.with_file_name(name)
}
