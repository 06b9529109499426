//! Rule-tree byte stores

#![allow(clippy::result_large_err)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::atomic::atomic_write;
use crate::errors::{io_error, missing, poisoned, Result};

/// Byte-level persistence used to load and save rule trees
///
/// Implementations must be shareable across tasks.
pub trait RuleTreeStore: Send + Sync {
    /// Read the whole file at `path`
    ///
    /// # Errors
    ///
    /// `NotFound` when nothing is stored at `path`, `Io` otherwise.
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Replace the file at `path` with `bytes`
    ///
    /// # Errors
    ///
    /// `Io` when the bytes cannot be persisted.
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;
}

/// Filesystem store; relative paths resolve against `root`
#[derive(Debug, Clone, Default)]
pub struct FsRuleTreeStore {
    root: Option<PathBuf>,
}

impl FsRuleTreeStore {
    /// A store resolving relative paths against the process working directory
    pub fn new() -> Self {
        Self { root: None }
    }

    /// A store resolving relative paths against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl RuleTreeStore for FsRuleTreeStore {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        fs::read(&full).map_err(|e| io_error("read_rule_tree", &full, e))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let full = self.resolve(path);
        atomic_write(&full, bytes)?;
        tracing::debug!(path = %full.display(), bytes = bytes.len(), "rule tree written");
        Ok(())
    }
}

/// In-memory store keyed by path
#[derive(Debug, Default)]
pub struct MemoryRuleTreeStore {
    files: RwLock<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryRuleTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file
    pub fn insert(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(path.into(), bytes.into());
        }
    }

    /// Stored bytes at `path`, if any
    pub fn get(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.read().ok()?.get(path).cloned()
    }

    /// Stored paths, sorted
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self
            .files
            .read()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }
}

impl RuleTreeStore for MemoryRuleTreeStore {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let files = self.files.read().map_err(|_| poisoned("read_rule_tree"))?;
        files
            .get(path)
            .cloned()
            .ok_or_else(|| missing("read_rule_tree", path))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut files = self.files.write().map_err(|_| poisoned("write_rule_tree"))?;
        files.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}
