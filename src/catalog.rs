//! Persisted registry of named connections.
//!
//! The file is a JSON object mapping connection name to folder path. It is
//! read once when the store is opened and rewritten in full after every
//! successful insert: exclusive lock on a sidecar `.lock` file, write to a
//! temp file in the same directory, then rename over the catalog.

use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::CatalogError;

pub struct CatalogStore {
    path: PathBuf,
    entries: BTreeMap<String, PathBuf>,
}

impl CatalogStore {
    /// Open the catalog at `path`. A missing file is an empty registry.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|source| CatalogError::Read {
                path: path.clone(),
                source,
            })?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|source| CatalogError::Parse {
                    path: path.clone(),
                    source,
                })?
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!(
            "opened catalog {} with {} connection(s)",
            path.display(),
            entries.len()
        );
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.entries.get(name).map(PathBuf::as_path)
    }

    /// Connection names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Map `name` to `folder`, replacing any previous mapping, and persist the
    /// whole registry. The in-memory registry only changes once the write succeeded.
    pub fn insert(&mut self, name: &str, folder: &Path) -> Result<Option<PathBuf>, CatalogError> {
        let mut updated = self.entries.clone();
        let previous = updated.insert(name.to_string(), folder.to_path_buf());
        self.write(&updated)?;
        self.entries = updated;
        Ok(previous)
    }

    fn write(&self, entries: &BTreeMap<String, PathBuf>) -> Result<(), CatalogError> {
        let json = serde_json::to_string_pretty(entries)?;
        let write_err = |source: std::io::Error| CatalogError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(write_err)?;

        let mut lock_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        lock_name.push(".lock");
        let lock_file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(dir.join(lock_name))
            .map_err(write_err)?;
        lock_file.lock_exclusive().map_err(write_err)?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.write_all(b"\n").map_err(write_err)?;
        tmp.flush().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        lock_file.unlock().map_err(write_err)?;
        Ok(())
    }
}
