//! Cache storage backends.
//!
//! A [`CacheStore`] moves opaque artifact bytes in and out of some medium.
//! Validation lives one level up in [`crate::cache::CodeCache`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::cache::key::CacheKey;
use crate::error::CacheError;

/// File extension for cached unit artifacts.
const UNIT_EXT: &str = "unit";

/// Trait for cache storage backends.
pub trait CacheStore: Send {
    /// Loads the bytes stored under `key`, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium can't be read.
    fn load(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError>;

    /// Stores `bytes` under `key`.
    ///
    /// Writing bytes identical to what is already stored is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium can't be written.
    fn save(&mut self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError>;

    /// Removes every entry, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if entries can't be removed.
    fn clear(&mut self) -> Result<usize, CacheError>;

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Returns `true` if nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process cache store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<CacheKey, Vec<u8>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn load(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError> {
        if self.entries.get(key).is_some_and(|b| b == bytes) {
            return Ok(());
        }
        self.entries.insert(*key, bytes.to_vec());
        Ok(())
    }

    fn clear(&mut self) -> Result<usize, CacheError> {
        let n = self.entries.len();
        self.entries.clear();
        Ok(n)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// On-disk cache store: one `<key>.unit` file per entry.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves either the old entry or none.
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    /// Creates a store rooted at `dir`. The directory is created lazily on
    /// first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the artifact for `key`.
    #[must_use]
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{key}.{UNIT_EXT}"))
    }

    fn entries(&self) -> Vec<PathBuf> {
        let Ok(read_dir) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        read_dir
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == UNIT_EXT))
            .collect()
    }
}

fn io_error(path: &Path, err: &std::io::Error) -> CacheError {
    CacheError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

impl CacheStore for DiskStore {
    fn load(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.entry_path(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, &e)),
        }
    }

    fn save(&mut self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        if std::fs::read(&path).is_ok_and(|existing| existing == bytes) {
            return Ok(());
        }

        std::fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, &e))?;
        let tmp = path.with_extension(format!("{UNIT_EXT}.tmp"));
        std::fs::write(&tmp, bytes).map_err(|e| io_error(&tmp, &e))?;
        std::fs::rename(&tmp, &path).map_err(|e| io_error(&path, &e))?;
        Ok(())
    }

    fn clear(&mut self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for path in self.entries() {
            std::fs::remove_file(&path).map_err(|e| io_error(&path, &e))?;
            removed += 1;
        }
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.entries().len()
    }
}
