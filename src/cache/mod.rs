//! Content-addressed cache of compiled units.
//!
//! Source text is hashed into a [`CacheKey`]; the stored artifact carries a
//! [`Fingerprint`] that must match the current one before the unit is
//! reused. Every failure on the lookup path degrades to a miss, so the worst
//! a broken cache can do is make the shell recompile.

pub mod artifact;
pub mod key;
pub mod store;

pub use key::{CacheKey, Fingerprint};
pub use store::{CacheStore, DiskStore, MemoryStore};

use std::fmt;

use crate::core::{CompileMode, CompiledUnit};
use crate::error::CacheError;

/// Which compile modes may use the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Cache interactive (`Single` mode) input.
    pub cache_everything: bool,

    /// Cache whole scripts (`Exec` mode).
    pub cache_scripts: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            cache_everything: false,
            cache_scripts: true,
        }
    }
}

impl CachePolicy {
    /// Policy that never uses the cache.
    #[must_use]
    pub const fn off() -> Self {
        Self {
            cache_everything: false,
            cache_scripts: false,
        }
    }

    /// Policy that caches every mode.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            cache_everything: true,
            cache_scripts: true,
        }
    }

    /// Returns `true` if `mode` may use the cache.
    #[must_use]
    pub const fn allows(self, mode: CompileMode) -> bool {
        match mode {
            CompileMode::Single => self.cache_everything,
            CompileMode::Exec => self.cache_scripts,
        }
    }
}

/// Cache of compiled units over a pluggable [`CacheStore`].
pub struct CodeCache {
    policy: CachePolicy,
    store: Box<dyn CacheStore>,
}

impl fmt::Debug for CodeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeCache")
            .field("policy", &self.policy)
            .field("entries", &self.store.len())
            .finish()
    }
}

impl CodeCache {
    /// Creates a cache over `store`.
    #[must_use]
    pub fn new(policy: CachePolicy, store: Box<dyn CacheStore>) -> Self {
        Self { policy, store }
    }

    /// In-memory cache.
    #[must_use]
    pub fn in_memory(policy: CachePolicy) -> Self {
        Self::new(policy, Box::new(MemoryStore::new()))
    }

    /// Cache that never hits and never stores.
    #[must_use]
    pub fn disabled() -> Self {
        Self::in_memory(CachePolicy::off())
    }

    /// The active policy.
    #[must_use]
    pub const fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Returns `true` if units compiled in `mode` go through the cache.
    #[must_use]
    pub const fn should_use_cache(&self, mode: CompileMode) -> bool {
        self.policy.allows(mode)
    }

    /// Looks up the unit previously compiled from `source`.
    ///
    /// Returns `None` on absence, a fingerprint mismatch, corruption, or a
    /// unit whose recorded source is not `source`.
    #[must_use]
    pub fn lookup(&self, source: &str, fingerprint: &Fingerprint) -> Option<CompiledUnit> {
        let key = CacheKey::from_source(source);
        let raw = match self.store.load(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(%key, "cache miss");
                return None;
            }
            Err(e) => {
                tracing::debug!(%key, error = %e, "cache load failed");
                return None;
            }
        };

        match artifact::decode(&raw, fingerprint) {
            Ok(unit) if unit.source() == source => {
                tracing::debug!(%key, "cache hit");
                Some(unit)
            }
            Ok(_) => {
                tracing::debug!(%key, "cache entry belongs to different source");
                None
            }
            Err(e) => {
                tracing::debug!(%key, error = %e, "cache entry rejected");
                None
            }
        }
    }

    /// Stores `unit` as the compiled form of `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact can't be encoded or written.
    pub fn store(
        &mut self,
        source: &str,
        unit: &CompiledUnit,
        fingerprint: &Fingerprint,
    ) -> Result<(), CacheError> {
        let key = CacheKey::from_source(source);
        let bytes = artifact::encode(unit, fingerprint)?;
        self.store.save(&key, &bytes)?;
        tracing::debug!(%key, mode = %unit.mode(), "cache store");
        Ok(())
    }

    /// Removes every entry, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store can't be cleared.
    pub fn clear(&mut self) -> Result<usize, CacheError> {
        self.store.clear()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(source: &str) -> CompiledUnit {
        CompiledUnit::new(source, CompileMode::Single, "<stdin>", vec![42])
    }

    #[test]
    fn test_policy_per_mode() {
        let policy = CachePolicy::default();
        assert!(!policy.allows(CompileMode::Single));
        assert!(policy.allows(CompileMode::Exec));

        let cache = CodeCache::in_memory(CachePolicy::all());
        assert!(cache.should_use_cache(CompileMode::Single));
        assert!(!CodeCache::disabled().should_use_cache(CompileMode::Exec));
    }

    #[test]
    fn test_lookup_after_store() {
        let fp = Fingerprint::interactive("lang-1");
        let mut cache = CodeCache::in_memory(CachePolicy::all());
        assert!(cache.lookup("echo hi\n", &fp).is_none());

        cache.store("echo hi\n", &unit("echo hi\n"), &fp).unwrap();
        assert_eq!(cache.lookup("echo hi\n", &fp), Some(unit("echo hi\n")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stale_entry_is_miss() {
        let mut cache = CodeCache::in_memory(CachePolicy::all());
        cache
            .store("echo hi\n", &unit("echo hi\n"), &Fingerprint::interactive("old"))
            .unwrap();
        assert!(
            cache
                .lookup("echo hi\n", &Fingerprint::interactive("new"))
                .is_none()
        );
    }

    #[test]
    fn test_corrupt_disk_entry_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let disk = DiskStore::new(dir.path());
        let path = disk.entry_path(&CacheKey::from_source("echo hi\n"));
        let mut cache = CodeCache::new(CachePolicy::all(), Box::new(disk));
        let fp = Fingerprint::interactive("lang-1");

        cache.store("echo hi\n", &unit("echo hi\n"), &fp).unwrap();
        std::fs::write(&path, b"not an artifact").unwrap();
        assert!(cache.lookup("echo hi\n", &fp).is_none());
    }

    #[test]
    fn test_store_is_idempotent() {
        let fp = Fingerprint::interactive("lang-1");
        let mut cache = CodeCache::in_memory(CachePolicy::all());
        cache.store("x\n", &unit("x\n"), &fp).unwrap();
        cache.store("x\n", &unit("x\n"), &fp).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.clear().unwrap(), 1);
        assert!(cache.is_empty());
    }
}
