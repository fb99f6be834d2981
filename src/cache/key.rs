//! Cache keys and validity fingerprints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Deterministic identifier for a piece of source text (XXH3-128).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(u128);

impl CacheKey {
    /// Computes the key for `source`.
    #[must_use]
    pub fn from_source(source: &str) -> Self {
        Self(xxhash_rust::xxh3::xxh3_128(source.as_bytes()))
    }

    /// Parses a key from its 32-digit hex form.
    #[must_use]
    pub fn parse(hex: &str) -> Option<Self> {
        if hex.len() != 32 {
            return None;
        }
        u128::from_str_radix(hex, 16).ok().map(Self)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Freshness stamp stored alongside a cache entry.
///
/// An entry is only reused when the fingerprint computed now equals the
/// one recorded at store time. Interactive input is stamped with the
/// compiler's identity; script files additionally carry their modification
/// time, so editing a script invalidates its entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint for interactive source compiled by `compiler`.
    #[must_use]
    pub fn interactive(compiler: &str) -> Self {
        Self(compiler.to_string())
    }

    /// Fingerprint for a script file compiled by `compiler`.
    ///
    /// Returns `None` when the modification time can't be read, in which
    /// case the file should not be cached at all.
    #[must_use]
    pub fn for_file(compiler: &str, path: &Path) -> Option<Self> {
        let modified = std::fs::metadata(path).ok()?.modified().ok()?;
        let nanos = modified.duration_since(UNIX_EPOCH).ok()?.as_nanos();
        Some(Self(format!("{compiler}@{nanos}")))
    }

    /// String form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
