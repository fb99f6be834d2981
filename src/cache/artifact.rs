//! Cache artifact encoding.
//!
//! Every entry is stored as a 4-byte little-endian header length, a
//! bincode-encoded [`ArtifactHeader`], then the bincode-encoded unit. The
//! header carries magic bytes, a format version, the fingerprint recorded
//! at store time and a checksum of the payload.

use serde::{Deserialize, Serialize};

use crate::cache::key::Fingerprint;
use crate::core::CompiledUnit;
use crate::error::CacheError;

/// Magic bytes identifying an incsh cache artifact.
const ARTIFACT_MAGIC: [u8; 4] = *b"INCS";

/// Current artifact format version. Increment on breaking changes to the
/// header or payload format.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Upper bound on bytes any single decode may claim. Length prefixes past
/// it fail instead of allocating.
pub const DECODE_LIMIT: usize = 16 * 1024 * 1024;

/// Header prepended to every artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Magic bytes: must be `b"INCS"`.
    pub magic: [u8; 4],

    /// Artifact format version.
    pub format_version: u32,

    /// Fingerprint in force when the entry was written.
    pub fingerprint: Fingerprint,

    /// XXH3-128 of the payload bytes.
    pub checksum: u128,
}

/// Serializes `unit` into artifact bytes stamped with `fingerprint`.
pub fn encode(unit: &CompiledUnit, fingerprint: &Fingerprint) -> Result<Vec<u8>, CacheError> {
    let payload = bincode::serde::encode_to_vec(unit, bincode::config::standard())?;
    let header = ArtifactHeader {
        magic: ARTIFACT_MAGIC,
        format_version: ARTIFACT_FORMAT_VERSION,
        fingerprint: fingerprint.clone(),
        checksum: xxhash_rust::xxh3::xxh3_128(&payload),
    };
    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())?;

    let header_len = u32::try_from(header_bytes.len()).map_err(|_| CacheError::InvalidHeader {
        reason: "header too large".to_string(),
    })?;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(&payload);
    Ok(output)
}

/// Decodes artifact bytes, validating them against `expected`.
///
/// Fails on truncation, bad magic, a different format version, a stale
/// fingerprint, a checksum mismatch, or an undecodable payload.
pub fn decode(raw: &[u8], expected: &Fingerprint) -> Result<CompiledUnit, CacheError> {
    let (len_bytes, rest) = raw.split_first_chunk::<4>().ok_or(CacheError::InvalidHeader {
        reason: "truncated header length".to_string(),
    })?;
    let header_len = u32::from_le_bytes(*len_bytes) as usize;
    if rest.len() < header_len {
        return Err(CacheError::InvalidHeader {
            reason: format!("header claims {header_len} bytes, {} available", rest.len()),
        });
    }
    let (header_bytes, payload) = rest.split_at(header_len);

    let config = bincode::config::standard().with_limit::<DECODE_LIMIT>();
    let (header, _): (ArtifactHeader, usize) =
        bincode::serde::decode_from_slice(header_bytes, config)?;

    if header.magic != ARTIFACT_MAGIC {
        return Err(CacheError::InvalidHeader {
            reason: "bad magic bytes".to_string(),
        });
    }
    if header.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(CacheError::VersionMismatch {
            expected: ARTIFACT_FORMAT_VERSION,
            actual: header.format_version,
        });
    }
    if &header.fingerprint != expected {
        return Err(CacheError::Stale {
            expected: expected.to_string(),
            actual: header.fingerprint.to_string(),
        });
    }
    let actual = xxhash_rust::xxh3::xxh3_128(payload);
    if actual != header.checksum {
        return Err(CacheError::ChecksumMismatch {
            expected: format!("{:032x}", header.checksum),
            actual: format!("{actual:032x}"),
        });
    }

    let (unit, _): (CompiledUnit, usize) = bincode::serde::decode_from_slice(payload, config)?;
    Ok(unit)
}
