use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Integrity-checked wrapper for values stored in the response caches.
///
/// Cached provider responses are stored with a SHA-256 checksum; retrieval
/// re-hashes the payload and rejects any entry whose digest no longer
/// matches, falling back to a fresh fetch instead of serving corrupted
/// data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedCacheEntry {
    payload: String,
    checksum: String,
}

impl ValidatedCacheEntry {
    /// Serializes a value and seals it with its checksum, ready for cache
    /// insertion. Returns `None` only if the value fails to serialize.
    pub fn seal<T: Serialize>(value: &T) -> Option<String> {
        let payload = serde_json::to_string(value).ok()?;
        let entry = Self {
            checksum: digest(&payload),
            payload,
        };
        serde_json::to_string(&entry).ok()
    }

    /// Opens a sealed cache entry, validating the checksum before
    /// deserializing. Returns `None` for corrupted, tampered or
    /// shape-mismatched entries.
    pub fn open<T: DeserializeOwned>(sealed: &str) -> Option<T> {
        let entry: ValidatedCacheEntry = serde_json::from_str(sealed).ok()?;

        if digest(&entry.payload) != entry.checksum {
            tracing::warn!(
                "Cache validation failed: checksum mismatch (payload length {})",
                entry.payload.len()
            );
            return None;
        }

        serde_json::from_str(&entry.payload).ok()
    }
}

fn digest(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}
