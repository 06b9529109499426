//! Content digests for opaque directive payloads.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA256 of a concatenated opaque payload (64 characters)
pub fn content_hash(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}
