//! Row keys for cached entries.

use sha2::{Digest, Sha256};

/// Compute the row key for an entry of `generation` stored under `url`.
///
/// The same URL in two generations yields two distinct rows.
pub fn compute_cache_key(generation: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(generation.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
