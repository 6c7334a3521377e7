//! Content hashing helpers used for protocol dedup (64-hex content hash)
//! and cache key derivation (spec §4.A).

use sha2::{Digest, Sha256};

/// Full SHA-256 hex digest of `bytes` (64 hex chars) — used for the
/// protocol content hash.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Short (16 hex char) digest of `text`, used for prompt/schema hashes
/// that feed the cache key closure.
#[must_use]
pub fn short_text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let full = hex_encode(&hasher.finalize());
    full[..16].to_string()
}

/// SHA-256 over an arbitrary ordered sequence of key parts, joined with a
/// separator byte that cannot appear inside any part's own hash, so the
/// combination is unambiguous regardless of part lengths.
#[must_use]
pub fn combine_hashes(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_is_64_chars() {
        let h = sha256_hex(b"hello world");
        assert_eq!(h.len(), 64);
    }

    #[test]
    fn combine_hashes_is_deterministic_and_order_sensitive() {
        let a = combine_hashes(&["x", "y"]);
        let b = combine_hashes(&["x", "y"]);
        let c = combine_hashes(&["y", "x"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
