//! Checksum computation over a WAL entry's canonical payload.
//!
//! Digest bytes are hand-formatted into lowercase hex rather than pulling
//! in a dependency for a single call site.

use sha2::{Digest, Sha256};

/// Compute the lowercase-hex SHA-256 digest of `payload`.
pub fn digest_hex(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    let bytes = hasher.finalize();
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(digest_hex("abc"), digest_hex("abc"));
    }

    #[test]
    fn sensitive_to_input() {
        assert_ne!(digest_hex("abc"), digest_hex("abd"));
    }

    #[test]
    fn hex_lowercase() {
        let h = digest_hex("x");
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(h.len(), 64);
    }
}
