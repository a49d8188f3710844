//! Common utilities.

use sha2::{Digest, Sha256};

/// SHA-256 hex fingerprint of a piece of text, used as a cache key component.
#[must_use]
pub fn compute_fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_hex() {
        let a = compute_fingerprint("apple unveils m5");
        let b = compute_fingerprint("apple unveils m5");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_distinguishes_inputs() {
        assert_ne!(compute_fingerprint("a"), compute_fingerprint("b"));
    }
}
