//! SHA-256 hashing for blocks, transactions and addresses.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hash of arbitrary data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_deterministic() {
        let h1 = sha256(b"hello weave");
        let h2 = sha256(b"hello weave");
        assert_eq!(h1, h2);
    }

    #[test]
    fn sha256_different_inputs() {
        assert_ne!(sha256(b"hello"), sha256(b"world"));
    }

    #[test]
    fn sha256_empty_is_nonzero() {
        assert_ne!(sha256(b""), [0u8; 32]);
    }

    #[test]
    fn sha256_multi_equivalent() {
        let single = sha256(b"helloworld");
        let multi = sha256_multi(&[b"hello", b"world"]);
        assert_eq!(single, multi);
    }
}
