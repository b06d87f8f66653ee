//! PoW validation.

use weave_crypto::sha256_multi;
use weave_types::BlockHash;

/// Count the leading zero bits of a 32-byte digest.
pub fn leading_zero_bits(digest: &[u8; 32]) -> u32 {
    let mut bits = 0;
    for byte in digest {
        if *byte == 0 {
            bits += 8;
        } else {
            bits += byte.leading_zeros();
            break;
        }
    }
    bits
}

/// Validate that a nonce satisfies the PoW predicate for a candidate block.
///
/// The digest is `SHA256(indep_hash ‖ nonce_le ‖ recall_hash)`; it must have
/// at least `diff` leading zero bits.
pub fn validate_work(indep_hash: &BlockHash, nonce: u64, recall_hash: &BlockHash, diff: u32) -> bool {
    let digest = sha256_multi(&[
        indep_hash.as_bytes(),
        &nonce.to_le_bytes(),
        recall_hash.as_bytes(),
    ]);
    leading_zero_bits(&digest) >= diff
}
