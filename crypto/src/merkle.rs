//! Merkle trees over sized chunks.
//!
//! Used for the per-block transaction root, the wallet-tree root and the
//! per-transaction data root. Leaves carry the chunk size so a reordered or
//! padded chunk set cannot reproduce a root.

use crate::hash::{sha256, sha256_multi};

/// Transaction data is chunked at this size before hashing.
pub const DATA_CHUNK_SIZE: usize = 256 * 1024;

/// Compute the Merkle root of a set of leaf hashes.
///
/// Internal nodes are `SHA256(left ‖ right)`; an odd trailing node is
/// promoted unchanged. The empty tree hashes to all zeroes.
pub fn merkle_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }
    let mut level: Vec<[u8; 32]> = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            if pair.len() == 2 {
                next.push(sha256_multi(&[&pair[0], &pair[1]]));
            } else {
                next.push(pair[0]);
            }
        }
        level = next;
    }
    level[0]
}

/// Hash one sized chunk into a leaf: `SHA256(chunk ‖ len_be)`.
pub fn chunk_leaf(chunk: &[u8]) -> [u8; 32] {
    sha256_multi(&[chunk, &(chunk.len() as u64).to_be_bytes()])
}

/// Compute the data root of a transaction's payload.
///
/// The payload is split into [`DATA_CHUNK_SIZE`] chunks; each chunk becomes a
/// sized leaf and the root is the Merkle root over them. Empty payloads root
/// to all zeroes.
pub fn data_root(data: &[u8]) -> [u8; 32] {
    if data.is_empty() {
        return [0u8; 32];
    }
    let leaves: Vec<[u8; 32]> = data.chunks(DATA_CHUNK_SIZE).map(chunk_leaf).collect();
    merkle_root(&leaves)
}
