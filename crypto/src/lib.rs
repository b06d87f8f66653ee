//! Cryptographic primitives for the Weave protocol.
//!
//! - **SHA-256** for hashing (block hashes, transaction ids, addresses)
//! - **RSA-PSS** (SHA-256 digest) for transaction signing and verification
//! - Merkle trees over sized chunks for transaction data and roots
//! - Address derivation: `to_address(owner) = SHA256(owner modulus)`

pub mod address;
pub mod hash;
pub mod keys;
pub mod merkle;
pub mod sign;

pub use address::to_address;
pub use hash::{sha256, sha256_multi};
pub use keys::{
    generate_keypair, generate_keypair_bits, owner_bytes, public_from_owner, WalletKeypair,
    MODULUS_BITS,
};
pub use merkle::{data_root, merkle_root, DATA_CHUNK_SIZE};
pub use sign::{sign_message, verify_signature, Signature};
