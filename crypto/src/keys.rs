//! RSA wallet keypairs.
//!
//! Wallets sign with 4096-bit RSA keys; the public "owner" field carried in
//! transactions is the big-endian public modulus (512 bytes at full size).

use rand::{CryptoRng, RngCore};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use weave_types::WeaveError;

/// Modulus size of production wallet keys, in bits.
pub const MODULUS_BITS: usize = 4096;

/// The fixed public exponent.
const PUBLIC_EXPONENT: u64 = 65_537;

/// An RSA wallet keypair.
#[derive(Clone, Debug)]
pub struct WalletKeypair {
    pub public: RsaPublicKey,
    pub private: RsaPrivateKey,
}

/// Generate a fresh wallet keypair with the production modulus size.
pub fn generate_keypair<R: CryptoRng + RngCore>(rng: &mut R) -> Result<WalletKeypair, WeaveError> {
    generate_keypair_bits(rng, MODULUS_BITS)
}

/// Generate a keypair with an explicit modulus size.
///
/// Tests use smaller moduli to keep key generation fast; the protocol caps
/// the owner field at 512 bytes, so anything up to 4096 bits is accepted.
pub fn generate_keypair_bits<R: CryptoRng + RngCore>(
    rng: &mut R,
    bits: usize,
) -> Result<WalletKeypair, WeaveError> {
    let private =
        RsaPrivateKey::new(rng, bits).map_err(|e| WeaveError::InvalidKey(e.to_string()))?;
    let public = private.to_public_key();
    Ok(WalletKeypair { public, private })
}

/// The transaction "owner" field: the public modulus, big-endian.
pub fn owner_bytes(public: &RsaPublicKey) -> Vec<u8> {
    public.n().to_bytes_be()
}

/// Reconstruct a public key from a transaction's owner field.
pub fn public_from_owner(owner: &[u8]) -> Result<RsaPublicKey, WeaveError> {
    let n = BigUint::from_bytes_be(owner);
    let e = BigUint::from(PUBLIC_EXPONENT);
    RsaPublicKey::new(n, e).map_err(|e| WeaveError::InvalidKey(e.to_string()))
}
