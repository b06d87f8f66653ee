//! RSA-PSS signing and verification (SHA-256 digest).

use rand::{CryptoRng, RngCore};
use rsa::pss::{BlindedSigningKey, VerifyingKey};
use rsa::sha2::Sha256;
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::keys::public_from_owner;

/// Maximum signature length in bytes (4096-bit modulus).
pub const MAX_SIGNATURE_BYTES: usize = 512;

/// An RSA-PSS signature over a transaction's signature data.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(Vec<u8>);

impl Signature {
    /// A placeholder for not-yet-signed transactions.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}

/// Sign a message with the wallet's private key.
///
/// PSS is randomized; the caller supplies the RNG.
pub fn sign_message<R: CryptoRng + RngCore>(
    rng: &mut R,
    data: &[u8],
    private: &RsaPrivateKey,
) -> Signature {
    let signing_key = BlindedSigningKey::<Sha256>::new(private.clone());
    let signature = signing_key.sign_with_rng(rng, data);
    Signature(signature.to_vec())
}

/// Verify a signature against the transaction's owner field.
///
/// Returns `false` for malformed owners or signatures rather than erroring —
/// an unverifiable transaction is simply invalid.
pub fn verify_signature(data: &[u8], signature: &Signature, owner: &[u8]) -> bool {
    let public = match public_from_owner(owner) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let verifying_key = VerifyingKey::<Sha256>::new(public);
    let sig = match rsa::pss::Signature::try_from(signature.as_bytes()) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    verifying_key.verify(data, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair_bits, owner_bytes};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn sign_verify_roundtrip() {
        let mut rng = StdRng::seed_from_u64(42);
        let kp = generate_keypair_bits(&mut rng, 1024).unwrap();
        let owner = owner_bytes(&kp.public);

        let sig = sign_message(&mut rng, b"weave tx data", &kp.private);
        assert!(verify_signature(b"weave tx data", &sig, &owner));
    }

    #[test]
    fn tampered_message_fails() {
        let mut rng = StdRng::seed_from_u64(43);
        let kp = generate_keypair_bits(&mut rng, 1024).unwrap();
        let owner = owner_bytes(&kp.public);

        let sig = sign_message(&mut rng, b"original", &kp.private);
        assert!(!verify_signature(b"tampered", &sig, &owner));
    }

    #[test]
    fn wrong_owner_fails() {
        let mut rng = StdRng::seed_from_u64(44);
        let kp1 = generate_keypair_bits(&mut rng, 1024).unwrap();
        let kp2 = generate_keypair_bits(&mut rng, 1024).unwrap();

        let sig = sign_message(&mut rng, b"data", &kp1.private);
        assert!(!verify_signature(b"data", &sig, &owner_bytes(&kp2.public)));
    }

    #[test]
    fn garbage_inputs_do_not_verify() {
        assert!(!verify_signature(b"data", &Signature::empty(), b""));
        assert!(!verify_signature(
            b"data",
            &Signature::from_bytes(vec![0xFF; 64]),
            &[0x01, 0x02]
        ));
    }
}
