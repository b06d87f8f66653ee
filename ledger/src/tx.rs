//! Transactions.
//!
//! A transaction either transfers Winston (`quantity > 0`), archives data
//! (`data` non-empty), or both. The `reward` is the fee paid into the mining
//! reward pool. Field size limits are protocol constants enforced by
//! [`Transaction::validate_size_limits`].

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use weave_crypto::{
    data_root, sha256_multi, sign_message, to_address, verify_signature, Signature, WalletKeypair,
};
use weave_types::{Address, TxId, Winston};

use crate::error::LedgerError;

/// Owner and signature fields carry at most a 4096-bit modulus.
pub const MAX_OWNER_BYTES: usize = 512;
pub const MAX_SIGNATURE_BYTES: usize = 512;
/// Combined size cap for all tag names and values.
pub const MAX_TAGS_BYTES: usize = 2048;
/// Quantity and reward are bounded by their decimal rendering.
pub const MAX_AMOUNT_DIGITS: usize = 21;
/// Total serialized transaction cap: 50 MiB.
pub const MAX_TX_BYTES: u64 = 50 * 1024 * 1024;

/// The current transaction format version.
pub const TX_FORMAT: u32 = 2;

/// An arbitrary name/value annotation carried by transactions and blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
}

impl Tag {
    pub fn new(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.name.len() + self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.value.is_empty()
    }
}

/// A Weave transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    /// The owner's previous transaction id, `TxId::ZERO` for a first spend.
    pub last_tx: TxId,
    /// The owner's RSA public modulus, big-endian.
    pub owner: Vec<u8>,
    pub tags: Vec<Tag>,
    /// Transfer destination; `Address::ZERO` for pure data transactions.
    pub target: Address,
    pub quantity: Winston,
    pub data: Vec<u8>,
    /// Fee paid into the reward pool.
    pub reward: Winston,
    pub signature: Signature,
    pub format: u32,
    pub data_root: [u8; 32],
    pub data_size: u64,
}

impl Transaction {
    /// Build an unsigned transaction; the id, data root and data size are
    /// derived from the fields.
    pub fn prepare(
        owner: Vec<u8>,
        last_tx: TxId,
        target: Address,
        quantity: Winston,
        data: Vec<u8>,
        reward: Winston,
        tags: Vec<Tag>,
    ) -> Self {
        let id = compute_id(&owner, &target, &last_tx, &data, quantity, reward);
        let root = data_root(&data);
        let data_size = data.len() as u64;
        Self {
            id,
            last_tx,
            owner,
            tags,
            target,
            quantity,
            data,
            reward,
            signature: Signature::empty(),
            format: TX_FORMAT,
            data_root: root,
            data_size,
        }
    }

    /// The exact byte string covered by the signature: the unencoded
    /// concatenation `owner ‖ target ‖ id ‖ data ‖ quantity ‖ reward ‖
    /// last_tx`, with amounts rendered as decimal strings.
    pub fn signature_data(&self) -> Vec<u8> {
        let quantity = self.quantity.to_decimal();
        let reward = self.reward.to_decimal();
        let mut out = Vec::with_capacity(
            self.owner.len() + 32 + 32 + self.data.len() + quantity.len() + reward.len() + 32,
        );
        out.extend_from_slice(&self.owner);
        out.extend_from_slice(self.target.as_bytes());
        out.extend_from_slice(self.id.as_bytes());
        out.extend_from_slice(&self.data);
        out.extend_from_slice(quantity.as_bytes());
        out.extend_from_slice(reward.as_bytes());
        out.extend_from_slice(self.last_tx.as_bytes());
        out
    }

    /// Sign in place with the owner's private key.
    pub fn sign<R: CryptoRng + RngCore>(&mut self, rng: &mut R, keypair: &WalletKeypair) {
        let data = self.signature_data();
        self.signature = sign_message(rng, &data, &keypair.private);
    }

    /// The owner's wallet address.
    pub fn owner_address(&self) -> Address {
        to_address(&self.owner)
    }

    /// Whether this transaction transfers Winston to a target.
    pub fn is_transfer(&self) -> bool {
        !self.quantity.is_zero()
    }

    /// Serialized size: the sum of all variable fields plus fixed headers.
    pub fn total_size(&self) -> u64 {
        let tags: usize = self.tags.iter().map(Tag::len).sum();
        (32 + 32 + 32 + self.owner.len() + self.signature.len() + tags + self.data.len()) as u64
            + 32 // data_root
            + 8 // data_size
            + 4 // format
    }

    /// Enforce the protocol's per-field and total size limits.
    pub fn validate_size_limits(&self) -> Result<(), LedgerError> {
        if self.owner.is_empty() || self.owner.len() > MAX_OWNER_BYTES {
            return Err(LedgerError::FieldTooLarge {
                field: "owner",
                len: self.owner.len(),
                max: MAX_OWNER_BYTES,
            });
        }
        if self.signature.len() > MAX_SIGNATURE_BYTES {
            return Err(LedgerError::FieldTooLarge {
                field: "signature",
                len: self.signature.len(),
                max: MAX_SIGNATURE_BYTES,
            });
        }
        let tags: usize = self.tags.iter().map(Tag::len).sum();
        if tags > MAX_TAGS_BYTES {
            return Err(LedgerError::FieldTooLarge {
                field: "tags",
                len: tags,
                max: MAX_TAGS_BYTES,
            });
        }
        if self.quantity.to_decimal().len() > MAX_AMOUNT_DIGITS {
            return Err(LedgerError::FieldTooLarge {
                field: "quantity",
                len: self.quantity.to_decimal().len(),
                max: MAX_AMOUNT_DIGITS,
            });
        }
        if self.reward.to_decimal().len() > MAX_AMOUNT_DIGITS {
            return Err(LedgerError::FieldTooLarge {
                field: "reward",
                len: self.reward.to_decimal().len(),
                max: MAX_AMOUNT_DIGITS,
            });
        }
        let size = self.total_size();
        if size > MAX_TX_BYTES {
            return Err(LedgerError::TxTooLarge {
                size,
                max: MAX_TX_BYTES,
            });
        }
        Ok(())
    }

    /// Full structural verification: size limits, data consistency and the
    /// RSA-PSS signature.
    pub fn verify(&self) -> Result<(), LedgerError> {
        self.validate_size_limits()?;
        if self.data_size != self.data.len() as u64 {
            return Err(LedgerError::DataSizeMismatch {
                declared: self.data_size,
                actual: self.data.len() as u64,
            });
        }
        if self.data_root != data_root(&self.data) {
            return Err(LedgerError::DataRootMismatch);
        }
        if !verify_signature(&self.signature_data(), &self.signature, &self.owner) {
            return Err(LedgerError::InvalidSignature);
        }
        Ok(())
    }
}

fn compute_id(
    owner: &[u8],
    target: &Address,
    last_tx: &TxId,
    data: &[u8],
    quantity: Winston,
    reward: Winston,
) -> TxId {
    TxId::new(sha256_multi(&[
        owner,
        target.as_bytes(),
        last_tx.as_bytes(),
        data,
        quantity.to_decimal().as_bytes(),
        reward.to_decimal().as_bytes(),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use weave_crypto::{generate_keypair_bits, owner_bytes};

    fn unsigned_tx(data: Vec<u8>) -> Transaction {
        Transaction::prepare(
            vec![0x42; 128],
            TxId::ZERO,
            Address::new([0xBB; 32]),
            Winston::new(50),
            data,
            Winston::new(5),
            vec![Tag::new("app", "test")],
        )
    }

    #[test]
    fn prepare_derives_id_and_data_fields() {
        let tx = unsigned_tx(b"hello".to_vec());
        assert!(!tx.id.is_zero());
        assert_eq!(tx.data_size, 5);
        assert_eq!(tx.data_root, data_root(b"hello"));
    }

    #[test]
    fn distinct_fields_yield_distinct_ids() {
        let a = unsigned_tx(b"one".to_vec());
        let b = unsigned_tx(b"two".to_vec());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn sign_and_verify() {
        let mut rng = StdRng::seed_from_u64(1);
        let kp = generate_keypair_bits(&mut rng, 1024).unwrap();
        let mut tx = Transaction::prepare(
            owner_bytes(&kp.public),
            TxId::ZERO,
            Address::new([0x01; 32]),
            Winston::new(10),
            b"payload".to_vec(),
            Winston::new(1),
            Vec::new(),
        );
        tx.sign(&mut rng, &kp);
        assert!(tx.verify().is_ok());
    }

    #[test]
    fn verify_rejects_tampered_quantity() {
        let mut rng = StdRng::seed_from_u64(2);
        let kp = generate_keypair_bits(&mut rng, 1024).unwrap();
        let mut tx = Transaction::prepare(
            owner_bytes(&kp.public),
            TxId::ZERO,
            Address::new([0x01; 32]),
            Winston::new(10),
            Vec::new(),
            Winston::new(1),
            Vec::new(),
        );
        tx.sign(&mut rng, &kp);
        tx.quantity = Winston::new(10_000);
        assert_eq!(tx.verify(), Err(LedgerError::InvalidSignature));
    }

    #[test]
    fn size_limits_enforced() {
        let mut tx = unsigned_tx(Vec::new());
        tx.owner = vec![0; MAX_OWNER_BYTES + 1];
        assert!(matches!(
            tx.validate_size_limits(),
            Err(LedgerError::FieldTooLarge { field: "owner", .. })
        ));

        let mut tx = unsigned_tx(Vec::new());
        tx.tags = vec![Tag::new(vec![0; 2000], vec![0; 100])];
        assert!(matches!(
            tx.validate_size_limits(),
            Err(LedgerError::FieldTooLarge { field: "tags", .. })
        ));

        let mut tx = unsigned_tx(Vec::new());
        tx.quantity = Winston::new(u128::MAX);
        assert!(matches!(
            tx.validate_size_limits(),
            Err(LedgerError::FieldTooLarge { field: "quantity", .. })
        ));
    }

    #[test]
    fn data_size_mismatch_detected() {
        let mut tx = unsigned_tx(b"data".to_vec());
        tx.data_size = 999;
        assert!(matches!(
            tx.verify(),
            Err(LedgerError::DataSizeMismatch { .. })
        ));
    }
}
