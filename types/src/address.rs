//! Wallet address types.
//!
//! An address is the SHA-256 digest of the wallet's RSA public modulus.
//! Mining rewards may also be directed nowhere (`RewardAddress::Unclaimed`),
//! in which case the finder share stays in the reward pool.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte wallet address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address([u8; 32]);

impl Address {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse an address from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, crate::WeaveError> {
        let s = s.trim();
        if s.len() != 64 {
            return Err(crate::WeaveError::InvalidAddress(s.to_string()));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_val(chunk[0]).ok_or_else(|| crate::WeaveError::InvalidAddress(s.to_string()))?;
            let lo = hex_val(chunk[1]).ok_or_else(|| crate::WeaveError::InvalidAddress(s.to_string()))?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(")?;
        for b in &self.0[..4] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Destination for mining rewards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardAddress {
    /// No payout address claimed — the finder share stays in the pool.
    Unclaimed,
    /// Rewards are credited to this wallet.
    Wallet(Address),
}

impl RewardAddress {
    pub fn is_unclaimed(&self) -> bool {
        matches!(self, RewardAddress::Unclaimed)
    }

    pub fn as_wallet(&self) -> Option<&Address> {
        match self {
            RewardAddress::Unclaimed => None,
            RewardAddress::Wallet(addr) => Some(addr),
        }
    }

    /// Stable byte encoding for hashing into block headers.
    pub fn to_bytes(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        match self {
            RewardAddress::Unclaimed => {}
            RewardAddress::Wallet(addr) => {
                out[0] = 1;
                out[1..].copy_from_slice(addr.as_bytes());
            }
        }
        out
    }
}

impl fmt::Display for RewardAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewardAddress::Unclaimed => write!(f, "unclaimed"),
            RewardAddress::Wallet(addr) => write!(f, "{addr}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_hex_roundtrip() {
        let addr = Address::new([0xAB; 32]);
        let parsed = Address::from_hex(&addr.to_string()).unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(Address::from_hex("xyz").is_err());
        assert!(Address::from_hex(&"g".repeat(64)).is_err());
    }

    #[test]
    fn reward_address_bytes_distinguish_unclaimed() {
        let unclaimed = RewardAddress::Unclaimed.to_bytes();
        let zero_wallet = RewardAddress::Wallet(Address::ZERO).to_bytes();
        assert_ne!(unclaimed, zero_wallet);
    }
}
