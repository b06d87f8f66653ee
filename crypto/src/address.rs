//! Address derivation.

use crate::hash::sha256;
use weave_types::Address;

/// Derive a wallet address from the owner field (the RSA public modulus).
pub fn to_address(owner: &[u8]) -> Address {
    Address::new(sha256(owner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_sha256_of_owner() {
        let owner = vec![0x11u8; 128];
        assert_eq!(to_address(&owner), Address::new(sha256(&owner)));
    }

    #[test]
    fn different_owners_different_addresses() {
        assert_ne!(to_address(&[1, 2, 3]), to_address(&[4, 5, 6]));
    }
}
