//! Vault record stored at each derived vault address.
//!
//! Memory layout:
//! ```text
//! [0..8]    tag: sha256("account:SolManager")[..8]
//! [8..40]   authority: Identity (32 bytes)
//! [40]      bump: u8
//! Total: 41 bytes
//! ```
//! The balance is not part of the record; it is the lamport balance the ledger
//! keeps for the account.

use crate::config::program::VAULT_ACCOUNT_TAG_PREIMAGE;
use crate::error::{CustodianError, CustodianResult};
use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// First 8 bytes of `sha256(preimage)`, used for record tags and
/// instruction discriminators.
pub fn discriminator(preimage: &str) -> [u8; 8] {
    let hash = Sha256::digest(preimage.as_bytes());
    let mut tag = [0u8; 8];
    tag.copy_from_slice(&hash[..8]);
    tag
}

/// Custody record for a single authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultAccount {
    /// Admin identity that created the vault, part of the address seeds
    pub authority: Identity,
    /// Canonical bump of the vault address
    pub bump: u8,
}

impl VaultAccount {
    pub const TAG_LEN: usize = 8;
    pub const LEN: usize = Self::TAG_LEN + 32 + 1; // 41 bytes

    pub fn tag() -> [u8; 8] {
        discriminator(VAULT_ACCOUNT_TAG_PREIMAGE)
    }

    pub fn serialize(&self) -> [u8; Self::LEN] {
        let mut data = [0u8; Self::LEN];
        data[0..8].copy_from_slice(&Self::tag());
        data[8..40].copy_from_slice(self.authority.as_ref());
        data[40] = self.bump;
        data
    }

    /// Parse a record read from the account at `address`.
    pub fn deserialize(address: &Identity, data: &[u8]) -> CustodianResult<Self> {
        if data.len() < Self::LEN {
            return Err(CustodianError::invalid_account(
                *address,
                format!("account data too small: {} < {} bytes", data.len(), Self::LEN),
            ));
        }
        if data[0..8] != Self::tag() {
            return Err(CustodianError::invalid_account(
                *address,
                "account is not a vault record",
            ));
        }

        Ok(VaultAccount {
            authority: Identity::try_from_slice(&data[8..40])?,
            bump: data[40],
        })
    }
}

/// Read-only view returned by the audit interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultView {
    pub address: Identity,
    pub authority: Identity,
    pub bump: u8,
    pub balance: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let authority = Identity::new([4u8; 32]);
        let data = VaultAccount { authority, bump: 254 }.serialize();

        assert_eq!(data.len(), 41);
        assert_eq!(&data[..8], &VaultAccount::tag());
        assert_eq!(&data[8..40], authority.as_ref());
        assert_eq!(data[40], 254);
    }

    #[test]
    fn test_deserialize_rejects_short_or_foreign_data() {
        let address = Identity::new_unique();
        let result = VaultAccount::deserialize(&address, &[0u8; 10]);
        assert!(matches!(result, Err(CustodianError::InvalidAccount { .. })));

        let mut data = VaultAccount { authority: Identity::new([1u8; 32]), bump: 7 }.serialize();
        data[0] ^= 0x01;
        let result = VaultAccount::deserialize(&address, &data);
        assert!(matches!(result, Err(CustodianError::InvalidAccount { .. })));
    }

    #[test]
    fn test_deserialize_ignores_trailing_bytes() {
        let record = VaultAccount { authority: Identity::new([2u8; 32]), bump: 250 };
        let mut data = record.serialize().to_vec();
        data.extend_from_slice(&[0u8; 16]);
        let parsed = VaultAccount::deserialize(&Identity::new_unique(), &data).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_discriminators_differ() {
        assert_ne!(discriminator("global:initialize"), discriminator("global:transfer_sol"));
        assert_eq!(discriminator("global:initialize"), discriminator("global:initialize"));
    }
}
