//! # Ledger Module
//!
//! The ledger owns account storage, balance arithmetic and atomic commit. The
//! custodian program only talks to it through the [`Ledger`] trait.
//!
//! ## Components
//!
//! - **Ledger**: services a program may call while one of its instructions executes
//! - **Program**: an instruction processor the ledger can route to
//! - **MemoryLedger**: in-process implementation with rent, signature checks and rollback

pub mod memory;

pub use memory::MemoryLedger;

use crate::config::ledger::{
    ACCOUNT_STORAGE_OVERHEAD, DEFAULT_EXEMPTION_YEARS, DEFAULT_LAMPORTS_PER_BYTE_YEAR,
};
use crate::derivation::ProgramCertificate;
use crate::error::CustodianResult;
use crate::identity::Identity;
use crate::instruction::Instruction;
use serde::{Deserialize, Serialize};

/// An account as stored by the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub lamports: u64,
    /// Program allowed to change the data and debit the balance
    pub owner: Identity,
    #[serde(with = "hex_data")]
    pub data: Vec<u8>,
}

impl Account {
    /// A plain wallet account owned by the system program.
    pub fn system(lamports: u64) -> Self {
        Self {
            lamports,
            owner: Identity::default(),
            data: Vec::new(),
        }
    }

    pub fn is_system_owned(&self) -> bool {
        self.owner == Identity::default()
    }

    /// System-owned with no data: may still be allocated by a program.
    pub fn is_unallocated(&self) -> bool {
        self.is_system_owned() && self.data.is_empty()
    }
}

/// Rent parameters deciding the minimum balance an account must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rent {
    pub lamports_per_byte_year: u64,
    pub exemption_years: u64,
}

impl Default for Rent {
    fn default() -> Self {
        Self {
            lamports_per_byte_year: DEFAULT_LAMPORTS_PER_BYTE_YEAR,
            exemption_years: DEFAULT_EXEMPTION_YEARS,
        }
    }
}

impl Rent {
    /// No minimum balance at all.
    pub fn free() -> Self {
        Self {
            lamports_per_byte_year: 0,
            exemption_years: 0,
        }
    }

    /// Rent-exempt minimum for an account holding `data_len` bytes.
    pub fn minimum_balance(&self, data_len: usize) -> u64 {
        (ACCOUNT_STORAGE_OVERHEAD + data_len as u64)
            .saturating_mul(self.lamports_per_byte_year)
            .saturating_mul(self.exemption_years)
    }
}

/// Services a program can use while its instruction is executing.
///
/// Every mutating call is part of the enclosing transaction and is rolled back
/// with it. Implementations must refuse certificates issued for any program
/// other than the one currently executing.
pub trait Ledger {
    /// Look up an account.
    fn account(&self, address: &Identity) -> Option<&Account>;

    /// Lamports an account with `data_len` bytes must keep.
    fn minimum_balance(&self, data_len: usize) -> u64;

    /// Allocate `space` bytes at the certificate's address, owned by the
    /// certificate's program and funded to the rent-exempt minimum by `payer`.
    fn create_program_account(
        &mut self,
        payer: &Identity,
        certificate: &ProgramCertificate,
        space: usize,
    ) -> CustodianResult<Identity>;

    /// Overwrite the start of an account's data. Only its owner may write.
    fn write_account_data(
        &mut self,
        program_id: &Identity,
        address: &Identity,
        data: &[u8],
    ) -> CustodianResult<()>;

    /// Debit the certificate's address and credit `to`.
    fn transfer_certified(
        &mut self,
        certificate: &ProgramCertificate,
        to: &Identity,
        lamports: u64,
    ) -> CustodianResult<()>;

    /// Lamports held at `address`, zero when the account does not exist.
    fn balance(&self, address: &Identity) -> u64 {
        self.account(address).map_or(0, |account| account.lamports)
    }
}

/// An on-ledger program.
pub trait Program: Send + Sync {
    fn id(&self) -> Identity;

    /// Execute one instruction. Declared signers have already been verified.
    fn process(&self, ledger: &mut dyn Ledger, instruction: &Instruction) -> CustodianResult<()>;
}

/// Hex encoding for account data in the state file.
mod hex_data {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rent_minimum_balance() {
        let rent = Rent::default();
        // (128 + 41) * 3480 * 2
        assert_eq!(rent.minimum_balance(41), 1_176_240);
        assert_eq!(rent.minimum_balance(0), 890_880);
        assert_eq!(Rent::free().minimum_balance(41), 0);
    }

    #[test]
    fn test_account_serde_hex_data() {
        let account = Account {
            lamports: 10,
            owner: Identity::new([5u8; 32]),
            data: vec![0xde, 0xad],
        };
        let json = serde_json::to_string(&account).unwrap();
        assert!(json.contains("\"dead\""));
        let back: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(back, account);
    }

    #[test]
    fn test_unallocated_account() {
        assert!(Account::system(5).is_unallocated());
        let owned = Account {
            owner: Identity::new([1u8; 32]),
            ..Account::default()
        };
        assert!(!owned.is_unallocated());
    }
}
