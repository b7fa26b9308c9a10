//! # Instructions
//!
//! Wire encoding of the custodian's two instructions plus the system transfer
//! used for ungated funding. Custodian instruction data starts with an 8-byte
//! discriminator (`sha256("global:<name>")[..8]`) so that it stays
//! byte-compatible with clients of the deployed program.
//!
//! Expected accounts:
//!
//! `Initialize`
//! 0. `[writable]` vault (derived address)
//! 1. `[writable, signer]` authority (pays rent)
//!
//! `TransferOut { amount }`
//! 0. `[writable]` vault
//! 1. `[signer]` trusted service
//! 2. `[writable]` recipient

use crate::config::program::{INITIALIZE_PREIMAGE, TRANSFER_OUT_PREIMAGE};
use crate::derivation::find_vault_address;
use crate::error::{CustodianError, CustodianResult};
use crate::identity::Identity;
use crate::state::discriminator;
use serde::{Deserialize, Serialize};

/// Account reference inside an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub pubkey: Identity,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(pubkey: Identity, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn new_readonly(pubkey: Identity, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// A single program invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program_id: Identity,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// Decoded custodian instruction data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustodianInstruction {
    /// Create the vault for the signing authority
    Initialize,
    /// Move `amount` lamports from a vault to a recipient
    TransferOut { amount: u64 },
}

impl CustodianInstruction {
    pub fn pack(&self) -> Vec<u8> {
        match self {
            Self::Initialize => discriminator(INITIALIZE_PREIMAGE).to_vec(),
            Self::TransferOut { amount } => {
                let mut data = discriminator(TRANSFER_OUT_PREIMAGE).to_vec();
                data.extend_from_slice(&amount.to_le_bytes());
                data
            }
        }
    }

    pub fn unpack(data: &[u8]) -> CustodianResult<Self> {
        if data.len() < 8 {
            return Err(CustodianError::instruction(format!(
                "instruction data too short: {} bytes",
                data.len()
            )));
        }
        let (tag, rest) = data.split_at(8);

        if tag == discriminator(INITIALIZE_PREIMAGE) {
            return Ok(Self::Initialize);
        }
        if tag == discriminator(TRANSFER_OUT_PREIMAGE) {
            let amount = rest
                .get(..8)
                .and_then(|bytes| bytes.try_into().ok())
                .map(u64::from_le_bytes)
                .ok_or_else(|| CustodianError::instruction("missing transfer amount"))?;
            return Ok(Self::TransferOut { amount });
        }

        Err(CustodianError::instruction(format!(
            "unknown discriminator {}",
            hex::encode(tag)
        )))
    }
}

/// Build an `Initialize` instruction for `authority`.
pub fn initialize(program_id: &Identity, authority: &Identity) -> CustodianResult<Instruction> {
    let (vault, _) = find_vault_address(authority, program_id)?;
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new(vault, false), AccountMeta::new(*authority, true)],
        data: CustodianInstruction::Initialize.pack(),
    })
}

/// Build a `TransferOut` instruction against an explicit vault address.
pub fn transfer_out(
    program_id: &Identity,
    vault: &Identity,
    trusted_service: &Identity,
    recipient: &Identity,
    amount: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*vault, false),
            AccountMeta::new_readonly(*trusted_service, true),
            AccountMeta::new(*recipient, false),
        ],
        data: CustodianInstruction::TransferOut { amount }.pack(),
    }
}

/// System program instructions understood by the ledger.
pub mod system {
    use super::*;

    /// Tag of the system transfer instruction.
    pub const TRANSFER_TAG: u32 = 2;

    /// Ungated lamport transfer between system-owned accounts.
    pub fn transfer(from: &Identity, to: &Identity, lamports: u64) -> Instruction {
        let mut data = TRANSFER_TAG.to_le_bytes().to_vec();
        data.extend_from_slice(&lamports.to_le_bytes());
        Instruction {
            program_id: Identity::default(),
            accounts: vec![AccountMeta::new(*from, true), AccountMeta::new(*to, false)],
            data,
        }
    }

    /// Decode the lamports of a system transfer.
    pub fn unpack_transfer(data: &[u8]) -> CustodianResult<u64> {
        if data.len() != 12 || data[..4] != TRANSFER_TAG.to_le_bytes() {
            return Err(CustodianError::instruction("unsupported system instruction"));
        }
        let mut lamports = [0u8; 8];
        lamports.copy_from_slice(&data[4..12]);
        Ok(u64::from_le_bytes(lamports))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_out_encoding() {
        let data = CustodianInstruction::TransferOut { amount: 100_000_000 }.pack();
        assert_eq!(data.len(), 16);
        assert_eq!(&data[8..], &100_000_000u64.to_le_bytes());
        assert_eq!(
            CustodianInstruction::unpack(&data).unwrap(),
            CustodianInstruction::TransferOut { amount: 100_000_000 }
        );
    }

    #[test]
    fn test_malformed_data_is_rejected() {
        assert!(matches!(
            CustodianInstruction::unpack(&[1, 2, 3]),
            Err(CustodianError::InvalidInstruction { .. })
        ));

        let mut truncated = CustodianInstruction::TransferOut { amount: 5 }.pack();
        truncated.truncate(12);
        assert!(CustodianInstruction::unpack(&truncated).is_err());

        assert!(CustodianInstruction::unpack(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_initialize_targets_derived_vault() {
        let program_id = Identity::new([7u8; 32]);
        let authority = Identity::new_unique();
        let ix = initialize(&program_id, &authority).unwrap();
        let (vault, _) = find_vault_address(&authority, &program_id).unwrap();

        assert_eq!(ix.accounts[0].pubkey, vault);
        assert!(ix.accounts[1].is_signer);
        assert_eq!(CustodianInstruction::unpack(&ix.data).unwrap(), CustodianInstruction::Initialize);
    }

    #[test]
    fn test_system_transfer_encoding() {
        let from = Identity::new_unique();
        let to = Identity::new_unique();
        let ix = system::transfer(&from, &to, 42);
        assert_eq!(ix.program_id, Identity::default());
        assert_eq!(system::unpack_transfer(&ix.data).unwrap(), 42);
        assert!(system::unpack_transfer(&ix.data[..8]).is_err());
    }
}
