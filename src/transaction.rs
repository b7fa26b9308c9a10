//! # Signed Transactions
//!
//! A transaction is a list of instructions plus ed25519 signatures over a
//! deterministic encoding of those instructions. Signatures here always come
//! from private keys; program-certified authority never appears in a
//! transaction and is only presented to the ledger from inside a program.
//!
//! ## Message Format
//!
//! ```text
//! instruction_count (u8) ||
//! for each instruction:
//!     program_id (32) || account_count (u8) ||
//!     for each account: pubkey (32) || flags (u8: bit0 signer, bit1 writable)
//!     data_len (u32 LE) || data
//! ```

use crate::error::{CustodianError, CustodianResult};
use crate::identity::{Identity, Keypair, SIGNATURE_LENGTH};
use crate::instruction::Instruction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A signature paired with the identity that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEntry {
    pub signer: Identity,
    pub signature: [u8; SIGNATURE_LENGTH],
}

/// Instructions to be executed atomically, with their signatures.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub instructions: Vec<Instruction>,
    pub signatures: Vec<SignatureEntry>,
}

/// Summary of a processed transaction, kept in the ledger history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Hex of the first signature, or of the message hash when unsigned
    pub id: String,
    pub slot: u64,
    /// Unix timestamp (seconds) at which the ledger processed the transaction
    pub processed_at: i64,
    pub success: bool,
    pub error: Option<String>,
}

impl Transaction {
    /// Build and sign a transaction with every given keypair.
    pub fn new_signed(instructions: Vec<Instruction>, signers: &[&Keypair]) -> CustodianResult<Self> {
        let mut transaction = Self {
            instructions,
            signatures: Vec::new(),
        };
        let message = transaction.message_bytes()?;
        transaction.signatures = signers
            .iter()
            .map(|keypair| SignatureEntry {
                signer: keypair.identity(),
                signature: keypair.sign(&message),
            })
            .collect();
        Ok(transaction)
    }

    /// Deterministic encoding the signatures commit to.
    pub fn message_bytes(&self) -> CustodianResult<Vec<u8>> {
        let count = u8::try_from(self.instructions.len())
            .map_err(|_| CustodianError::instruction("too many instructions"))?;

        let mut message = vec![count];
        for instruction in &self.instructions {
            let accounts = u8::try_from(instruction.accounts.len())
                .map_err(|_| CustodianError::instruction("too many accounts"))?;
            let data_len = u32::try_from(instruction.data.len())
                .map_err(|_| CustodianError::instruction("instruction data too large"))?;

            message.extend_from_slice(instruction.program_id.as_ref());
            message.push(accounts);
            for meta in &instruction.accounts {
                message.extend_from_slice(meta.pubkey.as_ref());
                message.push(u8::from(meta.is_signer) | (u8::from(meta.is_writable) << 1));
            }
            message.extend_from_slice(&data_len.to_le_bytes());
            message.extend_from_slice(&instruction.data);
        }
        Ok(message)
    }

    /// Identities declared as signers anywhere in the transaction.
    pub fn required_signers(&self) -> BTreeSet<Identity> {
        self.instructions
            .iter()
            .flat_map(|ix| ix.accounts.iter())
            .filter(|meta| meta.is_signer)
            .map(|meta| meta.pubkey)
            .collect()
    }

    /// Check every signature and return the set of verified signers.
    ///
    /// Each declared signer must carry a valid signature, and signatures from
    /// identities that were never declared as signers are refused.
    pub fn verify(&self) -> CustodianResult<BTreeSet<Identity>> {
        let message = self.message_bytes()?;
        let required = self.required_signers();

        let mut verified = BTreeSet::new();
        for entry in &self.signatures {
            if !required.contains(&entry.signer) || !entry.signer.verify(&message, &entry.signature) {
                return Err(CustodianError::InvalidSignature {
                    signer: entry.signer,
                });
            }
            verified.insert(entry.signer);
        }

        if let Some(missing) = required.iter().find(|signer| !verified.contains(signer)) {
            return Err(CustodianError::MissingRequiredSignature { signer: *missing });
        }

        Ok(verified)
    }

    /// Identifier used in the ledger history.
    pub fn id(&self) -> String {
        match self.signatures.first() {
            Some(entry) => hex::encode(entry.signature),
            None => {
                use sha2::{Digest, Sha256};
                let message = self.message_bytes().unwrap_or_default();
                hex::encode(Sha256::digest(&message))
            }
        }
    }
}
