//! In-process ledger.
//!
//! `MemoryLedger` verifies transaction signatures, routes instructions to
//! registered programs, executes the system transfer natively, enforces rent
//! minimums and commits each transaction atomically: account state is
//! snapshotted before the first instruction and restored if any instruction
//! fails.

use super::{Account, Ledger, Program, Rent};
use crate::derivation::ProgramCertificate;
use crate::error::{CustodianError, CustodianResult};
use crate::identity::Identity;
use crate::instruction::{system, Instruction};
use crate::transaction::{Transaction, TransactionRecord};
use crate::utils::fs::write_file_atomic;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    path::Path,
    sync::Arc,
};

/// Persisted part of the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerState {
    rent: Rent,
    slot: u64,
    accounts: BTreeMap<Identity, Account>,
    history: Vec<TransactionRecord>,
}

/// The program currently executing and the signers of its transaction.
struct Invocation {
    program_id: Identity,
    signers: BTreeSet<Identity>,
}

pub struct MemoryLedger {
    state: LedgerState,
    programs: HashMap<Identity, Arc<dyn Program>>,
    invocation: Option<Invocation>,
}

impl MemoryLedger {
    pub fn new(rent: Rent) -> Self {
        Self {
            state: LedgerState {
                rent,
                ..LedgerState::default()
            },
            programs: HashMap::new(),
            invocation: None,
        }
    }

    /// Make `program` reachable by instructions addressed to its id.
    pub fn register_program(&mut self, program: Arc<dyn Program>) {
        log::debug!("Registered program {}", program.id());
        self.programs.insert(program.id(), program);
    }

    /// Credit lamports to a wallet outside of any transaction (local faucet).
    pub fn airdrop(&mut self, address: &Identity, lamports: u64) -> CustodianResult<u64> {
        let account = self
            .state
            .accounts
            .entry(*address)
            .or_insert_with(|| Account::system(0));
        account.lamports = account
            .lamports
            .checked_add(lamports)
            .ok_or_else(|| CustodianError::invalid_account(*address, "balance overflow"))?;
        log::info!("Airdropped {} lamports to {}", lamports, address);
        Ok(account.lamports)
    }

    /// Place an account directly, bypassing every check. Genesis and fixtures only.
    pub fn set_account(&mut self, address: Identity, account: Account) {
        self.state.accounts.insert(address, account);
    }

    pub fn rent(&self) -> Rent {
        self.state.rent
    }

    pub fn slot(&self) -> u64 {
        self.state.slot
    }

    pub fn history(&self) -> &[TransactionRecord] {
        &self.state.history
    }

    /// Verify, execute and atomically commit a transaction.
    pub fn submit(&mut self, transaction: &Transaction) -> CustodianResult<TransactionRecord> {
        self.state.slot += 1;
        let result = self.execute(transaction);

        let record = TransactionRecord {
            id: transaction.id(),
            slot: self.state.slot,
            processed_at: chrono::Utc::now().timestamp(),
            success: result.is_ok(),
            error: result.as_ref().err().map(ToString::to_string),
        };
        self.state.history.push(record.clone());

        match result {
            Ok(()) => {
                log::info!("Committed transaction {} at slot {}", record.id, record.slot);
                Ok(record)
            }
            Err(error) => {
                log::warn!("Transaction {} failed: {}", record.id, error);
                Err(error)
            }
        }
    }

    fn execute(&mut self, transaction: &Transaction) -> CustodianResult<()> {
        let signers = transaction.verify()?;

        let snapshot = self.state.accounts.clone();
        for instruction in &transaction.instructions {
            if let Err(error) = self.execute_instruction(instruction, &signers) {
                self.state.accounts = snapshot;
                return Err(error);
            }
        }
        Ok(())
    }

    fn execute_instruction(
        &mut self,
        instruction: &Instruction,
        signers: &BTreeSet<Identity>,
    ) -> CustodianResult<()> {
        if instruction.program_id == Identity::default() {
            return self.system_transfer(instruction, signers);
        }

        let program = self
            .programs
            .get(&instruction.program_id)
            .cloned()
            .ok_or(CustodianError::UnknownProgram {
                program_id: instruction.program_id,
            })?;

        self.invocation = Some(Invocation {
            program_id: instruction.program_id,
            signers: signers.clone(),
        });
        let result = program.process(self, instruction);
        self.invocation = None;
        result
    }

    fn system_transfer(
        &mut self,
        instruction: &Instruction,
        signers: &BTreeSet<Identity>,
    ) -> CustodianResult<()> {
        let lamports = system::unpack_transfer(&instruction.data)?;
        let [from, to] = instruction.accounts.as_slice() else {
            return Err(CustodianError::instruction("system transfer needs exactly two accounts"));
        };
        if !from.is_signer || !signers.contains(&from.pubkey) {
            return Err(CustodianError::MissingRequiredSignature { signer: from.pubkey });
        }

        let source = self.state.accounts.get(&from.pubkey).cloned().unwrap_or_default();
        if !source.is_system_owned() {
            return Err(CustodianError::invalid_account(
                from.pubkey,
                "system transfer source must be owned by the system program",
            ));
        }
        if source.lamports < lamports {
            return Err(CustodianError::InsufficientFunds {
                required: lamports,
                available: source.lamports,
            });
        }

        self.move_lamports(&from.pubkey, &to.pubkey, lamports)
    }

    /// Debit `from` and credit `to`; `to` is created as a wallet if missing.
    fn move_lamports(&mut self, from: &Identity, to: &Identity, lamports: u64) -> CustodianResult<()> {
        if from == to {
            return Ok(());
        }

        let source = self
            .state
            .accounts
            .get_mut(from)
            .ok_or_else(|| CustodianError::invalid_account(*from, "account does not exist"))?;
        source.lamports = source.lamports.checked_sub(lamports).ok_or(
            CustodianError::InsufficientFunds {
                required: lamports,
                available: source.lamports,
            },
        )?;

        let destination = self
            .state
            .accounts
            .entry(*to)
            .or_insert_with(|| Account::system(0));
        destination.lamports = destination
            .lamports
            .checked_add(lamports)
            .ok_or_else(|| CustodianError::invalid_account(*to, "balance overflow"))?;

        log::debug!("Moved {} lamports {} -> {}", lamports, from, to);
        Ok(())
    }

    /// The executing program, which must be the one `program_id` names.
    fn require_invocation(&self, program_id: &Identity) -> CustodianResult<&Invocation> {
        let invocation = self.invocation.as_ref().ok_or_else(|| {
            CustodianError::instruction("ledger services are only available during execution")
        })?;
        if &invocation.program_id != program_id {
            return Err(CustodianError::IncorrectProgramId {
                expected: invocation.program_id,
                actual: *program_id,
            });
        }
        Ok(invocation)
    }

    /// Save the ledger state as pretty JSON.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> CustodianResult<()> {
        let json = serde_json::to_string_pretty(&self.state)?;
        write_file_atomic(path.as_ref(), json.as_bytes())
    }

    /// Load ledger state. Programs are not persisted and must be registered again.
    pub fn load_from_file(path: impl AsRef<Path>) -> CustodianResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let state: LedgerState = serde_json::from_str(&json)?;
        Ok(Self {
            state,
            programs: HashMap::new(),
            invocation: None,
        })
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new(Rent::default())
    }
}

impl Ledger for MemoryLedger {
    fn account(&self, address: &Identity) -> Option<&Account> {
        self.state.accounts.get(address)
    }

    fn minimum_balance(&self, data_len: usize) -> u64 {
        self.state.rent.minimum_balance(data_len)
    }

    fn create_program_account(
        &mut self,
        payer: &Identity,
        certificate: &ProgramCertificate,
        space: usize,
    ) -> CustodianResult<Identity> {
        let invocation = self.require_invocation(certificate.program_id())?;
        if !invocation.signers.contains(payer) {
            return Err(CustodianError::MissingRequiredSignature { signer: *payer });
        }
        let address = certificate.address()?;

        let existing = self.state.accounts.get(&address).cloned().unwrap_or_default();
        if !existing.is_unallocated() {
            return Err(CustodianError::AlreadyInitialized { address });
        }

        let payer_account = self.state.accounts.get(payer).cloned().unwrap_or_default();
        if !payer_account.is_system_owned() {
            return Err(CustodianError::invalid_account(*payer, "payer must be a system account"));
        }
        let needed = self.minimum_balance(space).saturating_sub(existing.lamports);
        if payer_account.lamports < needed {
            return Err(CustodianError::InsufficientFunds {
                required: needed,
                available: payer_account.lamports,
            });
        }

        if needed > 0 {
            self.move_lamports(payer, &address, needed)?;
        }
        let account = self
            .state
            .accounts
            .entry(address)
            .or_insert_with(|| Account::system(0));
        account.owner = *certificate.program_id();
        account.data = vec![0u8; space];

        log::debug!(
            "Allocated {} bytes at {} for program {}",
            space,
            address,
            certificate.program_id()
        );
        Ok(address)
    }

    fn write_account_data(
        &mut self,
        program_id: &Identity,
        address: &Identity,
        data: &[u8],
    ) -> CustodianResult<()> {
        self.require_invocation(program_id)?;
        let account = self
            .state
            .accounts
            .get_mut(address)
            .ok_or_else(|| CustodianError::invalid_account(*address, "account does not exist"))?;
        if &account.owner != program_id {
            return Err(CustodianError::invalid_account(
                *address,
                "only the owning program may write account data",
            ));
        }
        if data.len() > account.data.len() {
            return Err(CustodianError::invalid_account(
                *address,
                format!("{} bytes exceed the {} allocated", data.len(), account.data.len()),
            ));
        }

        account.data[..data.len()].copy_from_slice(data);
        Ok(())
    }

    fn transfer_certified(
        &mut self,
        certificate: &ProgramCertificate,
        to: &Identity,
        lamports: u64,
    ) -> CustodianResult<()> {
        self.require_invocation(certificate.program_id())?;
        let from = certificate.address()?;

        let source = self
            .state
            .accounts
            .get(&from)
            .ok_or_else(|| CustodianError::invalid_account(from, "account does not exist"))?;
        if &source.owner != certificate.program_id() {
            return Err(CustodianError::invalid_account(
                from,
                "certificate program does not own the account",
            ));
        }

        let minimum = self.minimum_balance(source.data.len());
        let available = source.lamports.saturating_sub(minimum);
        if lamports > available {
            return Err(CustodianError::InsufficientFunds {
                required: lamports,
                available,
            });
        }

        self.move_lamports(&from, to, lamports)
    }
}
