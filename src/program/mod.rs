//! # Custodian Program
//!
//! Owns one vault per authority at the derived address `["manager", authority]`
//! and moves SOL out of those vaults only when the deployment's trusted service
//! signs.
//!
//! ## Instructions
//!
//! - **Initialize**: allocate and record the vault for a signing authority
//! - **TransferOut**: pay lamports from a vault to a recipient
//!
//! Funding a vault is an ordinary system transfer to its address and never
//! reaches this program.

use crate::config::ProgramConfig;
use crate::derivation::{certify, find_vault_address, vault_seeds};
use crate::error::{CustodianError, CustodianResult};
use crate::identity::Identity;
use crate::instruction::{AccountMeta, CustodianInstruction, Instruction};
use crate::ledger::{Ledger, Program};
use crate::policy::{AuthorizationPolicy, TransferRequest};
use crate::state::{VaultAccount, VaultView};


/// The custodian program for one deployment.
#[derive(Debug, Clone)]
pub struct CustodianProgram {
    config: ProgramConfig,
    policy: AuthorizationPolicy,
}

impl CustodianProgram {
    pub fn new(config: ProgramConfig) -> Self {
        let policy = AuthorizationPolicy::new(config.trusted_service);
        Self { config, policy }
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    pub fn program_id(&self) -> &Identity {
        &self.config.program_id
    }

    /// Vault address of `authority` under this deployment.
    pub fn vault_address(&self, authority: &Identity) -> CustodianResult<Identity> {
        find_vault_address(authority, &self.config.program_id).map(|(address, _)| address)
    }

    /// Read a vault without side effects.
    pub fn fetch_vault(&self, ledger: &dyn Ledger, address: &Identity) -> CustodianResult<VaultView> {
        let (record, balance) = self.load_vault(ledger, address)?;
        Ok(VaultView {
            address: *address,
            authority: record.authority,
            bump: record.bump,
            balance,
        })
    }

    /// Load and parse the vault record at `address` along with its balance.
    fn load_vault(&self, ledger: &dyn Ledger, address: &Identity) -> CustodianResult<(VaultAccount, u64)> {
        let account = ledger
            .account(address)
            .ok_or_else(|| CustodianError::invalid_account(*address, "vault account does not exist"))?;
        if account.owner != self.config.program_id {
            return Err(CustodianError::invalid_account(
                *address,
                format!("owned by {}, not by the custodian program", account.owner),
            ));
        }
        let record = VaultAccount::deserialize(address, &account.data)?;
        Ok((record, account.lamports))
    }

    fn initialize(&self, ledger: &mut dyn Ledger, accounts: &[AccountMeta]) -> CustodianResult<()> {
        let [vault, authority, ..] = accounts else {
            return Err(CustodianError::instruction("initialize expects [vault, authority]"));
        };
        if !authority.is_signer {
            return Err(CustodianError::MissingRequiredSignature {
                signer: authority.pubkey,
            });
        }

        let program_id = self.config.program_id;
        let (address, bump) = find_vault_address(&authority.pubkey, &program_id)?;
        if vault.pubkey != address {
            return Err(CustodianError::AddressMismatch {
                expected: address,
                actual: vault.pubkey,
            });
        }
        if let Some(existing) = ledger.account(&address) {
            if !existing.is_unallocated() {
                return Err(CustodianError::AlreadyInitialized { address });
            }
        }

        let certificate = certify(&program_id, &vault_seeds(&authority.pubkey), bump);
        ledger.create_program_account(&authority.pubkey, &certificate, VaultAccount::LEN)?;

        let record = VaultAccount {
            authority: authority.pubkey,
            bump,
        };
        ledger.write_account_data(&program_id, &address, &record.serialize())?;

        log::info!(
            "Initialized vault {} for authority {} (bump {})",
            address,
            authority.pubkey,
            bump
        );
        Ok(())
    }

    fn transfer_out(&self, ledger: &mut dyn Ledger, accounts: &[AccountMeta], amount: u64) -> CustodianResult<()> {
        let [vault, _trusted, recipient, ..] = accounts else {
            return Err(CustodianError::instruction(
                "transfer expects [vault, trusted service, recipient]",
            ));
        };

        let (record, balance) = self.load_vault(ledger, &vault.pubkey)?;
        let minimum_balance = ledger.minimum_balance(VaultAccount::LEN);

        let signers: Vec<Identity> = accounts
            .iter()
            .filter(|meta| meta.is_signer)
            .map(|meta| meta.pubkey)
            .collect();
        self.policy.authorize(&TransferRequest {
            vault: &vault.pubkey,
            recipient: &recipient.pubkey,
            amount,
            signers: &signers,
            balance,
            minimum_balance,
        })?;

        let program_id = self.config.program_id;
        let (expected, canonical_bump) = find_vault_address(&record.authority, &program_id)?;
        if vault.pubkey != expected {
            return Err(CustodianError::AddressMismatch {
                expected,
                actual: vault.pubkey,
            });
        }
        if record.bump != canonical_bump {
            return Err(CustodianError::AddressMismatch {
                expected,
                actual: vault.pubkey,
            });
        }
        let certificate = certify(&program_id, &vault_seeds(&record.authority), record.bump);

        ledger.transfer_certified(&certificate, &recipient.pubkey, amount)?;

        log::info!(
            "Transferred {} lamports from vault {} to {}",
            amount,
            vault.pubkey,
            recipient.pubkey
        );
        Ok(())
    }
}

impl Program for CustodianProgram {
    fn id(&self) -> Identity {
        self.config.program_id
    }

    fn process(&self, ledger: &mut dyn Ledger, instruction: &Instruction) -> CustodianResult<()> {
        if instruction.program_id != self.config.program_id {
            return Err(CustodianError::IncorrectProgramId {
                expected: self.config.program_id,
                actual: instruction.program_id,
            });
        }

        match CustodianInstruction::unpack(&instruction.data)? {
            CustodianInstruction::Initialize => self.initialize(ledger, &instruction.accounts),
            CustodianInstruction::TransferOut { amount } => {
                self.transfer_out(ledger, &instruction.accounts, amount)
            }
        }
    }
}
