//! # sol-custodian: Program-Owned SOL Custody
//!
//! Core library for a custodian program that holds SOL at program-derived
//! addresses and releases it only on the signature of a single trusted service.
//!
//! - [`derivation`]: off-curve address derivation and program certificates
//! - [`state`]: the vault record layout
//! - [`policy`]: the transfer authorization gate
//! - [`program`]: `Initialize`, `TransferOut` and the read interface
//! - [`ledger`]: the ledger services the program runs against, with an in-memory implementation

pub mod config;
pub mod derivation;
pub mod error;
pub mod identity;
pub mod instruction;
pub mod ledger;
pub mod policy;
pub mod program;
pub mod state;
pub mod transaction;
pub mod utils;

// Re-export commonly used types
pub use config::ProgramConfig;
pub use derivation::{certify, find_program_address, find_vault_address, ProgramCertificate};
pub use error::{CustodianError, CustodianResult};
pub use identity::{Identity, Keypair};
pub use ledger::{Ledger, MemoryLedger, Program};
pub use program::CustodianProgram;
pub use state::{VaultAccount, VaultView};
pub use transaction::Transaction;
