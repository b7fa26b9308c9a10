//! # Configuration
//!
//! Constants used throughout the custodian, plus the deployment-time
//! [`ProgramConfig`] that carries the program identity and the trusted
//! service allowed to move funds out of vaults.

use crate::error::{CustodianError, CustodianResult};
use crate::identity::Identity;
use std::str::FromStr;

/// Program and address derivation constants
pub mod program {
    /// Program id the custodian is deployed under unless overridden.
    pub const DEFAULT_PROGRAM_ID: &str = "BqvmMSVZZ6fNXHegCahrgSkD6STpiBASVpvbsAgmbNxC";

    /// First seed of every vault address: `["manager", authority]`.
    pub const VAULT_SEED: &[u8] = b"manager";

    /// Domain tag appended to every derived-address preimage.
    pub const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

    /// Maximum number of seeds, bump included.
    pub const MAX_SEEDS: usize = 16;

    /// Maximum length of a single seed in bytes.
    pub const MAX_SEED_LEN: usize = 32;

    /// Preimage of the 8-byte vault record tag.
    pub const VAULT_ACCOUNT_TAG_PREIMAGE: &str = "account:SolManager";

    /// Preimage of the `Initialize` instruction discriminator.
    pub const INITIALIZE_PREIMAGE: &str = "global:initialize";

    /// Preimage of the `TransferOut` instruction discriminator.
    pub const TRANSFER_OUT_PREIMAGE: &str = "global:transfer_sol";
}

/// Ledger economics
///
/// Defaults mirror mainnet rent parameters so that local balances behave like
/// the real cluster: an account must hold two years of rent to be exempt.
pub mod ledger {
    /// Lamports in one SOL.
    pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

    /// Rent charged per byte per year.
    pub const DEFAULT_LAMPORTS_PER_BYTE_YEAR: u64 = 3_480;

    /// Years of rent an account must hold to be exempt.
    pub const DEFAULT_EXEMPTION_YEARS: u64 = 2;

    /// Per-account bookkeeping bytes counted on top of the data length.
    pub const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;

    /// System program id, the all-zero identity.
    pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
}

/// File paths and names
pub mod files {
    /// Default ledger state file used by the CLI
    pub const LEDGER_STATE: &str = "custodian_ledger.json";

    /// Directory under the home directory for operator config
    pub const CONFIG_DIR: &str = ".config/sol-custodian";

    /// Keypair file name inside [`CONFIG_DIR`]
    pub const DEFAULT_KEYPAIR: &str = "id.json";
}

/// Display settings
pub mod ui {
    /// Characters kept at the start of a shortened address
    pub const ADDRESS_DISPLAY_PREFIX: usize = 6;

    /// Characters kept at the end of a shortened address
    pub const ADDRESS_DISPLAY_SUFFIX: usize = 4;
}

/// Environment variable names
pub mod env {
    /// Program id override
    pub const PROGRAM_ID: &str = "PROGRAM_ID";

    /// Trusted service identity (base58)
    pub const TRUSTED_SERVICE: &str = "TRUSTED_SERVICE";

    /// Ledger state file override
    pub const LEDGER_STATE: &str = "CUSTODIAN_LEDGER";
}

/// Deployment-time configuration of the custodian program.
///
/// Both values are fixed for the lifetime of a deployment; nothing in the
/// program mutates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramConfig {
    /// Identity the program runs under; owner of every vault record
    pub program_id: Identity,
    /// The single identity allowed to authorize `TransferOut`
    pub trusted_service: Identity,
}

impl ProgramConfig {
    pub fn new(program_id: Identity, trusted_service: Identity) -> Self {
        Self {
            program_id,
            trusted_service,
        }
    }

    /// Load configuration from the environment (and `.env` if present).
    ///
    /// `PROGRAM_ID` falls back to [`program::DEFAULT_PROGRAM_ID`];
    /// `TRUSTED_SERVICE` has no default and must be set.
    pub fn from_env() -> CustodianResult<Self> {
        Self::resolve(None, None)
    }

    /// Like [`ProgramConfig::from_env`], but explicit values (CLI flags) win
    /// over the environment.
    pub fn resolve(program_id: Option<&str>, trusted_service: Option<&str>) -> CustodianResult<Self> {
        dotenv::dotenv().ok();

        let program_id = match program_id {
            Some(value) => value.to_string(),
            None => std::env::var(self::env::PROGRAM_ID)
                .unwrap_or_else(|_| program::DEFAULT_PROGRAM_ID.to_string()),
        };
        let program_id = Identity::from_str(&program_id)?;

        let trusted_service = match trusted_service {
            Some(value) => value.to_string(),
            None => std::env::var(self::env::TRUSTED_SERVICE).map_err(|_| {
                CustodianError::config(format!(
                    "{} is not set; the trusted service identity must be configured",
                    self::env::TRUSTED_SERVICE
                ))
            })?,
        };
        let trusted_service = Identity::from_str(&trusted_service)?;

        Ok(Self::new(program_id, trusted_service))
    }

    /// Default program id as an [`Identity`].
    pub fn default_program_id() -> CustodianResult<Identity> {
        Identity::from_str(program::DEFAULT_PROGRAM_ID)
    }
}
