//! # Error Types for the SOL Custodian
//!
//! Every rejection the custodian, the address deriver or the ledger can produce
//! surfaces as a distinct [`CustodianError`] variant. Callers branch on the
//! variant, never on the rendered message.

use crate::identity::Identity;
use thiserror::Error;

/// Base for the numeric codes returned by [`CustodianError::code`].
pub const CUSTOM_ERROR_BASE: u32 = 6000;

/// Main error type for all custody operations
#[derive(Debug, Error)]
pub enum CustodianError {
    /// A vault already exists at the derived address for this authority
    #[error("Vault already initialized at {address}")]
    AlreadyInitialized { address: Identity },

    /// No bump in 255..=0 produced an off-curve address
    #[error("Unable to find a valid program address for the given seeds")]
    NoValidAddress,

    /// The trusted service identity did not sign the instruction
    #[error("Unauthorized caller: trusted service {expected} did not sign")]
    UnauthorizedCaller { expected: Identity },

    /// Supplied account does not match the address re-derived from its authority
    #[error("Address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: Identity, actual: Identity },

    /// Requested amount exceeds the spendable balance
    #[error("Insufficient funds: required {required} lamports, available {available} lamports")]
    InsufficientFunds { required: u64, available: u64 },

    /// Missing account, wrong owner or malformed record
    #[error("Invalid account {address}: {message}")]
    InvalidAccount { address: Identity, message: String },

    /// Seed limits exceeded or seeds hash onto the curve
    #[error("Invalid seeds: {message}")]
    InvalidSeeds { message: String },

    /// Transfer recipient is the vault itself
    #[error("Self-transfer rejected: recipient is the vault {address}")]
    SelfTransfer { address: Identity },

    /// Transfer of zero lamports
    #[error("Transfer amount must be greater than zero")]
    ZeroAmount,

    /// An account declared as signer carries no signature
    #[error("Missing required signature for {signer}")]
    MissingRequiredSignature { signer: Identity },

    /// A signature failed ed25519 verification or was not requested
    #[error("Invalid signature for {signer}")]
    InvalidSignature { signer: Identity },

    /// Malformed instruction data or account list
    #[error("Invalid instruction: {message}")]
    InvalidInstruction { message: String },

    /// Instruction or certificate bound to a different program
    #[error("Incorrect program id: expected {expected}, got {actual}")]
    IncorrectProgramId { expected: Identity, actual: Identity },

    /// The ledger has no program registered under this id
    #[error("Unknown program {program_id}")]
    UnknownProgram { program_id: Identity },

    /// Text or bytes that are not a valid identity or keypair
    #[error("Invalid identity: {value}")]
    InvalidIdentity { value: String },

    /// Configuration errors during program setup
    #[error("Custodian configuration error: {message}")]
    Configuration { message: String },

    /// File I/O operations
    #[error("File operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON processing error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

/// Result type alias for custody operations
pub type CustodianResult<T> = Result<T, CustodianError>;

impl CustodianError {
    /// Create a configuration error with a message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an invalid account error
    pub fn invalid_account(address: Identity, message: impl Into<String>) -> Self {
        Self::InvalidAccount {
            address,
            message: message.into(),
        }
    }

    /// Create an invalid seeds error
    pub fn invalid_seeds(message: impl Into<String>) -> Self {
        Self::InvalidSeeds {
            message: message.into(),
        }
    }

    /// Create an invalid instruction error
    pub fn instruction(message: impl Into<String>) -> Self {
        Self::InvalidInstruction {
            message: message.into(),
        }
    }

    /// Create an invalid identity error
    pub fn identity(value: impl Into<String>) -> Self {
        Self::InvalidIdentity {
            value: value.into(),
        }
    }

    /// Stable numeric code, in the style of custom program errors.
    pub fn code(&self) -> u32 {
        let offset = match self {
            Self::AlreadyInitialized { .. } => 0,
            Self::NoValidAddress => 1,
            Self::UnauthorizedCaller { .. } => 2,
            Self::AddressMismatch { .. } => 3,
            Self::InsufficientFunds { .. } => 4,
            Self::InvalidAccount { .. } => 5,
            Self::InvalidSeeds { .. } => 6,
            Self::SelfTransfer { .. } => 7,
            Self::ZeroAmount => 8,
            Self::MissingRequiredSignature { .. } => 9,
            Self::InvalidSignature { .. } => 10,
            Self::InvalidInstruction { .. } => 11,
            Self::IncorrectProgramId { .. } => 12,
            Self::UnknownProgram { .. } => 13,
            Self::InvalidIdentity { .. } => 14,
            Self::Configuration { .. } => 15,
            Self::Io { .. } => 16,
            Self::Json { .. } => 17,
        };
        CUSTOM_ERROR_BASE + offset
    }

    /// Check if this error indicates an attempted custody violation
    pub fn is_security_critical(&self) -> bool {
        matches!(
            self,
            CustodianError::UnauthorizedCaller { .. }
                | CustodianError::AddressMismatch { .. }
                | CustodianError::MissingRequiredSignature { .. }
                | CustodianError::InvalidSignature { .. }
                | CustodianError::IncorrectProgramId { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_error_creation() {
        let config_err = CustodianError::config("missing trusted service");
        assert!(matches!(config_err, CustodianError::Configuration { .. }));

        let seeds_err = CustodianError::invalid_seeds("too many seeds");
        assert!(matches!(seeds_err, CustodianError::InvalidSeeds { .. }));
        assert!(!seeds_err.is_security_critical());
    }

    #[test]
    fn test_error_classification() {
        let unauthorized = CustodianError::UnauthorizedCaller {
            expected: Identity::default(),
        };
        assert!(unauthorized.is_security_critical());

        let funds = CustodianError::InsufficientFunds {
            required: 10,
            available: 5,
        };
        assert!(!funds.is_security_critical());
        assert!(funds.to_string().contains("required 10"));
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let id = Identity::default();
        let errors = vec![
            CustodianError::AlreadyInitialized { address: id },
            CustodianError::NoValidAddress,
            CustodianError::UnauthorizedCaller { expected: id },
            CustodianError::AddressMismatch { expected: id, actual: id },
            CustodianError::InsufficientFunds { required: 1, available: 0 },
            CustodianError::invalid_account(id, "x"),
            CustodianError::invalid_seeds("x"),
            CustodianError::SelfTransfer { address: id },
            CustodianError::ZeroAmount,
            CustodianError::MissingRequiredSignature { signer: id },
            CustodianError::InvalidSignature { signer: id },
            CustodianError::instruction("x"),
            CustodianError::IncorrectProgramId { expected: id, actual: id },
            CustodianError::UnknownProgram { program_id: id },
            CustodianError::identity("x"),
            CustodianError::config("x"),
            std::io::Error::other("x").into(),
            serde_json::from_str::<u8>("x").unwrap_err().into(),
        ];

        let codes: HashSet<u32> = errors.iter().map(CustodianError::code).collect();
        assert_eq!(codes.len(), errors.len());
        assert_eq!(codes.len(), 18);
        assert!(codes.iter().all(|code| (CUSTOM_ERROR_BASE..CUSTOM_ERROR_BASE + 18).contains(code)));
        assert_eq!(CustodianError::NoValidAddress.code(), 6001);
    }
}
