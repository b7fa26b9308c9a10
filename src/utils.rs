//! # Utility Functions
//!
//! Display and file helpers shared by the CLI and the ledger.

use crate::error::{CustodianError, CustodianResult};

/// Address formatting utilities
pub mod address {
    use crate::config::ui::{ADDRESS_DISPLAY_PREFIX, ADDRESS_DISPLAY_SUFFIX};
    use crate::identity::Identity;

    /// Format an identity for display with ellipsis in the middle
    ///
    /// # Returns
    /// Formatted address string like "BqvmMS...bNxC"
    pub fn format_short(identity: &Identity) -> String {
        format_with_length(&identity.to_string(), ADDRESS_DISPLAY_PREFIX, ADDRESS_DISPLAY_SUFFIX)
    }

    /// Format an address with custom prefix and suffix lengths
    pub fn format_with_length(address: &str, prefix_len: usize, suffix_len: usize) -> String {
        if address.len() <= prefix_len + suffix_len + 3 {
            address.to_string()
        } else {
            format!(
                "{}...{}",
                &address[..prefix_len],
                &address[address.len() - suffix_len..]
            )
        }
    }
}

/// Amount formatting utilities
pub mod amount {
    use crate::config::ledger::LAMPORTS_PER_SOL;

    /// Convert lamports to SOL
    pub fn lamports_to_sol(lamports: u64) -> f64 {
        lamports as f64 / LAMPORTS_PER_SOL as f64
    }

    /// Convert SOL to lamports, rounding to the nearest lamport
    pub fn sol_to_lamports(sol: f64) -> u64 {
        (sol * LAMPORTS_PER_SOL as f64).round() as u64
    }

    /// Format amount with both lamports and SOL
    pub fn format_lamports(lamports: u64) -> String {
        format!("{} lamports ({:.9} SOL)", lamports, lamports_to_sol(lamports))
    }
}

/// Time utilities
pub mod time {
    use chrono::{DateTime, Utc};

    /// Format a unix timestamp (seconds) for display
    pub fn format_unix(timestamp: i64) -> String {
        match DateTime::<Utc>::from_timestamp(timestamp, 0) {
            Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            None => format!("@{}", timestamp),
        }
    }
}

/// File system utilities
pub mod fs {
    use super::*;
    use crate::config::files;
    use std::fs;
    use std::path::{Path, PathBuf};

    /// Ensure directory exists, create if it doesn't
    pub fn ensure_dir_exists(path: &Path) -> CustodianResult<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Get the configuration directory path
    pub fn config_dir() -> CustodianResult<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CustodianError::config("Unable to determine home directory"))?;
        Ok(home.join(files::CONFIG_DIR))
    }

    /// Default location of the operator keypair
    pub fn default_keypair_path() -> CustodianResult<PathBuf> {
        Ok(config_dir()?.join(files::DEFAULT_KEYPAIR))
    }

    /// Safe file write with atomic operation
    pub fn write_file_atomic(path: &Path, content: &[u8]) -> CustodianResult<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            ensure_dir_exists(parent)?;
        }
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, content)?;
        fs::rename(temp_path, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use std::str::FromStr;

    #[test]
    fn test_address_formatting() {
        let identity = Identity::from_str("BqvmMSVZZ6fNXHegCahrgSkD6STpiBASVpvbsAgmbNxC").unwrap();
        assert_eq!(address::format_short(&identity), "BqvmMS...bNxC");
        assert_eq!(address::format_with_length("short", 4, 4), "short");
    }

    #[test]
    fn test_amount_conversion() {
        assert_eq!(amount::lamports_to_sol(1_500_000_000), 1.5);
        assert_eq!(amount::sol_to_lamports(0.1), 100_000_000);
        assert_eq!(amount::sol_to_lamports(1.0), 1_000_000_000);
        assert_eq!(
            amount::format_lamports(900_000_000),
            "900000000 lamports (0.900000000 SOL)"
        );
    }

    #[test]
    fn test_format_unix() {
        assert_eq!(time::format_unix(0), "1970-01-01 00:00:00 UTC");
        assert_eq!(time::format_unix(1_700_000_000), "2023-11-14 22:13:20 UTC");
    }

    #[test]
    fn test_atomic_write_creates_parent() {
        let dir = std::env::temp_dir().join(format!("custodian_utils_{}", Identity::new_unique()));
        let path = dir.join("state.json");

        fs::write_file_atomic(&path, b"{}").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
        assert!(!path.with_extension("tmp").exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
