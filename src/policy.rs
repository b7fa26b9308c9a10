//! # Transfer Authorization Policy
//!
//! Decides whether a `TransferOut` may debit a vault. The vault's `authority`
//! takes no part in the decision: it records who created the vault, while the
//! right to move funds belongs solely to the deployment's trusted service.
//!
//! Rules, evaluated in order:
//! 1. the trusted service signed the instruction, else `UnauthorizedCaller`
//! 2. the recipient is not the vault itself, else `SelfTransfer`
//! 3. the amount is non-zero, else `ZeroAmount`
//! 4. the amount fits in the spendable balance, else `InsufficientFunds`

use crate::error::{CustodianError, CustodianResult};
use crate::identity::Identity;

/// Everything the policy looks at for one transfer.
#[derive(Debug, Clone)]
pub struct TransferRequest<'a> {
    pub vault: &'a Identity,
    pub recipient: &'a Identity,
    pub amount: u64,
    /// Identities whose signatures the ledger verified for this instruction
    pub signers: &'a [Identity],
    /// Current lamports held by the vault
    pub balance: u64,
    /// Balance the ledger requires the vault to keep
    pub minimum_balance: u64,
}

impl TransferRequest<'_> {
    /// Lamports that can leave the vault without breaching the minimum.
    pub fn available(&self) -> u64 {
        self.balance.saturating_sub(self.minimum_balance)
    }
}

/// Signer policy bound to a single trusted service identity.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationPolicy {
    trusted_service: Identity,
}

impl AuthorizationPolicy {
    pub fn new(trusted_service: Identity) -> Self {
        Self { trusted_service }
    }

    pub fn trusted_service(&self) -> &Identity {
        &self.trusted_service
    }

    /// Permit or reject a transfer.
    pub fn authorize(&self, request: &TransferRequest<'_>) -> CustodianResult<()> {
        if !request.signers.contains(&self.trusted_service) {
            log::warn!(
                "Rejected transfer from vault {}: trusted service did not sign",
                request.vault
            );
            return Err(CustodianError::UnauthorizedCaller {
                expected: self.trusted_service,
            });
        }

        if request.recipient == request.vault {
            return Err(CustodianError::SelfTransfer {
                address: *request.vault,
            });
        }

        if request.amount == 0 {
            return Err(CustodianError::ZeroAmount);
        }

        let available = request.available();
        if request.amount > available {
            return Err(CustodianError::InsufficientFunds {
                required: request.amount,
                available,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        trusted: Identity,
        vault: Identity,
        recipient: Identity,
    }

    fn fixture() -> Fixture {
        Fixture {
            trusted: Identity::new([1u8; 32]),
            vault: Identity::new([2u8; 32]),
            recipient: Identity::new([3u8; 32]),
        }
    }

    fn request<'a>(f: &'a Fixture, signers: &'a [Identity], amount: u64) -> TransferRequest<'a> {
        TransferRequest {
            vault: &f.vault,
            recipient: &f.recipient,
            amount,
            signers,
            balance: 1_000,
            minimum_balance: 100,
        }
    }

    #[test]
    fn test_trusted_signer_is_permitted() {
        let f = fixture();
        let policy = AuthorizationPolicy::new(f.trusted);
        let signers = [f.trusted];
        assert!(policy.authorize(&request(&f, &signers, 900)).is_ok());
    }

    #[test]
    fn test_missing_trusted_signer_is_rejected() {
        let f = fixture();
        let policy = AuthorizationPolicy::new(f.trusted);
        let authority = Identity::new([9u8; 32]);

        for signers in [vec![], vec![authority], vec![f.recipient, authority]] {
            let result = policy.authorize(&request(&f, &signers, 10));
            assert!(matches!(result, Err(CustodianError::UnauthorizedCaller { .. })));
        }
    }

    #[test]
    fn test_signer_check_comes_first() {
        // an oversized self-transfer without the trusted signer is still
        // reported as unauthorized
        let f = fixture();
        let policy = AuthorizationPolicy::new(f.trusted);
        let mut req = request(&f, &[], u64::MAX);
        req.recipient = &f.vault;
        assert!(matches!(
            policy.authorize(&req),
            Err(CustodianError::UnauthorizedCaller { .. })
        ));
    }

    #[test]
    fn test_self_transfer_and_zero_amount() {
        let f = fixture();
        let policy = AuthorizationPolicy::new(f.trusted);
        let signers = [f.trusted];

        let mut req = request(&f, &signers, 10);
        req.recipient = &f.vault;
        assert!(matches!(policy.authorize(&req), Err(CustodianError::SelfTransfer { .. })));

        let req = request(&f, &signers, 0);
        assert!(matches!(policy.authorize(&req), Err(CustodianError::ZeroAmount)));
    }

    #[test]
    fn test_minimum_balance_is_retained() {
        let f = fixture();
        let policy = AuthorizationPolicy::new(f.trusted);
        let signers = [f.trusted];

        let result = policy.authorize(&request(&f, &signers, 901));
        assert!(matches!(
            result,
            Err(CustodianError::InsufficientFunds { required: 901, available: 900 })
        ));

        let mut req = request(&f, &signers, 1);
        req.balance = 50;
        assert_eq!(req.available(), 0);
        assert!(policy.authorize(&req).is_err());
    }
}
