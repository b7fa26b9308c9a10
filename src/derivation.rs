//! # Program-Derived Addresses
//!
//! Derived addresses are hashes of `seeds || owner || "ProgramDerivedAddress"`
//! that are required to fall *off* the ed25519 curve, so no private key exists
//! for them. The owning program asserts control over such an address by
//! presenting the seeds and bump again as a [`ProgramCertificate`].
//!
//! ## Derivation
//!
//! ```text
//! address = SHA256(seed_0 || .. || seed_n || [bump] || owner || "ProgramDerivedAddress")
//! ```
//!
//! The bump is searched from 255 down to 0 and the first off-curve result wins.
//! The winning bump is the *canonical* bump; vault records store it and every
//! later check insists on it.

use crate::config::program::{MAX_SEEDS, MAX_SEED_LEN, PDA_MARKER, VAULT_SEED};
use crate::error::{CustodianError, CustodianResult};
use crate::identity::{bytes_are_curve_point, Identity};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hash the seeds and owner into a candidate address without any curve check.
fn hash_seeds(seeds: &[&[u8]], owner: &Identity) -> CustodianResult<[u8; 32]> {
    if seeds.len() > MAX_SEEDS {
        return Err(CustodianError::invalid_seeds(format!(
            "at most {} seeds allowed, got {}",
            MAX_SEEDS,
            seeds.len()
        )));
    }
    if let Some(seed) = seeds.iter().find(|seed| seed.len() > MAX_SEED_LEN) {
        return Err(CustodianError::invalid_seeds(format!(
            "seed of {} bytes exceeds the {} byte limit",
            seed.len(),
            MAX_SEED_LEN
        )));
    }

    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(owner.as_ref());
    hasher.update(PDA_MARKER);
    Ok(hasher.finalize().into())
}

/// Compute the address for a complete seed list (bump included).
///
/// Fails with `InvalidSeeds` if the seed limits are exceeded or the result
/// lands on the curve.
pub fn create_program_address(seeds: &[&[u8]], owner: &Identity) -> CustodianResult<Identity> {
    let hash = hash_seeds(seeds, owner)?;
    if bytes_are_curve_point(&hash) {
        return Err(CustodianError::invalid_seeds(
            "derived address lies on the ed25519 curve",
        ));
    }
    Ok(Identity::new(hash))
}

/// Find the canonical `(address, bump)` for `seeds` under `owner`.
pub fn find_program_address(seeds: &[&[u8]], owner: &Identity) -> CustodianResult<(Identity, u8)> {
    search_bump(seeds, owner, |candidate| !bytes_are_curve_point(candidate))
}

/// Walk bumps 255..=0 and return the first candidate `accept` approves.
fn search_bump<F>(seeds: &[&[u8]], owner: &Identity, accept: F) -> CustodianResult<(Identity, u8)>
where
    F: Fn(&[u8; 32]) -> bool,
{
    // one slot is reserved for the bump
    if seeds.len() >= MAX_SEEDS {
        return Err(CustodianError::invalid_seeds(format!(
            "at most {} seeds allowed before the bump, got {}",
            MAX_SEEDS - 1,
            seeds.len()
        )));
    }

    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut with_bump: Vec<&[u8]> = seeds.to_vec();
        with_bump.push(&bump_seed);
        let candidate = hash_seeds(&with_bump, owner)?;

        if accept(&candidate) {
            return Ok((Identity::new(candidate), bump));
        }
    }

    Err(CustodianError::NoValidAddress)
}

/// Seeds of the vault owned by `authority`: `["manager", authority]`.
pub fn vault_seeds(authority: &Identity) -> [&[u8]; 2] {
    [VAULT_SEED, authority.as_ref()]
}

/// Canonical vault address and bump for `authority` under `program_id`.
pub fn find_vault_address(authority: &Identity, program_id: &Identity) -> CustodianResult<(Identity, u8)> {
    find_program_address(&vault_seeds(authority), program_id)
}

/// Proof that a program controls a derived address.
///
/// A certificate is what the ledger accepts in place of a private-key
/// signature when debiting a program-owned account. It carries the owner
/// program, the seeds and the bump; the ledger re-derives the address and only
/// honours the certificate for the program that is currently executing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramCertificate {
    program_id: Identity,
    seeds: Vec<Vec<u8>>,
    bump: u8,
}

/// Issue a certificate for `seeds + [bump]` under `program_id`.
///
/// Issuing never fails; a certificate whose seeds do not derive a valid address
/// is rejected when the ledger calls [`ProgramCertificate::address`].
pub fn certify(program_id: &Identity, seeds: &[&[u8]], bump: u8) -> ProgramCertificate {
    ProgramCertificate {
        program_id: *program_id,
        seeds: seeds.iter().map(|seed| seed.to_vec()).collect(),
        bump,
    }
}

impl ProgramCertificate {
    pub fn program_id(&self) -> &Identity {
        &self.program_id
    }

    pub fn bump(&self) -> u8 {
        self.bump
    }

    /// The address this certificate speaks for.
    pub fn address(&self) -> CustodianResult<Identity> {
        let bump_seed = [self.bump];
        let mut seeds: Vec<&[u8]> = self.seeds.iter().map(Vec::as_slice).collect();
        seeds.push(&bump_seed);
        create_program_address(&seeds, &self.program_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Keypair;
    use std::collections::HashSet;

    fn program_id() -> Identity {
        Keypair::from_secret(&[42u8; 32]).identity()
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let authority = Keypair::from_secret(&[1u8; 32]).identity();
        let first = find_vault_address(&authority, &program_id()).unwrap();
        let second = find_vault_address(&authority, &program_id()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_derived_address_is_off_curve() {
        for i in 0..32u8 {
            let authority = Keypair::from_secret(&[i; 32]).identity();
            let (address, _) = find_vault_address(&authority, &program_id()).unwrap();
            assert!(!address.is_on_curve());
        }
    }

    #[test]
    fn test_canonical_bump_is_first_off_curve() {
        let authority = Keypair::from_secret(&[5u8; 32]).identity();
        let seeds = vault_seeds(&authority);
        let (address, bump) = find_program_address(&seeds, &program_id()).unwrap();

        let bump_seed = [bump];
        let recreated =
            create_program_address(&[seeds[0], seeds[1], &bump_seed[..]], &program_id()).unwrap();
        assert_eq!(recreated, address);

        // every higher bump must have landed on the curve
        for higher in (bump as u16 + 1)..=255 {
            let higher_seed = [higher as u8];
            let result = create_program_address(&[seeds[0], seeds[1], &higher_seed[..]], &program_id());
            assert!(matches!(result, Err(CustodianError::InvalidSeeds { .. })));
        }
    }

    #[test]
    fn test_distinct_authorities_get_distinct_addresses() {
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let authority = Identity::new_unique();
            let (address, _) = find_vault_address(&authority, &program_id()).unwrap();
            assert!(seen.insert(address), "address collision for {}", authority);
        }
    }

    #[test]
    fn test_owner_changes_address() {
        let authority = Keypair::from_secret(&[8u8; 32]).identity();
        let other_program = Keypair::from_secret(&[43u8; 32]).identity();
        let (a, _) = find_vault_address(&authority, &program_id()).unwrap();
        let (b, _) = find_vault_address(&authority, &other_program).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_exhausted_search_reports_no_valid_address() {
        let authority = Identity::new_unique();
        let result = search_bump(&vault_seeds(&authority), &program_id(), |_| false);
        assert!(matches!(result, Err(CustodianError::NoValidAddress)));
    }

    #[test]
    fn test_seed_limits() {
        let long_seed = [0u8; MAX_SEED_LEN + 1];
        let result = find_program_address(&[&long_seed], &program_id());
        assert!(matches!(result, Err(CustodianError::InvalidSeeds { .. })));

        let seed: &[u8] = b"s";
        let too_many = vec![seed; MAX_SEEDS];
        let result = find_program_address(&too_many, &program_id());
        assert!(matches!(result, Err(CustodianError::InvalidSeeds { .. })));

        let result = create_program_address(&vec![seed; MAX_SEEDS + 1], &program_id());
        assert!(matches!(result, Err(CustodianError::InvalidSeeds { .. })));
    }

    #[test]
    fn test_certificate_resolves_to_derived_address() {
        let authority = Keypair::from_secret(&[11u8; 32]).identity();
        let (address, bump) = find_vault_address(&authority, &program_id()).unwrap();

        let certificate = certify(&program_id(), &vault_seeds(&authority), bump);
        assert_eq!(certificate.address().unwrap(), address);
        assert_eq!(certificate.program_id(), &program_id());

        // same seeds under a different program speak for a different address
        let foreign = certify(&Identity::new_unique(), &vault_seeds(&authority), bump);
        assert_ne!(foreign.address().ok(), Some(address));
    }
}
