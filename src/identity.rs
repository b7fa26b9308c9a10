//! # Identities and Keypairs
//!
//! An [`Identity`] is a 32-byte public verification key, rendered as base58.
//! A [`Keypair`] is an ordinary ed25519 signer: "signed by a person". The
//! program-certified counterpart lives in [`crate::derivation`].

use crate::error::{CustodianError, CustodianResult};
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, io::Write as _, path::Path, str::FromStr};

/// Length of an identity in bytes
pub const IDENTITY_LENGTH: usize = 32;

/// Length of an ed25519 signature in bytes
pub const SIGNATURE_LENGTH: usize = 64;

/// Permissions of keypair files written on unix
#[cfg(unix)]
const KEYPAIR_FILE_MODE: u32 = 0o600;

/// A 32-byte account or signer identity.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity([u8; IDENTITY_LENGTH]);

impl Identity {
    pub const fn new(bytes: [u8; IDENTITY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Build an identity from a slice that must be exactly 32 bytes.
    pub fn try_from_slice(bytes: &[u8]) -> CustodianResult<Self> {
        let array: [u8; IDENTITY_LENGTH] = bytes.try_into().map_err(|_| {
            CustodianError::identity(format!(
                "identity must be {} bytes, got {}",
                IDENTITY_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// A random identity. Almost always on-curve, but nobody knows its key.
    pub fn new_unique() -> Self {
        Self(rand::random())
    }

    pub fn to_bytes(self) -> [u8; IDENTITY_LENGTH] {
        self.0
    }

    /// Whether these bytes decompress to a valid ed25519 point.
    ///
    /// Only on-curve identities can ever produce a valid signature; derived
    /// vault addresses are required to be off-curve.
    pub fn is_on_curve(&self) -> bool {
        bytes_are_curve_point(&self.0)
    }

    /// Verify an ed25519 signature made by this identity over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8; SIGNATURE_LENGTH]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let signature = Signature::from_bytes(signature);
        key.verify(message, &signature).is_ok()
    }
}

/// Edwards25519 point decompression check.
pub fn bytes_are_curve_point(bytes: &[u8; IDENTITY_LENGTH]) -> bool {
    VerifyingKey::from_bytes(bytes).is_ok()
}

impl AsRef<[u8]> for Identity {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; IDENTITY_LENGTH]> for Identity {
    fn from(bytes: [u8; IDENTITY_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self)
    }
}

impl FromStr for Identity {
    type Err = CustodianError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| CustodianError::identity(format!("{}: {}", s, e)))?;
        Self::try_from_slice(&bytes).map_err(|_| CustodianError::identity(s))
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Identity::from_str(&text).map_err(serde::de::Error::custom)
    }
}

/// An ed25519 keypair able to sign transactions.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let secret: [u8; 32] = rand::random();
        Self::from_secret(&secret)
    }

    /// Deterministic keypair from a 32-byte secret
    pub fn from_secret(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// Parse the 64-byte `secret || public` form used by keypair files.
    pub fn from_keypair_bytes(bytes: &[u8]) -> CustodianResult<Self> {
        let array: [u8; 64] = bytes.try_into().map_err(|_| {
            CustodianError::identity(format!("keypair must be 64 bytes, got {}", bytes.len()))
        })?;
        let signing_key = SigningKey::from_keypair_bytes(&array)
            .map_err(|e| CustodianError::identity(format!("keypair halves do not match: {}", e)))?;
        Ok(Self { signing_key })
    }

    pub fn to_keypair_bytes(&self) -> [u8; 64] {
        self.signing_key.to_keypair_bytes()
    }

    pub fn identity(&self) -> Identity {
        Identity(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Read a keypair file: a JSON array of 64 numbers.
    pub fn read_from_file(path: impl AsRef<Path>) -> CustodianResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let bytes: Vec<u8> = serde_json::from_str(&json)?;
        Self::from_keypair_bytes(&bytes)
    }

    /// Write the keypair in the same JSON array format.
    ///
    /// On unix the file is readable by its owner only (0600), including when
    /// an existing file is overwritten.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> CustodianResult<()> {
        let json = serde_json::to_string(&self.to_keypair_bytes().to_vec())?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(KEYPAIR_FILE_MODE);
        }
        let mut file = options.open(path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(KEYPAIR_FILE_MODE))?;
        }

        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never print the secret half
        write!(f, "Keypair({})", self.identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base58_round_trip() {
        let keypair = Keypair::from_secret(&[7u8; 32]);
        let identity = keypair.identity();
        let text = identity.to_string();
        assert_eq!(Identity::from_str(&text).unwrap(), identity);
    }

    #[test]
    fn test_invalid_identity_text() {
        assert!(matches!(
            Identity::from_str("not-base58-0OIl"),
            Err(CustodianError::InvalidIdentity { .. })
        ));
        // valid base58, wrong length
        assert!(matches!(
            Identity::from_str("3yZe7d"),
            Err(CustodianError::InvalidIdentity { .. })
        ));
    }

    #[test]
    fn test_keypair_identity_is_on_curve() {
        let keypair = Keypair::generate();
        assert!(keypair.identity().is_on_curve());
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = Keypair::from_secret(&[1u8; 32]);
        let other = Keypair::from_secret(&[2u8; 32]);
        let signature = keypair.sign(b"transfer 100");

        assert!(keypair.identity().verify(b"transfer 100", &signature));
        assert!(!keypair.identity().verify(b"transfer 101", &signature));
        assert!(!other.identity().verify(b"transfer 100", &signature));
    }

    #[test]
    fn test_keypair_bytes_must_match() {
        let keypair = Keypair::from_secret(&[3u8; 32]);
        let mut bytes = keypair.to_keypair_bytes();
        let restored = Keypair::from_keypair_bytes(&bytes).unwrap();
        assert_eq!(restored.identity(), keypair.identity());

        bytes[40] ^= 0xff;
        assert!(Keypair::from_keypair_bytes(&bytes).is_err());
        assert!(Keypair::from_keypair_bytes(&bytes[..10]).is_err());
    }

    #[test]
    fn test_identity_serde_as_string() {
        let identity = Keypair::from_secret(&[9u8; 32]).identity();
        let json = serde_json::to_string(&identity).unwrap();
        assert_eq!(json, format!("\"{}\"", identity));
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, identity);
    }

    #[cfg(unix)]
    #[test]
    fn test_keypair_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("custodian_keys_{}", Identity::new_unique()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("service.json");

        // an existing world-readable file is tightened on overwrite
        std::fs::write(&path, "[]").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let keypair = Keypair::from_secret(&[4u8; 32]);
        keypair.write_to_file(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(Keypair::read_from_file(&path).unwrap().identity(), keypair.identity());

        let fresh = dir.join("authority.json");
        keypair.write_to_file(&fresh).unwrap();
        assert_eq!(std::fs::metadata(&fresh).unwrap().permissions().mode() & 0o777, 0o600);

        std::fs::remove_dir_all(&dir).ok();
    }
}
