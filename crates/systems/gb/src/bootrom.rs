//! DMG boot ROM
//!
//! The 256-byte boot program overlays $0000-$00FF until the program writes to
//! $FF50. Images are checked against the MD5 of the retail DMG boot ROM unless
//! the caller supplies a SHA-256 digest of its own.

use crate::DmgError;
use md5::Md5;
use sha2::{Digest, Sha256};

pub const BOOTROM_SIZE: usize = 0x100;

/// MD5 of the retail DMG boot ROM
pub const DMG_BOOTROM_MD5: &str = "32fbbd84168d3482956eb3c5051637f5";

#[derive(Clone)]
pub struct Bootrom {
    bytes: [u8; BOOTROM_SIZE],
}

impl std::fmt::Debug for Bootrom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootrom")
            .field("sha256", &sha256_hex(&self.bytes))
            .finish()
    }
}

/// Lowercase hex SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Lowercase hex MD5 of `data`
pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Check a user-supplied digest and bring it to lowercase
fn normalize_digest(hex: &str) -> Result<String, DmgError> {
    let hex = hex.trim();
    if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DmgError::InvalidDigest(hex.to_string()));
    }
    Ok(hex.to_ascii_lowercase())
}

impl Bootrom {
    pub fn from_bytes(data: &[u8]) -> Result<Self, DmgError> {
        let bytes: [u8; BOOTROM_SIZE] = data
            .try_into()
            .map_err(|_| DmgError::BootromSize(data.len()))?;
        Ok(Self { bytes })
    }

    /// Load and verify in one go: against `expected_sha256` when given,
    /// otherwise against the retail DMG image
    pub fn verified(data: &[u8], expected_sha256: Option<&str>) -> Result<Self, DmgError> {
        let bootrom = Self::from_bytes(data)?;
        match expected_sha256 {
            Some(expected) => bootrom.verify(expected)?,
            None => bootrom.verify_dmg()?,
        }
        Ok(bootrom)
    }

    /// Check that this is the retail DMG boot ROM
    pub fn verify_dmg(&self) -> Result<(), DmgError> {
        let actual = md5_hex(&self.bytes);
        if actual != DMG_BOOTROM_MD5 {
            return Err(DmgError::BootromDigest {
                expected: DMG_BOOTROM_MD5.to_string(),
                actual,
            });
        }
        Ok(())
    }

    pub fn verify(&self, expected_sha256: &str) -> Result<(), DmgError> {
        let expected = normalize_digest(expected_sha256)?;
        let actual = self.sha256();
        if actual != expected {
            return Err(DmgError::BootromDigest { expected, actual });
        }
        Ok(())
    }

    pub fn sha256(&self) -> String {
        sha256_hex(&self.bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // SHA-256 of 256 zero bytes
    const ZEROES_SHA256: &str = "5341e6b2646979a70e57653007a1f310169421ec9bdd9f1a5648f75ade005af1";
    // MD5 of 256 zero bytes
    const ZEROES_MD5: &str = "348a9791dc41b89796ec3808b5b5262f";

    #[test]
    fn test_size_must_be_exact() {
        assert!(matches!(
            Bootrom::from_bytes(&[0; 255]),
            Err(DmgError::BootromSize(255))
        ));
        assert!(matches!(
            Bootrom::from_bytes(&[0; 257]),
            Err(DmgError::BootromSize(257))
        ));
        assert!(Bootrom::from_bytes(&[0; BOOTROM_SIZE]).is_ok());
    }

    #[test]
    fn test_digest_matches() {
        let rom = Bootrom::from_bytes(&[0; BOOTROM_SIZE]).unwrap();
        assert_eq!(rom.sha256(), ZEROES_SHA256);
        assert!(rom.verify(ZEROES_SHA256).is_ok());
        // Case and surrounding whitespace are ignored
        let upper = format!(" {} ", ZEROES_SHA256.to_uppercase());
        assert!(rom.verify(&upper).is_ok());
    }

    #[test]
    fn test_digest_mismatch_rejected() {
        let mut data = [0u8; BOOTROM_SIZE];
        data[0] = 0x31;
        let err = Bootrom::verified(&data, Some(ZEROES_SHA256)).unwrap_err();
        match err {
            DmgError::BootromDigest { expected, actual } => {
                assert_eq!(expected, ZEROES_SHA256);
                assert_ne!(actual, expected);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_image_rejected_without_override() {
        assert_eq!(md5_hex(&[0; BOOTROM_SIZE]), ZEROES_MD5);
        let err = Bootrom::verified(&[0x42; BOOTROM_SIZE], None).unwrap_err();
        match err {
            DmgError::BootromDigest { expected, actual } => {
                assert_eq!(expected, DMG_BOOTROM_MD5);
                assert_eq!(actual, "03af7b93bc40f80dd209b53596eb1390");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_override_replaces_builtin_digest() {
        assert!(Bootrom::verified(&[0; BOOTROM_SIZE], Some(ZEROES_SHA256)).is_ok());
        assert!(Bootrom::verified(&[0; BOOTROM_SIZE], None).is_err());
    }

    #[test]
    fn test_malformed_digest() {
        let rom = Bootrom::from_bytes(&[0; BOOTROM_SIZE]).unwrap();
        assert!(matches!(rom.verify("abc"), Err(DmgError::InvalidDigest(_))));
        let not_hex = "z".repeat(64);
        assert!(matches!(rom.verify(&not_hex), Err(DmgError::InvalidDigest(_))));
    }
}
