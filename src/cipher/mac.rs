use hmac::{Hmac, Mac as _};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::{KEY_CHECK_LABEL, KEY_CHECK_SIZE};
use crate::error::{Error, Result};

/// Verifier for a derived layer key, stored ahead of each native layer.
///
/// A mismatch identifies the wrong passphrase or key file before any
/// ciphertext is touched, so damage to the ciphertext can always be reported
/// as an integrity failure.
pub struct KeyCheck;

impl KeyCheck {
    pub fn compute(key: &[u8], salt: &[u8]) -> Result<[u8; KEY_CHECK_SIZE]> {
        if key.is_empty() {
            return Err(Error::InvalidParameter("empty key".to_owned()));
        }

        let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|e| Error::InvalidParameter(format!("key check: {e}")))?;
        mac.update(KEY_CHECK_LABEL);
        mac.update(salt);

        let digest = mac.finalize().into_bytes();
        let mut check = [0u8; KEY_CHECK_SIZE];
        check.copy_from_slice(&digest[..KEY_CHECK_SIZE]);
        Ok(check)
    }

    pub fn verify(key: &[u8], salt: &[u8], expected: &[u8]) -> Result<bool> {
        let computed = Self::compute(key, salt)?;
        Ok(bool::from(computed.as_slice().ct_eq(expected)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify() {
        let check = KeyCheck::compute(b"derived key", b"saltsalt").unwrap();
        assert!(KeyCheck::verify(b"derived key", b"saltsalt", &check).unwrap());
        assert!(!KeyCheck::verify(b"derived kez", b"saltsalt", &check).unwrap());
        assert!(!KeyCheck::verify(b"derived key", b"saltsalu", &check).unwrap());
    }

    #[test]
    fn test_empty_key() {
        assert!(KeyCheck::compute(b"", b"salt").is_err());
    }
}
