//! Digest dispatch and the modification detection code.
//!
//! The MDC is always SHA-1 regardless of the S2K hash: the packet that
//! carries it has a fixed 20-byte body.

use sha1::Sha1;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::algorithm::HashAlgo;

/// Size of the MDC digest.
pub const MDC_SIZE: usize = 20;

/// Incremental hasher over a registered algorithm.
#[derive(Clone)]
pub enum Hasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl Hasher {
    pub fn new(algo: HashAlgo) -> Self {
        match algo {
            HashAlgo::Sha1 => Self::Sha1(Sha1::new()),
            HashAlgo::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha1(hasher) => hasher.update(data),
            Self::Sha256(hasher) => hasher.update(data),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha1(hasher) => hasher.finalize().to_vec(),
            Self::Sha256(hasher) => hasher.finalize().to_vec(),
        }
    }
}

/// SHA-1 over `data`, as stored in the MDC packet.
pub fn mdc(data: &[u8]) -> [u8; MDC_SIZE] {
    Sha1::digest(data).into()
}

/// Verifies an MDC in constant time.
pub fn verify_mdc(data: &[u8], expected: &[u8]) -> bool {
    bool::from(mdc(data).as_slice().ct_eq(expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digests() {
        let mut sha1 = Hasher::new(HashAlgo::Sha1);
        sha1.update(b"abc");
        assert_eq!(hex::encode(sha1.finalize()), "a9993e364706816aba3e25717850c26c9cd0d89d");

        let mut sha256 = Hasher::new(HashAlgo::Sha256);
        sha256.update(b"a");
        sha256.update(b"bc");
        assert_eq!(hex::encode(sha256.finalize()), "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }

    #[test]
    fn test_mdc_verify() {
        let tag = mdc(b"payload");
        assert!(verify_mdc(b"payload", &tag));
        assert!(!verify_mdc(b"payloae", &tag));
        assert!(!verify_mdc(b"payload", &tag[..19]));
    }
}
