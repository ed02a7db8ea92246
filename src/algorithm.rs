//! Cipher, hash and compression registry.
//!
//! Each supported algorithm maps to the stable numeric identifier written
//! into containers. The identifiers are the RFC 4880 registry values, so the
//! same numbers serve both output formats.

use strum::{Display, EnumIter, IntoEnumIterator};

use crate::error::{AlgorithmKind, Error, Result};

/// Symmetric ciphers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum CipherAlgo {
    #[strum(to_string = "Triple DES")]
    TripleDes,
    #[strum(to_string = "CAST5")]
    Cast5,
    #[strum(to_string = "AES-128")]
    Aes128,
    #[strum(to_string = "AES-256")]
    Aes256,
}

impl CipherAlgo {
    #[inline]
    pub const fn id(self) -> u8 {
        match self {
            Self::TripleDes => 2,
            Self::Cast5 => 3,
            Self::Aes128 => 7,
            Self::Aes256 => 9,
        }
    }

    /// Key length in bytes.
    #[inline]
    pub const fn key_size(self) -> usize {
        match self {
            Self::TripleDes => 24,
            Self::Cast5 | Self::Aes128 => 16,
            Self::Aes256 => 32,
        }
    }

    /// Block length in bytes; also the length of the CFB random prefix.
    #[inline]
    pub const fn block_size(self) -> usize {
        match self {
            Self::TripleDes | Self::Cast5 => 8,
            Self::Aes128 | Self::Aes256 => 16,
        }
    }
}

impl TryFrom<u8> for CipherAlgo {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        Self::iter().find(|algo| algo.id() == id).ok_or(Error::unsupported(AlgorithmKind::Cipher, id))
    }
}

/// Hash algorithms for S2K and integrity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum HashAlgo {
    #[strum(to_string = "SHA-1")]
    Sha1,
    #[strum(to_string = "SHA-256")]
    Sha256,
}

impl HashAlgo {
    #[inline]
    pub const fn id(self) -> u8 {
        match self {
            Self::Sha1 => 2,
            Self::Sha256 => 8,
        }
    }

    /// Digest length in bytes.
    #[inline]
    pub const fn digest_size(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }
}

impl TryFrom<u8> for HashAlgo {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        Self::iter().find(|algo| algo.id() == id).ok_or(Error::unsupported(AlgorithmKind::Hash, id))
    }
}

/// Compression methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Compression {
    #[strum(to_string = "Uncompressed")]
    None,
    /// Raw DEFLATE.
    #[strum(to_string = "ZIP")]
    Zip,
    /// DEFLATE with the zlib wrapper.
    #[strum(to_string = "ZLIB")]
    Zlib,
}

impl Compression {
    #[inline]
    pub const fn id(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Zip => 1,
            Self::Zlib => 2,
        }
    }
}

impl TryFrom<u8> for Compression {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        Self::iter().find(|algo| algo.id() == id).ok_or(Error::unsupported(AlgorithmKind::Compression, id))
    }
}
