//! # String-to-Key Derivation
//!
//! Turns a passphrase (or key-file content) into a cipher key the way
//! RFC 4880 §3.7 specifies. Writing always uses the iterated and salted
//! form; the simple and salted forms are accepted when reading messages
//! produced elsewhere.
//!
//! ## Iteration Count
//!
//! The count of hashed bytes is persisted as one coded octet
//! `c`: `(16 + (c & 15)) << ((c >> 4) + 6)`. Requested counts are rounded
//! up to the nearest representable value.
//!
//! ## Long Keys
//!
//! When the digest is shorter than the key, further hash contexts are run
//! over the same input, the n-th one preloaded with n zero octets, and the
//! digests are concatenated. A shorter key is therefore always a prefix of a
//! longer key derived from the same parameters.

use zeroize::Zeroizing;

use crate::algorithm::HashAlgo;
use crate::cipher::Hasher;
use crate::config::{MAX_ITERATIONS, SALT_SIZE};
use crate::error::{AlgorithmKind, Error, Result};
use crate::secret::SecretBytes;

const S2K_SIMPLE: u8 = 0;
const S2K_SALTED: u8 = 1;
const S2K_ITERATED: u8 = 3;

/// Size of the hashing buffer that repeats the salted input.
const REPEAT_BUFFER: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum S2kKind {
    Simple,
    Salted,
    Iterated,
}

/// Self-describing S2K parameters, persisted next to the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S2kParameters {
    pub hash: HashAlgo,
    pub salt: [u8; SALT_SIZE],
    /// Bytes hashed; always a representable count.
    pub iterations: u32,
    kind: S2kKind,
}

impl S2kParameters {
    /// Iterated and salted parameters; `iterations` is rounded up.
    pub fn new(hash: HashAlgo, salt: [u8; SALT_SIZE], iterations: u32) -> Self {
        Self { hash, salt, iterations: decode_count(encode_count(iterations)), kind: S2kKind::Iterated }
    }

    /// Derives a key of `key_len` bytes.
    pub fn derive(&self, passphrase: &[u8], key_len: usize) -> SecretBytes {
        let mut input = Zeroizing::new(Vec::with_capacity(SALT_SIZE + passphrase.len()));
        if self.kind != S2kKind::Simple {
            input.extend_from_slice(&self.salt);
        }
        input.extend_from_slice(passphrase);

        let total = match self.kind {
            S2kKind::Iterated => (self.iterations as usize).max(input.len()),
            S2kKind::Simple | S2kKind::Salted => input.len(),
        };

        hash_repeated(self.hash, &input, total, key_len)
    }

    /// Serialises the specifier as it appears inside a session key packet.
    pub fn write(&self, out: &mut Vec<u8>) {
        match self.kind {
            S2kKind::Simple => out.extend_from_slice(&[S2K_SIMPLE, self.hash.id()]),
            S2kKind::Salted => {
                out.extend_from_slice(&[S2K_SALTED, self.hash.id()]);
                out.extend_from_slice(&self.salt);
            }
            S2kKind::Iterated => {
                out.extend_from_slice(&[S2K_ITERATED, self.hash.id()]);
                out.extend_from_slice(&self.salt);
                out.push(encode_count(self.iterations));
            }
        }
    }

    /// Parses a specifier, returning it with the number of bytes consumed.
    pub fn read(bytes: &[u8]) -> Result<(Self, usize)> {
        let (&kind, rest) = bytes.split_first().ok_or_else(|| Error::corrupted("missing s2k specifier"))?;
        let (&hash_id, rest) = rest.split_first().ok_or_else(|| Error::corrupted("missing s2k hash"))?;

        let kind = match kind {
            S2K_SIMPLE => S2kKind::Simple,
            S2K_SALTED => S2kKind::Salted,
            S2K_ITERATED => S2kKind::Iterated,
            other => return Err(Error::unsupported(AlgorithmKind::S2k, other)),
        };
        let hash = HashAlgo::try_from(hash_id)?;

        if kind == S2kKind::Simple {
            return Ok((Self { hash, salt: [0u8; SALT_SIZE], iterations: 0, kind }, 2));
        }

        let salt: [u8; SALT_SIZE] = rest.get(..SALT_SIZE).and_then(|s| s.try_into().ok()).ok_or_else(|| Error::corrupted("truncated s2k salt"))?;

        if kind == S2kKind::Salted {
            return Ok((Self { hash, salt, iterations: 0, kind }, 2 + SALT_SIZE));
        }

        let coded = *rest.get(SALT_SIZE).ok_or_else(|| Error::corrupted("missing s2k count"))?;
        Ok((Self { hash, salt, iterations: decode_count(coded), kind }, 3 + SALT_SIZE))
    }
}

/// Derives `key_len` bytes with the iterated and salted S2K.
pub fn derive(passphrase: &[u8], hash: HashAlgo, salt: &[u8; SALT_SIZE], iterations: u32, key_len: usize) -> SecretBytes {
    S2kParameters::new(hash, *salt, iterations).derive(passphrase, key_len)
}

/// Same as [`derive`] for a raw hash identifier taken from outside the registry.
pub fn derive_by_id(passphrase: &[u8], hash_id: u8, salt: &[u8; SALT_SIZE], iterations: u32, key_len: usize) -> Result<SecretBytes> {
    Ok(derive(passphrase, HashAlgo::try_from(hash_id)?, salt, iterations, key_len))
}

/// Expands a coded count octet.
#[inline]
pub const fn decode_count(coded: u8) -> u32 {
    (16 + (coded as u32 & 15)) << ((coded as u32 >> 4) + 6)
}

/// Smallest coded octet whose count is at least `iterations`.
pub fn encode_count(iterations: u32) -> u8 {
    if iterations >= MAX_ITERATIONS {
        return u8::MAX;
    }
    (0..=u8::MAX).find(|&coded| decode_count(coded) >= iterations).unwrap_or(u8::MAX)
}

fn hash_repeated(algo: HashAlgo, input: &[u8], total: usize, key_len: usize) -> SecretBytes {
    // Whole repetitions of the input, so every prefix of the buffer continues the stream correctly.
    let repeats = (REPEAT_BUFFER / input.len().max(1)).max(1);
    let buffer = Zeroizing::new(input.repeat(repeats));

    let mut key = Zeroizing::new(Vec::with_capacity(key_len + algo.digest_size()));
    let mut preload = 0usize;

    while key.len() < key_len {
        let mut hasher = Hasher::new(algo);
        hasher.update(&vec![0u8; preload]);

        let mut remaining = if buffer.is_empty() { 0 } else { total };
        while remaining > 0 {
            let take = remaining.min(buffer.len());
            hasher.update(&buffer[..take]);
            remaining -= take;
        }

        key.extend_from_slice(&Zeroizing::new(hasher.finalize()));
        preload += 1;
    }

    key.truncate(key_len);
    SecretBytes::new(&key)
}
