//! Symmetrically encrypted integrity protected data packet (tag 18, version 1).
//!
//! ## Layout of the encrypted plaintext
//!
//! ```text
//! random prefix (block size) || last two prefix bytes || inner packets || 0xD3 0x14 || SHA-1
//! ```
//!
//! The SHA-1 covers everything before it, including the two MDC header
//! octets. The whole plaintext is encrypted in one CFB pass with a zero IV.

use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::algorithm::CipherAlgo;
use crate::cipher::{Cfb, MDC_SIZE, mdc, verify_mdc};
use crate::error::{AlgorithmKind, Error, Result};

const VERSION: u8 = 1;

/// MDC packet header: new-format tag 19, length 20.
const MDC_HEADER: [u8; 2] = [0xC0 | 19, MDC_SIZE as u8];

/// Outcome of opening a data packet.
pub enum Opened {
    /// MDC verified; the inner packet stream.
    Plaintext(Zeroizing<Vec<u8>>),

    /// The quick check in the random prefix failed: almost certainly the wrong key.
    WrongKey,
}

pub fn encrypt<G: RngCore + CryptoRng>(cipher: CipherAlgo, key: &[u8], inner: &[u8], rng: &mut G) -> Result<Vec<u8>> {
    let block_size = cipher.block_size();
    let mut plaintext = Zeroizing::new(Vec::with_capacity(block_size + 2 + inner.len() + 2 + MDC_SIZE));

    plaintext.resize(block_size, 0);
    rng.fill_bytes(&mut plaintext[..block_size]);
    let repeat = [plaintext[block_size - 2], plaintext[block_size - 1]];
    plaintext.extend_from_slice(&repeat);
    plaintext.extend_from_slice(inner);
    plaintext.extend_from_slice(&MDC_HEADER);
    let digest = mdc(&plaintext);
    plaintext.extend_from_slice(&digest);

    Cfb::new(cipher, key)?.encrypt(&mut plaintext);

    let mut body = Vec::with_capacity(1 + plaintext.len());
    body.push(VERSION);
    body.extend_from_slice(&plaintext);
    Ok(body)
}

pub fn decrypt(cipher: CipherAlgo, key: &[u8], body: &[u8]) -> Result<Opened> {
    let (&version, ciphertext) = body.split_first().ok_or_else(|| Error::corrupted("empty data packet"))?;
    if version != VERSION {
        return Err(Error::unsupported(AlgorithmKind::Packet, version));
    }

    let block_size = cipher.block_size();
    let overhead = block_size + 2 + MDC_HEADER.len() + MDC_SIZE;
    if ciphertext.len() < overhead {
        return Err(Error::corrupted("data packet shorter than its framing"));
    }

    let mut plaintext = Zeroizing::new(ciphertext.to_vec());
    Cfb::new(cipher, key)?.decrypt(&mut plaintext);

    if plaintext[block_size - 2..block_size] != plaintext[block_size..block_size + 2] {
        return Ok(Opened::WrongKey);
    }

    let digest_start = plaintext.len() - MDC_SIZE;
    let header_start = digest_start - MDC_HEADER.len();
    if plaintext[header_start..digest_start] != MDC_HEADER || !verify_mdc(&plaintext[..digest_start], &plaintext[digest_start..]) {
        return Err(Error::corrupted("modification detection code mismatch"));
    }

    Ok(Opened::Plaintext(Zeroizing::new(plaintext[block_size + 2..header_start].to_vec())))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use strum::IntoEnumIterator;

    use super::*;

    fn open(cipher: CipherAlgo, key: &[u8], body: &[u8]) -> Result<Vec<u8>> {
        match decrypt(cipher, key, body)? {
            Opened::Plaintext(inner) => Ok(inner.to_vec()),
            Opened::WrongKey => Err(Error::InvalidPassphrase),
        }
    }

    #[test]
    fn test_round_trip_all_ciphers() {
        let mut rng = StdRng::seed_from_u64(1);
        for cipher in CipherAlgo::iter() {
            let key = vec![0x24; cipher.key_size()];
            let body = encrypt(cipher, &key, b"inner packet stream", &mut rng).unwrap();
            assert_eq!(body.len(), 1 + cipher.block_size() + 2 + 19 + 22);
            assert_eq!(open(cipher, &key, &body).unwrap(), b"inner packet stream");
        }
    }

    #[test]
    fn test_empty_inner_stream() {
        let mut rng = StdRng::seed_from_u64(2);
        let body = encrypt(CipherAlgo::Aes128, &[1; 16], b"", &mut rng).unwrap();
        assert!(open(CipherAlgo::Aes128, &[1; 16], &body).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_key_fails_quick_check() {
        let mut rng = StdRng::seed_from_u64(3);
        let body = encrypt(CipherAlgo::Aes256, &[1; 32], b"secret", &mut rng).unwrap();
        assert!(matches!(decrypt(CipherAlgo::Aes256, &[2; 32], &body), Ok(Opened::WrongKey)));
    }

    #[test]
    fn test_every_payload_byte_is_protected() {
        let mut rng = StdRng::seed_from_u64(4);
        let key = [9u8; 32];
        let body = encrypt(CipherAlgo::Aes256, &key, b"tamper with me", &mut rng).unwrap();

        // Past the prefix and its repeat, a flipped byte can only be caught by the MDC.
        for index in (1 + 16 + 2)..body.len() {
            let mut damaged = body.clone();
            damaged[index] ^= 0x01;
            assert!(matches!(decrypt(CipherAlgo::Aes256, &key, &damaged), Err(Error::IntegrityCheckFailed)), "byte {index}");
        }
    }

    #[test]
    fn test_truncated_and_wrong_version() {
        assert!(matches!(decrypt(CipherAlgo::Aes128, &[0; 16], &[1, 2, 3]), Err(Error::IntegrityCheckFailed)));
        assert!(matches!(decrypt(CipherAlgo::Aes128, &[0; 16], &[2; 64]), Err(Error::UnsupportedAlgorithm { kind: AlgorithmKind::Packet, id: 2 })));
    }
}
