//! Symmetric-key encrypted session key packet (tag 3, version 4).
//!
//! Written without an encrypted session key: the S2K output keys the data
//! packet directly. Messages from other implementations that carry an
//! encrypted session key are accepted; the key is decrypted with CFB under
//! the S2K output.

use zeroize::Zeroizing;

use crate::algorithm::CipherAlgo;
use crate::cipher::{Cfb, S2kParameters};
use crate::error::{AlgorithmKind, Error, Result};
use crate::secret::SecretBytes;

const VERSION: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeyPacket {
    pub cipher: CipherAlgo,
    pub s2k: S2kParameters,
    pub encrypted_key: Option<Vec<u8>>,
}

impl SessionKeyPacket {
    pub const fn new(cipher: CipherAlgo, s2k: S2kParameters) -> Self {
        Self { cipher, s2k, encrypted_key: None }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = vec![VERSION, self.cipher.id()];
        self.s2k.write(&mut body);
        if let Some(encrypted_key) = &self.encrypted_key {
            body.extend_from_slice(encrypted_key);
        }
        body
    }

    pub fn decode(body: &[u8]) -> Result<Self> {
        let (&version, rest) = body.split_first().ok_or_else(|| Error::corrupted("empty session key packet"))?;
        if version != VERSION {
            return Err(Error::unsupported(AlgorithmKind::Packet, version));
        }

        let (&cipher_id, rest) = rest.split_first().ok_or_else(|| Error::corrupted("truncated session key packet"))?;
        let cipher = CipherAlgo::try_from(cipher_id)?;
        let (s2k, used) = S2kParameters::read(rest)?;

        let remainder = &rest[used..];
        let encrypted_key = (!remainder.is_empty()).then(|| remainder.to_vec());

        Ok(Self { cipher, s2k, encrypted_key })
    }

    /// Cipher and key of the data packet, given the S2K output for this
    /// packet's cipher. `None` when a decrypted session key does not parse,
    /// which is what the wrong passphrase produces.
    pub fn session_key(&self, derived: &SecretBytes) -> Result<Option<(CipherAlgo, SecretBytes)>> {
        let Some(encrypted_key) = &self.encrypted_key else {
            return Ok(Some((self.cipher, derived.clone())));
        };

        let mut decrypted = Zeroizing::new(encrypted_key.clone());
        Cfb::new(self.cipher, derived.expose_secret())?.decrypt(&mut decrypted);

        let Some((&algo_id, key)) = decrypted.split_first() else {
            return Err(Error::corrupted("empty session key"));
        };
        let Ok(algo) = CipherAlgo::try_from(algo_id) else {
            return Ok(None);
        };
        if key.len() != algo.key_size() {
            return Ok(None);
        }

        Ok(Some((algo, SecretBytes::new(key))))
    }
}
