//! Passphrase-derived key cache.
//!
//! A passphrase is turned into a batch of keys, each with its own random
//! salt, and then dropped. Every encrypting save takes one unused key so
//! consecutive saves get fresh salts without asking for the passphrase
//! again. The key that opened the document is kept for lookups by its
//! parameters.

use rand::{CryptoRng, RngCore};

use crate::algorithm::HashAlgo;
use crate::cipher::S2kParameters;
use crate::config::{MAX_KEY_SIZE, SALT_SIZE};
use crate::error::{Error, Result};
use crate::secret::{Secret, SecretBytes};

struct CachedKey {
    params: S2kParameters,
    key: SecretBytes,
    used: bool,
}

#[derive(Default)]
pub struct KeyService {
    keys: Vec<CachedKey>,
}

impl KeyService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cache with `count` keys derived from `passphrase`.
    pub fn fill<G: RngCore + CryptoRng>(&mut self, passphrase: &Secret, hash: HashAlgo, iterations: u32, count: usize, rng: &mut G) -> Result<()> {
        if iterations == 0 {
            return Err(Error::InvalidParameter("iteration count must be positive".to_owned()));
        }

        self.keys.clear();
        for _ in 0..count.max(1) {
            let mut salt = [0u8; SALT_SIZE];
            rng.fill_bytes(&mut salt);
            let params = S2kParameters::new(hash, salt, iterations);
            let key = params.derive(passphrase.expose_secret().as_bytes(), MAX_KEY_SIZE);
            self.keys.push(CachedKey { params, key, used: false });
        }
        tracing::debug!(count = self.keys.len(), %hash, iterations, "passphrase keys derived");
        Ok(())
    }

    /// Remembers an already derived key; it is never handed out for encryption.
    pub fn remember(&mut self, params: S2kParameters, key: SecretBytes) {
        self.keys.push(CachedKey { params, key, used: true });
    }

    /// Takes an unused key matching the requested parameters.
    pub fn take_fresh(&mut self, hash: HashAlgo, iterations: u32) -> Option<(S2kParameters, SecretBytes)> {
        let effective = S2kParameters::new(hash, [0; SALT_SIZE], iterations).iterations;
        let cached = self.keys.iter_mut().find(|cached| !cached.used && cached.params.hash == hash && cached.params.iterations == effective)?;
        cached.used = true;
        Some((cached.params.clone(), cached.key.clone()))
    }

    /// Whether a save with these parameters can proceed without a prompt.
    pub fn has_fresh(&self, hash: HashAlgo, iterations: u32) -> bool {
        let effective = S2kParameters::new(hash, [0; SALT_SIZE], iterations).iterations;
        self.keys.iter().any(|cached| !cached.used && cached.params.hash == hash && cached.params.iterations == effective)
    }

    pub fn lookup(&self, params: &S2kParameters) -> Option<SecretBytes> {
        self.keys.iter().find(|cached| cached.params == *params).map(|cached| cached.key.clone())
    }

    pub fn remaining(&self) -> usize {
        self.keys.iter().filter(|cached| !cached.used).count()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}

impl std::fmt::Debug for KeyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyService").field("keys", &self.keys.len()).field("remaining", &self.remaining()).finish()
    }
}
