//! # Encode/Decode Engine
//!
//! Turns a plaintext and a [`FileProtectionConfig`] into container bytes
//! and back. The engine never asks anybody for a secret itself: it is
//! parameterised by a [`KeyResolver`] that hands out S2K parameters and
//! keys per protection [`Layer`]. A protected key file is decoded by running
//! a second engine over it with [`StaticKeys`].
//!
//! ## Order of operations
//!
//! Encoding: literal packet, compression, key-file layer, passphrase
//! layer, container framing. Decoding runs the same steps backwards and
//! returns no plaintext unless every integrity check passed.

pub mod container;
pub mod message;

use rand::{CryptoRng, RngCore};

use crate::algorithm::{Compression, HashAlgo};
use crate::cipher::{KeyCheck, S2kParameters};
use crate::config::{KEY_CHECK_SIZE, MAX_KEY_SIZE, SALT_SIZE};
use crate::engine::container::{NativeHeader, open_native, seal_native};
use crate::engine::message::{Envelope, literal_stream, parse_envelope, read_literal_stream, seal};
use crate::error::{Error, Result};
use crate::packet::armor;
use crate::packet::seipd::Opened;
use crate::policy::Policy;
use crate::secret::{Secret, SecretBytes};
use crate::types::{ContainerFormat, FileProtectionConfig, KeyFileRef, KeySource};

/// One encryption layer of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Passphrase,
    KeyFile,
}

impl Layer {
    /// Error reported when this layer rejects the supplied secret.
    pub const fn mismatch(self) -> Error {
        match self {
            Self::Passphrase => Error::InvalidPassphrase,
            Self::KeyFile => Error::EncryptionKeyInvalid,
        }
    }
}

/// Source of layer keys.
///
/// Keys are returned at [`MAX_KEY_SIZE`] bytes; the engine truncates them to
/// the cipher's key size, which S2K output allows.
pub trait KeyResolver {
    /// Fresh S2K parameters and the key derived with them.
    fn encryption_key<G: RngCore + CryptoRng>(&mut self, layer: Layer, hash: HashAlgo, iterations: u32, rng: &mut G) -> Result<(S2kParameters, SecretBytes)>;

    /// Key for parameters read from a container.
    fn decryption_key(&mut self, layer: Layer, params: &S2kParameters) -> Result<SecretBytes>;

    /// Which secret keys a standards message, which does not record it.
    fn standards_layer(&self) -> Layer {
        Layer::Passphrase
    }

    /// Reference reported for a key-file layer in decoded configurations.
    fn key_file(&self) -> Option<KeyFileRef> {
        None
    }
}

/// Resolver over secrets already in memory. Derives every key directly.
#[derive(Debug, Clone, Default)]
pub struct StaticKeys {
    passphrase: Option<Secret>,
    key_material: Option<SecretBytes>,
}

impl StaticKeys {
    pub fn new(passphrase: Option<Secret>, key_material: Option<SecretBytes>) -> Self {
        Self { passphrase, key_material }
    }

    pub fn passphrase(passphrase: Secret) -> Self {
        Self::new(Some(passphrase), None)
    }

    pub fn key_file(key_material: SecretBytes) -> Self {
        Self::new(None, Some(key_material))
    }

    fn material(&self, layer: Layer) -> Result<&[u8]> {
        match layer {
            Layer::Passphrase => self.passphrase.as_ref().map(|p| p.expose_secret().as_bytes()).ok_or(Error::InvalidPassphrase),
            Layer::KeyFile => self.key_material.as_ref().map(SecretBytes::expose_secret).ok_or(Error::EncryptionKeyInvalid),
        }
    }
}

impl KeyResolver for StaticKeys {
    fn encryption_key<G: RngCore + CryptoRng>(&mut self, layer: Layer, hash: HashAlgo, iterations: u32, rng: &mut G) -> Result<(S2kParameters, SecretBytes)> {
        let mut salt = [0u8; SALT_SIZE];
        rng.fill_bytes(&mut salt);
        let params = S2kParameters::new(hash, salt, iterations);
        let key = params.derive(self.material(layer)?, MAX_KEY_SIZE);
        Ok((params, key))
    }

    fn decryption_key(&mut self, layer: Layer, params: &S2kParameters) -> Result<SecretBytes> {
        Ok(params.derive(self.material(layer)?, MAX_KEY_SIZE))
    }

    fn standards_layer(&self) -> Layer {
        if self.passphrase.is_none() && self.key_material.is_some() { Layer::KeyFile } else { Layer::Passphrase }
    }

    fn key_file(&self) -> Option<KeyFileRef> {
        self.key_material.clone().map(KeyFileRef::inline)
    }
}

/// Output of [`Engine::encode`].
#[derive(Debug)]
pub struct Encoded {
    pub bytes: Vec<u8>,

    /// The configuration actually applied: effective iteration count and
    /// the outermost layer's salt.
    pub config: FileProtectionConfig,
}

/// Output of [`Engine::decode`].
#[derive(Debug)]
pub struct Decoded {
    pub plaintext: Vec<u8>,
    pub config: FileProtectionConfig,
    pub format: ContainerFormat,
}

pub struct Engine<K> {
    resolver: K,
}

impl<K: KeyResolver> Engine<K> {
    pub const fn new(resolver: K) -> Self {
        Self { resolver }
    }

    pub fn into_resolver(self) -> K {
        self.resolver
    }

    pub fn encode<G: RngCore + CryptoRng>(&mut self, plaintext: &[u8], config: &FileProtectionConfig, format: ContainerFormat, rng: &mut G) -> Result<Encoded> {
        let mut config = Policy::evaluate(config, format)?.config;

        let bytes = match format {
            ContainerFormat::Plain => plaintext.to_vec(),
            ContainerFormat::Standards { armor } => {
                let stream = literal_stream(plaintext, config.compression)?;
                let message = if config.has_passphrase {
                    self.seal_layer(Layer::Passphrase, &stream, &mut config, rng)?
                } else if config.has_key_file() {
                    self.seal_layer(Layer::KeyFile, &stream, &mut config, rng)?
                } else {
                    stream
                };

                if armor { armor::encode(&message).into_bytes() } else { message }
            }
            ContainerFormat::Native => {
                let mut body = literal_stream(plaintext, config.compression)?;

                // Each layer seals a literal packet holding the next layer down.
                for (present, layer) in [(config.has_key_file(), Layer::KeyFile), (config.has_passphrase, Layer::Passphrase)] {
                    if present {
                        let wrapped = literal_stream(&body, Compression::None)?;
                        body = self.checked_layer(layer, &wrapped, &mut config, rng)?;
                    }
                }

                let key_path = if config.persistent_key_path { config.key_file.as_ref().and_then(|key| key.source.persisted_location()) } else { None };
                let header = NativeHeader { passphrase: config.has_passphrase, key_file: config.has_key_file(), key_path };

                let mut out = Vec::with_capacity(body.len() + 64);
                header.write(&mut out)?;
                out.extend_from_slice(&body);
                seal_native(&mut out);
                out
            }
        };

        tracing::debug!(%format, mode = %config.mode(), cipher = %config.cipher, size = bytes.len(), "document encoded");
        Ok(Encoded { bytes, config })
    }

    pub fn decode(&mut self, data: &[u8], fallback: ContainerFormat) -> Result<Decoded> {
        if data.is_empty() {
            return Ok(Decoded { plaintext: Vec::new(), config: FileProtectionConfig::new(), format: fallback });
        }

        let format = container::detect(data, fallback);
        let mut config = FileProtectionConfig::new();

        let plaintext = match format {
            ContainerFormat::Plain => data.to_vec(),
            ContainerFormat::Standards { armor } => {
                let message = if armor { armor::decode(data)? } else { data.to_vec() };
                let layer = self.resolver.standards_layer();
                let (plaintext, compression) = self.open_layer(layer, &message, None, &mut config)?;
                config.compression = compression;
                plaintext
            }
            ContainerFormat::Native => {
                let content = open_native(data)?;
                let (header, offset) = NativeHeader::read(content)?;
                let mut body = content[offset..].to_vec();

                let layers = [(header.passphrase, Layer::Passphrase), (header.key_file, Layer::KeyFile)];
                for (_, layer) in layers.into_iter().filter(|(present, _)| *present) {
                    let (check, message) = body.split_at_checked(KEY_CHECK_SIZE).ok_or_else(|| Error::corrupted("truncated key check"))?;
                    let (inner, _) = self.open_layer(layer, message, Some(check), &mut config)?;
                    body = inner;
                }

                let (plaintext, compression) = read_literal_stream(&body)?;
                config.compression = compression;
                config.persistent_key_path = header.key_path.is_some();

                if let Some(path) = header.key_path {
                    // The persisted location wins over however the resolver found the key.
                    let protection = config.key_file.take().and_then(|key| key.protection);
                    config.key_file = Some(KeyFileRef { source: KeySource::parse(&path), protection });
                }
                plaintext
            }
        };

        tracing::debug!(%format, mode = %config.mode(), size = plaintext.len(), "document decoded");
        Ok(Decoded { plaintext, config, format })
    }

    fn seal_layer<G: RngCore + CryptoRng>(&mut self, layer: Layer, inner: &[u8], config: &mut FileProtectionConfig, rng: &mut G) -> Result<Vec<u8>> {
        let (params, key) = self.layer_key(layer, config, rng)?;
        seal(inner, config.cipher, &params, &key, rng)
    }

    /// Native layer: key check followed by the sealed message.
    fn checked_layer<G: RngCore + CryptoRng>(&mut self, layer: Layer, inner: &[u8], config: &mut FileProtectionConfig, rng: &mut G) -> Result<Vec<u8>> {
        let (params, key) = self.layer_key(layer, config, rng)?;
        let check = KeyCheck::compute(key.expose_secret(), &params.salt)?;

        let mut out = check.to_vec();
        out.extend(seal(inner, config.cipher, &params, &key, rng)?);
        Ok(out)
    }

    fn layer_key<G: RngCore + CryptoRng>(&mut self, layer: Layer, config: &mut FileProtectionConfig, rng: &mut G) -> Result<(S2kParameters, SecretBytes)> {
        let (params, key) = self.resolver.encryption_key(layer, config.hash, config.iterations, rng)?;
        config.iterations = params.iterations;
        config.salt = params.salt.to_vec();
        Ok((params, key.prefix(config.cipher.key_size())))
    }

    /// Opens one layer, returning the document bytes (or the next layer)
    /// and the compression found around them. Layer properties are recorded
    /// in `config`; the last layer opened wins except for the salt, which
    /// stays the outermost one.
    fn open_layer(&mut self, layer: Layer, message: &[u8], check: Option<&[u8]>, config: &mut FileProtectionConfig) -> Result<(Vec<u8>, Compression)> {
        let (session, data) = match parse_envelope(message)? {
            Envelope::Open(stream) if check.is_none() => return read_literal_stream(&stream),
            Envelope::Open(_) => return Err(Error::corrupted("native layer without encryption")),
            Envelope::Sealed { session, data } => (session, data),
        };

        let key = self.resolver.decryption_key(layer, &session.s2k)?.prefix(session.cipher.key_size());

        if let Some(check) = check {
            if !KeyCheck::verify(key.expose_secret(), &session.s2k.salt, check)? {
                tracing::debug!(?layer, "key check rejected the secret");
                return Err(layer.mismatch());
            }
        }

        let (cipher, opened) = message::open(&session, &data, &key)?;
        let stream = match opened {
            Opened::Plaintext(stream) => stream,
            // Past a matching key check the key is right, so the prefix itself is damaged.
            Opened::WrongKey if check.is_some() => return Err(Error::corrupted("quick check failed after key check")),
            Opened::WrongKey => return Err(layer.mismatch()),
        };

        if config.salt.is_empty() {
            config.salt = session.s2k.salt.to_vec();
            config.hash = session.s2k.hash;
            // Simple and salted specifiers carry no count; the default applies to the next save.
            if session.s2k.iterations > 0 {
                config.iterations = session.s2k.iterations;
            }
        }
        config.cipher = cipher;
        match layer {
            Layer::Passphrase => config.has_passphrase = true,
            Layer::KeyFile => config.key_file = self.resolver.key_file().or_else(|| config.key_file.take()),
        }

        read_literal_stream(&stream)
    }
}
