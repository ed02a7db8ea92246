//! Key files: generation, storage and resolution.
//!
//! A key file holds base64 text of random bytes. The text itself (trimmed)
//! is the key material fed to the S2K. A key file may be protected with a
//! passphrase, in which case it is stored as an armored standards message
//! that wraps the same text.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::algorithm::Compression;
use crate::config::{ARMOR_BEGIN, Settings};
use crate::engine::{Engine, StaticKeys};
use crate::error::{Error, Result};
use crate::keys::fetch::FetchTool;
use crate::secret::{Secret, SecretBytes};
use crate::types::{ContainerFormat, FileProtectionConfig, KeyFileRef, KeySource};

/// Decrypted key-file content, ready for the S2K.
#[derive(Debug, Clone)]
pub struct ResolvedKey {
    pub material: SecretBytes,

    /// How the key file itself is protected, if it is.
    pub protection: Option<FileProtectionConfig>,
}

/// Loads, fetches and creates key files.
#[derive(Debug, Clone)]
pub struct KeyFileProvider {
    repository: Option<PathBuf>,
    fetch: FetchTool,
    protection: FileProtectionConfig,
    length: usize,
}

impl KeyFileProvider {
    pub fn new(settings: &Settings) -> Self {
        let mut protection = FileProtectionConfig::from_settings(settings);
        protection.cipher = settings.key_file_cipher;
        protection.hash = settings.key_file_hash;
        protection.iterations = settings.key_file_iterations;
        protection.compression = Compression::None;

        Self {
            repository: settings.key_repository.clone(),
            fetch: FetchTool::new(settings.fetch_tool.clone(), settings.fetch_parameters.clone(), settings.fetch_timeout),
            protection,
            length: settings.key_file_length,
        }
    }

    /// Random sequence length used by [`Self::create`].
    pub const fn length(&self) -> usize {
        self.length
    }

    /// Where a local key reference points. Bare file names live in the
    /// key repository.
    pub fn locate(&self, path: &Path) -> PathBuf {
        let bare = path.components().count() == 1 && path.parent().is_none_or(|parent| parent.as_os_str().is_empty());
        match &self.repository {
            Some(repository) if bare && !path.is_absolute() => repository.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Raw key-file bytes from wherever the source points.
    pub async fn read(&self, source: &KeySource) -> Result<Vec<u8>> {
        match source {
            KeySource::Inline(content) => Ok(content.expose_secret().to_vec()),
            KeySource::Remote(uri) => self.fetch.fetch(uri).await,
            KeySource::Local(path) => {
                let located = self.locate(path);
                tracing::debug!(path = %located.display(), "reading key file");
                tokio::fs::read(&located).await.map_err(|e| {
                    let reason = if e.kind() == ErrorKind::NotFound { "file not found".to_owned() } else { e.to_string() };
                    Error::CannotOpenEncryptionKey { path: located, reason }
                })
            }
        }
    }

    /// Reads the key file and, if it is protected, decrypts it with a
    /// passphrase obtained from `ask`. `ask` returning `None` cancels.
    pub async fn resolve<F>(&self, key: &KeyFileRef, ask: F) -> Result<ResolvedKey>
    where
        F: FnOnce(&KeySource) -> Option<Secret>,
    {
        let content = Zeroizing::new(self.read(&key.source).await?);
        Self::from_content(&content, &key.source, ask)
    }

    /// Turns raw key-file bytes into key material.
    pub fn from_content<F>(content: &[u8], source: &KeySource, ask: F) -> Result<ResolvedKey>
    where
        F: FnOnce(&KeySource) -> Option<Secret>,
    {
        let (text, protection) = if content.trim_ascii_start().starts_with(ARMOR_BEGIN.as_bytes()) {
            let passphrase = ask(source).ok_or(Error::JobCancelled)?;
            let decoded = Engine::new(StaticKeys::passphrase(passphrase)).decode(content, ContainerFormat::Standards { armor: true }).map_err(|e| match e {
                Error::InvalidPassphrase => Error::InvalidPassphraseForKeyFile,
                other => other,
            })?;
            (Zeroizing::new(decoded.plaintext), Some(decoded.config))
        } else {
            (Zeroizing::new(content.to_vec()), None)
        };

        let material = validate(&text)?;
        tracing::debug!(protected = protection.is_some(), size = material.len(), "key file resolved");
        Ok(ResolvedKey { material, protection })
    }

    /// Generates `length` random bytes as base64 text.
    pub fn generate<G: RngCore + CryptoRng>(length: usize, rng: &mut G) -> Result<SecretBytes> {
        if length == 0 {
            return Err(Error::InvalidParameter("key length must be positive".to_owned()));
        }

        let mut random = Zeroizing::new(vec![0u8; length]);
        rng.fill_bytes(&mut random);
        Ok(SecretBytes::from_vec(STANDARD.encode(&*random).into_bytes()))
    }

    /// Generates a key file at `path`, protected by `passphrase` unless it
    /// is blank. The file is readable by its owner only.
    pub async fn create<G: RngCore + CryptoRng>(&self, path: &Path, length: usize, passphrase: Option<&Secret>, rng: &mut G) -> Result<KeyFileRef> {
        let material = Self::generate(length, rng)?;
        let passphrase = passphrase.filter(|p| !p.is_empty());

        let (content, protection) = match passphrase {
            Some(passphrase) => {
                let config = self.protection.clone().with_passphrase();
                let encoded = Engine::new(StaticKeys::passphrase(passphrase.clone())).encode(material.expose_secret(), &config, ContainerFormat::Standards { armor: true }, rng)?;
                (encoded.bytes, Some(Box::new(encoded.config)))
            }
            None => (material.expose_secret().to_vec(), None),
        };

        let target = self.locate(path);
        write_private(&target, &content).await.map_err(|source| Error::CannotGenerateKey { path: target.clone(), source })?;
        tracing::info!(path = %target.display(), length, protected = protection.is_some(), "key file generated");

        Ok(KeyFileRef { source: KeySource::Local(path.to_path_buf()), protection })
    }
}

fn validate(text: &[u8]) -> Result<SecretBytes> {
    let trimmed = text.trim_ascii();
    if trimmed.is_empty() {
        return Err(Error::EncryptionKeyInvalid);
    }

    let compact: Zeroizing<Vec<u8>> = Zeroizing::new(trimmed.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect());
    let decoded = Zeroizing::new(STANDARD.decode(&*compact).map_err(|_| Error::EncryptionKeyInvalid)?);
    if decoded.is_empty() {
        return Err(Error::EncryptionKeyInvalid);
    }

    Ok(SecretBytes::new(trimmed))
}

async fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    tokio::io::AsyncWriteExt::write_all(&mut file, content).await?;
    file.sync_all().await
}
