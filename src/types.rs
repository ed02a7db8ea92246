//! Common type definitions.
//!
//! - [`ContainerFormat`]: which on-disk layout a document uses
//! - [`ProtectionMode`]: which protections a configuration combines
//! - [`FileProtectionConfig`]: the per-document protection state
//! - [`KeyFileRef`]: where the key file lives and how it is protected

use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use crate::algorithm::{CipherAlgo, Compression, HashAlgo};
use crate::config::{ARMOR_EXTENSION, NATIVE_EXTENSION, STANDARDS_EXTENSION, Settings};
use crate::secret::SecretBytes;

/// On-disk layout of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// Raw bytes, no protection possible.
    Plain,

    /// Superset format: dual protection and persisted key paths.
    Native,

    /// Interoperable message, optionally ASCII-armored.
    Standards { armor: bool },
}

impl ContainerFormat {
    /// Chooses the format from the file extension.
    pub fn from_path(path: &Path) -> Self {
        let extension = path.extension().map(|ext| ext.to_string_lossy().to_ascii_lowercase());
        match extension.as_deref() {
            Some(NATIVE_EXTENSION) => Self::Native,
            Some(STANDARDS_EXTENSION) => Self::Standards { armor: false },
            Some(ARMOR_EXTENSION) => Self::Standards { armor: true },
            _ => Self::Plain,
        }
    }

    /// Whether documents in this format are expected to be encrypted.
    #[inline]
    pub const fn is_encrypted(self) -> bool {
        !matches!(self, Self::Plain)
    }

    #[inline]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Plain => "Plain",
            Self::Native => "Native",
            Self::Standards { armor: false } => "Standards",
            Self::Standards { armor: true } => "Standards (armored)",
        }
    }
}

impl Display for ContainerFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Combination of protections applied to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionMode {
    Unprotected,
    PassphraseOnly,
    KeyFileOnly,
    Both,
}

impl ProtectionMode {
    #[inline]
    pub const fn from_flags(passphrase: bool, key_file: bool) -> Self {
        match (passphrase, key_file) {
            (false, false) => Self::Unprotected,
            (true, false) => Self::PassphraseOnly,
            (false, true) => Self::KeyFileOnly,
            (true, true) => Self::Both,
        }
    }

    #[inline]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unprotected => "Not protected",
            Self::PassphraseOnly => "Passphrase protected",
            Self::KeyFileOnly => "Key protected",
            Self::Both => "Passphrase and key protected",
        }
    }
}

impl Display for ProtectionMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Where the key file comes from.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Key-file content held in memory.
    Inline(SecretBytes),

    /// A local path, or a bare name looked up in the key repository.
    Local(PathBuf),

    /// A URI handed to the fetch tool.
    Remote(String),
}

impl KeySource {
    /// Classifies a user-entered key location.
    pub fn parse(location: &str) -> Self {
        if location.contains("://") { Self::Remote(location.to_owned()) } else { Self::Local(PathBuf::from(location)) }
    }

    /// Text persisted in a native header; `None` for inline keys.
    pub fn persisted_location(&self) -> Option<String> {
        match self {
            Self::Inline(_) => None,
            Self::Local(path) => Some(path.to_string_lossy().into_owned()),
            Self::Remote(uri) => Some(uri.clone()),
        }
    }
}

/// Reference to a key file, owned by the configuration that uses it.
#[derive(Debug, Clone)]
pub struct KeyFileRef {
    pub source: KeySource,

    /// The key file's own protection, once known. Filled in when a
    /// protected key file is decrypted or generated.
    pub protection: Option<Box<FileProtectionConfig>>,
}

impl KeyFileRef {
    pub fn new(source: KeySource) -> Self {
        Self { source, protection: None }
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::new(KeySource::Local(path.into()))
    }

    pub fn inline(content: SecretBytes) -> Self {
        Self::new(KeySource::Inline(content))
    }
}

/// Protection state of one document.
///
/// Passed into and returned from every load and save; there is no ambient
/// "current document" state anywhere in the crate.
#[derive(Debug, Clone)]
pub struct FileProtectionConfig {
    pub cipher: CipherAlgo,
    pub hash: HashAlgo,
    pub compression: Compression,

    /// Bytes hashed by the S2K. Rounded up to a representable count on save.
    pub iterations: u32,

    /// Salt of the outermost layer from the last load or save; empty before
    /// the first one.
    pub salt: Vec<u8>,

    pub has_passphrase: bool,
    pub key_file: Option<KeyFileRef>,

    /// Record the key-file location inside the container (native only).
    pub persistent_key_path: bool,
}

impl FileProtectionConfig {
    /// New unprotected configuration with the default algorithms.
    pub fn new() -> Self {
        Self::from_settings(&Settings::default())
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            cipher: settings.default_cipher,
            hash: settings.default_hash,
            compression: settings.default_compression,
            iterations: settings.default_iterations,
            salt: Vec::new(),
            has_passphrase: false,
            key_file: None,
            persistent_key_path: false,
        }
    }

    #[must_use]
    pub fn with_passphrase(mut self) -> Self {
        self.has_passphrase = true;
        self
    }

    #[must_use]
    pub fn with_key_file(mut self, key_file: KeyFileRef) -> Self {
        self.key_file = Some(key_file);
        self
    }

    #[inline]
    pub fn has_key_file(&self) -> bool {
        self.key_file.is_some()
    }

    #[inline]
    pub fn mode(&self) -> ProtectionMode {
        ProtectionMode::from_flags(self.has_passphrase, self.has_key_file())
    }
}

impl Default for FileProtectionConfig {
    fn default() -> Self {
        Self::new()
    }
}
