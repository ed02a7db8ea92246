//! # Error Types
//!
//! Every public operation of the library returns [`Result<T>`](Result) with
//! one of the kinds below. The binary wraps them into `anyhow` context.

use std::path::PathBuf;

use thiserror::Error;

/// Which registry rejected an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum AlgorithmKind {
    #[strum(to_string = "cipher")]
    Cipher,
    #[strum(to_string = "hash")]
    Hash,
    #[strum(to_string = "compression")]
    Compression,
    #[strum(to_string = "s2k specifier")]
    S2k,
    #[strum(to_string = "packet")]
    Packet,
}

#[derive(Error, Debug)]
pub enum Error {
    /// The document to load is not present.
    #[error("cannot open the file because it does not exist: {}", .0.display())]
    FileDoesNotExist(PathBuf),

    /// The document exists but reading it failed.
    #[error("cannot load {}: {source}", path.display())]
    CannotLoadFile { path: PathBuf, source: std::io::Error },

    /// The key file could not be read.
    #[error("cannot open the encryption key {}: {reason}", path.display())]
    CannotOpenEncryptionKey { path: PathBuf, reason: String },

    /// The key file was read but is not a usable key, or a key-file layer
    /// did not accept it.
    #[error("the encryption key is invalid")]
    EncryptionKeyInvalid,

    /// The fetch tool for a remote key reference is not installed.
    #[error("cannot download the encryption key: {} is not found", .0.display())]
    FetchToolNotFound(PathBuf),

    /// The fetch tool ran and reported failure.
    #[error("cannot download the key: fetch tool returned exit code {code:?}")]
    FetchNonZeroExit { code: Option<i32> },

    /// The fetch tool did not finish within the caller's timeout and was killed.
    #[error("cannot download the key: fetch tool timed out")]
    FetchTimedOut,

    /// The passphrase protecting a key file is wrong.
    #[error("invalid passphrase for key file")]
    InvalidPassphraseForKeyFile,

    /// The passphrase protecting the document is wrong.
    #[error("invalid passphrase")]
    InvalidPassphrase,

    /// Passphrase and confirmation differ.
    #[error("the confirmation passphrase does not match")]
    ConfirmationPassphraseMismatch,

    #[error("the standards format does not support a persistent key path")]
    FormatDoesNotSupportPersistentKeyPath,

    #[error("the standards format does not support double protection by passphrase and key file")]
    FormatDoesNotSupportDualProtection,

    /// Container damaged, truncated or tampered with.
    #[error("integrity check failed")]
    IntegrityCheckFailed,

    /// An identifier in the container is not in the registry.
    #[error("unsupported {kind} algorithm id {id}")]
    UnsupportedAlgorithm { kind: AlgorithmKind, id: u8 },

    /// The file changed on disk since it was loaded.
    #[error("the file has been modified by another program")]
    ExternalModificationDetected,

    #[error("cannot create backup file {}: {source}", path.display())]
    CannotCreateBackupFile { path: PathBuf, source: std::io::Error },

    #[error("cannot save {}: {source}", path.display())]
    CannotSaveFile { path: PathBuf, source: std::io::Error },

    #[error("cannot generate the key {}: {source}", path.display())]
    CannotGenerateKey { path: PathBuf, source: std::io::Error },

    /// The user aborted at a prompt or confirmation.
    #[error("the job has been cancelled")]
    JobCancelled,

    /// The alphabet for passphrase generation is empty.
    #[error("no character class selected and no custom symbols supplied")]
    AlphabetEmpty,

    #[error("passphrase generation request cannot be satisfied: {0}")]
    InvalidGenerationSpec(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl Error {
    /// Shorthand used by the decoders for any structural damage.
    pub(crate) fn corrupted(reason: &str) -> Self {
        tracing::debug!(reason, "container rejected");
        Self::IntegrityCheckFailed
    }

    /// Shorthand for identifiers missing from a registry.
    pub(crate) const fn unsupported(kind: AlgorithmKind, id: u8) -> Self {
        Self::UnsupportedAlgorithm { kind, id }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, Error>;
