//! # Protection Policy
//!
//! Validates a requested protection against what the output format can
//! express, before any key is derived or any byte is written.
//!
//! | Format    | Encryption | Passphrase + key file | Persistent key path |
//! |-----------|------------|-----------------------|---------------------|
//! | Plain     | no         | no                    | no                  |
//! | Native    | yes        | yes                   | yes                 |
//! | Standards | yes        | no                    | no                  |
//!
//! A zero iteration count is refused first. The remaining guards run in a
//! fixed order: persistent key path, dual protection, then the
//! unencrypted-output flag.

use crate::error::{Error, Result};
use crate::types::{ContainerFormat, FileProtectionConfig, KeyFileRef, KeySource};

/// What a container format can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub encryption: bool,
    pub dual_protection: bool,
    pub persistent_key_path: bool,
}

pub const fn capabilities(format: ContainerFormat) -> Capabilities {
    match format {
        ContainerFormat::Plain => Capabilities { encryption: false, dual_protection: false, persistent_key_path: false },
        ContainerFormat::Native => Capabilities { encryption: true, dual_protection: true, persistent_key_path: true },
        ContainerFormat::Standards { .. } => Capabilities { encryption: true, dual_protection: false, persistent_key_path: false },
    }
}

/// Accepted protection request.
#[derive(Debug, Clone)]
pub struct PolicyOutcome {
    /// The configuration that will actually be applied.
    pub config: FileProtectionConfig,

    /// Nothing will be encrypted; the caller should warn before writing.
    pub unencrypted: bool,
}

pub struct Policy;

impl Policy {
    pub fn evaluate(config: &FileProtectionConfig, format: ContainerFormat) -> Result<PolicyOutcome> {
        let caps = capabilities(format);

        if !caps.encryption {
            let mut config = config.clone();
            config.has_passphrase = false;
            config.key_file = None;
            config.persistent_key_path = false;
            tracing::debug!(%format, "format cannot carry protection");
            return Ok(PolicyOutcome { config, unencrypted: true });
        }

        if config.iterations == 0 {
            return Err(Error::InvalidParameter("iteration count must be positive".to_owned()));
        }

        if config.persistent_key_path && !caps.persistent_key_path {
            return Err(Error::FormatDoesNotSupportPersistentKeyPath);
        }

        if config.has_passphrase && config.has_key_file() && !caps.dual_protection {
            return Err(Error::FormatDoesNotSupportDualProtection);
        }

        if config.persistent_key_path {
            let persistable = config.key_file.as_ref().is_some_and(|key| !matches!(key.source, KeySource::Inline(_)));
            if !persistable {
                return Err(Error::InvalidParameter("a persistent key path needs a key file location".to_owned()));
            }
        }

        let unencrypted = !config.has_passphrase && !config.has_key_file();
        tracing::debug!(%format, mode = %config.mode(), unencrypted, "protection accepted");

        Ok(PolicyOutcome { config: config.clone(), unencrypted })
    }

    /// Fallback for [`Error::FormatDoesNotSupportPersistentKeyPath`]: the same
    /// protection with the key path kept out of the container.
    pub fn degrade(config: &FileProtectionConfig) -> FileProtectionConfig {
        let mut degraded = config.clone();
        degraded.persistent_key_path = false;
        degraded
    }

    /// Binds a freshly generated key file to the document if `confirm`
    /// accepts it. Returns whether the configuration changed.
    pub fn bind_generated_key(config: &mut FileProtectionConfig, key: KeyFileRef, confirm: impl FnOnce(&KeyFileRef) -> bool) -> bool {
        if !confirm(&key) {
            tracing::debug!("generated key not bound to the document");
            return false;
        }

        config.key_file = Some(key);
        true
    }
}
