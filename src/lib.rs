//! SealPad - passphrase and key-file protected documents.
//!
//! A document protection core for text editors:
//! - RFC 4880 symmetric messages (`.gpg`, `.asc`) for interoperability
//! - A native container (`.epd`) adding dual protection and persisted key paths
//! - Iterated and salted S2K with a cache of pre-derived keys
//! - Key files, optionally passphrase protected or fetched from remote locations
//! - Atomic saves with backups and external modification detection
//! - A passphrase candidate generator

pub mod algorithm;
pub mod cipher;
pub mod compression;
pub mod config;
pub mod engine;
pub mod error;
pub mod file;
pub mod handler;
pub mod keys;
pub mod packet;
pub mod passgen;
pub mod policy;
pub mod prompt;
pub mod secret;
pub mod types;

pub use error::{Error, Result};
pub use handler::{Credentials, LoadOptions, LoadSaveHandler, LoadedDocument, ModificationCheck, SaveOutcome};
pub use types::{ContainerFormat, FileProtectionConfig, KeyFileRef, KeySource, ProtectionMode};
