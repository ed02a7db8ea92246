//! Interaction points the load/save handler suspends on.
//!
//! The handler never talks to a terminal or a window. Everything it needs
//! from the user goes through a [`Prompt`]; refusing any request cancels
//! the job.

use crate::secret::Secret;
use crate::types::KeySource;

/// Which passphrase is being asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassphraseRequest {
    /// Opening a protected document.
    Document,
    /// Setting the passphrase of a document being saved.
    NewDocument,
    /// Repeating it for confirmation.
    ConfirmDocument,
    /// Unlocking a protected key file.
    KeyFile { location: String },
}

/// Yes/no decisions the handler cannot make alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// The target format cannot persist the key path; save without it?
    DisablePersistentKeyPath,
    /// Nothing will be encrypted; write anyway?
    SaveUnencrypted,
}

pub trait Prompt {
    /// `None` cancels the job.
    fn passphrase(&self, request: PassphraseRequest) -> Option<Secret>;

    /// Location of the key file for a document that needs one but does not
    /// record where it is. `None` cancels the job.
    fn key_location(&self) -> Option<String>;

    fn confirm(&self, confirmation: Confirmation) -> bool;
}

impl PassphraseRequest {
    pub fn key_file(source: &KeySource) -> Self {
        let location = source.persisted_location().unwrap_or_else(|| "inline key".to_owned());
        Self::KeyFile { location }
    }
}
