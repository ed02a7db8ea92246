//! Terminal prompts.
//!
//! Implements the library's [`Prompt`] with inquire. Escape or Ctrl-C at
//! any prompt cancels the job.

use std::path::Path;

use inquire::{Confirm, InquireError, Password, PasswordDisplayMode, Text};
use sealpad::prompt::{Confirmation, PassphraseRequest, Prompt};
use sealpad::secret::Secret;

/// Prompt answering from command-line flags first, then from the terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompt {
    passphrase: Option<Secret>,
    key_passphrase: Option<Secret>,
    key_location: Option<String>,
    assume_yes: bool,
}

impl TerminalPrompt {
    pub fn new(passphrase: Option<String>, key_passphrase: Option<String>, assume_yes: bool) -> Self {
        Self { passphrase: passphrase.map(Secret::from_string), key_passphrase: key_passphrase.map(Secret::from_string), key_location: None, assume_yes }
    }

    pub fn with_key_location(mut self, location: Option<String>) -> Self {
        self.key_location = location;
        self
    }

    /// Passphrase protecting a new key file. Blank means unprotected.
    pub fn new_key_file_passphrase(&self) -> Option<Secret> {
        if let Some(passphrase) = &self.key_passphrase {
            return Some(passphrase.clone());
        }

        let passphrase = ask_secret("Passphrase for the key file (empty for none):")?;
        if passphrase.is_empty() {
            return Some(passphrase);
        }
        let confirmation = ask_secret("Confirm key file passphrase:")?;
        if passphrase.matches(&confirmation) {
            Some(passphrase)
        } else {
            eprintln!("{}", console::style("Passphrases do not match").red());
            None
        }
    }

    pub fn confirm_overwrite(&self, path: &Path) -> bool {
        let filename = path.file_name().map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
        self.assume_yes || ask_confirm(&format!("{filename} already exists. Overwrite?"))
    }
}

impl Prompt for TerminalPrompt {
    fn passphrase(&self, request: PassphraseRequest) -> Option<Secret> {
        let preset = match request {
            PassphraseRequest::KeyFile { .. } => &self.key_passphrase,
            _ => &self.passphrase,
        };
        if let Some(passphrase) = preset {
            return Some(passphrase.clone());
        }

        let message = match request {
            PassphraseRequest::Document => "Passphrase:".to_owned(),
            PassphraseRequest::NewDocument => "New passphrase (empty for none):".to_owned(),
            PassphraseRequest::ConfirmDocument => "Confirm passphrase:".to_owned(),
            PassphraseRequest::KeyFile { location } => format!("Passphrase for key file {location}:"),
        };
        ask_secret(&message)
    }

    fn key_location(&self) -> Option<String> {
        self.key_location.clone().or_else(|| answer(Text::new("Key file location:").prompt()))
    }

    fn confirm(&self, confirmation: Confirmation) -> bool {
        if self.assume_yes {
            return true;
        }

        let message = match confirmation {
            Confirmation::DisablePersistentKeyPath => "This format cannot store the key file location. Save without it?",
            Confirmation::SaveUnencrypted => "The file will be saved without encryption. Continue?",
        };
        ask_confirm(message)
    }
}

fn ask_secret(message: &str) -> Option<Secret> {
    answer(Password::new(message).without_confirmation().with_display_mode(PasswordDisplayMode::Masked).prompt()).map(Secret::from_string)
}

fn ask_confirm(message: &str) -> bool {
    answer(Confirm::new(message).with_default(false).prompt()).unwrap_or(false)
}

fn answer<T>(result: Result<T, InquireError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => None,
        Err(e) => {
            tracing::warn!(error = %e, "prompt failed");
            None
        }
    }
}
