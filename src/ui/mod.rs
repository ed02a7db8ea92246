//! User interface components for terminal interaction.
//!
//! - [`display`]: property tables, candidate lists, status lines
//! - [`prompt`]: passphrase and confirmation dialogs

pub mod display;
pub mod prompt;
