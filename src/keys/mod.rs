//! # Key Material
//!
//! - [`KeyService`]: passphrase-derived keys kept ready for saving
//! - [`KeyFileProvider`]: key-file generation, loading and unwrapping
//! - [`FetchTool`]: remote key retrieval through an external command

pub mod fetch;
pub mod keyfile;
pub mod service;

pub use fetch::FetchTool;
pub use keyfile::{KeyFileProvider, ResolvedKey};
pub use service::KeyService;
