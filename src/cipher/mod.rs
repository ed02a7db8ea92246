//! # Cryptographic Primitives
//!
//! Building blocks of the protection engine:
//! - **CFB**: OpenPGP cipher feedback mode over the registered block ciphers
//! - **S2K**: string-to-key derivation (simple, salted, iterated and salted)
//! - **Hash**: digest dispatch and the modification detection code
//! - **Key check**: HMAC-SHA-256 verifier stored in native containers
//!
//! Every comparison against a stored value (key check, MDC, passphrase
//! confirmation) is done in constant time.

mod cfb;
mod hash;
mod mac;
mod s2k;

pub use cfb::Cfb;
pub use hash::{Hasher, MDC_SIZE, mdc, verify_mdc};
pub use mac::KeyCheck;
pub use s2k::{S2kParameters, decode_count, derive, derive_by_id, encode_count};
