//! Global Configuration Constants
//!
//! Defaults for every tunable used by the protection engine, the key-file
//! provider, the load/save handler and the passphrase generator, plus the
//! [`Settings`] value that carries the runtime preferences a caller may
//! override.
//!
//! ## Format Constants
//!
//! Numeric identifiers written into containers live in [`crate::algorithm`];
//! this module only holds sizes, defaults and file-name conventions.

use std::path::PathBuf;
use std::time::Duration;

use crate::algorithm::{CipherAlgo, Compression, HashAlgo};

/// Application name used in user interfaces.
pub const APP_NAME: &str = "SealPad";

/// Extension of the native (superset) container format.
pub const NATIVE_EXTENSION: &str = "epd";

/// Extension of the binary standards-format message.
pub const STANDARDS_EXTENSION: &str = "gpg";

/// Extension of the ASCII-armored standards-format message.
pub const ARMOR_EXTENSION: &str = "asc";

/// Suffix appended to a file name to form its backup copy.
pub const BACKUP_SUFFIX: &str = ".bak";

// === Native Container Layout ===

/// Magic bytes opening every native container.
pub const NATIVE_MAGIC: [u8; 4] = *b"EPDN";

/// Current native container version.
pub const NATIVE_VERSION: u8 = 1;

/// Size of the per-layer key check stored in native containers.
pub const KEY_CHECK_SIZE: usize = 8;

/// Domain separator mixed into the key check MAC.
pub const KEY_CHECK_LABEL: &[u8] = b"key-check";

/// Longest persisted key-file path accepted in a native header.
pub const MAX_KEY_PATH_LENGTH: usize = u16::MAX as usize;

// === S2K Parameters ===

/// Width of the S2K salt in bytes. Fixed by the packet layout.
pub const SALT_SIZE: usize = 8;

/// Default number of bytes hashed by the iterated and salted S2K.
///
/// Exactly representable in the one-octet coded count (`0x9F`), so a file
/// saved with the default reports the same value after a round trip.
pub const DEFAULT_ITERATIONS: u32 = 1_015_808;

/// Largest iteration count the one-octet coding can express.
pub const MAX_ITERATIONS: u32 = 65_011_712;

/// Longest key any registered cipher needs. Cached keys are derived at this
/// length and truncated per cipher.
pub const MAX_KEY_SIZE: usize = 32;

/// Default number of passphrase-derived keys kept ready for saving.
pub const DEFAULT_KEY_CACHE_SIZE: usize = 8;

/// Default algorithm choices for new documents.
pub const DEFAULT_CIPHER: CipherAlgo = CipherAlgo::Aes256;
pub const DEFAULT_HASH: HashAlgo = HashAlgo::Sha256;
pub const DEFAULT_COMPRESSION: Compression = Compression::Zlib;

// === Key Files ===

/// Default random sequence length for generated key files, in bytes.
pub const DEFAULT_KEY_FILE_LENGTH: usize = 64;

/// Key-file lengths offered to the user.
pub const KEY_FILE_LENGTHS: &[usize] = &[32, 64, 128, 256];

/// Directory name of the key repository inside the user's home.
pub const KEY_REPOSITORY_DIR: &str = ".sealpad";

/// Prefix identifying a key file that is itself protected.
pub const ARMOR_BEGIN: &str = "-----BEGIN PGP MESSAGE-----";
pub const ARMOR_END: &str = "-----END PGP MESSAGE-----";

/// Width of base64 lines inside armored output.
pub const ARMOR_LINE_WIDTH: usize = 64;

// === Remote Key Retrieval ===

/// Fetch tool invoked for remote key references.
pub const DEFAULT_FETCH_TOOL: &str = "curl";

/// Parameters passed to the fetch tool before the URI.
pub const DEFAULT_FETCH_PARAMETERS: &str = "-s";

/// Time a fetch may run before the tool is killed.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

// === Passphrase Generator ===

/// Candidate counts offered in the generator menu.
pub const CANDIDATE_COUNTS: &[usize] = &[7, 15, 25];

/// Passphrase lengths offered in the generator menu.
pub const PASSPHRASE_LENGTHS: &[usize] = &[8, 12, 16];

/// Default custom symbol set.
pub const DEFAULT_SYMBOLS: &str = "`~!@#$%^&*()_-+={}[]|:;\"'<>,.?/";

/// Attempts spent looking for a candidate that covers every selected class.
pub const CLASS_COVERAGE_ATTEMPTS: usize = 256;

/// Runtime preferences consumed by the key-file provider and the load/save
/// handler.
///
/// Nothing here is persisted by the library; the binary builds it from
/// command-line flags and an editor would build it from its own preferences.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Copy the previous file to `<name>.bak` before replacing it.
    pub create_backup: bool,

    /// Number of keys derived ahead of time from a passphrase.
    pub key_cache_size: usize,

    /// Random sequence length of generated key files.
    pub key_file_length: usize,

    /// Cipher, hash, compression and iteration count used to protect
    /// generated key files.
    pub key_file_cipher: CipherAlgo,
    pub key_file_hash: HashAlgo,
    pub key_file_iterations: u32,

    /// Remote key retrieval.
    pub fetch_tool: PathBuf,
    pub fetch_parameters: String,
    pub fetch_timeout: Duration,

    /// Directory searched for key references given as bare file names.
    pub key_repository: Option<PathBuf>,

    /// Properties given to new documents.
    pub default_cipher: CipherAlgo,
    pub default_hash: HashAlgo,
    pub default_compression: Compression,
    pub default_iterations: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            create_backup: false,
            key_cache_size: DEFAULT_KEY_CACHE_SIZE,
            key_file_length: DEFAULT_KEY_FILE_LENGTH,
            key_file_cipher: DEFAULT_CIPHER,
            key_file_hash: DEFAULT_HASH,
            key_file_iterations: DEFAULT_ITERATIONS,
            fetch_tool: PathBuf::from(DEFAULT_FETCH_TOOL),
            fetch_parameters: DEFAULT_FETCH_PARAMETERS.to_owned(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            key_repository: std::env::var_os("HOME").map(|home| PathBuf::from(home).join(KEY_REPOSITORY_DIR)),
            default_cipher: DEFAULT_CIPHER,
            default_hash: DEFAULT_HASH,
            default_compression: DEFAULT_COMPRESSION,
            default_iterations: DEFAULT_ITERATIONS,
        }
    }
}
