//! # Load/Save Handler
//!
//! Runs the engine against the file system. A load reads the container,
//! works out which secrets it needs, asks for them through a [`Prompt`],
//! decodes and returns the plaintext with the protection it found. A save
//! checks the file was not changed behind the caller's back, validates the
//! requested protection, obtains keys and replaces the file atomically.
//!
//! The handler keeps no document state between calls. Everything that
//! outlives one call, the [`FileProtectionConfig`] and the [`Credentials`],
//! is owned by the caller and passed back in.
//!
//! The modification check compares timestamps only. Another process can
//! still write between the check and the rename.

use std::path::Path;
use std::time::SystemTime;

use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::{CryptoRng, RngCore, SeedableRng};

use crate::algorithm::HashAlgo;
use crate::cipher::S2kParameters;
use crate::config::{MAX_KEY_SIZE, SALT_SIZE, Settings};
use crate::engine::container::{self, Protection};
use crate::engine::{Engine, KeyResolver, Layer};
use crate::error::{Error, Result};
use crate::file;
use crate::keys::{KeyFileProvider, KeyService, ResolvedKey};
use crate::policy::Policy;
use crate::prompt::{Confirmation, PassphraseRequest, Prompt};
use crate::secret::{Secret, SecretBytes};
use crate::types::{ContainerFormat, FileProtectionConfig, KeyFileRef, KeySource};

/// Secrets kept between a load and the following saves.
#[derive(Debug, Default)]
pub struct Credentials {
    pub key_service: KeyService,

    /// Passphrases that unlocked protected key files, by key location.
    key_file_passphrases: HashMap<String, Secret>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every cached key and passphrase.
    pub fn clear(&mut self) {
        self.key_service.clear();
        self.key_file_passphrases.clear();
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Key file to use when the container does not record one.
    pub key_file: Option<KeyFileRef>,
}

#[derive(Debug)]
pub struct LoadedDocument {
    pub plaintext: Vec<u8>,

    /// Protection found on the document, to be passed to the next save.
    pub config: FileProtectionConfig,
    pub format: ContainerFormat,

    /// Modification time at load, for [`ModificationCheck::Verify`].
    pub modified: Option<SystemTime>,
}

#[derive(Debug)]
pub struct SaveOutcome {
    /// Protection actually applied: effective iterations, new salt, and any
    /// downgrade the user accepted.
    pub config: FileProtectionConfig,
    pub format: ContainerFormat,
    pub modified: Option<SystemTime>,

    /// The file was written without encryption.
    pub unencrypted: bool,
}

/// What a save does about changes made by other programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModificationCheck {
    /// Fail with [`Error::ExternalModificationDetected`] unless the file
    /// still has this modification time.
    Verify(SystemTime),

    /// Replace whatever is there.
    Overwrite,
}

pub struct LoadSaveHandler {
    settings: Settings,
    provider: KeyFileProvider,
    rng: StdRng,
}

impl LoadSaveHandler {
    pub fn new(settings: Settings) -> Self {
        let provider = KeyFileProvider::new(&settings);
        Self { settings, provider, rng: StdRng::from_entropy() }
    }

    /// Replaces the random source with a seeded one, so that saves become
    /// reproducible. For tests only.
    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    pub const fn provider(&self) -> &KeyFileProvider {
        &self.provider
    }

    /// Generates a key file of the configured length.
    pub async fn generate_key(&mut self, path: &Path, passphrase: Option<&Secret>) -> Result<KeyFileRef> {
        let length = self.provider.length();
        self.provider.create(path, length, passphrase, &mut self.rng).await
    }

    pub async fn load(&mut self, path: &Path, options: LoadOptions, prompt: &impl Prompt, credentials: &mut Credentials) -> Result<LoadedDocument> {
        let (data, modified) = file::read_document(path).await?;
        let probe = container::probe(&data, ContainerFormat::from_path(path))?;

        let (needs_passphrase, key_file) = match probe.protection {
            Protection::None => (false, None),
            Protection::Native(header) => {
                let key_file = if header.key_file {
                    let key = match (header.key_path, options.key_file) {
                        (Some(location), _) => KeyFileRef::new(KeySource::parse(&location)),
                        (None, Some(key)) => key,
                        (None, None) => KeyFileRef::new(KeySource::parse(&prompt.key_location().ok_or(Error::JobCancelled)?)),
                    };
                    Some(key)
                } else {
                    None
                };
                (header.passphrase, key_file)
            }
            // The message does not say which secret keyed it. A key file
            // supplied by the caller means key-file protection.
            Protection::Standards => (options.key_file.is_none(), options.key_file),
        };

        let passphrase = if needs_passphrase { Some(prompt.passphrase(PassphraseRequest::Document).ok_or(Error::JobCancelled)?) } else { None };

        let key = match key_file {
            Some(key_file) => {
                let resolved = self.resolve_key(&key_file, prompt, credentials).await?;
                Some((key_file, resolved))
            }
            None => None,
        };

        let mut engine = Engine::new(SessionKeys { service: &mut credentials.key_service, passphrase: passphrase.clone(), key, opened: None });
        let decoded = engine.decode(&data, probe.format)?;
        let opened = engine.into_resolver().opened;

        if let Some(passphrase) = &passphrase {
            let count = self.settings.key_cache_size;
            credentials.key_service.fill(passphrase, decoded.config.hash, decoded.config.iterations, count, &mut self.rng)?;
            if let Some((params, key)) = opened {
                credentials.key_service.remember(params, key);
            }
        }

        tracing::info!(path = %path.display(), format = %decoded.format, mode = %decoded.config.mode(), "document loaded");
        Ok(LoadedDocument { plaintext: decoded.plaintext, config: decoded.config, format: decoded.format, modified })
    }

    pub async fn save(&mut self, path: &Path, plaintext: &[u8], config: &FileProtectionConfig, check: ModificationCheck, prompt: &impl Prompt, credentials: &mut Credentials) -> Result<SaveOutcome> {
        if let ModificationCheck::Verify(expected) = check {
            if file::modified(path).await?.is_some_and(|current| current != expected) {
                tracing::warn!(path = %path.display(), "file changed since it was loaded");
                return Err(Error::ExternalModificationDetected);
            }
        }

        let format = ContainerFormat::from_path(path);
        let requested = config.has_passphrase || config.has_key_file();
        let outcome = match Policy::evaluate(config, format) {
            Ok(outcome) => outcome,
            Err(Error::FormatDoesNotSupportPersistentKeyPath) => {
                if !prompt.confirm(Confirmation::DisablePersistentKeyPath) {
                    return Err(Error::JobCancelled);
                }
                Policy::evaluate(&Policy::degrade(config), format)?
            }
            Err(e) => return Err(e),
        };
        let mut config = outcome.config;

        if config.has_passphrase && !credentials.key_service.has_fresh(config.hash, config.iterations) {
            match self.new_passphrase(prompt)? {
                Some(passphrase) => {
                    let count = self.settings.key_cache_size;
                    credentials.key_service.fill(&passphrase, config.hash, config.iterations, count, &mut self.rng)?;
                }
                None => config.has_passphrase = false,
            }
        }

        // Plain files saved without protection are the normal case and need no warning.
        let unencrypted = !config.has_passphrase && !config.has_key_file();
        if unencrypted && (format.is_encrypted() || requested) && !prompt.confirm(Confirmation::SaveUnencrypted) {
            return Err(Error::JobCancelled);
        }

        let key = match config.key_file.clone() {
            Some(key_file) => {
                let resolved = self.resolve_key(&key_file, prompt, credentials).await?;
                Some((key_file, resolved))
            }
            None => None,
        };
        let key_protection = key.as_ref().and_then(|(_, resolved)| resolved.protection.clone());

        let mut engine = Engine::new(SessionKeys { service: &mut credentials.key_service, passphrase: None, key, opened: None });
        let mut encoded = engine.encode(plaintext, &config, format, &mut self.rng)?;

        if let Some(key_file) = encoded.config.key_file.as_mut().filter(|key_file| key_file.protection.is_none()) {
            key_file.protection = key_protection.map(Box::new);
        }

        let modified = file::write_atomic(path, encoded.bytes, self.settings.create_backup).await?;
        tracing::info!(path = %path.display(), %format, mode = %encoded.config.mode(), "document saved");

        Ok(SaveOutcome { config: encoded.config, format, modified, unencrypted })
    }

    /// Asks for a new passphrase and its confirmation. `None` means the
    /// user left it blank.
    fn new_passphrase(&self, prompt: &impl Prompt) -> Result<Option<Secret>> {
        let passphrase = prompt.passphrase(PassphraseRequest::NewDocument).ok_or(Error::JobCancelled)?;
        if passphrase.is_empty() {
            tracing::debug!("blank passphrase, passphrase protection dropped");
            return Ok(None);
        }

        let confirmation = prompt.passphrase(PassphraseRequest::ConfirmDocument).ok_or(Error::JobCancelled)?;
        if !passphrase.matches(&confirmation) {
            return Err(Error::ConfirmationPassphraseMismatch);
        }
        Ok(Some(passphrase))
    }

    async fn resolve_key(&self, key: &KeyFileRef, prompt: &impl Prompt, credentials: &mut Credentials) -> Result<ResolvedKey> {
        let location = key.source.persisted_location();
        let cached = location.as_ref().and_then(|location| credentials.key_file_passphrases.get(location)).cloned();

        let mut used = None;
        let result = self
            .provider
            .resolve(key, |source| {
                let passphrase = cached.or_else(|| prompt.passphrase(PassphraseRequest::key_file(source)));
                used.clone_from(&passphrase);
                passphrase
            })
            .await;

        match (result, location) {
            (Ok(resolved), Some(location)) => {
                if let Some(passphrase) = used {
                    credentials.key_file_passphrases.insert(location, passphrase);
                }
                Ok(resolved)
            }
            (Err(Error::InvalidPassphraseForKeyFile), Some(location)) => {
                credentials.key_file_passphrases.remove(&location);
                Err(Error::InvalidPassphraseForKeyFile)
            }
            (result, _) => result,
        }
    }
}

/// Keys for one load or save: passphrase keys from the cache or the typed
/// passphrase, key-file keys from the resolved key file.
struct SessionKeys<'a> {
    service: &'a mut KeyService,
    passphrase: Option<Secret>,
    key: Option<(KeyFileRef, ResolvedKey)>,

    /// Passphrase key that opened the document.
    opened: Option<(S2kParameters, SecretBytes)>,
}

impl SessionKeys<'_> {
    fn key_material(&self) -> Result<&[u8]> {
        self.key.as_ref().map(|(_, resolved)| resolved.material.expose_secret()).ok_or(Error::EncryptionKeyInvalid)
    }
}

impl KeyResolver for SessionKeys<'_> {
    fn encryption_key<G: RngCore + CryptoRng>(&mut self, layer: Layer, hash: HashAlgo, iterations: u32, rng: &mut G) -> Result<(S2kParameters, SecretBytes)> {
        match layer {
            Layer::Passphrase => self.service.take_fresh(hash, iterations).ok_or(Error::InvalidPassphrase),
            Layer::KeyFile => {
                let mut salt = [0u8; SALT_SIZE];
                rng.fill_bytes(&mut salt);
                let params = S2kParameters::new(hash, salt, iterations);
                let key = params.derive(self.key_material()?, MAX_KEY_SIZE);
                Ok((params, key))
            }
        }
    }

    fn decryption_key(&mut self, layer: Layer, params: &S2kParameters) -> Result<SecretBytes> {
        match layer {
            Layer::Passphrase => match &self.passphrase {
                Some(passphrase) => {
                    let key = params.derive(passphrase.expose_secret().as_bytes(), MAX_KEY_SIZE);
                    self.opened = Some((params.clone(), key.clone()));
                    Ok(key)
                }
                None => self.service.lookup(params).ok_or(Error::InvalidPassphrase),
            },
            Layer::KeyFile => Ok(params.derive(self.key_material()?, MAX_KEY_SIZE)),
        }
    }

    fn standards_layer(&self) -> Layer {
        if self.passphrase.is_none() && self.key.is_some() { Layer::KeyFile } else { Layer::Passphrase }
    }

    fn key_file(&self) -> Option<KeyFileRef> {
        self.key.as_ref().map(|(key_file, resolved)| KeyFileRef { source: key_file.source.clone(), protection: resolved.protection.clone().map(Box::new) })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::fs;
    use std::time::Duration;

    use tempfile::tempdir;

    use super::*;
    use crate::algorithm::{CipherAlgo, Compression};

    const PLAINTEXT: &[u8] = b"Meet at the usual place at noon.\n";

    /// Prompt answering from a fixed script and recording what was asked.
    struct Script {
        passphrases: RefCell<VecDeque<String>>,
        location: Option<String>,
        confirm: bool,
        asked: RefCell<Vec<PassphraseRequest>>,
        confirmations: RefCell<Vec<Confirmation>>,
    }

    impl Script {
        fn answering(passphrases: &[&str]) -> Self {
            Self {
                passphrases: RefCell::new(passphrases.iter().map(|p| (*p).to_owned()).collect()),
                location: None,
                confirm: true,
                asked: RefCell::default(),
                confirmations: RefCell::default(),
            }
        }

        fn declining(mut self) -> Self {
            self.confirm = false;
            self
        }

        fn asked(&self) -> Vec<PassphraseRequest> {
            self.asked.borrow().clone()
        }

        fn confirmations(&self) -> Vec<Confirmation> {
            self.confirmations.borrow().clone()
        }
    }

    impl Prompt for Script {
        fn passphrase(&self, request: PassphraseRequest) -> Option<Secret> {
            self.asked.borrow_mut().push(request);
            self.passphrases.borrow_mut().pop_front().map(Secret::from_string)
        }

        fn key_location(&self) -> Option<String> {
            self.location.clone()
        }

        fn confirm(&self, confirmation: Confirmation) -> bool {
            self.confirmations.borrow_mut().push(confirmation);
            self.confirm
        }
    }

    fn settings(repository: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.key_cache_size = 2;
        settings.default_iterations = 1024;
        settings.key_file_iterations = 1024;
        settings.key_repository = Some(repository.to_path_buf());
        settings
    }

    fn handler(repository: &Path) -> LoadSaveHandler {
        LoadSaveHandler::new(settings(repository)).with_rng_seed(11)
    }

    fn passphrase_config() -> FileProtectionConfig {
        let mut config = FileProtectionConfig::new().with_passphrase();
        config.iterations = 1024;
        config
    }

    #[tokio::test]
    async fn test_correct_horse_scenario() {
        for name in ["doc.epd", "doc.gpg", "doc.asc"] {
            let dir = tempdir().unwrap();
            let path = dir.path().join(name);
            let mut handler = handler(dir.path());

            let mut config = FileProtectionConfig::new().with_passphrase();
            config.cipher = CipherAlgo::Aes256;
            config.hash = HashAlgo::Sha256;
            config.compression = Compression::Zlib;
            config.iterations = 65536;

            let script = Script::answering(&["correct-horse", "correct-horse"]);
            handler.save(&path, PLAINTEXT, &config, ModificationCheck::Overwrite, &script, &mut Credentials::new()).await.unwrap();

            let loaded = handler.load(&path, LoadOptions::default(), &Script::answering(&["correct-horse"]), &mut Credentials::new()).await.unwrap();
            assert_eq!(loaded.plaintext, PLAINTEXT, "{name}");
            assert_eq!(loaded.config.cipher, CipherAlgo::Aes256);
            assert_eq!(loaded.config.hash, HashAlgo::Sha256);
            assert_eq!(loaded.config.compression, Compression::Zlib);
            assert_eq!(loaded.config.iterations, 65536);
            assert!(loaded.config.has_passphrase);

            let wrong = handler.load(&path, LoadOptions::default(), &Script::answering(&["wrong-horse"]), &mut Credentials::new()).await;
            assert!(matches!(wrong, Err(Error::InvalidPassphrase)), "{name}: {wrong:?}");
        }
    }

    #[tokio::test]
    async fn test_standards_dual_protection_rejected_before_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.gpg");
        fs::write(&path, b"original").unwrap();

        let config = passphrase_config().with_key_file(KeyFileRef::local("doc.key"));
        let script = Script::answering(&["pw", "pw"]);
        let result = handler(dir.path()).save(&path, PLAINTEXT, &config, ModificationCheck::Overwrite, &script, &mut Credentials::new()).await;

        assert!(matches!(result, Err(Error::FormatDoesNotSupportDualProtection)));
        assert_eq!(fs::read(&path).unwrap(), b"original");
        assert!(script.asked().is_empty());
    }

    #[tokio::test]
    async fn test_external_modification_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.epd");
        let mut handler = handler(dir.path());
        let mut credentials = Credentials::new();
        let script = Script::answering(&["pw", "pw"]);

        let saved = handler.save(&path, PLAINTEXT, &passphrase_config(), ModificationCheck::Overwrite, &script, &mut credentials).await.unwrap();
        let stamp = saved.modified.unwrap();
        let before = fs::read(&path).unwrap();

        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(stamp - Duration::from_secs(3600)).unwrap();
        drop(file);

        let result = handler.save(&path, b"mine", &saved.config, ModificationCheck::Verify(stamp), &script, &mut credentials).await;
        assert!(matches!(result, Err(Error::ExternalModificationDetected)));
        assert_eq!(fs::read(&path).unwrap(), before);

        handler.save(&path, b"mine", &saved.config, ModificationCheck::Overwrite, &script, &mut credentials).await.unwrap();
    }

    #[tokio::test]
    async fn test_seeded_saves_are_identical() {
        let dir = tempdir().unwrap();
        let mut outputs = Vec::new();

        for name in ["a.epd", "b.epd"] {
            let path = dir.path().join(name);
            let mut handler = LoadSaveHandler::new(settings(dir.path())).with_rng_seed(7);
            let script = Script::answering(&["pw", "pw"]);
            handler.save(&path, PLAINTEXT, &passphrase_config(), ModificationCheck::Overwrite, &script, &mut Credentials::new()).await.unwrap();
            outputs.push(fs::read(&path).unwrap());
        }

        assert_eq!(outputs[0], outputs[1]);
    }

    #[tokio::test]
    async fn test_cached_keys_give_fresh_salts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.epd");
        let mut handler = handler(dir.path());
        let mut credentials = Credentials::new();
        let script = Script::answering(&["pw", "pw", "pw", "pw"]);

        let first = handler.save(&path, PLAINTEXT, &passphrase_config(), ModificationCheck::Overwrite, &script, &mut credentials).await.unwrap();
        let second = handler.save(&path, PLAINTEXT, &first.config, ModificationCheck::Overwrite, &script, &mut credentials).await.unwrap();
        assert_ne!(first.config.salt, second.config.salt);
        assert_eq!(script.asked().len(), 2);

        // Cache of two is exhausted now.
        handler.save(&path, PLAINTEXT, &second.config, ModificationCheck::Overwrite, &script, &mut credentials).await.unwrap();
        assert_eq!(script.asked(), [PassphraseRequest::NewDocument, PassphraseRequest::ConfirmDocument, PassphraseRequest::NewDocument, PassphraseRequest::ConfirmDocument]);
    }

    #[tokio::test]
    async fn test_load_refills_the_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.asc");
        let mut handler = handler(dir.path());
        let script = Script::answering(&["pw", "pw"]);
        handler.save(&path, PLAINTEXT, &passphrase_config(), ModificationCheck::Overwrite, &script, &mut Credentials::new()).await.unwrap();

        let mut credentials = Credentials::new();
        let loaded = handler.load(&path, LoadOptions::default(), &Script::answering(&["pw"]), &mut credentials).await.unwrap();
        assert_eq!(credentials.key_service.remaining(), 2);

        let quiet = Script::answering(&[]);
        handler.save(&path, b"edited", &loaded.config, ModificationCheck::Verify(loaded.modified.unwrap()), &quiet, &mut credentials).await.unwrap();
        assert!(quiet.asked().is_empty());

        let reloaded = handler.load(&path, LoadOptions::default(), &Script::answering(&["pw"]), &mut Credentials::new()).await.unwrap();
        assert_eq!(reloaded.plaintext, b"edited");
    }

    #[tokio::test]
    async fn test_passphrase_prompts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.epd");
        let mut handler = handler(dir.path());

        let mismatch = handler.save(&path, PLAINTEXT, &passphrase_config(), ModificationCheck::Overwrite, &Script::answering(&["one", "two"]), &mut Credentials::new()).await;
        assert!(matches!(mismatch, Err(Error::ConfirmationPassphraseMismatch)));

        let cancelled = handler.save(&path, PLAINTEXT, &passphrase_config(), ModificationCheck::Overwrite, &Script::answering(&[]), &mut Credentials::new()).await;
        assert!(matches!(cancelled, Err(Error::JobCancelled)));
        assert!(!path.exists());

        handler.save(&path, PLAINTEXT, &passphrase_config(), ModificationCheck::Overwrite, &Script::answering(&["pw", "pw"]), &mut Credentials::new()).await.unwrap();
        let cancelled = handler.load(&path, LoadOptions::default(), &Script::answering(&[]), &mut Credentials::new()).await;
        assert!(matches!(cancelled, Err(Error::JobCancelled)));
    }

    #[tokio::test]
    async fn test_blank_passphrase_saves_unencrypted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.epd");
        let mut handler = handler(dir.path());

        let declined = Script::answering(&[""]).declining();
        let result = handler.save(&path, PLAINTEXT, &passphrase_config(), ModificationCheck::Overwrite, &declined, &mut Credentials::new()).await;
        assert!(matches!(result, Err(Error::JobCancelled)));
        assert!(!path.exists());

        let script = Script::answering(&[""]);
        let outcome = handler.save(&path, PLAINTEXT, &passphrase_config(), ModificationCheck::Overwrite, &script, &mut Credentials::new()).await.unwrap();
        assert!(outcome.unencrypted);
        assert!(!outcome.config.has_passphrase);
        assert_eq!(script.confirmations(), [Confirmation::SaveUnencrypted]);

        let loaded = handler.load(&path, LoadOptions::default(), &Script::answering(&[]), &mut Credentials::new()).await.unwrap();
        assert_eq!(loaded.plaintext, PLAINTEXT);
    }

    #[tokio::test]
    async fn test_plain_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        let mut handler = handler(dir.path());

        let script = Script::answering(&[]);
        let outcome = handler.save(&path, PLAINTEXT, &FileProtectionConfig::new(), ModificationCheck::Overwrite, &script, &mut Credentials::new()).await.unwrap();
        assert!(outcome.unencrypted);
        assert!(script.confirmations().is_empty());
        assert_eq!(fs::read(&path).unwrap(), PLAINTEXT);

        // Protection requested on a plain file is a warning, not a silent downgrade.
        let script = Script::answering(&[]);
        handler.save(&path, PLAINTEXT, &passphrase_config(), ModificationCheck::Overwrite, &script, &mut Credentials::new()).await.unwrap();
        assert_eq!(script.confirmations(), [Confirmation::SaveUnencrypted]);
    }

    #[tokio::test]
    async fn test_backup_on_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.epd");
        let mut settings = settings(dir.path());
        settings.create_backup = true;
        let mut handler = LoadSaveHandler::new(settings).with_rng_seed(3);
        let mut credentials = Credentials::new();
        let script = Script::answering(&["pw", "pw"]);

        handler.save(&path, b"first", &passphrase_config(), ModificationCheck::Overwrite, &script, &mut credentials).await.unwrap();
        let first = fs::read(&path).unwrap();
        handler.save(&path, b"second", &passphrase_config(), ModificationCheck::Overwrite, &script, &mut credentials).await.unwrap();

        assert_eq!(fs::read(file::backup_path(&path)).unwrap(), first);
    }

    #[tokio::test]
    async fn test_persistent_key_path_with_protected_key_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.epd");
        let mut handler = handler(dir.path());

        let key = handler.generate_key(Path::new("doc.key"), Some(&Secret::new("key-pass"))).await.unwrap();
        assert!(dir.path().join("doc.key").exists());

        let mut config = passphrase_config().with_key_file(key);
        config.persistent_key_path = true;
        let script = Script::answering(&["doc-pass", "doc-pass", "key-pass"]);
        handler.save(&path, PLAINTEXT, &config, ModificationCheck::Overwrite, &script, &mut Credentials::new()).await.unwrap();

        let mut credentials = Credentials::new();
        let script = Script::answering(&["doc-pass", "key-pass"]);
        let loaded = handler.load(&path, LoadOptions::default(), &script, &mut credentials).await.unwrap();
        assert_eq!(loaded.plaintext, PLAINTEXT);
        assert!(loaded.config.persistent_key_path);
        assert!(loaded.config.has_passphrase);
        let key_file = loaded.config.key_file.as_ref().unwrap();
        assert_eq!(key_file.source.persisted_location().as_deref(), Some("doc.key"));
        assert!(key_file.protection.is_some());
        assert_eq!(script.asked(), [PassphraseRequest::Document, PassphraseRequest::KeyFile { location: "doc.key".to_owned() }]);

        // The key-file passphrase is remembered for the session.
        let script = Script::answering(&["doc-pass"]);
        handler.load(&path, LoadOptions::default(), &script, &mut credentials).await.unwrap();
        assert_eq!(script.asked(), [PassphraseRequest::Document]);

        let wrong = handler.load(&path, LoadOptions::default(), &Script::answering(&["doc-pass", "nope"]), &mut Credentials::new()).await;
        assert!(matches!(wrong, Err(Error::InvalidPassphraseForKeyFile)));
    }

    #[tokio::test]
    async fn test_key_location_asked_when_not_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.epd");
        let mut handler = handler(dir.path());

        let key = handler.generate_key(Path::new("k.key"), None).await.unwrap();
        let mut config = FileProtectionConfig::new().with_key_file(key);
        config.iterations = 1024;
        handler.save(&path, PLAINTEXT, &config, ModificationCheck::Overwrite, &Script::answering(&[]), &mut Credentials::new()).await.unwrap();

        let cancelled = handler.load(&path, LoadOptions::default(), &Script::answering(&[]), &mut Credentials::new()).await;
        assert!(matches!(cancelled, Err(Error::JobCancelled)));

        let mut script = Script::answering(&[]);
        script.location = Some("k.key".to_owned());
        let loaded = handler.load(&path, LoadOptions::default(), &script, &mut Credentials::new()).await.unwrap();
        assert_eq!(loaded.plaintext, PLAINTEXT);
        assert!(!loaded.config.has_passphrase);
        assert!(loaded.config.has_key_file());
    }

    #[tokio::test]
    async fn test_standards_key_file_degrades_persistent_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.gpg");
        let mut handler = handler(dir.path());

        let key = handler.generate_key(Path::new("g.key"), None).await.unwrap();
        let mut config = FileProtectionConfig::new().with_key_file(key);
        config.iterations = 1024;
        config.persistent_key_path = true;

        let declined = Script::answering(&[]).declining();
        let result = handler.save(&path, PLAINTEXT, &config, ModificationCheck::Overwrite, &declined, &mut Credentials::new()).await;
        assert!(matches!(result, Err(Error::JobCancelled)));
        assert!(!path.exists());

        let script = Script::answering(&[]);
        let outcome = handler.save(&path, PLAINTEXT, &config, ModificationCheck::Overwrite, &script, &mut Credentials::new()).await.unwrap();
        assert!(!outcome.config.persistent_key_path);
        assert_eq!(script.confirmations(), [Confirmation::DisablePersistentKeyPath]);

        let options = LoadOptions { key_file: Some(KeyFileRef::local("g.key")) };
        let loaded = handler.load(&path, options, &Script::answering(&[]), &mut Credentials::new()).await.unwrap();
        assert_eq!(loaded.plaintext, PLAINTEXT);
        assert!(loaded.config.has_key_file() && !loaded.config.has_passphrase);
    }

    #[tokio::test]
    async fn test_remote_key_errors_reach_the_caller() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.gpg");
        handler(dir.path()).save(&path, PLAINTEXT, &passphrase_config(), ModificationCheck::Overwrite, &Script::answering(&["pw", "pw"]), &mut Credentials::new()).await.unwrap();

        let remote = || LoadOptions { key_file: Some(KeyFileRef::new(KeySource::parse("https://keys.invalid/doc.key"))) };

        let mut absent_tool = settings(dir.path());
        absent_tool.fetch_tool = dir.path().join("no-such-fetch-tool");
        let mut missing = LoadSaveHandler::new(absent_tool);
        let result = missing.load(&path, remote(), &Script::answering(&[]), &mut Credentials::new()).await;
        assert!(matches!(result, Err(Error::FetchToolNotFound(_))));

        #[cfg(unix)]
        {
            let mut exits_one = settings(dir.path());
            exits_one.fetch_tool = "false".into();
            let mut failing = LoadSaveHandler::new(exits_one);
            let result = failing.load(&path, remote(), &Script::answering(&[]), &mut Credentials::new()).await;
            assert!(matches!(result, Err(Error::FetchNonZeroExit { .. })));
        }
    }

    #[tokio::test]
    async fn test_missing_document() {
        let dir = tempdir().unwrap();
        let result = handler(dir.path()).load(&dir.path().join("absent.epd"), LoadOptions::default(), &Script::answering(&[]), &mut Credentials::new()).await;
        assert!(matches!(result, Err(Error::FileDoesNotExist(_))));
    }
}
