use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sealpad::algorithm::{CipherAlgo, Compression, HashAlgo};
use sealpad::config::{CANDIDATE_COUNTS, DEFAULT_ITERATIONS, DEFAULT_KEY_FILE_LENGTH, DEFAULT_SYMBOLS, KEY_FILE_LENGTHS, PASSPHRASE_LENGTHS, Settings};
use sealpad::passgen::{self, CharacterClasses, PassphraseGenerationSpec, RepeatPolicy};
use sealpad::{Credentials, FileProtectionConfig, KeyFileRef, KeySource, LoadOptions, LoadSaveHandler, ModificationCheck};
use tokio::io::AsyncWriteExt;
use tracing::Level;

use crate::ui::display::{show_candidates, show_properties, show_success, show_warning};
use crate::ui::prompt::TerminalPrompt;

#[derive(Clone, Copy, ValueEnum)]
pub enum CipherArg {
    #[value(name = "3des")]
    TripleDes,
    Cast5,
    Aes128,
    Aes256,
}

impl From<CipherArg> for CipherAlgo {
    fn from(arg: CipherArg) -> Self {
        match arg {
            CipherArg::TripleDes => Self::TripleDes,
            CipherArg::Cast5 => Self::Cast5,
            CipherArg::Aes128 => Self::Aes128,
            CipherArg::Aes256 => Self::Aes256,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum HashArg {
    Sha1,
    Sha256,
}

impl From<HashArg> for HashAlgo {
    fn from(arg: HashArg) -> Self {
        match arg {
            HashArg::Sha1 => Self::Sha1,
            HashArg::Sha256 => Self::Sha256,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum CompressionArg {
    None,
    Zip,
    Zlib,
}

impl From<CompressionArg> for Compression {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => Self::None,
            CompressionArg::Zip => Self::Zip,
            CompressionArg::Zlib => Self::Zlib,
        }
    }
}

#[derive(Args)]
pub struct SecretArgs {
    /// Document passphrase; asked interactively when omitted.
    #[arg(short, long)]
    passphrase: Option<String>,

    /// Key file: a path, a bare name in the key repository, or a URI.
    #[arg(short, long)]
    key: Option<String>,

    /// Passphrase of a protected key file.
    #[arg(long)]
    key_passphrase: Option<String>,

    /// Answer yes to every confirmation.
    #[arg(short, long)]
    yes: bool,
}

impl SecretArgs {
    fn prompt(&self) -> TerminalPrompt {
        TerminalPrompt::new(self.passphrase.clone(), self.key_passphrase.clone(), self.yes).with_key_location(self.key.clone())
    }

    fn key_file(&self) -> Option<KeyFileRef> {
        self.key.as_deref().map(|location| KeyFileRef::new(KeySource::parse(location)))
    }
}

#[derive(Args)]
pub struct ProtectionArgs {
    #[arg(long, value_enum, default_value_t = CipherArg::Aes256)]
    cipher: CipherArg,

    #[arg(long, value_enum, default_value_t = HashArg::Sha256)]
    hash: HashArg,

    #[arg(long, value_enum, default_value_t = CompressionArg::Zlib)]
    compression: CompressionArg,

    /// Bytes hashed by the S2K; rounded up to a representable count.
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: u32,

    /// Protect with the key file only.
    #[arg(long, requires = "key")]
    no_passphrase: bool,

    /// Store the key file location in the document (native format only).
    #[arg(long, requires = "key")]
    persist_key_path: bool,

    /// Keep the previous version as <target>.bak.
    #[arg(long)]
    backup: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decrypt a document to standard output or a file.
    Open {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        secrets: SecretArgs,
    },

    /// Protect a plaintext file. The target extension picks the format:
    /// .epd native, .gpg binary, .asc armored, anything else plain.
    Save {
        input: PathBuf,
        target: PathBuf,

        #[command(flatten)]
        protection: ProtectionArgs,

        #[command(flatten)]
        secrets: SecretArgs,
    },

    /// Show how a document is protected.
    Inspect {
        input: PathBuf,

        #[command(flatten)]
        secrets: SecretArgs,
    },

    /// Generate a key file.
    GenKey {
        path: PathBuf,

        /// Random sequence length in bytes. Usual choices: 32, 64, 128, 256.
        #[arg(short, long, default_value_t = DEFAULT_KEY_FILE_LENGTH, value_parser = parse_key_length)]
        length: usize,

        /// Passphrase protecting the key file; empty for none.
        #[arg(long)]
        key_passphrase: Option<String>,

        #[arg(short, long)]
        yes: bool,
    },

    /// Generate passphrase candidates.
    GenPassphrase {
        #[arg(short, long, default_value_t = PASSPHRASE_LENGTHS[1])]
        length: usize,

        #[arg(short, long, default_value_t = CANDIDATE_COUNTS[0])]
        count: usize,

        #[arg(long)]
        no_lowercase: bool,

        #[arg(long)]
        no_uppercase: bool,

        #[arg(long)]
        no_digits: bool,

        /// Custom symbols; empty to leave symbols out.
        #[arg(long, default_value = DEFAULT_SYMBOLS)]
        symbols: String,

        /// Most times any character may occur.
        #[arg(long)]
        max_repeat: Option<usize>,

        /// Apply --max-repeat to runs of the same character instead of totals.
        #[arg(long, requires = "max_repeat")]
        consecutive: bool,
    },
}

#[derive(Parser)]
#[command(name = "sealpad", version, about = "Passphrase and key-file protected documents in an OpenPGP-compatible format.")]
pub struct App {
    #[command(subcommand)]
    command: Commands,

    /// Directory searched for key files given by bare name.
    #[arg(long, global = true)]
    repository: Option<PathBuf>,

    /// Remote key fetch tool.
    #[arg(long, global = true)]
    fetch_tool: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

impl App {
    pub fn init() -> Result<Self> {
        let app = Self::parse();
        let level = if app.verbose { Level::DEBUG } else { Level::WARN };
        let subscriber = tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).with_file(true).with_line_number(true).finish();
        tracing::subscriber::set_global_default(subscriber)?;
        Ok(app)
    }

    pub async fn execute(self) -> Result<()> {
        let mut settings = Settings::default();
        if let Some(repository) = self.repository {
            settings.key_repository = Some(repository);
        }
        if let Some(tool) = self.fetch_tool {
            settings.fetch_tool = tool;
        }

        match self.command {
            Commands::Open { input, output, secrets } => Self::open(settings, &input, output.as_deref(), &secrets).await,
            Commands::Save { input, target, protection, secrets } => Self::save(settings, &input, &target, &protection, &secrets).await,
            Commands::Inspect { input, secrets } => Self::inspect(settings, &input, &secrets).await,
            Commands::GenKey { path, length, key_passphrase, yes } => Self::gen_key(settings, &path, length, key_passphrase, yes).await,
            Commands::GenPassphrase { length, count, no_lowercase, no_uppercase, no_digits, symbols, max_repeat, consecutive } => {
                let spec = PassphraseGenerationSpec {
                    classes: CharacterClasses { lowercase: !no_lowercase, uppercase: !no_uppercase, digits: !no_digits, symbols },
                    length,
                    max_group_repeat: max_repeat,
                    repeat_policy: if consecutive { RepeatPolicy::Consecutive } else { RepeatPolicy::Total },
                    candidate_count: count,
                };
                show_candidates(&passgen::generate(&spec)?);
                Ok(())
            }
        }
    }

    async fn open(settings: Settings, input: &Path, output: Option<&Path>, secrets: &SecretArgs) -> Result<()> {
        let prompt = secrets.prompt();
        let mut handler = LoadSaveHandler::new(settings);
        let options = LoadOptions { key_file: secrets.key_file() };
        let document = handler.load(input, options, &prompt, &mut Credentials::new()).await.with_context(|| format!("cannot open {}", input.display()))?;

        match output {
            Some(path) => {
                if path.exists() && !prompt.confirm_overwrite(path) {
                    bail!("operation cancelled");
                }
                tokio::fs::write(path, &document.plaintext).await.with_context(|| format!("cannot write {}", path.display()))?;
                show_success("Decrypted", path);
            }
            None => {
                let mut stdout = tokio::io::stdout();
                stdout.write_all(&document.plaintext).await?;
                stdout.flush().await?;
            }
        }
        Ok(())
    }

    async fn save(mut settings: Settings, input: &Path, target: &Path, protection: &ProtectionArgs, secrets: &SecretArgs) -> Result<()> {
        let plaintext = tokio::fs::read(input).await.with_context(|| format!("cannot read {}", input.display()))?;
        let prompt = secrets.prompt();
        if target.exists() && !prompt.confirm_overwrite(target) {
            bail!("operation cancelled");
        }

        settings.create_backup = protection.backup;
        let mut config = FileProtectionConfig::from_settings(&settings);
        config.cipher = protection.cipher.into();
        config.hash = protection.hash.into();
        config.compression = protection.compression.into();
        config.iterations = protection.iterations;
        config.has_passphrase = !protection.no_passphrase;
        config.key_file = secrets.key_file();
        config.persistent_key_path = protection.persist_key_path;

        let mut handler = LoadSaveHandler::new(settings);
        let outcome = handler
            .save(target, &plaintext, &config, ModificationCheck::Overwrite, &prompt, &mut Credentials::new())
            .await
            .with_context(|| format!("cannot save {}", target.display()))?;

        if outcome.unencrypted {
            show_warning("saved without encryption");
        }
        show_success(&format!("Saved ({}, {})", outcome.format, outcome.config.mode()), target);
        Ok(())
    }

    async fn inspect(settings: Settings, input: &Path, secrets: &SecretArgs) -> Result<()> {
        let prompt = secrets.prompt();
        let mut handler = LoadSaveHandler::new(settings);
        let options = LoadOptions { key_file: secrets.key_file() };
        let document = handler.load(input, options, &prompt, &mut Credentials::new()).await.with_context(|| format!("cannot open {}", input.display()))?;
        show_properties(input, &document);
        Ok(())
    }

    async fn gen_key(mut settings: Settings, path: &Path, length: usize, key_passphrase: Option<String>, yes: bool) -> Result<()> {
        let prompt = TerminalPrompt::new(None, key_passphrase, yes);
        if path.exists() && !prompt.confirm_overwrite(path) {
            bail!("operation cancelled");
        }
        let Some(passphrase) = prompt.new_key_file_passphrase() else {
            bail!("operation cancelled");
        };

        settings.key_file_length = length;
        let mut handler = LoadSaveHandler::new(settings);
        let key = handler.generate_key(path, Some(&passphrase)).await.with_context(|| format!("cannot generate {}", path.display()))?;

        let target = handler.provider().locate(path);
        let label = if key.protection.is_some() { "Protected key file generated" } else { "Key file generated" };
        show_success(label, &target);
        Ok(())
    }
}

fn parse_key_length(value: &str) -> std::result::Result<usize, String> {
    let length: usize = value.parse().map_err(|e| format!("{e}"))?;
    if length > 0 { Ok(length) } else { Err(format!("must be positive (presets: {KEY_FILE_LENGTHS:?})")) }
}
