//! Terminal output.

use std::path::Path;

use comfy_table::Table;
use comfy_table::presets::UTF8_FULL;
use console::style;
use sealpad::LoadedDocument;
use sealpad::secret::Secret;

/// Formats bytes into a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const UNIT: u64 = 1024;

    if bytes < UNIT {
        return format!("{bytes} B");
    }

    #[allow(clippy::cast_precision_loss)]
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= UNIT as f64 && unit < UNITS.len() - 1 {
        size /= UNIT as f64;
        unit += 1;
    }

    format!("{size:.1} {}", UNITS[unit])
}

/// Protection properties of a loaded document.
pub fn show_properties(path: &Path, document: &LoadedDocument) {
    let config = &document.config;
    let encrypted = config.has_passphrase || config.has_key_file();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Property", "Value"]);
    table.add_row(vec!["File".to_owned(), path.display().to_string()]);
    table.add_row(vec!["Format".to_owned(), document.format.to_string()]);
    table.add_row(vec!["Protection".to_owned(), config.mode().to_string()]);
    table.add_row(vec!["Size".to_owned(), format_bytes(document.plaintext.len() as u64)]);

    if encrypted {
        table.add_row(vec!["Cipher".to_owned(), config.cipher.to_string()]);
        table.add_row(vec!["Hash".to_owned(), config.hash.to_string()]);
        table.add_row(vec!["Iterations".to_owned(), config.iterations.to_string()]);
        table.add_row(vec!["Salt".to_owned(), hex::encode(&config.salt)]);
    }
    table.add_row(vec!["Compression".to_owned(), config.compression.to_string()]);

    if let Some(key_file) = &config.key_file {
        let location = key_file.source.persisted_location().unwrap_or_else(|| "(inline)".to_owned());
        table.add_row(vec!["Key file".to_owned(), location]);
        table.add_row(vec!["Key file protected".to_owned(), yes_no(key_file.protection.is_some())]);
        table.add_row(vec!["Key path stored".to_owned(), yes_no(config.persistent_key_path)]);
    }

    println!("{table}");
}

pub fn show_candidates(candidates: &[Secret]) {
    for (i, candidate) in candidates.iter().enumerate() {
        println!("  {:>3}  {}", style(i + 1).bold(), style(candidate.expose_secret()).green());
    }
}

pub fn show_success(message: &str, path: &Path) {
    eprintln!("{} {}", style("✓").green(), style(format!("{message}: {}", path.display())).bold());
}

pub fn show_warning(message: &str) {
    eprintln!("{} {}", style("!").yellow(), style(message).yellow());
}

fn yes_no(value: bool) -> String {
    (if value { "yes" } else { "no" }).to_owned()
}
