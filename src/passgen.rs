//! Passphrase candidate generator.
//!
//! Candidates are drawn uniformly from the union of the selected character
//! classes with a cryptographically secure generator. Each candidate is
//! independent of the others.

use hashbrown::HashMap;
use rand::rngs::OsRng;
use rand::{CryptoRng, Rng};

use crate::config::{CANDIDATE_COUNTS, CLASS_COVERAGE_ATTEMPTS, DEFAULT_SYMBOLS, PASSPHRASE_LENGTHS};
use crate::error::{Error, Result};
use crate::secret::Secret;

const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterClasses {
    pub lowercase: bool,
    pub uppercase: bool,
    pub digits: bool,

    /// Custom symbols; empty when the class is not selected.
    pub symbols: String,
}

impl Default for CharacterClasses {
    fn default() -> Self {
        Self { lowercase: true, uppercase: true, digits: true, symbols: DEFAULT_SYMBOLS.to_owned() }
    }
}

impl CharacterClasses {
    fn selected(&self) -> Vec<Vec<char>> {
        [(self.lowercase, LOWERCASE), (self.uppercase, UPPERCASE), (self.digits, DIGITS), (!self.symbols.is_empty(), self.symbols.as_str())]
            .into_iter()
            .filter(|(selected, _)| *selected)
            .map(|(_, chars)| chars.chars().collect())
            .collect()
    }

    /// Union of the selected classes, first occurrence order, no duplicates.
    pub fn alphabet(&self) -> Vec<char> {
        let mut alphabet: Vec<char> = Vec::new();
        for c in self.selected().into_iter().flatten() {
            if !alphabet.contains(&c) {
                alphabet.push(c);
            }
        }
        alphabet
    }
}

/// How `max_group_repeat` limits a character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RepeatPolicy {
    /// At most `max_group_repeat` occurrences anywhere in the candidate.
    #[default]
    Total,

    /// At most `max_group_repeat` occurrences in a row.
    Consecutive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassphraseGenerationSpec {
    pub classes: CharacterClasses,
    pub length: usize,
    pub max_group_repeat: Option<usize>,
    pub repeat_policy: RepeatPolicy,
    pub candidate_count: usize,
}

impl Default for PassphraseGenerationSpec {
    fn default() -> Self {
        Self {
            classes: CharacterClasses::default(),
            length: PASSPHRASE_LENGTHS[1],
            max_group_repeat: None,
            repeat_policy: RepeatPolicy::Total,
            candidate_count: CANDIDATE_COUNTS[0],
        }
    }
}

/// Generates `spec.candidate_count` candidates from the operating system's
/// random source.
pub fn generate(spec: &PassphraseGenerationSpec) -> Result<Vec<Secret>> {
    generate_with(spec, &mut OsRng)
}

pub fn generate_with<G: Rng + CryptoRng>(spec: &PassphraseGenerationSpec, rng: &mut G) -> Result<Vec<Secret>> {
    let alphabet = spec.classes.alphabet();
    if alphabet.is_empty() {
        return Err(Error::AlphabetEmpty);
    }
    validate(spec, alphabet.len())?;

    let classes = spec.classes.selected();
    let candidates = (0..spec.candidate_count).map(|_| candidate(spec, &alphabet, &classes, rng)).collect::<Vec<_>>();

    tracing::debug!(count = candidates.len(), length = spec.length, alphabet = alphabet.len(), "passphrase candidates generated");
    Ok(candidates)
}

fn validate(spec: &PassphraseGenerationSpec, alphabet: usize) -> Result<()> {
    if spec.length == 0 {
        return Err(Error::InvalidGenerationSpec("length must be positive".to_owned()));
    }

    let Some(cap) = spec.max_group_repeat else {
        return Ok(());
    };
    if cap == 0 {
        return Err(Error::InvalidGenerationSpec("repeat limit must be at least 1".to_owned()));
    }

    let feasible = match spec.repeat_policy {
        RepeatPolicy::Total => alphabet.saturating_mul(cap) >= spec.length,
        RepeatPolicy::Consecutive => alphabet > 1 || cap >= spec.length,
    };
    if !feasible {
        return Err(Error::InvalidGenerationSpec(format!("{alphabet} characters with at most {cap} repeats cannot fill {} positions", spec.length)));
    }
    Ok(())
}

/// One candidate. Redrawn until every selected class appears, when the
/// length leaves room for all of them.
fn candidate<G: Rng + CryptoRng>(spec: &PassphraseGenerationSpec, alphabet: &[char], classes: &[Vec<char>], rng: &mut G) -> Secret {
    let mut drawn = draw(spec, alphabet, rng);
    if spec.length < classes.len() {
        return Secret::from_string(drawn);
    }

    for _ in 1..CLASS_COVERAGE_ATTEMPTS {
        if classes.iter().all(|class| drawn.chars().any(|c| class.contains(&c))) {
            break;
        }
        drawn = draw(spec, alphabet, rng);
    }
    Secret::from_string(drawn)
}

fn draw<G: Rng + CryptoRng>(spec: &PassphraseGenerationSpec, alphabet: &[char], rng: &mut G) -> String {
    let mut out = String::with_capacity(spec.length);
    let mut counts: HashMap<char, usize> = HashMap::new();
    let mut run = (None, 0usize);

    for _ in 0..spec.length {
        let c = match spec.max_group_repeat {
            None => alphabet[rng.gen_range(0..alphabet.len())],
            Some(cap) => {
                let allowed: Vec<char> = alphabet
                    .iter()
                    .copied()
                    .filter(|c| match spec.repeat_policy {
                        RepeatPolicy::Total => counts.get(c).copied().unwrap_or(0) < cap,
                        RepeatPolicy::Consecutive => run.0 != Some(*c) || run.1 < cap,
                    })
                    .collect();
                allowed[rng.gen_range(0..allowed.len())]
            }
        };

        *counts.entry(c).or_insert(0) += 1;
        run = if run.0 == Some(c) { (Some(c), run.1 + 1) } else { (Some(c), 1) };
        out.push(c);
    }
    out
}
