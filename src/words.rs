//! Tokenization, stemming and keyword filtering shared by the indexing and
//! query paths.

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Filtering rules applied to stemmed tokens.
#[derive(Debug, Clone)]
pub struct WordFilter {
    pub stop_words: HashSet<String>,
    pub min_length: usize,
    pub max_length: usize,
    pub min_frequency: u64,
    pub max_frequency: u64,
}

impl WordFilter {
    fn rejects(&self, word: &str) -> bool {
        let length = word.chars().count();
        length < self.min_length || length > self.max_length || self.stop_words.contains(word)
    }
}

/// Characters that never belong to a word. Keeps ASCII alphanumerics and the
/// Latin-1 letter range so accented words survive.
fn illegal_characters() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[^a-z0-9\u{00C0}-\u{00FF}]+").expect("illegal characters pattern is valid")
    })
}

/// Reduce raw text to stemmed terms and their frequencies.
///
/// Tokens are lowercased, stripped of punctuation, Porter-stemmed (English)
/// and then dropped when they are stop words or fall outside the configured
/// length bounds. Frequency bounds are not applied here; query terms keep
/// their raw counts.
pub fn terms(text: &str, filter: &WordFilter) -> HashMap<String, u64> {
    let stemmer = Stemmer::create(Algorithm::English);
    let mut counts = HashMap::new();

    for raw in text.to_lowercase().split_whitespace() {
        let cleaned = illegal_characters().replace_all(raw, "");
        if cleaned.is_empty() {
            continue;
        }

        let stemmed = stemmer.stem(&cleaned).to_string();
        if filter.rejects(&stemmed) {
            continue;
        }

        *counts.entry(stemmed).or_insert(0) += 1;
    }

    counts
}

/// Index-side extraction: [`terms`] plus the frequency floor and ceiling.
pub fn keywords(text: &str, filter: &WordFilter) -> HashMap<String, u64> {
    let mut words = terms(text, filter);
    words.retain(|_, frequency| *frequency >= filter.min_frequency);
    for frequency in words.values_mut() {
        *frequency = (*frequency).min(filter.max_frequency);
    }

    words
}
