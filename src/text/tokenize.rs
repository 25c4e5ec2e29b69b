//! Mixed-script tokenizer for the TF-IDF definition space.
//!
//! Japanese runs have no word boundaries, so ideographic/kana sequences are
//! broken into overlapping character n-grams (2–4). Latin runs are taken as
//! whole lowercase words, plus adjacent-word bigrams so that multi-word
//! clinical phrases ("airway clearance") survive as single dimensions.

use std::sync::LazyLock;

use regex::Regex;

/// Hard cap on tokens per document; definitions are short prose and the
/// n-gram expansion is quadratic-ish on long runs.
const MAX_TOKENS_PER_DOC: usize = 120;

/// Function words that carry no topical signal in definition prose.
const STOPWORDS: &[&str] = &[
    "こと", "もの", "ため", "および", "また", "とは", "的", "など", "にくい",
];

static JA_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[一-龥ぁ-んァ-ン]+").expect("japanese run pattern"));
static LATIN_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z][a-zA-Z\-]+").expect("latin run pattern"));
static LATIN_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z]{3,}").expect("latin word pattern"));

/// Overlapping character n-grams over a script run, whitespace removed.
pub fn char_ngrams(run: &str, n_min: usize, n_max: usize) -> Vec<String> {
    let chars: Vec<char> = run.chars().filter(|c| !c.is_whitespace()).collect();
    let mut out = Vec::new();
    for n in n_min..=n_max {
        if chars.len() < n {
            break;
        }
        for window in chars.windows(n) {
            out.push(window.iter().collect());
        }
    }
    out
}

/// Tokenize text into the TF-IDF token multiset.
///
/// The input should already be NFKC-folded; tokens shorter than two
/// characters and stopwords are dropped, and the result is capped at
/// [`MAX_TOKENS_PER_DOC`].
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();

    for m in JA_RUN.find_iter(text) {
        tokens.extend(char_ngrams(m.as_str(), 2, 4));
    }

    let lower = text.to_lowercase();
    for m in LATIN_RUN.find_iter(&lower) {
        tokens.push(m.as_str().to_string());
    }

    let words: Vec<&str> = LATIN_WORD.find_iter(&lower).map(|m| m.as_str()).collect();
    for pair in words.windows(2) {
        tokens.push(format!("{}_{}", pair[0], pair[1]));
    }

    tokens.retain(|t| t.chars().count() >= 2 && !STOPWORDS.contains(&t.as_str()));
    tokens.truncate(MAX_TOKENS_PER_DOC);
    tokens
}
