//! Phrase extraction from catalogue cells and definition prose.

use std::sync::LazyLock;

use regex::Regex;

use crate::text::normalize::nfkc;

/// Content words inside definition prose: kanji/katakana compounds,
/// longer hiragana runs, Latin words, and alphanumeric codes (SpO2, O2).
static CONTENT_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:[一-龥]{2,}|[ァ-ヶー]{2,}|[ぁ-ん]{3,}|[A-Za-z][A-Za-z\-]{2,}|[A-Za-z][0-9][A-Za-z0-9\-]*)",
    )
    .expect("content word pattern")
});

/// Particles and glue words that slip through the content-word pattern.
const PROSE_STOPWORDS: &[&str] = &[
    "こと", "もの", "ため", "および", "また", "など", "よう", "これ", "それ", "にて",
    "により", "について", "とは", "的",
];

/// Splitters between atomic phrases in the catalogue's delimited cells.
static PHRASE_DELIMITERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[、,;／/・]|\s+").expect("phrase delimiter pattern"));

fn dedup_ordered(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

/// Salient terms of a definition's prose, in order of appearance.
pub fn definition_terms(definition: &str, max_terms: usize, min_len: usize) -> Vec<String> {
    let folded = nfkc(definition);
    let mut out = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for m in CONTENT_WORD.find_iter(&folded) {
        let word = m.as_str().trim();
        if word.chars().count() < min_len || PROSE_STOPWORDS.contains(&word) {
            continue;
        }
        if seen.insert(word.to_string()) {
            out.push(word.to_string());
        }
        if out.len() >= max_terms {
            break;
        }
    }
    out
}

/// Split a raw delimited cell (診断指標/関連因子/危険因子) into atomic
/// phrases. `|` separates groups, the finer delimiters separate phrases.
pub fn split_phrases(raw: &str, min_len: usize) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    for group in raw.split(['|', '｜']) {
        for piece in PHRASE_DELIMITERS.split(group) {
            let phrase = nfkc(piece).trim().to_string();
            if phrase.chars().count() >= min_len {
                parts.push(phrase);
            }
        }
    }
    dedup_ordered(parts)
}
