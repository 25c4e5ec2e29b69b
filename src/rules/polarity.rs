//! Local polarity of a term hit.
//!
//! 「発熱なし」 mentions fever without asserting it. A fixed character
//! window around each hit is checked for normal/negation vocabulary; a hit
//! inside such a window is recorded as evidence of *absence* and excluded
//! from the score. Worsening vocabulary in the same window overrides the
//! normal reading (「安定せず悪化」).

use std::sync::LazyLock;

use regex::Regex;

static NORMAL_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"なし|ない|良好|維持|保た|正常|安定|問題なし|みられず|陰性|改善")
        .expect("normal vocabulary pattern")
});
static WORSENING_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"悪化|不良|低下|障害|困難|不足|増悪|異常|陽性|上昇|増加")
        .expect("worsening vocabulary pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// The term is asserted; it counts toward the score.
    Affirmed,
    /// The term appears negated/normalized; reported but not scored.
    Normalized,
}

/// Classify the hit at byte offset `at` in `text` by inspecting `width`
/// characters on each side.
pub fn classify(text: &str, at: usize, width: usize) -> Polarity {
    let window = char_window(text, at, width);
    if NORMAL_WORDS.is_match(window) && !WORSENING_WORDS.is_match(window) {
        Polarity::Normalized
    } else {
        Polarity::Affirmed
    }
}

/// Slice `width` characters either side of the byte offset `at`,
/// respecting char boundaries.
fn char_window(text: &str, at: usize, width: usize) -> &str {
    let at = at.min(text.len());
    let start = text[..at]
        .char_indices()
        .rev()
        .nth(width.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let end = text[at..]
        .char_indices()
        .nth(width)
        .map(|(i, _)| at + i)
        .unwrap_or(text.len());
    &text[start..end]
}
