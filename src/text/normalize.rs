//! Character normalization shared by every matcher in the crate.
//!
//! Japanese clinical notes mix full-width and half-width forms freely
//! (ＳｐＯ２ vs SpO2, ７８ vs 78). Anything that compares text goes
//! through here first so the rest of the pipeline can assume one canonical
//! representation.

use unicode_normalization::UnicodeNormalization;

/// Fold Unicode compatibility variants (NFKC): full-width ASCII, half-width
/// katakana, circled digits and friends all collapse to their plain forms.
pub fn nfkc(s: &str) -> String {
    s.nfkc().collect()
}

/// Canonical matching form: NFKC-folded, lowercased, whitespace runs
/// (including U+3000) collapsed to a single space, trimmed.
///
/// Idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(s: &str) -> String {
    let folded = nfkc(s).to_lowercase();
    let mut out = String::with_capacity(folded.len());
    let mut pending_space = false;
    for ch in folded.chars() {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(ch);
        }
    }
    out
}
