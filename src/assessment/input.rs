//! Assembly of the engine's text input from working-directory files.
//!
//! The summarized assessment body is required; the raw S/O halves are
//! optional extras prepended with `S:` / `O:` markers when present. The
//! first non-empty candidate file wins for each half.

use std::path::Path;

use super::InputError;

/// Required assessment body, produced by the upstream summarizer.
pub const ASSESSMENT_FILE: &str = "assessment_final.txt";
/// Optional raw subjective-note files, in preference order.
pub const S_FILE_CANDIDATES: &[&str] = &["s_input.txt", "S.txt", "s.txt"];
/// Optional raw objective-note files, in preference order.
pub const O_FILE_CANDIDATES: &[&str] = &["o_input.txt", "O.txt", "o.txt"];

fn read_optional(path: &Path) -> String {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn first_non_empty(dir: &Path, candidates: &[&str]) -> String {
    candidates
        .iter()
        .map(|name| read_optional(&dir.join(name)))
        .find(|content| !content.is_empty())
        .unwrap_or_default()
}

/// Read and join the assessment text from `dir`.
///
/// Fatal when the required body is missing or empty and no S/O text exists
/// either — there is nothing to match against.
pub fn read_assessment_text(dir: &Path) -> Result<String, InputError> {
    let core = read_optional(&dir.join(ASSESSMENT_FILE));
    let s_text = first_non_empty(dir, S_FILE_CANDIDATES);
    let o_text = first_non_empty(dir, O_FILE_CANDIDATES);

    let mut parts = Vec::new();
    if !s_text.is_empty() {
        parts.push(format!("S: {s_text}"));
    }
    if !o_text.is_empty() {
        parts.push(format!("O: {o_text}"));
    }
    if !core.is_empty() {
        parts.push(core);
    }

    if parts.is_empty() {
        return Err(InputError::MissingAssessment(dir.join(ASSESSMENT_FILE)));
    }
    Ok(parts.join("\n"))
}
