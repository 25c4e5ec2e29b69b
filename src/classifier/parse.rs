//! Strict-then-lenient parsing of classifier output.
//!
//! Models wrap JSON in prose or code fences despite the instructions. The
//! strategy: parse the whole response as JSON; failing that, parse the
//! first balanced brace-delimited region; failing that, the caller falls
//! back to the documented empty default. Nothing here panics or returns
//! errors past the gateway boundary.

use serde_json::Value;

/// Extract a JSON object from a raw model response.
pub fn extract_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        if v.is_object() {
            return Some(v);
        }
    }
    let region = balanced_brace_region(trimmed)?;
    serde_json::from_str::<Value>(region).ok().filter(Value::is_object)
}

/// The first balanced `{…}` region, tracking strings and escapes so braces
/// inside values do not truncate the region.
fn balanced_brace_region(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Read a `score` field, clamped to `[0, 1]`. Missing/non-numeric → 0.
pub fn score_of(value: &Value) -> f64 {
    value
        .get("score")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
        .clamp(0.0, 1.0)
}

/// Read one matched-term list leniently: non-string items are skipped,
/// strings are trimmed, empties dropped.
pub fn matched_terms(value: &Value, category: &str) -> Vec<String> {
    value
        .get("matched")
        .and_then(|m| m.get(category))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_parse_of_clean_json() {
        let v = extract_json(r#"{"score": 0.7}"#).unwrap();
        assert!((score_of(&v) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn lenient_parse_inside_prose() {
        let v = extract_json("評価します。\n```json\n{\"score\": 0.42}\n```\n以上です。").unwrap();
        assert!((score_of(&v) - 0.42).abs() < 1e-9);
    }

    #[test]
    fn brace_inside_string_does_not_truncate() {
        let v = extract_json(r#"note {"score": 0.5, "why": "matches {dyspnea}"} trailing"#).unwrap();
        assert!((score_of(&v) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn garbage_yields_none() {
        assert!(extract_json("no json here").is_none());
        assert!(extract_json("{broken").is_none());
        assert!(extract_json("").is_none());
    }

    #[test]
    fn score_clamped_to_unit_interval() {
        let v = extract_json(r#"{"score": 3.2}"#).unwrap();
        assert_eq!(score_of(&v), 1.0);
        let v = extract_json(r#"{"score": -0.4}"#).unwrap();
        assert_eq!(score_of(&v), 0.0);
        let v = extract_json(r#"{"score": "high"}"#).unwrap();
        assert_eq!(score_of(&v), 0.0);
    }

    #[test]
    fn matched_terms_skip_non_strings() {
        let v = extract_json(
            r#"{"score": 0.9, "matched": {"診断指標": ["呼吸困難", 3, " 咳嗽 ", ""]}}"#,
        )
        .unwrap();
        assert_eq!(matched_terms(&v, "診断指標"), vec!["呼吸困難", "咳嗽"]);
        assert!(matched_terms(&v, "関連因子").is_empty());
    }
}
