//! Request builders for the two classification stages.
//!
//! Fixed instructions (with the expected JSON schema) live in constants;
//! only the variable content is interpolated into the user message. The
//! assessment body is trimmed to a snippet first — the screening section
//! when the note carries the summarizer's markers, a prefix otherwise.

use std::sync::LazyLock;

use regex::Regex;

use crate::text::normalize::nfkc;

/// Coarse stage: plausibility only, strict one-field JSON.
pub const COARSE_SYSTEM: &str = "あなたは看護診断の意味一致チェッカーです。\
以下の『アセスメント本文（要旨）』と『看護診断（診断名/定義）』が臨床的に一致する可能性を 0.0〜1.0 で評価し、\
厳密JSON {\"score\": 0.0} のみを返してください。言い換え・含意の一致も評価してください。";

/// Fine stage: strict match plus per-category matched terms.
pub const FINE_SYSTEM: &str = "あなたは看護診断の意味一致チェッカーです。\
『アセスメント本文（要旨）』に、提示する診断名/定義/診断指標/関連因子/危険因子が意味的に表れているかを評価し、\
厳密JSON {\"matched\":{\"診断指標\":[],\"関連因子\":[],\"危険因子\":[]}, \"score\":0.0} だけ返してください。\
 matched は文字一致でなくても意味等価ならOK。score は 0.0〜1.0。";

static SCREENING_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)◆スクリー.*?アセスメント.*?◆データ分析").expect("screening section pattern")
});

/// One ready-to-send classification request.
#[derive(Debug, Clone)]
pub struct ClassifyRequest {
    pub system: &'static str,
    pub user: String,
}

/// Trim the assessment to at most `limit` characters, preferring the
/// screening section when the upstream summarizer's markers are present.
pub fn trim_assessment(text: &str, limit: usize) -> String {
    let folded = nfkc(text);
    let core = SCREENING_SECTION
        .find(&folded)
        .map(|m| m.as_str())
        .unwrap_or(&folded);
    let mut out: String = core.chars().take(limit).collect();
    if core.chars().count() > limit {
        out.push('…');
    }
    out
}

pub fn coarse_request(snippet: &str, label: &str, definition: &str) -> ClassifyRequest {
    ClassifyRequest {
        system: COARSE_SYSTEM,
        user: format!(
            "【看護診断】{label}\n【定義】{definition}\n\n【アセスメント本文（要旨）】\n{snippet}"
        ),
    }
}

pub fn fine_request(
    snippet: &str,
    label: &str,
    definition: &str,
    dc_terms: &[String],
    rf_terms: &[String],
    rk_terms: &[String],
) -> ClassifyRequest {
    let list = |terms: &[String]| {
        if terms.is_empty() {
            "（なし）".to_string()
        } else {
            terms.join(", ")
        }
    };
    ClassifyRequest {
        system: FINE_SYSTEM,
        user: format!(
            "【看護診断】{label}\n【定義】{definition}\n\n\
             【診断指標リスト】{}\n\
             【関連因子リスト】{}\n\
             【危険因子リスト】{}\n\n\
             【アセスメント本文（要旨）】\n{snippet}",
            list(dc_terms),
            list(rf_terms),
            list(rk_terms),
        ),
    }
}
