//! Clinical synonym families for term expansion.
//!
//! The catalogue writes formal terms (疼痛) where notes write colloquial
//! ones (痛い, しんどい). Lookup is bidirectional: any member of a family
//! expands to the whole family.

use crate::text::normalize::nfkc;

/// Canonical term → equivalent phrasings seen in notes.
const SYNONYM_FAMILIES: &[(&str, &[&str])] = &[
    (
        "疼痛",
        &[
            "痛い", "痛み", "苦痛", "圧痛", "腰痛", "腹痛", "胸痛", "頭痛", "創部痛",
            "痛覚過敏",
        ],
    ),
    (
        "呼吸困難",
        &[
            "息苦しさ", "息切れ", "呼吸苦", "呼吸困難感", "起坐呼吸", "労作時呼吸困難",
        ],
    ),
    (
        "不安",
        &["心配", "落ち着かない", "そわそわ", "緊張", "恐れ", "恐怖"],
    ),
    (
        "倦怠感",
        &["だるい", "疲労", "しんどい", "易疲労", "脱力"],
    ),
    (
        "脱水",
        &["口渇", "尿量低下", "皮膚乾燥", "尿濃縮", "飲水不足"],
    ),
    (
        "転倒リスク",
        &["ふらつき", "歩行不安定", "易転倒", "失神既往"],
    ),
    (
        "嚥下障害",
        &["dysphagia", "誤嚥", "むせ", "咽頭残留", "嚥下機能低下"],
    ),
];

/// Expand a term through its synonym family. The term itself is always the
/// first element; members join in table order.
pub fn expand(term: &str) -> Vec<String> {
    let folded = nfkc(term);
    let mut out = vec![folded.clone()];
    for (canonical, members) in SYNONYM_FAMILIES {
        if folded == *canonical || members.contains(&folded.as_str()) {
            for candidate in std::iter::once(*canonical).chain(members.iter().copied()) {
                if !out.iter().any(|t| t == candidate) {
                    out.push(candidate.to_string());
                }
            }
        }
    }
    out
}
