//! Confirmed-selection rendering.
//!
//! A human reviews the ranked report, ticks candidates, and the selection
//! comes back as `- [x] CODE LABEL` lines. Each line is matched against
//! the run record (code first, then exact label, then loose label
//! containment — lowest rank wins) and re-rendered with full detail into
//! the confirmed report. Unknown selections get a minimal stub instead of
//! failing the whole review.

use std::sync::LazyLock;

use regex::Regex;

use super::record::RunRecord;
use crate::engine::candidate::{Candidate, CatalogueMeta};

static SELECTED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*]\s*\[(?:x|X)\]\s*(\S+)\s+(.+)$").expect("selection line pattern")
});

/// Parse `- [x] CODE LABEL` lines into `(code, label)` pairs,
/// deduplicated in order.
pub fn parse_selection(text: &str) -> Vec<(String, String)> {
    let mut seen = std::collections::HashSet::new();
    text.lines()
        .filter_map(|line| {
            let caps = SELECTED_LINE.captures(line.trim())?;
            Some((caps[1].trim().to_string(), caps[2].trim().to_string()))
        })
        .filter(|pair| seen.insert(pair.clone()))
        .collect()
}

/// Find the recorded candidate for one selection. Among multiple matches
/// the lowest rank wins.
pub fn pick_candidate<'a>(
    code: &str,
    label: &str,
    candidates: &'a [Candidate],
) -> Option<&'a Candidate> {
    let best = |matches: Vec<&'a Candidate>| matches.into_iter().min_by_key(|c| c.rank);

    let by_code: Vec<&Candidate> = candidates.iter().filter(|c| c.code == code).collect();
    if !by_code.is_empty() {
        return best(by_code);
    }

    let by_label: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.label.trim() == label)
        .collect();
    if !by_label.is_empty() {
        return best(by_label);
    }

    let needle: String = label.chars().filter(|c| !c.is_whitespace()).collect();
    if needle.is_empty() {
        return None;
    }
    let loose: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| {
            let hay: String = c.label.chars().filter(|ch| !ch.is_whitespace()).collect();
            hay.contains(&needle)
        })
        .collect();
    best(loose)
}

fn stub_candidate(code: &str, label: &str) -> Candidate {
    Candidate {
        code: code.to_string(),
        label: label.to_string(),
        definition: String::new(),
        definition_similarity: 0.0,
        rule_raw_score: 0.0,
        coarse_score: 0.0,
        fine_score: 0.0,
        evidence: Default::default(),
        semantic_evidence: Default::default(),
        eligibility: Default::default(),
        penalties: Vec::new(),
        total_score: 0.0,
        is_related: false,
        rank: usize::MAX,
        reasons: Vec::new(),
        meta: CatalogueMeta::default(),
    }
}

fn entry_block(c: &Candidate, index: usize) -> String {
    let mut lines = Vec::new();
    lines.push(format!("{index}. [{}] {}", c.code, c.label));
    if !c.definition.is_empty() {
        lines.push(format!("    定義: {}", c.definition));
    }
    let rank = if c.rank == usize::MAX {
        "-".to_string()
    } else {
        c.rank.to_string()
    };
    lines.push(format!(
        "    順位: {rank} / fine: {:.3} / スコア: {:.1}",
        c.fine_score, c.total_score
    ));

    let mut matches = Vec::new();
    if !c.evidence.defining_characteristics.is_empty() {
        matches.push(format!(
            "診断指標: {}",
            c.evidence.defining_characteristics.join("・")
        ));
    }
    if !c.evidence.related_factors.is_empty() {
        matches.push(format!("関連因子: {}", c.evidence.related_factors.join("・")));
    }
    if !c.evidence.risk_factors.is_empty() {
        matches.push(format!("危険因子: {}", c.evidence.risk_factors.join("・")));
    }
    if !c.evidence.definition_terms.is_empty() {
        matches.push(format!("定義語: {}", c.evidence.definition_terms.join("・")));
    }
    if !matches.is_empty() {
        lines.push("    曖昧一致:".into());
        for m in matches {
            lines.push(format!("      - {m}"));
        }
    }

    if !c.reasons.is_empty() {
        lines.push("    スコア根拠:".into());
        for reason in c.reasons.iter().take(10) {
            lines.push(format!("      - {reason}"));
        }
    }

    if !c.semantic_evidence.is_empty() {
        lines.push("    AI根拠:".into());
        for (name, terms) in [
            ("指標", &c.semantic_evidence.defining_characteristics),
            ("関連因子", &c.semantic_evidence.related_factors),
            ("危険因子", &c.semantic_evidence.risk_factors),
        ] {
            if !terms.is_empty() {
                lines.push(format!("      {name}: {}", terms.join("・")));
            }
        }
    }

    let meta: Vec<String> = c
        .meta
        .labelled_fields()
        .into_iter()
        .map(|(k, v)| format!("{k}:{v}"))
        .collect();
    if !meta.is_empty() {
        lines.push(format!("    メタ情報: {}", meta.join(" / ")));
    }

    lines.join("\n")
}

/// Render the confirmed report for a selection against a run record.
/// An empty selection yields an empty string (clearing the output file).
pub fn render_confirmed(selection_text: &str, record: &RunRecord) -> String {
    let selected = parse_selection(selection_text);
    if selected.is_empty() {
        return String::new();
    }

    let mut chosen: Vec<Candidate> = selected
        .iter()
        .map(|(code, label)| {
            pick_candidate(code, label, &record.candidates)
                .cloned()
                .unwrap_or_else(|| stub_candidate(code, label))
        })
        .collect();
    chosen.sort_by_key(|c| c.rank);

    let mut lines = vec![
        "===== 診断（確定版） =====".to_string(),
        format!("作成: {}", chrono::Local::now().format("%Y-%m-%d %H:%M")),
        format!("件数: {}", chosen.len()),
    ];
    if !record.meta.generated_at.is_empty() {
        lines.push("ソース情報:".into());
        lines.push(format!("  - 生成: {}", record.meta.generated_at));
        lines.push(format!("  - モデル: {}", record.meta.classifier_model));
        lines.push(format!("  - 分類器到達性: {}", record.meta.classifier_online));
    }

    let blocks: Vec<String> = chosen
        .iter()
        .enumerate()
        .map(|(i, c)| entry_block(c, i + 1))
        .collect();

    format!("{}\n\n{}\n", lines.join("\n"), blocks.join("\n\n"))
}
