//! Human-readable ranked report.
//!
//! Mirrors what the ward actually reads: one block per candidate with the
//! score breakdown and the evidence that produced it, then a one-line
//! narrative for the top candidate citing abnormal vitals.

use crate::assessment::AssessmentInput;
use crate::config::EngineConfig;
use crate::engine::{Candidate, RankOutcome};

fn join_terms(terms: &[String]) -> String {
    terms.join("・")
}

/// One candidate's report block.
pub fn format_block(c: &Candidate, weights: &crate::config::ScoreWeights) -> String {
    let mut lines = Vec::new();
    lines.push(format!("- [ ] {}\t{}", c.code, c.label));
    if !c.definition.is_empty() {
        lines.push(format!("    定義: {}", c.definition));
    }
    lines.push(format!(
        "    総合スコア: {:.2}  (rank: {})",
        c.total_score, c.rank
    ));
    lines.push(format!(
        "    内訳: fine {:.2} ×{} / coarse {:.2} ×{} / 定義適合 {:.2} ×{} / ルール(raw): {:.1}",
        c.fine_score,
        weights.fine,
        c.coarse_score,
        weights.coarse,
        c.definition_similarity,
        weights.definition_similarity,
        c.rule_raw_score
    ));

    if !c.evidence.is_empty() {
        lines.push("    ①曖昧一致（文字/同義/定義語）:".into());
        if !c.evidence.definition_terms.is_empty() {
            lines.push(format!(
                "       定義語:   {}",
                join_terms(&c.evidence.definition_terms)
            ));
        }
        if !c.evidence.defining_characteristics.is_empty() {
            lines.push(format!(
                "       診断指標: {}",
                join_terms(&c.evidence.defining_characteristics)
            ));
        }
        if !c.evidence.related_factors.is_empty() {
            lines.push(format!(
                "       関連因子: {}",
                join_terms(&c.evidence.related_factors)
            ));
        }
        if !c.evidence.risk_factors.is_empty() {
            lines.push(format!(
                "       危険因子: {}",
                join_terms(&c.evidence.risk_factors)
            ));
        }
    }

    if !c.semantic_evidence.is_empty() {
        lines.push("    ②AI意味一致（言い換え/含意）:".into());
        if !c.semantic_evidence.defining_characteristics.is_empty() {
            lines.push(format!(
                "       指標ヒット: {}",
                join_terms(&c.semantic_evidence.defining_characteristics)
            ));
        }
        if !c.semantic_evidence.related_factors.is_empty() {
            lines.push(format!(
                "       関連因子ヒット: {}",
                join_terms(&c.semantic_evidence.related_factors)
            ));
        }
        if !c.semantic_evidence.risk_factors.is_empty() {
            lines.push(format!(
                "       危険因子ヒット: {}",
                join_terms(&c.semantic_evidence.risk_factors)
            ));
        }
    }

    if !c.reasons.is_empty() {
        lines.push("       └ 根拠/ペナルティ内訳:".into());
        for reason in c.reasons.iter().take(12) {
            lines.push(format!("         - {reason}"));
        }
    }
    lines.join("\n")
}

/// One-line narrative for the top candidate: label, total, leading
/// evidence, and whichever vitals sit outside their normal bands.
pub fn narrative(input: &AssessmentInput, top: &Candidate) -> String {
    let v = &input.vitals;
    let mut abnormal = Vec::new();
    if let Some(t) = v.temperature {
        if t >= 38.0 || t <= 35.0 {
            abnormal.push(format!("T{t:.1}"));
        }
    }
    if let Some(hr) = v.heart_rate {
        if hr >= 100.0 || hr <= 50.0 {
            abnormal.push(format!("HR{}", hr as i64));
        }
    }
    if let Some(rr) = v.respiratory_rate {
        if rr >= 22.0 || rr <= 10.0 {
            abnormal.push(format!("RR{}", rr as i64));
        }
    }
    if let Some(spo2) = v.spo2 {
        if spo2 < 94.0 {
            abnormal.push(format!("SpO2{}%", spo2 as i64));
        }
    }
    if let Some(sbp) = v.systolic {
        if sbp <= 100.0 {
            abnormal.push(format!("SBP{}", sbp as i64));
        }
    }
    if let Some(map) = v.mean_arterial_pressure {
        if map < 65.0 {
            abnormal.push(format!("MAP{}", map as i64));
        }
    }
    if let Some(nrs) = v.pain_score {
        if nrs >= 4.0 {
            abnormal.push(format!("NRS{}", nrs as i64));
        }
    }

    let evidence: Vec<&String> = top
        .evidence
        .defining_characteristics
        .iter()
        .chain(top.semantic_evidence.defining_characteristics.iter())
        .chain(top.evidence.related_factors.iter())
        .take(3)
        .collect();

    let mut parts = vec![format!(
        "{}[{}] を最有力（総合 {:.2}）。",
        top.label, top.code, top.total_score
    )];
    if !evidence.is_empty() {
        parts.push(format!(
            "根拠: {}",
            evidence.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("・")
        ));
    }
    if !abnormal.is_empty() {
        parts.push(format!("所見: {}", abnormal.join(" ")));
    }
    parts.join(" ")
}

/// The full report text.
pub fn format_report(input: &AssessmentInput, outcome: &RankOutcome, cfg: &EngineConfig) -> String {
    let rule = "=".repeat(100);
    let thin = "—".repeat(100);
    let mut lines = Vec::new();
    lines.push(rule.clone());
    lines.push(format!(
        "看護診断 候補（性別/年齢 厳格・カテゴリは明確NGのみ除外・上位Kのみ意味分類） {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M")
    ));
    lines.push(rule);
    lines.push(format!(
        "[設定] TOPK={}, coarse≥{}, fine≥{}, MIN_DEF_SIM={}, MIN_RULE={}, SHOW_N={}, classifier={}",
        cfg.classify_top_k,
        cfg.coarse_min_pass,
        cfg.fine_min_pass,
        cfg.min_definition_similarity_keep,
        cfg.min_rule_score_keep,
        cfg.show_n,
        if outcome.classifier_online {
            "online"
        } else {
            "offline"
        }
    ));
    lines.push(String::new());

    if outcome.visible.is_empty() {
        lines.push(
            "（候補なし：条件が厳し過ぎる可能性。S/O記載や語彙を見直すか、環境変数で足切りを緩めてください）"
                .into(),
        );
    } else {
        for c in outcome.visible.iter().take(cfg.show_n) {
            lines.push(format!("(順位:{})", c.rank));
            lines.push(format_block(c, &cfg.weights));
            lines.push(String::new());
        }
        lines.push(thin.clone());
        lines.push("【診断ナラティブ（要約）】".into());
        lines.push(narrative(input, &outcome.visible[0]));
        lines.push(thin);
        lines.push(String::new());
        lines.push("（レビュー手順）候補にチェック → review コマンドで diagnosis_final.txt へ".into());
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::candidate::CatalogueMeta;
    use crate::rules::MatchedEvidence;

    fn candidate() -> Candidate {
        Candidate {
            code: "00031".into(),
            label: "非効果的気道浄化".into(),
            definition: "気道から分泌物を除去できない状態".into(),
            definition_similarity: 0.42,
            rule_raw_score: 5.2,
            coarse_score: 0.0,
            fine_score: 0.0,
            evidence: MatchedEvidence {
                definition_terms: vec!["気道".into(), "分泌物".into()],
                defining_characteristics: vec!["呼吸困難".into(), "咳嗽".into()],
                related_factors: Vec::new(),
                risk_factors: Vec::new(),
            },
            semantic_evidence: Default::default(),
            eligibility: Default::default(),
            penalties: Vec::new(),
            total_score: 6.84,
            is_related: true,
            rank: 1,
            reasons: vec!["バイタル:SpO2<90".into()],
            meta: CatalogueMeta::default(),
        }
    }

    #[test]
    fn block_carries_breakdown_and_evidence() {
        let block = format_block(&candidate(), &crate::config::ScoreWeights::default());
        assert!(block.contains("00031"));
        assert!(block.contains("総合スコア: 6.84"));
        assert!(block.contains("定義適合 0.42"));
        assert!(block.contains("診断指標: 呼吸困難・咳嗽"));
        assert!(block.contains("SpO2<90"));
    }

    #[test]
    fn narrative_cites_abnormal_vitals() {
        let input = AssessmentInput::from_text("SpO2 88%、血圧 85/50、呼吸困難あり");
        let line = narrative(&input, &candidate());
        assert!(line.contains("非効果的気道浄化[00031]"));
        assert!(line.contains("SpO288%"));
        assert!(line.contains("MAP61"));
        assert!(line.contains("根拠: 呼吸困難"));
    }

    #[test]
    fn narrative_quiet_vitals_omits_findings() {
        let input = AssessmentInput::from_text("体温36.5 SpO2 98%");
        let line = narrative(&input, &candidate());
        assert!(!line.contains("所見"));
    }

    #[test]
    fn report_renders_top_blocks() {
        let input = AssessmentInput::from_text("呼吸困難あり");
        let outcome = RankOutcome {
            all: vec![candidate()],
            visible: vec![candidate()],
            classifier_online: false,
        };
        let report = format_report(&input, &outcome, &EngineConfig::default());
        assert!(report.contains("(順位:1)"));
        assert!(report.contains("【診断ナラティブ（要約）】"));
        assert!(report.contains("classifier=offline"));
    }

    #[test]
    fn empty_outcome_renders_guidance() {
        let input = AssessmentInput::from_text("呼吸困難あり");
        let outcome = RankOutcome {
            all: Vec::new(),
            visible: Vec::new(),
            classifier_online: false,
        };
        let report = format_report(&input, &outcome, &EngineConfig::default());
        assert!(report.contains("候補なし"));
    }
}
