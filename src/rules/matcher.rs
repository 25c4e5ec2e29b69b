//! Term matching and the raw rule score.
//!
//! For each of the three catalogue term categories the matcher expands
//! every phrase through its synonym family, looks for it in the normalized
//! note (substring first, fuzzy token second), and classifies each hit's
//! local polarity. Affirmed hits are weighted into the raw score; negated
//! hits are reported but never scored.

use serde::{Deserialize, Serialize};
use strsim::normalized_levenshtein;

use super::polarity::{self, Polarity};
use super::synonyms;
use super::terms::{definition_terms, split_phrases};
use crate::assessment::AssessmentInput;
use crate::catalog::DiagnosisDefinition;
use crate::config::EngineConfig;
use crate::text::normalize::normalize;

/// Terms found for one category, split by polarity.
#[derive(Debug, Clone, Default)]
pub struct TermHits {
    pub affirmed: Vec<String>,
    pub normalized: Vec<String>,
}

/// The evidence bundle attached to a candidate: what the matcher actually
/// found, by category. Lists are deduplicated and insertion-ordered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchedEvidence {
    /// Salient terms of the definition prose (context, not hits).
    pub definition_terms: Vec<String>,
    pub defining_characteristics: Vec<String>,
    pub related_factors: Vec<String>,
    pub risk_factors: Vec<String>,
}

impl MatchedEvidence {
    pub fn is_empty(&self) -> bool {
        self.definition_terms.is_empty()
            && self.defining_characteristics.is_empty()
            && self.related_factors.is_empty()
            && self.risk_factors.is_empty()
    }
}

/// Raw rule result for one (note, diagnosis) pairing.
#[derive(Debug, Clone, Default)]
pub struct RuleOutcome {
    pub raw_score: f64,
    pub evidence: MatchedEvidence,
    /// Human-readable notes: negated-hit counts, numeric bonuses applied.
    pub reasons: Vec<String>,
}

/// Find category phrases in the normalized note text.
pub fn find_hits(
    text_norm: &str,
    phrases: &[String],
    fuzzy_threshold: f64,
    window: usize,
) -> TermHits {
    let tokens: Vec<&str> = text_norm.split(' ').filter(|t| !t.is_empty()).collect();
    let mut hits = TermHits::default();

    for phrase in phrases {
        let mut found_at: Option<usize> = None;

        // Substring containment over the synonym family.
        let expansions = synonyms::expand(phrase);
        for expansion in &expansions {
            let needle = normalize(expansion);
            if needle.is_empty() {
                continue;
            }
            if let Some(at) = text_norm.find(&needle) {
                found_at = Some(at);
                break;
            }
        }

        // Fuzzy token similarity as fallback.
        if found_at.is_none() {
            'outer: for expansion in &expansions {
                let needle = normalize(expansion);
                if needle.is_empty() {
                    continue;
                }
                for token in &tokens {
                    if normalized_levenshtein(&needle, token) >= fuzzy_threshold {
                        found_at = Some(text_norm.find(token).unwrap_or(0));
                        break 'outer;
                    }
                }
            }
        }

        if let Some(at) = found_at {
            let bucket = match polarity::classify(text_norm, at, window) {
                Polarity::Affirmed => &mut hits.affirmed,
                Polarity::Normalized => &mut hits.normalized,
            };
            if !bucket.contains(phrase) {
                bucket.push(phrase.clone());
            }
        }
    }
    hits
}

/// Match all three term categories of `def` against the note and compute
/// the weighted raw score plus evidence.
pub fn score_terms(input: &AssessmentInput, def: &DiagnosisDefinition, cfg: &EngineConfig) -> RuleOutcome {
    let w = &cfg.weights;
    let text = &input.normalized;

    let dc_phrases = split_phrases(&def.defining_characteristics, cfg.min_token_len);
    let rf_phrases = split_phrases(&def.related_factors, cfg.min_token_len);
    let rk_phrases = split_phrases(&def.risk_factors, cfg.min_token_len);

    let dc = find_hits(text, &dc_phrases, cfg.fuzzy_threshold, cfg.polarity_window);
    let rf = find_hits(text, &rf_phrases, cfg.fuzzy_threshold, cfg.polarity_window);
    let rk = find_hits(text, &rk_phrases, cfg.fuzzy_threshold, cfg.polarity_window);

    let mut score = w.rule_defining_characteristic * dc.affirmed.len() as f64
        + w.rule_related_factor * rf.affirmed.len() as f64
        + w.rule_risk_factor * rk.affirmed.len() as f64;

    let mut reasons = Vec::new();
    if !dc.normalized.is_empty() || !rf.normalized.is_empty() || !rk.normalized.is_empty() {
        reasons.push(format!(
            "正常/陰性と判断: DC{} RF{} RK{}",
            dc.normalized.len(),
            rf.normalized.len(),
            rk.normalized.len()
        ));
    }

    // Numeric pain-scale bonus for pain diagnoses.
    if def.label.contains('痛') {
        if let Some(nrs) = input.vitals.pain_score {
            if nrs >= 7.0 {
                score += 1.5;
                reasons.push("数値:NRS≥7".into());
            } else if nrs >= 4.0 {
                score += 0.8;
                reasons.push("数値:NRS≥4".into());
            }
        }
    }

    // Priority-hint bonus, doubled when the matching vital is in danger.
    let hint = normalize(&def.priority_hint);
    if ["呼吸", "airway", "breathing"].iter().any(|k| hint.contains(k)) {
        let danger = matches!(input.vitals.spo2, Some(s) if s < 90.0);
        score += w.vital_hint * (1.0 + if danger { 1.0 } else { 0.0 });
        if danger {
            reasons.push("バイタル:SpO2<90".into());
        }
    }
    if ["循環", "circulation"].iter().any(|k| hint.contains(k)) {
        let danger = matches!(input.vitals.mean_arterial_pressure, Some(m) if m < 65.0);
        score += w.vital_hint * (1.0 + if danger { 1.0 } else { 0.0 });
        if danger {
            reasons.push("バイタル:MAP<65".into());
        }
    }

    RuleOutcome {
        raw_score: score,
        evidence: MatchedEvidence {
            definition_terms: definition_terms(&def.definition, 16, cfg.min_token_len),
            defining_characteristics: dc.affirmed,
            related_factors: rf.affirmed,
            risk_factors: rk.affirmed,
        },
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    fn respiratory_def() -> DiagnosisDefinition {
        DiagnosisDefinition {
            code: "00031".into(),
            label: "非効果的気道浄化".into(),
            definition: "気道から分泌物を除去できない状態".into(),
            defining_characteristics: "呼吸困難|咳嗽|喘鳴".into(),
            related_factors: "分泌物貯留".into(),
            priority_hint: "呼吸".into(),
            ..Default::default()
        }
    }

    #[test]
    fn substring_hit_scores() {
        let input = AssessmentInput::from_text("呼吸困難の訴えあり、咳嗽も見られる");
        let outcome = score_terms(&input, &respiratory_def(), &cfg());
        assert!(outcome
            .evidence
            .defining_characteristics
            .contains(&"呼吸困難".to_string()));
        assert!(outcome.raw_score > 0.0);
    }

    #[test]
    fn synonym_hit_scores() {
        // 息切れ is in the 呼吸困難 synonym family.
        let input = AssessmentInput::from_text("労作時の息切れが強い");
        let outcome = score_terms(&input, &respiratory_def(), &cfg());
        assert!(outcome
            .evidence
            .defining_characteristics
            .contains(&"呼吸困難".to_string()));
    }

    #[test]
    fn negated_hit_reported_not_scored() {
        let def = DiagnosisDefinition {
            label: "高体温".into(),
            defining_characteristics: "発熱".into(),
            ..Default::default()
        };
        let input = AssessmentInput::from_text("発熱なし、バイタル安定");
        let outcome = score_terms(&input, &def, &cfg());
        assert!(outcome.evidence.defining_characteristics.is_empty());
        assert_eq!(outcome.raw_score, 0.0);
        assert!(outcome.reasons.iter().any(|r| r.contains("正常/陰性")));
    }

    #[test]
    fn respiratory_hint_bonus_doubles_in_danger() {
        let calm = AssessmentInput::from_text("呼吸音清、SpO2 98%");
        let danger = AssessmentInput::from_text("SpO2 87%で呼吸困難");
        let def = respiratory_def();
        let base = score_terms(&calm, &def, &cfg());
        let worse = score_terms(&danger, &def, &cfg());
        // Danger adds one extra vital_hint weight plus the extra DC hit.
        assert!(worse.raw_score > base.raw_score);
        assert!(worse.reasons.iter().any(|r| r.contains("SpO2<90")));
    }

    #[test]
    fn circulatory_hint_uses_map() {
        let def = DiagnosisDefinition {
            label: "心拍出量減少".into(),
            priority_hint: "循環".into(),
            ..Default::default()
        };
        let input = AssessmentInput::from_text("血圧 80/50、末梢冷感あり");
        let outcome = score_terms(&input, &def, &cfg());
        // MAP = (80 + 100) / 3 = 60 < 65 → doubled hint bonus.
        assert!((outcome.raw_score - 2.0).abs() < 1e-9);
        assert!(outcome.reasons.iter().any(|r| r.contains("MAP<65")));
    }

    #[test]
    fn pain_scale_bonus_applies_to_pain_labels() {
        let def = DiagnosisDefinition {
            label: "急性疼痛".into(),
            defining_characteristics: "疼痛の訴え".into(),
            ..Default::default()
        };
        let strong = AssessmentInput::from_text("疼痛の訴え NRS 8");
        let mild = AssessmentInput::from_text("疼痛の訴え NRS 5");
        let s = score_terms(&strong, &def, &cfg());
        let m = score_terms(&mild, &def, &cfg());
        assert!(s.raw_score > m.raw_score);
        assert!(s.reasons.iter().any(|r| r.contains("NRS≥7")));
        assert!(m.reasons.iter().any(|r| r.contains("NRS≥4")));
    }

    #[test]
    fn fuzzy_token_match_catches_near_spellings() {
        let phrases = vec!["dysphagia".to_string()];
        let hits = find_hits("patient shows dysphagea symptoms", &phrases, 0.86, 12);
        assert_eq!(hits.affirmed, vec!["dysphagia"]);
    }

    #[test]
    fn no_terms_no_score() {
        let input = AssessmentInput::from_text("特記事項なし");
        let def = DiagnosisDefinition::default();
        let outcome = score_terms(&input, &def, &cfg());
        assert_eq!(outcome.raw_score, 0.0);
        assert!(outcome.evidence.defining_characteristics.is_empty());
    }
}
