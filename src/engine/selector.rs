//! The ranking pipeline.
//!
//! A single-threaded orchestration (pre-scoring, filtering, cutoff,
//! selection, assembly) wrapping two bounded-concurrency classification
//! stages. Every fallback here exists so that a non-empty catalogue always
//! yields a non-empty, totally ordered candidate list — decision support
//! must degrade, not gate.

use std::collections::HashSet;

use crate::assessment::AssessmentInput;
use crate::catalog::DiagnosisDefinition;
use crate::classifier::{ChatModel, ClassifierGateway, FineEvidence};
use crate::config::EngineConfig;
use crate::engine::candidate::{Candidate, CatalogueMeta};
use crate::engine::pool::run_bounded;
use crate::filters::{
    check_eligibility, contradiction_penalty, setting_penalty, weak_evidence_penalty, Eligibility,
};
use crate::lexical::{cosine, tfidf_vector, DefinitionSpace};
use crate::rules::{score_terms, RuleOutcome};
use crate::rules::terms::split_phrases;
use crate::text::tokenize::tokenize;

/// Everything one run produces.
pub struct RankOutcome {
    /// Every scored candidate, sorted, 1-based ranks assigned.
    pub all: Vec<Candidate>,
    /// The subset the text report shows (visibility mode + fallback).
    pub visible: Vec<Candidate>,
    /// Whether the classifier service was reachable this run.
    pub classifier_online: bool,
}

struct PreScore {
    definition_similarity: f64,
    rule: RuleOutcome,
    eligibility: Eligibility,
}

/// Score and rank the whole catalogue against one assessment.
pub fn rank_candidates<M: ChatModel>(
    input: &AssessmentInput,
    definitions: &[DiagnosisDefinition],
    space: &DefinitionSpace,
    gateway: &ClassifierGateway<M>,
    cfg: &EngineConfig,
) -> RankOutcome {
    let n = definitions.len();
    let input_vector = tfidf_vector(&tokenize(&input.normalized), &space.idf);

    // 1. Pre-score everything: lexical similarity + rule matching + the
    //    hard-filter verdicts (cheap, always computed).
    let pre: Vec<PreScore> = definitions
        .iter()
        .enumerate()
        .map(|(i, def)| PreScore {
            definition_similarity: cosine(&input_vector, &space.vectors[i]),
            rule: score_terms(input, def, cfg),
            eligibility: check_eligibility(def, input, &cfg.filters),
        })
        .collect();

    // 2. Eligible pool; an empty pool falls back to the full catalogue.
    let mut eligible: Vec<usize> = (0..n).filter(|&i| pre[i].eligibility.all_passed()).collect();
    if eligible.is_empty() {
        tracing::info!("no definition passed the hard filters; using the full catalogue");
        eligible = (0..n).collect();
    }

    // 3. Loose topical cutoff, skipped when it would empty the pool.
    let mut kept: Vec<usize> = eligible
        .iter()
        .copied()
        .filter(|&i| {
            pre[i].definition_similarity >= cfg.min_definition_similarity_keep
                || pre[i].rule.raw_score >= cfg.min_rule_score_keep
        })
        .collect();
    if kept.is_empty() {
        kept = eligible;
    }

    // 4. Classification targets: top K by a cheap composite.
    let quick_score = |i: usize| {
        let bonus = if pre[i].eligibility.category.passed
            && !pre[i].eligibility.category_overlap.is_empty()
        {
            cfg.weights.category_match
        } else {
            0.0
        };
        0.6 * pre[i].definition_similarity
            + 0.4 * (pre[i].rule.raw_score / 4.0).min(1.0)
            + 0.1 * bonus
    };
    kept.sort_by(|&a, &b| {
        quick_score(b)
            .partial_cmp(&quick_score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let targets: Vec<usize> = kept.into_iter().take(cfg.classify_top_k).collect();

    // 5. Coarse stage.
    let classifier_online = gateway.is_online();
    let mut coarse = vec![0.0f64; n];
    if !targets.is_empty() && classifier_online {
        let results = run_bounded(&targets, cfg.coarse_concurrency, cfg.coarse_budget, |i| {
            let def = &definitions[i];
            gateway.classify_coarse(&input.text, def.display_label(), &def.definition)
        });
        for (i, score) in results {
            coarse[i] = score;
        }
        tracing::debug!(targets = targets.len(), "coarse classification done");
    }

    // 6. Fine pool: top 60% of coarse-ranked targets over the pass bar.
    //    Very high coarse scores are accepted outright so one slow fine
    //    call cannot hold the whole run hostage.
    let mut coarse_ranked = targets.clone();
    coarse_ranked.sort_by(|&a, &b| {
        coarse[b]
            .partial_cmp(&coarse[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let cut = if coarse_ranked.is_empty() {
        0
    } else {
        ((0.6 * coarse_ranked.len() as f64).ceil() as usize).clamp(1, coarse_ranked.len())
    };
    let fine_pool: Vec<usize> = coarse_ranked[..cut]
        .iter()
        .copied()
        .filter(|&i| coarse[i] >= cfg.coarse_min_pass)
        .collect();
    let early_accept: HashSet<usize> = coarse_ranked
        .iter()
        .copied()
        .filter(|&i| coarse[i] >= cfg.early_accept_threshold)
        .collect();

    // 7. Fine stage.
    let mut fine = vec![0.0f64; n];
    let mut fine_evidence: Vec<Option<FineEvidence>> = vec![None; n];
    if !fine_pool.is_empty() && classifier_online {
        let results = run_bounded(&fine_pool, cfg.fine_concurrency, cfg.fine_budget, |i| {
            let def = &definitions[i];
            let dc = split_phrases(&def.defining_characteristics, cfg.min_token_len);
            let rf = split_phrases(&def.related_factors, cfg.min_token_len);
            let rk = split_phrases(&def.risk_factors, cfg.min_token_len);
            gateway.classify_fine(&input.text, def.display_label(), &def.definition, &dc, &rf, &rk)
        });
        for (i, (score, evidence)) in results {
            fine[i] = score;
            fine_evidence[i] = Some(evidence);
        }
        tracing::debug!(pool = fine_pool.len(), "fine classification done");
    }
    for &i in &early_accept {
        if fine_evidence[i].is_none() {
            fine[i] = coarse[i];
        }
    }

    // 8. Assemble every definition — including the ones the classifier
    //    never saw, which keep 0 for both stages.
    let mut candidates: Vec<Candidate> = (0..n)
        .map(|i| {
            build_candidate(
                &definitions[i],
                &pre[i],
                coarse[i],
                fine[i],
                fine_evidence[i].clone().unwrap_or_default(),
                input,
                cfg,
            )
        })
        .collect();

    // 9. Total order with explicit tie-breaks, then 1-based ranks.
    candidates.sort_by(|a, b| sort_key(b).cmp(&sort_key(a)));
    for (position, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank = position + 1;
    }

    // 10. Visibility: related-only mode keeps a top-fraction fallback so a
    //     reviewer always has something to inspect.
    let visible = if cfg.only_related {
        let related: Vec<Candidate> = candidates
            .iter()
            .filter(|c| c.is_related && c.total_score > 0.0)
            .cloned()
            .collect();
        if related.is_empty() && !candidates.is_empty() {
            let k = ((candidates.len() as f64 * cfg.fallback_top_fraction) as usize)
                .max(3)
                .min(candidates.len());
            candidates[..k].to_vec()
        } else {
            related
        }
    } else {
        candidates.clone()
    };

    RankOutcome {
        all: candidates,
        visible,
        classifier_online,
    }
}

#[allow(clippy::too_many_arguments)]
fn build_candidate(
    def: &DiagnosisDefinition,
    pre: &PreScore,
    coarse_score: f64,
    fine_score: f64,
    semantic_evidence: FineEvidence,
    input: &AssessmentInput,
    cfg: &EngineConfig,
) -> Candidate {
    let w = &cfg.weights;

    // Evidence counts for the weak-evidence penalty include what the fine
    // stage reported as semantically present.
    let dc_hits = pre.rule.evidence.defining_characteristics.len()
        + semantic_evidence.defining_characteristics.len();
    let rk_hits = pre.rule.evidence.risk_factors.len() + semantic_evidence.risk_factors.len();

    let mut penalties = Vec::new();
    penalties.extend(setting_penalty(def, input, w));
    penalties.extend(weak_evidence_penalty(def, dc_hits, rk_hits, w));
    penalties.extend(contradiction_penalty(def, input, w));
    let penalty_total: f64 = penalties.iter().map(|p| p.amount).sum();

    let category_bonus = if pre.eligibility.category.passed
        && !pre.eligibility.category_overlap.is_empty()
    {
        w.category_match
    } else {
        0.0
    };

    let total_score = w.fine * fine_score
        + w.coarse * coarse_score
        + w.definition_similarity * pre.definition_similarity
        + pre.rule.raw_score
        + category_bonus
        - penalty_total;

    let related_basic = fine_score >= cfg.fine_min_pass
        || (coarse_score >= cfg.coarse_min_pass
            && (pre.definition_similarity >= cfg.related_definition_similarity
                || pre.rule.raw_score >= cfg.related_rule_score));
    let is_related =
        pre.eligibility.all_passed() && (related_basic || total_score >= cfg.related_floor);

    let mut reasons = pre.rule.reasons.clone();
    for (check, _) in pre.eligibility.reasons() {
        let verdict = if check.passed { "OK" } else { "NG" };
        if let Some(reason) = &check.reason {
            reasons.push(format!("{verdict}: {reason}"));
        }
    }
    for penalty in &penalties {
        reasons.push(format!("penalty: {} (-{:.1})", penalty.reason, penalty.amount));
    }

    Candidate {
        code: def.display_code().to_string(),
        label: def.display_label().to_string(),
        definition: def.definition.clone(),
        definition_similarity: pre.definition_similarity,
        rule_raw_score: pre.rule.raw_score,
        coarse_score,
        fine_score,
        evidence: pre.rule.evidence.clone(),
        semantic_evidence,
        eligibility: pre.eligibility.clone(),
        penalties,
        total_score,
        is_related,
        rank: 0,
        reasons,
        meta: CatalogueMeta::of(def),
    }
}

/// Descending sort key: relatedness first, then each score as a tie-break
/// for the previous. Scores are compared at fixed precision so floating
/// noise cannot flip neighbours.
fn sort_key(c: &Candidate) -> (bool, i64, i64, i64, i64, i64) {
    let milli = |x: f64| (x * 1000.0).round() as i64;
    (
        c.is_related,
        milli(c.total_score),
        milli(c.fine_score),
        milli(c.coarse_score),
        (c.definition_similarity * 10_000.0).round() as i64,
        milli(c.rule_raw_score),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{MockChatModel, ResponseCache};
    use crate::lexical;

    fn catalogue() -> Vec<DiagnosisDefinition> {
        vec![
            DiagnosisDefinition {
                code: "00031".into(),
                label: "非効果的気道浄化".into(),
                definition: "気道から分泌物を除去できない状態".into(),
                defining_characteristics: "呼吸困難|咳嗽|喘鳴".into(),
                related_factors: "分泌物貯留".into(),
                priority_hint: "呼吸".into(),
                primary_focus: "気道".into(),
                diagnosis_state: "問題焦点型".into(),
                ..Default::default()
            },
            DiagnosisDefinition {
                code: "00095".into(),
                label: "不眠".into(),
                definition: "睡眠の量と質が阻害された状態".into(),
                defining_characteristics: "入眠困難|中途覚醒".into(),
                primary_focus: "睡眠".into(),
                diagnosis_state: "問題焦点型".into(),
                ..Default::default()
            },
            DiagnosisDefinition {
                code: "00209".into(),
                label: "母体胎児二者関係混乱リスク状態".into(),
                definition: "妊娠に伴う子宮内環境の変化の状態".into(),
                risk_factors: "妊娠合併症".into(),
                diagnosis_state: "リスク型".into(),
                ..Default::default()
            },
        ]
    }

    fn offline_gateway() -> ClassifierGateway<MockChatModel> {
        ClassifierGateway::new(MockChatModel::offline(), ResponseCache::in_memory(), 0, 1500)
    }

    fn rank(text: &str) -> RankOutcome {
        let defs = catalogue();
        let space = lexical::index::build_space(&defs);
        let input = AssessmentInput::from_text(text);
        rank_candidates(
            &input,
            &defs,
            &space,
            &offline_gateway(),
            &EngineConfig::default(),
        )
    }

    #[test]
    fn respiratory_note_ranks_respiratory_first() {
        let outcome = rank("78歳 男性。SpO2 88%、呼吸困難と咳嗽あり。");
        assert_eq!(outcome.all.len(), 3);
        assert_eq!(outcome.all[0].code, "00031");
        assert!(outcome.all[0].rule_raw_score > 0.0);
        assert!(outcome.all[0].is_related);
        assert_eq!(outcome.all[0].rank, 1);
    }

    #[test]
    fn sex_filter_excludes_in_strict_mode() {
        let outcome = rank("78歳 男性。SpO2 88%、呼吸困難と咳嗽あり。");
        let maternal = outcome.all.iter().find(|c| c.code == "00209").unwrap();
        assert!(!maternal.eligibility.sex.passed);
        assert!(!maternal.is_related);
        assert!(outcome.visible.iter().all(|c| c.code != "00209"));
    }

    #[test]
    fn offline_run_is_complete_and_ordered() {
        let outcome = rank("呼吸困難あり");
        assert!(!outcome.classifier_online);
        assert!(!outcome.all.is_empty());
        for c in &outcome.all {
            assert_eq!(c.coarse_score, 0.0);
            assert_eq!(c.fine_score, 0.0);
        }
        let ranks: Vec<usize> = outcome.all.iter().map(|c| c.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn visibility_falls_back_to_top_fraction() {
        // A note matching nothing: no candidate is related, yet the
        // reviewer still sees the top of the list.
        let outcome = rank("散歩を楽しんだ");
        assert!(!outcome.visible.is_empty());
        assert!(outcome.visible.len() >= 3.min(outcome.all.len()));
    }

    #[test]
    fn score_decomposition_holds_for_every_candidate() {
        let cfg = EngineConfig::default();
        let outcome = rank("78歳 男性。SpO2 88%、呼吸困難と咳嗽あり。");
        for c in &outcome.all {
            let bonus = if c.eligibility.category.passed && !c.eligibility.category_overlap.is_empty()
            {
                cfg.weights.category_match
            } else {
                0.0
            };
            let expected = cfg.weights.fine * c.fine_score
                + cfg.weights.coarse * c.coarse_score
                + cfg.weights.definition_similarity * c.definition_similarity
                + c.rule_raw_score
                + bonus
                - c.penalty_total();
            assert!(
                (c.total_score - expected).abs() < 1e-9,
                "decomposition broke for {}",
                c.code
            );
        }
    }

    #[test]
    fn online_classifier_scores_feed_totals() {
        let defs = catalogue();
        let space = lexical::index::build_space(&defs);
        let input = AssessmentInput::from_text("SpO2 88%、呼吸困難と咳嗽あり。");
        let gateway = ClassifierGateway::new(
            MockChatModel::always(r#"{"score": 0.9}"#),
            ResponseCache::in_memory(),
            0,
            1500,
        );
        let outcome = rank_candidates(&input, &defs, &space, &gateway, &EngineConfig::default());
        assert!(outcome.classifier_online);
        let top = &outcome.all[0];
        assert!(top.coarse_score > 0.0);
        // Coarse 0.9 puts the top candidate in the fine pool, so the fine
        // score is populated too.
        assert!(top.fine_score > 0.0);
        assert!(top.is_related);
    }

    #[test]
    fn empty_catalogue_yields_empty_outcome() {
        let defs: Vec<DiagnosisDefinition> = Vec::new();
        let space = lexical::index::build_space(&defs);
        let input = AssessmentInput::from_text("呼吸困難");
        let outcome = rank_candidates(
            &input,
            &defs,
            &space,
            &offline_gateway(),
            &EngineConfig::default(),
        );
        assert!(outcome.all.is_empty());
        assert!(outcome.visible.is_empty());
    }
}
