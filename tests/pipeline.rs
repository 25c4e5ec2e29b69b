//! End-to-end pipeline scenarios: catalogue → assessment → ranking, with
//! the classifier mocked online, offline, or misbehaving.

use mitate::assessment::AssessmentInput;
use mitate::catalog::{load_catalogue, DiagnosisDefinition};
use mitate::classifier::{ClassifierGateway, MockChatModel, ResponseCache};
use mitate::config::EngineConfig;
use mitate::engine::rank_candidates;
use mitate::lexical::{self, load_or_build_space};
use mitate::text::normalize::normalize;

fn catalogue() -> Vec<DiagnosisDefinition> {
    vec![
        DiagnosisDefinition {
            code: "00031".into(),
            label: "非効果的気道浄化".into(),
            definition: "気道から分泌物を除去できず気道が開存しない状態".into(),
            defining_characteristics: "呼吸困難|咳嗽|喘鳴|SpO2低下".into(),
            related_factors: "分泌物貯留|気道攣縮".into(),
            priority_hint: "呼吸・循環".into(),
            primary_focus: "気道".into(),
            diagnosis_state: "問題焦点型".into(),
            ..Default::default()
        },
        DiagnosisDefinition {
            code: "00132".into(),
            label: "急性疼痛".into(),
            definition: "実在または潜在する組織損傷に伴う不快な感覚体験".into(),
            defining_characteristics: "疼痛の訴え|防御的行動".into(),
            related_factors: "損傷因子".into(),
            primary_focus: "疼痛".into(),
            diagnosis_state: "問題焦点型".into(),
            ..Default::default()
        },
        DiagnosisDefinition {
            code: "00221".into(),
            label: "非効果的出産育児行動".into(),
            definition: "妊娠中の子宮収縮と産褥期の適応が阻害された状態".into(),
            risk_factors: "妊娠合併症".into(),
            diagnosis_state: "リスク型".into(),
            ..Default::default()
        },
        DiagnosisDefinition {
            code: "00095".into(),
            label: "不眠".into(),
            definition: "睡眠の量と質が阻害され活動が損なわれる状態".into(),
            defining_characteristics: "入眠困難|中途覚醒".into(),
            primary_focus: "睡眠".into(),
            diagnosis_state: "問題焦点型".into(),
            ..Default::default()
        },
    ]
}

fn offline_gateway() -> ClassifierGateway<MockChatModel> {
    ClassifierGateway::new(MockChatModel::offline(), ResponseCache::in_memory(), 0, 1500)
}

const RESPIRATORY_NOTE: &str = "78歳 男性。SpO2 88%、血圧 85/50、呼吸困難と咳嗽あり。";

#[test]
fn normalization_is_idempotent_over_clinical_text() {
    for s in [RESPIRATORY_NOTE, "ＳｐＯ２　８８％", "発熱なし", ""] {
        let once = normalize(s);
        assert_eq!(normalize(&once), once);
    }
}

#[test]
fn clean_respiratory_case_ranks_first_with_rule_bonus() {
    let defs = catalogue();
    let space = lexical::index::build_space(&defs);
    let input = AssessmentInput::from_text(RESPIRATORY_NOTE);
    let outcome = rank_candidates(&input, &defs, &space, &offline_gateway(), &EngineConfig::default());

    let top = &outcome.all[0];
    assert_eq!(top.code, "00031");
    assert!(top.rule_raw_score > 0.0);
    assert!(top.is_related);
    // SpO2 88 < 90 and MAP = (85 + 2·50)/3 ≈ 61.7 < 65 both cross their
    // danger thresholds, so both hint bonuses annotate the reasons.
    assert!(top.reasons.iter().any(|r| r.contains("SpO2<90")));
    assert!(top.reasons.iter().any(|r| r.contains("MAP<65")));
    assert!(top
        .evidence
        .defining_characteristics
        .contains(&"呼吸困難".to_string()));
}

#[test]
fn sex_filter_excludes_uterine_diagnosis_for_male_profile() {
    let defs = catalogue();
    let space = lexical::index::build_space(&defs);
    let input = AssessmentInput::from_text(RESPIRATORY_NOTE);
    let outcome = rank_candidates(&input, &defs, &space, &offline_gateway(), &EngineConfig::default());

    let maternal = outcome.all.iter().find(|c| c.code == "00221").unwrap();
    assert!(!maternal.eligibility.sex.passed);
    assert!(maternal.eligibility.sex.reason.is_some());
    assert!(!maternal.is_related);
    assert!(outcome.visible.iter().all(|c| c.code != "00221"));
}

#[test]
fn offline_classifier_still_yields_ordered_nonempty_list() {
    let defs = catalogue();
    let space = lexical::index::build_space(&defs);
    let cfg = EngineConfig::default();
    let input = AssessmentInput::from_text(RESPIRATORY_NOTE);
    let outcome = rank_candidates(&input, &defs, &space, &offline_gateway(), &cfg);

    assert!(!outcome.classifier_online);
    assert!(!outcome.visible.is_empty());
    assert_eq!(outcome.all.len(), defs.len());

    for c in &outcome.all {
        assert_eq!(c.coarse_score, 0.0);
        assert_eq!(c.fine_score, 0.0);

        // With both classifier terms zeroed the documented decomposition
        // reduces to the cheap signals exactly.
        let bonus = if c.eligibility.category.passed && !c.eligibility.category_overlap.is_empty() {
            cfg.weights.category_match
        } else {
            0.0
        };
        let expected = cfg.weights.definition_similarity * c.definition_similarity
            + c.rule_raw_score
            + bonus
            - c.penalty_total();
        assert!((c.total_score - expected).abs() < 1e-9);
    }

    // Ranks are a 1-based total order.
    let ranks: Vec<usize> = outcome.all.iter().map(|c| c.rank).collect();
    assert_eq!(ranks, (1..=defs.len()).collect::<Vec<_>>());
}

#[test]
fn negated_finding_recorded_but_not_scored() {
    let defs = vec![DiagnosisDefinition {
        code: "00007".into(),
        label: "高体温".into(),
        definition: "体温が正常範囲を超えて上昇した状態".into(),
        defining_characteristics: "発熱|皮膚紅潮".into(),
        diagnosis_state: "問題焦点型".into(),
        ..Default::default()
    }];
    let space = lexical::index::build_space(&defs);
    let input = AssessmentInput::from_text("発熱なし、バイタル安定。");
    let outcome = rank_candidates(&input, &defs, &space, &offline_gateway(), &EngineConfig::default());

    let c = &outcome.all[0];
    assert!(c.evidence.defining_characteristics.is_empty());
    assert_eq!(c.rule_raw_score, 0.0);
    assert!(c.reasons.iter().any(|r| r.contains("正常/陰性")));
}

#[test]
fn cosine_bounds_hold_across_the_catalogue() {
    let defs = catalogue();
    let space = lexical::index::build_space(&defs);
    for a in &space.vectors {
        assert!((lexical::cosine(a, a) - 1.0).abs() < 1e-9);
        for b in &space.vectors {
            let s = lexical::cosine(a, b);
            assert!((0.0..=1.0 + 1e-9).contains(&s));
        }
    }
}

#[test]
fn strict_pass_implies_permissive_pass_end_to_end() {
    let defs = catalogue();
    let space = lexical::index::build_space(&defs);
    let input = AssessmentInput::from_text(RESPIRATORY_NOTE);

    let strict_cfg = EngineConfig::default();
    let mut permissive_cfg = EngineConfig::default();
    permissive_cfg.filters.strict_sex = false;
    permissive_cfg.filters.strict_age = false;
    permissive_cfg.filters.strict_care_target = false;
    permissive_cfg.filters.strict_category = false;

    let strict = rank_candidates(&input, &defs, &space, &offline_gateway(), &strict_cfg);
    let permissive = rank_candidates(&input, &defs, &space, &offline_gateway(), &permissive_cfg);

    for s in &strict.all {
        if s.eligibility.all_passed() {
            let p = permissive.all.iter().find(|c| c.code == s.code).unwrap();
            assert!(p.eligibility.all_passed());
        }
    }
}

#[test]
fn classifier_answers_flow_into_scores_and_cache() {
    let defs = catalogue();
    let space = lexical::index::build_space(&defs);
    let input = AssessmentInput::from_text(RESPIRATORY_NOTE);
    let cfg = EngineConfig::default();

    let gateway = ClassifierGateway::new(
        MockChatModel::always(
            r#"{"matched":{"診断指標":["呼吸困難"],"関連因子":[],"危険因子":[]},"score":0.88}"#,
        ),
        ResponseCache::in_memory(),
        0,
        1500,
    );
    let outcome = rank_candidates(&input, &defs, &space, &gateway, &cfg);
    assert!(outcome.classifier_online);

    let top = &outcome.all[0];
    assert_eq!(top.code, "00031");
    assert!((top.coarse_score - 0.88).abs() < 1e-9);
    assert!(top.fine_score > 0.0);
    assert!(top
        .semantic_evidence
        .defining_characteristics
        .contains(&"呼吸困難".to_string()));

    // A second identical run is answered from the cache alone.
    let calls_after_first = gateway_calls(&gateway);
    let again = rank_candidates(&input, &defs, &space, &gateway, &cfg);
    assert_eq!(gateway_calls(&gateway), calls_after_first);
    assert!((again.all[0].total_score - outcome.all[0].total_score).abs() < 1e-9);
}

fn gateway_calls(gateway: &ClassifierGateway<MockChatModel>) -> usize {
    gateway.chat_model().call_count()
}

#[test]
fn catalogue_cache_survives_runs() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("diagnosis_db.csv");
    std::fs::write(
        &source,
        "コード,診断名,定義,診断指標\n00031,非効果的気道浄化,気道から分泌物を除去できない状態,咳嗽|喘鳴\n",
    )
    .unwrap();
    let rows_cache = dir.path().join("rows.json");
    let vec_cache = dir.path().join("vectors.json");

    let (defs, sig) = load_catalogue(&source, &rows_cache).unwrap();
    let space = load_or_build_space(&defs, &sig, &vec_cache);
    assert_eq!(space.vectors.len(), defs.len());
    assert!(rows_cache.exists());
    assert!(vec_cache.exists());

    let (defs2, sig2) = load_catalogue(&source, &rows_cache).unwrap();
    assert_eq!(sig, sig2);
    assert_eq!(defs.len(), defs2.len());
}
