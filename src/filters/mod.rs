//! Hard eligibility filters and soft penalties.
//!
//! Hard filters decide whether a diagnosis may appear in the eligible pool
//! at all; each returns a pass/fail plus a human-readable reason for the
//! audit trail. A permissive policy degrades a failure to a pass while
//! keeping the reason, so permissive mode never excludes anything strict
//! mode would keep. Penalties subtract from the total score instead of
//! excluding.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::assessment::{AssessmentInput, Sex};
use crate::assessment::context::{categories_of_definition, settings_of_definition};
use crate::catalog::{DiagnosisDefinition, DiagnosisState};
use crate::config::{FilterPolicy, ScoreWeights};
use crate::text::normalize::normalize;

static FEMALE_SPECIFIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"子宮|卵巣|膣|会陰|産褥|授乳|母乳|乳房|乳腺|妊娠|産科").expect("female pattern")
});
static MALE_SPECIFIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"前立腺|精巣|陰嚢").expect("male pattern"));
static FAMILY_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"家族|介護者|保護者|親|配偶者").expect("family target pattern"));
static RESPIRATORY_TOPIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"呼吸|酸素|気道|SpO2|息切|喘").expect("respiratory topic"));
static RESPIRATORY_NOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"呼吸|息|spo2|喘|rr").expect("respiratory note vocabulary"));
static PAIN_TOPIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"痛|疼痛|pain").expect("pain topic"));
static PAIN_NOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"痛|nrs|鎮痛").expect("pain note vocabulary"));

/// One hard-filter verdict. `passed` already reflects the policy; the
/// reason survives either way for the audit trail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterCheck {
    pub passed: bool,
    pub reason: Option<String>,
}

impl FilterCheck {
    fn pass() -> Self {
        Self {
            passed: true,
            reason: None,
        }
    }

    fn fail_unless_permissive(strict: bool, reason: String) -> Self {
        Self {
            passed: !strict,
            reason: Some(reason),
        }
    }
}

/// All four hard-filter verdicts for one candidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Eligibility {
    pub sex: FilterCheck,
    pub age: FilterCheck,
    pub care_target: FilterCheck,
    pub category: FilterCheck,
    /// Categories shared between note and diagnosis, when any.
    pub category_overlap: Vec<String>,
}

impl Eligibility {
    pub fn all_passed(&self) -> bool {
        self.sex.passed && self.age.passed && self.care_target.passed && self.category.passed
    }

    pub fn reasons(&self) -> impl Iterator<Item = (&FilterCheck, &'static str)> {
        [
            (&self.sex, "性別"),
            (&self.age, "年齢"),
            (&self.care_target, "ケア対象"),
            (&self.category, "カテゴリ"),
        ]
        .into_iter()
        .filter(|(check, _)| check.reason.is_some())
    }
}

/// A soft score deduction with its reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Penalty {
    pub amount: f64,
    pub reason: String,
}

/// Sex-specific anatomy/physiology vs the patient's recorded sex.
/// Unknown sex always passes.
pub fn check_sex(def: &DiagnosisDefinition, input: &AssessmentInput, policy: &FilterPolicy) -> FilterCheck {
    let text = format!("{} {} {}", def.label, def.definition, def.anatomical_site);
    let female = FEMALE_SPECIFIC.is_match(&text);
    let male = MALE_SPECIFIC.is_match(&text);
    match input.demographics.sex {
        Sex::Male if female => {
            FilterCheck::fail_unless_permissive(policy.strict_sex, "男性×女性特異診断".into())
        }
        Sex::Female if male => {
            FilterCheck::fail_unless_permissive(policy.strict_sex, "女性×男性特異診断".into())
        }
        _ => FilterCheck::pass(),
    }
}

/// Declared age bounds vs the patient's age. Either side unknown passes.
pub fn check_age(def: &DiagnosisDefinition, input: &AssessmentInput, policy: &FilterPolicy) -> FilterCheck {
    let Some(age) = input.demographics.age else {
        return FilterCheck::pass();
    };
    if let Some(min) = def.age_min() {
        if age < min {
            return FilterCheck::fail_unless_permissive(
                policy.strict_age,
                format!("年齢{age}<最小{min}"),
            );
        }
    }
    if let Some(max) = def.age_max() {
        if age > max {
            return FilterCheck::fail_unless_permissive(
                policy.strict_age,
                format!("年齢{age}>最大{max}"),
            );
        }
    }
    FilterCheck::pass()
}

/// Family/caregiver-focused diagnoses need family involvement in the note.
pub fn check_care_target(
    def: &DiagnosisDefinition,
    input: &AssessmentInput,
    policy: &FilterPolicy,
) -> FilterCheck {
    let target = def.care_target.trim();
    if target.is_empty() {
        return FilterCheck::pass();
    }
    if FAMILY_TARGET.is_match(target) && !input.demographics.has_family_involvement {
        return FilterCheck::fail_unless_permissive(
            policy.strict_care_target,
            "ケア対象が家族だが本文に家族介入記載なし".into(),
        );
    }
    FilterCheck::pass()
}

/// Topical category overlap. Fails only when both sides resolve to at
/// least one category and the sets are disjoint; returns the overlap for
/// the category-match bonus.
pub fn check_category(
    def: &DiagnosisDefinition,
    input: &AssessmentInput,
    policy: &FilterPolicy,
) -> (FilterCheck, Vec<String>) {
    let def_cats = categories_of_definition(def);
    if input.categories.is_empty() || def_cats.is_empty() {
        return (FilterCheck::pass(), Vec::new());
    }
    let overlap: Vec<String> = input.categories.intersection(&def_cats).cloned().collect();
    if !overlap.is_empty() {
        let check = FilterCheck {
            passed: true,
            reason: Some(format!("カテゴリ一致({})", overlap.join(", "))),
        };
        return (check, overlap);
    }
    let reason = format!(
        "カテゴリ不一致(本文:{} vs 候補:{})",
        join_set(&input.categories),
        join_set(&def_cats)
    );
    (
        FilterCheck::fail_unless_permissive(policy.strict_category, reason),
        Vec::new(),
    )
}

/// Run all four hard filters.
pub fn check_eligibility(
    def: &DiagnosisDefinition,
    input: &AssessmentInput,
    policy: &FilterPolicy,
) -> Eligibility {
    let (category, category_overlap) = check_category(def, input, policy);
    Eligibility {
        sex: check_sex(def, input, policy),
        age: check_age(def, input, policy),
        care_target: check_care_target(def, input, policy),
        category,
        category_overlap,
    }
}

/// Setting-mismatch penalty: the diagnosis implies care settings the note
/// does not show.
pub fn setting_penalty(
    def: &DiagnosisDefinition,
    input: &AssessmentInput,
    weights: &ScoreWeights,
) -> Option<Penalty> {
    let required = settings_of_definition(def);
    if required.is_empty() {
        return None;
    }
    let missing: Vec<&String> = required.difference(&input.settings).collect();
    if missing.is_empty() {
        return None;
    }
    Some(Penalty {
        amount: weights.penalty_setting_mismatch,
        reason: format!(
            "場面根拠弱({})",
            missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        ),
    })
}

/// Weak-evidence penalty: a risk-type diagnosis with no affirmed risk
/// factors, or a problem-focused one with no affirmed defining
/// characteristics. Hit counts include fine-classifier evidence.
pub fn weak_evidence_penalty(
    def: &DiagnosisDefinition,
    dc_hits: usize,
    rk_hits: usize,
    weights: &ScoreWeights,
) -> Option<Penalty> {
    match def.state() {
        DiagnosisState::RiskType if rk_hits < 1 => Some(Penalty {
            amount: weights.penalty_weak_evidence,
            reason: format!("危険因子ヒット弱({rk_hits}/1)"),
        }),
        DiagnosisState::ProblemFocused if dc_hits < 1 => Some(Penalty {
            amount: weights.penalty_weak_evidence,
            reason: format!("診断指標ヒット弱({dc_hits}/1)"),
        }),
        _ => None,
    }
}

/// Contradiction penalty: the diagnosis concerns respiration or pain but
/// the note carries no related vocabulary and the vitals look normal.
pub fn contradiction_penalty(
    def: &DiagnosisDefinition,
    input: &AssessmentInput,
    weights: &ScoreWeights,
) -> Option<Penalty> {
    let topic = format!("{} {}", def.label, def.definition);
    let note = &input.normalized;
    let v = &input.vitals;

    if RESPIRATORY_TOPIC.is_match(&topic) {
        let no_vocabulary = !RESPIRATORY_NOTE.is_match(note);
        let spo2_ok = matches!(v.spo2, Some(s) if s >= 95.0);
        let rr_ok = matches!(v.respiratory_rate, Some(r) if (12.0..=20.0).contains(&r));
        if no_vocabulary && (spo2_ok || rr_ok) {
            return Some(Penalty {
                amount: weights.penalty_contradiction,
                reason: "呼吸所見/語彙が弱く矛盾".into(),
            });
        }
    }
    if PAIN_TOPIC.is_match(&normalize(&topic)) && !PAIN_NOTE.is_match(note) {
        return Some(Penalty {
            amount: weights.penalty_contradiction,
            reason: "疼痛所見/語彙が弱い".into(),
        });
    }
    None
}

fn join_set(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn input(text: &str) -> AssessmentInput {
        AssessmentInput::from_text(text)
    }

    fn policy() -> FilterPolicy {
        FilterPolicy::default()
    }

    #[test]
    fn female_specific_diagnosis_fails_for_male() {
        let def = DiagnosisDefinition {
            label: "非効果的母乳栄養".into(),
            definition: "子宮復古に関連する状態".into(),
            ..Default::default()
        };
        let check = check_sex(&def, &input("70歳 男性"), &policy());
        assert!(!check.passed);
        assert!(check.reason.is_some());
    }

    #[test]
    fn unknown_sex_always_passes() {
        let def = DiagnosisDefinition {
            definition: "子宮の状態".into(),
            ..Default::default()
        };
        let check = check_sex(&def, &input("呼吸困難あり"), &policy());
        assert!(check.passed);
    }

    #[test]
    fn permissive_sex_filter_records_reason_but_passes() {
        let def = DiagnosisDefinition {
            definition: "子宮の状態".into(),
            ..Default::default()
        };
        let permissive = FilterPolicy {
            strict_sex: false,
            ..FilterPolicy::default()
        };
        let check = check_sex(&def, &input("70歳 男性"), &permissive);
        assert!(check.passed);
        assert!(check.reason.is_some());
    }

    #[test]
    fn age_bounds_enforced_when_both_known() {
        let def = DiagnosisDefinition {
            age_min: "65".into(),
            ..Default::default()
        };
        assert!(!check_age(&def, &input("40歳 男性"), &policy()).passed);
        assert!(check_age(&def, &input("70歳 男性"), &policy()).passed);
        // Unknown patient age passes.
        assert!(check_age(&def, &input("男性"), &policy()).passed);
    }

    #[test]
    fn family_care_target_needs_family_mention() {
        let def = DiagnosisDefinition {
            care_target: "家族".into(),
            ..Default::default()
        };
        assert!(!check_care_target(&def, &input("独居の男性"), &policy()).passed);
        assert!(check_care_target(&def, &input("妻が介護中"), &policy()).passed);
    }

    #[test]
    fn disjoint_categories_fail_only_when_both_resolve() {
        let sleep_def = DiagnosisDefinition {
            label: "不眠".into(),
            primary_focus: "睡眠".into(),
            ..Default::default()
        };
        let (check, overlap) = check_category(&sleep_def, &input("SpO2 88% 呼吸困難"), &policy());
        assert!(!check.passed);
        assert!(overlap.is_empty());

        // A note with no resolved category passes permissively.
        let (check, _) = check_category(&sleep_def, &input("特記なし"), &policy());
        assert!(check.passed);
    }

    #[test]
    fn category_overlap_reports_match() {
        let def = DiagnosisDefinition {
            label: "非効果的気道浄化".into(),
            primary_focus: "気道".into(),
            ..Default::default()
        };
        let (check, overlap) = check_category(&def, &input("呼吸困難 SpO2 88%"), &policy());
        assert!(check.passed);
        assert_eq!(overlap, vec!["呼吸".to_string()]);
        assert!(check.reason.unwrap().contains("カテゴリ一致"));
    }

    #[test]
    fn strict_pass_implies_permissive_pass() {
        // Filter monotonicity: anything strict admits, permissive admits.
        let defs = [
            DiagnosisDefinition {
                definition: "子宮の状態".into(),
                ..Default::default()
            },
            DiagnosisDefinition {
                age_min: "18".into(),
                ..Default::default()
            },
            DiagnosisDefinition {
                care_target: "家族".into(),
                primary_focus: "睡眠".into(),
                ..Default::default()
            },
        ];
        let strict = FilterPolicy::default();
        let permissive = FilterPolicy {
            strict_sex: false,
            strict_age: false,
            strict_care_target: false,
            strict_category: false,
        };
        let note = input("45歳 女性。家族の支援あり。呼吸困難。");
        for def in &defs {
            let s = check_eligibility(def, &note, &strict);
            let p = check_eligibility(def, &note, &permissive);
            if s.all_passed() {
                assert!(p.all_passed());
            }
        }
    }

    #[test]
    fn setting_mismatch_penalized() {
        let w = EngineConfig::default().weights;
        let def = DiagnosisDefinition {
            situational_constraints: "人工呼吸器管理下".into(),
            ..Default::default()
        };
        let p = setting_penalty(&def, &input("在宅で療養中"), &w).unwrap();
        assert!((p.amount - 0.8).abs() < 1e-9);
        assert!(p.reason.contains("ICU"));

        assert!(setting_penalty(&def, &input("ICUで人工呼吸器管理中"), &w).is_none());
    }

    #[test]
    fn weak_evidence_penalty_by_state() {
        let w = EngineConfig::default().weights;
        let risk = DiagnosisDefinition {
            diagnosis_state: "リスク型".into(),
            ..Default::default()
        };
        assert!(weak_evidence_penalty(&risk, 3, 0, &w).is_some());
        assert!(weak_evidence_penalty(&risk, 0, 1, &w).is_none());

        let problem = DiagnosisDefinition {
            diagnosis_state: "問題焦点型".into(),
            ..Default::default()
        };
        assert!(weak_evidence_penalty(&problem, 0, 3, &w).is_some());
        assert!(weak_evidence_penalty(&problem, 1, 0, &w).is_none());
    }

    #[test]
    fn respiratory_contradiction_needs_normal_vitals() {
        let w = EngineConfig::default().weights;
        let def = DiagnosisDefinition {
            label: "ガス交換障害".into(),
            definition: "酸素化の障害".into(),
            ..Default::default()
        };
        // No respiratory vocabulary, normal SpO2 → contradiction.
        let quiet = input("食欲良好。SpO2 97%。");
        // SpO2 mention is respiratory vocabulary — the note itself talks
        // about respiration, so no contradiction.
        assert!(contradiction_penalty(&def, &quiet, &w).is_none());

        let silent = AssessmentInput {
            vitals: crate::assessment::Vitals {
                spo2: Some(97.0),
                ..Default::default()
            },
            ..input("食欲良好。")
        };
        assert!(contradiction_penalty(&def, &silent, &w).is_some());
    }

    #[test]
    fn pain_contradiction_when_no_pain_vocabulary() {
        let w = EngineConfig::default().weights;
        let def = DiagnosisDefinition {
            label: "急性疼痛".into(),
            ..Default::default()
        };
        assert!(contradiction_penalty(&def, &input("食欲良好"), &w).is_some());
        assert!(contradiction_penalty(&def, &input("疼痛の訴えあり"), &w).is_none());
    }
}
