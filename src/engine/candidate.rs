//! The scored pairing of one diagnosis with one assessment.

use serde::{Deserialize, Serialize};

use crate::catalog::DiagnosisDefinition;
use crate::classifier::FineEvidence;
use crate::filters::{Eligibility, Penalty};
use crate::rules::MatchedEvidence;

/// Catalogue columns echoed into the record so the review step can render
/// full detail without re-reading the catalogue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogueMeta {
    pub primary_focus: String,
    pub secondary_focus: String,
    pub care_target: String,
    pub anatomical_site: String,
    pub age_min: String,
    pub age_max: String,
    pub clinical_course: String,
    pub diagnosis_state: String,
    pub situational_constraints: String,
    pub domain: String,
    pub class: String,
    pub judge: String,
    pub priority_hint: String,
}

impl CatalogueMeta {
    pub fn of(def: &DiagnosisDefinition) -> Self {
        Self {
            primary_focus: def.primary_focus.clone(),
            secondary_focus: def.secondary_focus.clone(),
            care_target: def.care_target.clone(),
            anatomical_site: def.anatomical_site.clone(),
            age_min: def.age_min.clone(),
            age_max: def.age_max.clone(),
            clinical_course: def.clinical_course.clone(),
            diagnosis_state: def.diagnosis_state.clone(),
            situational_constraints: def.situational_constraints.clone(),
            domain: def.domain.clone(),
            class: def.class.clone(),
            judge: def.judge.clone(),
            priority_hint: def.priority_hint.clone(),
        }
    }

    /// `(label, value)` pairs for the non-empty columns, in render order.
    pub fn labelled_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("一次焦点", self.primary_focus.as_str()),
            ("二次焦点", self.secondary_focus.as_str()),
            ("ケア対象", self.care_target.as_str()),
            ("解剖学的部位", self.anatomical_site.as_str()),
            ("年齢下限", self.age_min.as_str()),
            ("年齢上限", self.age_max.as_str()),
            ("臨床経過", self.clinical_course.as_str()),
            ("診断の状態", self.diagnosis_state.as_str()),
            ("状況的制約", self.situational_constraints.as_str()),
            ("領域", self.domain.as_str()),
            ("分類", self.class.as_str()),
            ("判断", self.judge.as_str()),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .collect()
    }
}

/// One fully scored candidate. Recomputed from scratch every run; nothing
/// here persists across runs except through the response cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub code: String,
    pub label: String,
    pub definition: String,

    /// Cosine similarity of definition prose to the note, 0–1.
    pub definition_similarity: f64,
    /// Weighted rule score; non-negative, unbounded.
    pub rule_raw_score: f64,
    /// Coarse classifier score; 0 when the stage never ran for this row.
    pub coarse_score: f64,
    /// Fine classifier score; 0 when the stage never ran for this row.
    pub fine_score: f64,

    /// What the rule matcher found, by category.
    pub evidence: MatchedEvidence,
    /// What the fine classifier reported as semantically present.
    pub semantic_evidence: FineEvidence,

    pub eligibility: Eligibility,
    pub penalties: Vec<Penalty>,
    /// Weighted sum of all signals minus penalties.
    pub total_score: f64,
    /// Whether the candidate clears the "worth showing a human" bar.
    pub is_related: bool,
    /// 1-based position after sorting; 0 until assigned.
    pub rank: usize,

    /// Human-readable annotations: match notes, filter verdicts, penalties.
    pub reasons: Vec<String>,

    pub meta: CatalogueMeta,
}

impl Candidate {
    pub fn penalty_total(&self) -> f64 {
        self.penalties.iter().map(|p| p.amount).sum()
    }
}
