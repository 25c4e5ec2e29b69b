//! Typed catalogue records.
//!
//! One `DiagnosisDefinition` per catalogue row. Cells are kept as the raw
//! (trimmed) strings the source carries — many are free-prose Japanese —
//! and typed accessors parse the few numeric/enumerated fields leniently:
//! an unparsable age bound is "unknown", never zero.

use serde::{Deserialize, Serialize};

/// Whether a diagnosis describes a current problem, a vulnerability, or a
/// readiness to improve. Parsed from the catalogue's free-text state cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosisState {
    ProblemFocused,
    RiskType,
    HealthPromotion,
    Unspecified,
}

/// One catalogue entry. Immutable once loaded; the catalogue is reloaded
/// only when the backing file's signature changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosisDefinition {
    pub code: String,
    pub label: String,
    pub definition: String,
    /// Raw delimited phrase list; split lazily by the rule matcher.
    pub defining_characteristics: String,
    pub related_factors: String,
    pub risk_factors: String,
    pub priority_hint: String,
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
}

impl DiagnosisDefinition {
    /// Lower age bound, if the cell holds a parsable integer.
    pub fn age_min(&self) -> Option<u32> {
        parse_age(&self.age_min)
    }

    /// Upper age bound, if the cell holds a parsable integer.
    pub fn age_max(&self) -> Option<u32> {
        parse_age(&self.age_max)
    }

    pub fn state(&self) -> DiagnosisState {
        let s = &self.diagnosis_state;
        if s.contains("リスク") || s.contains("risk") {
            DiagnosisState::RiskType
        } else if s.contains("問題焦点") || s.contains("problem") {
            DiagnosisState::ProblemFocused
        } else if s.contains("ヘルスプロモーション") || s.contains("promotion") {
            DiagnosisState::HealthPromotion
        } else {
            DiagnosisState::Unspecified
        }
    }

    /// Display code, with the catalogue's placeholder for unnumbered rows.
    pub fn display_code(&self) -> &str {
        let c = self.code.trim();
        if c.is_empty() {
            "00000"
        } else {
            c
        }
    }

    /// Display label, never empty.
    pub fn display_label(&self) -> &str {
        let l = self.label.trim();
        if l.is_empty() {
            "(診断名未設定)"
        } else {
            l
        }
    }
}

fn parse_age(cell: &str) -> Option<u32> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().map(|v| v.max(0.0) as u32)
}
