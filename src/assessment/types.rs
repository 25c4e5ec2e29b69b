//! The immutable per-run view of one assessment note.
//!
//! Everything derivable from the free text (demographics, vitals, care
//! settings, topical categories) is computed exactly once here and then
//! passed by reference through the whole pipeline — no stage re-parses the
//! note or mutates shared state.

use std::collections::BTreeSet;

use serde::Serialize;

use super::{context, demographics, vitals};
use crate::text::normalize::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct Demographics {
    pub sex: Sex,
    pub age: Option<u32>,
    /// Any mention of family/caregiver involvement in the note.
    pub has_family_involvement: bool,
}

/// Vital signs picked out of the note. Absent or unparsable values stay
/// `None` — never zero.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Vitals {
    pub temperature: Option<f64>,
    pub heart_rate: Option<f64>,
    pub respiratory_rate: Option<f64>,
    pub spo2: Option<f64>,
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
    /// (SBP + 2·DBP) / 3, derived when both pressures are present.
    pub mean_arterial_pressure: Option<f64>,
    /// Numeric pain-scale (NRS) mention, 0–10.
    pub pain_score: Option<f64>,
}

/// One assessment note plus everything derived from it.
#[derive(Debug, Clone)]
pub struct AssessmentInput {
    /// Raw assembled text (assessment body plus optional S/O sections).
    pub text: String,
    /// Canonical matching form of `text`.
    pub normalized: String,
    pub demographics: Demographics,
    pub vitals: Vitals,
    /// Care-context tags present in the text (ICU, 在宅, 術後, …).
    pub settings: BTreeSet<String>,
    /// Topical categories present in the text (呼吸, 循環, 疼痛, …).
    pub categories: BTreeSet<String>,
}

impl AssessmentInput {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            normalized: normalize(&text),
            demographics: demographics::parse(&text),
            vitals: vitals::parse(&text),
            settings: context::care_settings_in(&text),
            categories: context::categories_in(&text),
            text,
        }
    }
}
