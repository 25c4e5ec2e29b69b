//! Machine-readable run record.
//!
//! One entry per scored candidate — all of them, not just the shown ones —
//! plus enough run metadata for a downstream reviewer to interpret the
//! scores without this process around.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::engine::Candidate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub generated_at: String,
    pub ranking: String,
    pub classifier_model: String,
    pub classifier_online: bool,
    pub classify_top_k: usize,
    pub coarse_min_pass: f64,
    pub fine_min_pass: f64,
    pub min_definition_similarity_keep: f64,
    pub min_rule_score_keep: f64,
    pub only_related: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunRecord {
    pub meta: RunMeta,
    pub candidates: Vec<Candidate>,
}

impl RunRecord {
    pub fn new(
        candidates: Vec<Candidate>,
        classifier_model: &str,
        classifier_online: bool,
        cfg: &EngineConfig,
    ) -> Self {
        Self {
            meta: RunMeta {
                generated_at: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
                ranking:
                    "score(= fine*Wf + coarse*Wc + def_sim*Wd + rule_raw + bonuses - penalties)"
                        .into(),
                classifier_model: classifier_model.to_string(),
                classifier_online,
                classify_top_k: cfg.classify_top_k,
                coarse_min_pass: cfg.coarse_min_pass,
                fine_min_pass: cfg.fine_min_pass,
                min_definition_similarity_keep: cfg.min_definition_similarity_keep,
                min_rule_score_keep: cfg.min_rule_score_keep,
                only_related: cfg.only_related,
            },
            candidates,
        }
    }

    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Read a record back; missing or corrupt files yield an empty record
    /// so the review step can still render a (stub) result.
    pub fn read_lenient(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_else(|| Self {
                meta: RunMeta {
                    generated_at: String::new(),
                    ranking: String::new(),
                    classifier_model: String::new(),
                    classifier_online: false,
                    classify_top_k: 0,
                    coarse_min_pass: 0.0,
                    fine_min_pass: 0.0,
                    min_definition_similarity_keep: 0.0,
                    min_rule_score_keep: 0.0,
                    only_related: false,
                },
                candidates: Vec::new(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::candidate::CatalogueMeta;

    fn candidate(code: &str, rank: usize) -> Candidate {
        Candidate {
            code: code.into(),
            label: "テスト診断".into(),
            definition: "定義".into(),
            definition_similarity: 0.1,
            rule_raw_score: 1.0,
            coarse_score: 0.0,
            fine_score: 0.0,
            evidence: Default::default(),
            semantic_evidence: Default::default(),
            eligibility: Default::default(),
            penalties: Vec::new(),
            total_score: 1.2,
            is_related: true,
            rank,
            reasons: Vec::new(),
            meta: CatalogueMeta::default(),
        }
    }

    #[test]
    fn record_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candidates.json");
        let record = RunRecord::new(
            vec![candidate("00031", 1), candidate("00095", 2)],
            "mock-model",
            false,
            &EngineConfig::default(),
        );
        record.write(&path).unwrap();

        let loaded = RunRecord::read_lenient(&path);
        assert_eq!(loaded.candidates.len(), 2);
        assert_eq!(loaded.candidates[0].code, "00031");
        assert_eq!(loaded.meta.classifier_model, "mock-model");
        assert!(!loaded.meta.classifier_online);
    }

    #[test]
    fn missing_record_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = RunRecord::read_lenient(&dir.path().join("absent.json"));
        assert!(loaded.candidates.is_empty());
    }
}
