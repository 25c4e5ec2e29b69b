//! Cache-backed gateway over the semantic classifier.
//!
//! The two public operations never fail: any connection, timeout or parse
//! problem degrades that one score to 0 (with empty evidence for the fine
//! stage) and is logged. Successful answers populate the cache; failures
//! do not, so a later run may still get a real answer.

use super::cache::{self, FineRecord, ResponseCache};
use super::ollama::ChatModel;
use super::parse;
use super::prompt::{self, ClassifyRequest};

pub use super::cache::FineEvidence;

pub struct ClassifierGateway<M: ChatModel> {
    model: M,
    cache: ResponseCache,
    retry: u32,
    snippet_chars: usize,
}

impl<M: ChatModel> ClassifierGateway<M> {
    pub fn new(model: M, cache: ResponseCache, retry: u32, snippet_chars: usize) -> Self {
        Self {
            model,
            cache,
            retry,
            snippet_chars,
        }
    }

    /// Reachability of the underlying service, for run metadata and stage
    /// skipping. Cached answers are served even when this is false.
    pub fn is_online(&self) -> bool {
        self.model.is_available()
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// The underlying chat model (tests assert on mock call counts).
    pub fn chat_model(&self) -> &M {
        &self.model
    }

    /// Persist the response cache (no-op for in-memory caches).
    pub fn save_cache(&self) {
        self.cache.save();
    }

    /// Does the diagnosis plausibly match the assessment at all?
    pub fn classify_coarse(&self, assessment: &str, label: &str, definition: &str) -> f64 {
        let key = cache::coarse_key(self.model.model_name(), assessment, label, definition);
        if let Some(score) = self.cache.coarse_get(&key) {
            return score;
        }
        if !self.model.is_available() {
            return 0.0;
        }

        let snippet = prompt::trim_assessment(assessment, self.snippet_chars);
        let request = prompt::coarse_request(&snippet, label, definition);
        let Some(value) = self.ask(&request, label) else {
            return 0.0;
        };
        let score = parse::score_of(&value);
        self.cache.coarse_put(key, score);
        score
    }

    /// Strict semantic match plus which terms are semantically present.
    pub fn classify_fine(
        &self,
        assessment: &str,
        label: &str,
        definition: &str,
        dc_terms: &[String],
        rf_terms: &[String],
        rk_terms: &[String],
    ) -> (f64, FineEvidence) {
        let key = cache::fine_key(
            self.model.model_name(),
            assessment,
            label,
            definition,
            dc_terms,
            rf_terms,
            rk_terms,
        );
        if let Some(record) = self.cache.fine_get(&key) {
            return (record.score, record.evidence);
        }
        if !self.model.is_available() {
            return (0.0, FineEvidence::default());
        }

        let snippet = prompt::trim_assessment(assessment, self.snippet_chars);
        let request = prompt::fine_request(&snippet, label, definition, dc_terms, rf_terms, rk_terms);
        let Some(value) = self.ask(&request, label) else {
            return (0.0, FineEvidence::default());
        };

        let score = parse::score_of(&value);
        let evidence = FineEvidence {
            defining_characteristics: parse::matched_terms(&value, "診断指標"),
            related_factors: parse::matched_terms(&value, "関連因子"),
            risk_factors: parse::matched_terms(&value, "危険因子"),
        };
        self.cache.fine_put(
            key,
            FineRecord {
                score,
                evidence: evidence.clone(),
            },
        );
        (score, evidence)
    }

    /// One request with retries and lenient parsing. `None` means every
    /// attempt failed; the caller substitutes the stage default.
    fn ask(&self, request: &ClassifyRequest, label: &str) -> Option<serde_json::Value> {
        for attempt in 0..=self.retry {
            match self.model.chat(request.system, &request.user) {
                Ok(raw) => {
                    if let Some(value) = parse::extract_json(&raw) {
                        return Some(value);
                    }
                    tracing::debug!(label, attempt, "classifier output unparsable");
                }
                Err(e) => {
                    tracing::debug!(label, attempt, error = %e, "classifier call failed");
                }
            }
            if attempt < self.retry {
                std::thread::sleep(std::time::Duration::from_millis(300 * (attempt as u64 + 1)));
            }
        }
        tracing::warn!(label, "classification degraded to 0 after retries");
        None
    }
}
