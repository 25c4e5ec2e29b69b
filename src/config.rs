//! Engine configuration.
//!
//! All tunables live in one immutable `EngineConfig` built once at startup:
//! hard-coded defaults, overridable through environment variables. The
//! score weights are the calibration the ranking report documents, so they
//! are plain fields here rather than scattered constants.

use std::time::Duration;

pub const APP_NAME: &str = "Mitate";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Definition catalogue source (UTF-8 CSV with named headers).
pub const CATALOGUE_FILE: &str = "diagnosis_db.csv";
/// Parsed-row cache, keyed by the catalogue file signature.
pub const ROWS_CACHE_FILE: &str = "diagnosis_rows_cache.json";
/// Definition vector cache, keyed by the same signature.
pub const VECTORS_CACHE_FILE: &str = "diagnosis_vec_cache.json";
/// Classifier response cache (coarse + fine), persisted across runs.
pub const RESPONSE_CACHE_FILE: &str = "diagnosis_ai_cache.json";

/// Human-readable ranked report.
pub const RESULT_TEXT_FILE: &str = "diagnosis_result.txt";
/// Machine-readable record of every scored candidate.
pub const RESULT_RECORD_FILE: &str = "diagnosis_candidates.json";
/// Confirmed-selection report written by the review subcommand.
pub const REVIEW_FINAL_FILE: &str = "diagnosis_final.txt";

pub fn default_log_filter() -> String {
    format!("{}=info", env!("CARGO_PKG_NAME"))
}

/// Additive score weights and penalty amounts.
///
/// Calibrated so a strong candidate lands in the low double digits; the
/// scale is unbounded upward by design (more evidence keeps adding).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScoreWeights {
    /// Definition-prose cosine similarity.
    pub definition_similarity: f64,
    /// Coarse semantic-classifier score.
    pub coarse: f64,
    /// Fine semantic-classifier score.
    pub fine: f64,
    /// Per affirmed defining-characteristic hit.
    pub rule_defining_characteristic: f64,
    /// Per affirmed related-factor hit.
    pub rule_related_factor: f64,
    /// Per affirmed risk-factor hit.
    pub rule_risk_factor: f64,
    /// Respiratory/circulatory priority hint, doubled when the matching
    /// vital crosses its danger threshold.
    pub vital_hint: f64,
    /// Category overlap between note and diagnosis.
    pub category_match: f64,
    pub penalty_setting_mismatch: f64,
    pub penalty_weak_evidence: f64,
    pub penalty_contradiction: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            definition_similarity: 2.0,
            coarse: 3.5,
            fine: 4.5,
            rule_defining_characteristic: 1.6,
            rule_related_factor: 1.2,
            rule_risk_factor: 1.4,
            vital_hint: 1.0,
            category_match: 0.8,
            penalty_setting_mismatch: 0.8,
            penalty_weak_evidence: 0.8,
            penalty_contradiction: 1.0,
        }
    }
}

/// Strict/permissive switches for the four hard filters. Permissive mode
/// records the failure reason but lets the candidate through.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FilterPolicy {
    pub strict_sex: bool,
    pub strict_age: bool,
    pub strict_care_target: bool,
    pub strict_category: bool,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            strict_sex: true,
            strict_age: true,
            strict_care_target: true,
            strict_category: true,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineConfig {
    // ── Semantic classification ─────────────────────────────────────
    /// How many pre-ranked candidates get the coarse classifier at most.
    pub classify_top_k: usize,
    /// Coarse score needed to enter the fine pool.
    pub coarse_min_pass: f64,
    /// Fine score treated as a semantic confirmation.
    pub fine_min_pass: f64,
    /// Coarse score that accepts a candidate without waiting for fine.
    pub early_accept_threshold: f64,
    pub coarse_concurrency: usize,
    pub fine_concurrency: usize,
    /// Wall-clock budget per stage; `None` = unbounded.
    #[serde(skip)]
    pub coarse_budget: Option<Duration>,
    #[serde(skip)]
    pub fine_budget: Option<Duration>,
    /// Character cap for the assessment snippet sent to the classifier.
    pub snippet_chars: usize,

    // ── Loose topical cutoff ────────────────────────────────────────
    pub min_definition_similarity_keep: f64,
    pub min_rule_score_keep: f64,

    // ── Relatedness heuristic ───────────────────────────────────────
    /// Definition similarity that, with a coarse pass, marks relatedness.
    pub related_definition_similarity: f64,
    /// Rule score that, with a coarse pass, marks relatedness.
    pub related_rule_score: f64,
    /// Absolute total-score floor for relatedness. A tunable, not a
    /// clinically validated constant.
    pub related_floor: f64,

    // ── Output ──────────────────────────────────────────────────────
    /// Maximum candidates rendered in the text report.
    pub show_n: usize,
    /// Show only related candidates (with top-fraction fallback).
    pub only_related: bool,
    /// Fraction of the full list shown when no candidate qualifies.
    pub fallback_top_fraction: f64,

    // ── Matching ────────────────────────────────────────────────────
    pub fuzzy_threshold: f64,
    pub min_token_len: usize,
    /// Characters inspected on each side of a hit for polarity vocabulary.
    pub polarity_window: usize,

    pub filters: FilterPolicy,
    pub weights: ScoreWeights,

    // ── Classifier endpoint ─────────────────────────────────────────
    pub ollama_base_url: String,
    pub ollama_model: String,
    #[serde(skip)]
    pub connect_timeout: Duration,
    #[serde(skip)]
    pub read_timeout: Duration,
    pub retry: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            classify_top_k: 40,
            coarse_min_pass: 0.30,
            fine_min_pass: 0.35,
            early_accept_threshold: 0.82,
            coarse_concurrency: 4,
            fine_concurrency: 3,
            coarse_budget: None,
            fine_budget: None,
            snippet_chars: 1500,
            min_definition_similarity_keep: 0.05,
            min_rule_score_keep: 0.60,
            related_definition_similarity: 0.12,
            related_rule_score: 1.5,
            related_floor: 2.0,
            show_n: 40,
            only_related: true,
            fallback_top_fraction: 0.20,
            fuzzy_threshold: 0.86,
            min_token_len: 2,
            polarity_window: 12,
            filters: FilterPolicy::default(),
            weights: ScoreWeights::default(),
            ollama_base_url: "http://127.0.0.1:11434".into(),
            ollama_model: "qwen2.5:7b-instruct".into(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(20),
            retry: 1,
        }
    }
}

impl EngineConfig {
    /// Build the config from the environment, falling back to defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            classify_top_k: env_parse("DIAG_AI_TOPK", d.classify_top_k),
            coarse_min_pass: env_parse("DIAG_COARSE_MIN_PASS", d.coarse_min_pass),
            fine_min_pass: env_parse("DIAG_FINE_MIN_PASS", d.fine_min_pass),
            early_accept_threshold: env_parse("DIAG_EARLY_ACCEPT", d.early_accept_threshold),
            coarse_concurrency: env_parse("DIAG_COARSE_CONCURRENCY", d.coarse_concurrency),
            fine_concurrency: env_parse("DIAG_FINE_CONCURRENCY", d.fine_concurrency),
            coarse_budget: env_budget("DIAG_COARSE_BUDGET_SEC"),
            fine_budget: env_budget("DIAG_FINE_BUDGET_SEC"),
            snippet_chars: env_parse("DIAG_AI_SNIPPET", d.snippet_chars),
            min_definition_similarity_keep: env_parse(
                "DIAG_MIN_DEF_SIM",
                d.min_definition_similarity_keep,
            ),
            min_rule_score_keep: env_parse("DIAG_MIN_RULE", d.min_rule_score_keep),
            related_definition_similarity: d.related_definition_similarity,
            related_rule_score: d.related_rule_score,
            related_floor: env_parse("DIAG_RELATED_FLOOR", d.related_floor),
            show_n: env_parse("DIAG_SHOW_N", d.show_n),
            only_related: env_flag("DIAG_ONLY_RELATED", d.only_related),
            fallback_top_fraction: env_parse("DIAG_TOP_FRAC", d.fallback_top_fraction),
            fuzzy_threshold: env_parse("DIAG_FUZZY_TH", d.fuzzy_threshold),
            min_token_len: env_parse("DIAG_TOKEN_MINLEN", d.min_token_len),
            polarity_window: d.polarity_window,
            filters: FilterPolicy {
                strict_sex: env_flag("DIAG_STRICT_SEX", true),
                strict_age: env_flag("DIAG_STRICT_AGE", true),
                strict_care_target: env_flag("DIAG_STRICT_CARETARGET", true),
                strict_category: env_flag("DIAG_STRICT_CATEGORY", true),
            },
            weights: ScoreWeights::default(),
            ollama_base_url: std::env::var("OLLAMA_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(d.ollama_base_url),
            ollama_model: std::env::var("OLLAMA_MODEL").unwrap_or(d.ollama_model),
            connect_timeout: Duration::from_secs_f64(env_parse(
                "OLLAMA_CONNECT_TIMEOUT",
                d.connect_timeout.as_secs_f64(),
            )),
            read_timeout: Duration::from_secs_f64(env_parse(
                "OLLAMA_READ_TIMEOUT",
                d.read_timeout.as_secs_f64(),
            )),
            retry: env_parse("OLLAMA_RETRY", d.retry),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// `"1"`/`"0"` style boolean flags.
fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => v.trim() != "0",
        Err(_) => default,
    }
}

/// A zero or negative budget means "no budget".
fn env_budget(key: &str) -> Option<Duration> {
    let secs: f64 = env_parse(key, 0.0);
    (secs > 0.0).then(|| Duration::from_secs_f64(secs))
}
