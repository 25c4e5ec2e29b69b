//! TF-IDF vector space over the catalogue's definition prose.
//!
//! Sparse string-keyed vectors: definitions are a few hundred short
//! documents, so there is no need for a dense matrix or an ANN index —
//! cosine against every definition is microseconds. The built space is
//! cached beside the catalogue row cache and invalidated by the same
//! source signature.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::DiagnosisDefinition;
use crate::text::normalize::nfkc;
use crate::text::tokenize::tokenize;

pub type SparseVector = HashMap<String, f64>;

/// IDF weights plus one TF-IDF vector per definition (catalogue order).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionSpace {
    pub idf: HashMap<String, f64>,
    pub vectors: Vec<SparseVector>,
}

#[derive(Serialize, Deserialize)]
struct SpaceCache {
    sig: String,
    space: DefinitionSpace,
}

fn term_frequency(tokens: &[String]) -> HashMap<&str, f64> {
    let mut tf: HashMap<&str, f64> = HashMap::new();
    for t in tokens {
        *tf.entry(t.as_str()).or_insert(0.0) += 1.0;
    }
    tf
}

/// Smoothed inverse document frequency: `ln((N+1)/(df+1)) + 1`.
fn inverse_document_frequency(docs: &[Vec<String>]) -> HashMap<String, f64> {
    let n = docs.len() as f64;
    let mut df: HashMap<&str, f64> = HashMap::new();
    for tokens in docs {
        let mut seen: Vec<&str> = tokens.iter().map(String::as_str).collect();
        seen.sort_unstable();
        seen.dedup();
        for t in seen {
            *df.entry(t).or_insert(0.0) += 1.0;
        }
    }
    df.into_iter()
        .map(|(t, dfv)| (t.to_string(), ((n + 1.0) / (dfv + 1.0)).ln() + 1.0))
        .collect()
}

/// TF-IDF vector restricted to tokens the space knows about.
pub fn tfidf_vector(tokens: &[String], idf: &HashMap<String, f64>) -> SparseVector {
    term_frequency(tokens)
        .into_iter()
        .filter_map(|(t, tf)| idf.get(t).map(|w| (t.to_string(), tf * w)))
        .collect()
}

/// Cosine similarity over the intersection of present dimensions.
/// Returns 0 when either vector is empty (or has zero norm).
pub fn cosine(a: &SparseVector, b: &SparseVector) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(k, va)| large.get(k).map(|vb| va * vb))
        .sum();
    let norm = |v: &SparseVector| v.values().map(|x| x * x).sum::<f64>().sqrt();
    let na = norm(a);
    let nb = norm(b);
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

/// Build the definition space from scratch.
pub fn build_space(definitions: &[DiagnosisDefinition]) -> DefinitionSpace {
    let docs: Vec<Vec<String>> = definitions
        .iter()
        .map(|d| tokenize(&nfkc(&d.definition)))
        .collect();
    let idf = inverse_document_frequency(&docs);
    let vectors = docs.iter().map(|tokens| tfidf_vector(tokens, &idf)).collect();
    DefinitionSpace { idf, vectors }
}

/// Load the cached space for `sig`, or build and cache a fresh one.
pub fn load_or_build_space(
    definitions: &[DiagnosisDefinition],
    sig: &str,
    cache_path: &Path,
) -> DefinitionSpace {
    if let Ok(raw) = std::fs::read_to_string(cache_path) {
        if let Ok(cache) = serde_json::from_str::<SpaceCache>(&raw) {
            if cache.sig == sig && cache.space.vectors.len() == definitions.len() {
                tracing::debug!("definition vector cache hit");
                return cache.space;
            }
        }
    }

    let space = build_space(definitions);
    let cache = SpaceCache {
        sig: sig.to_string(),
        space: space.clone(),
    };
    match serde_json::to_string(&cache) {
        Ok(json) => {
            if let Err(e) = std::fs::write(cache_path, json) {
                tracing::warn!(error = %e, "could not write definition vector cache");
            }
        }
        Err(e) => tracing::warn!(error = %e, "could not serialize definition vector cache"),
    }
    space
}
