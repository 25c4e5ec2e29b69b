//! Persistent response cache for the two classification stages.
//!
//! Keys are sha256 digests over the model identifier, the normalized
//! assessment text and the diagnosis fields (fine keys additionally cover
//! the sorted term lists), so an unchanged question never reaches the
//! network twice — across runs too, since the map persists as JSON. The
//! cache only grows; there is no eviction. Workers share it behind a
//! mutex: reads are frequent, misses (writes) rare.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::text::normalize::normalize;

/// Matched terms reported by the fine stage, by category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FineEvidence {
    pub defining_characteristics: Vec<String>,
    pub related_factors: Vec<String>,
    pub risk_factors: Vec<String>,
}

impl FineEvidence {
    pub fn is_empty(&self) -> bool {
        self.defining_characteristics.is_empty()
            && self.related_factors.is_empty()
            && self.risk_factors.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FineRecord {
    pub score: f64,
    pub evidence: FineEvidence,
}

#[derive(Default, Serialize, Deserialize)]
struct CacheState {
    coarse: HashMap<String, f64>,
    fine: HashMap<String, FineRecord>,
}

pub struct ResponseCache {
    path: Option<PathBuf>,
    state: Mutex<CacheState>,
}

impl ResponseCache {
    /// Load the cache from `path`; a missing or corrupt file starts empty.
    pub fn load(path: &Path) -> Self {
        let state = std::fs::read_to_string(path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self {
            path: Some(path.to_path_buf()),
            state: Mutex::new(state),
        }
    }

    /// Purely in-memory cache (tests, one-shot runs).
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn coarse_get(&self, key: &str) -> Option<f64> {
        self.state.lock().expect("response cache lock").coarse.get(key).copied()
    }

    pub fn coarse_put(&self, key: String, score: f64) {
        self.state.lock().expect("response cache lock").coarse.insert(key, score);
    }

    pub fn fine_get(&self, key: &str) -> Option<FineRecord> {
        self.state.lock().expect("response cache lock").fine.get(key).cloned()
    }

    pub fn fine_put(&self, key: String, record: FineRecord) {
        self.state.lock().expect("response cache lock").fine.insert(key, record);
    }

    pub fn len(&self) -> usize {
        let state = self.state.lock().expect("response cache lock");
        state.coarse.len() + state.fine.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist the cache; failures are logged, never fatal.
    pub fn save(&self) {
        let Some(path) = &self.path else { return };
        let state = self.state.lock().expect("response cache lock");
        match serde_json::to_string_pretty(&*state) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    tracing::warn!(error = %e, path = %path.display(), "could not persist response cache");
                }
            }
            Err(e) => tracing::warn!(error = %e, "could not serialize response cache"),
        }
    }
}

/// Cache key for a coarse request.
pub fn coarse_key(model: &str, assessment: &str, label: &str, definition: &str) -> String {
    digest(&[model, &normalize(assessment), &normalize(label), &normalize(definition)])
}

/// Cache key for a fine request. Term lists are sorted so that phrase
/// order in the catalogue cell does not split cache entries.
pub fn fine_key(
    model: &str,
    assessment: &str,
    label: &str,
    definition: &str,
    dc_terms: &[String],
    rf_terms: &[String],
    rk_terms: &[String],
) -> String {
    let sorted_join = |terms: &[String]| {
        let mut sorted: Vec<&str> = terms.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.join("|")
    };
    digest(&[
        model,
        &normalize(assessment),
        &normalize(label),
        &normalize(definition),
        &sorted_join(dc_terms),
        &sorted_join(rf_terms),
        &sorted_join(rk_terms),
    ])
}

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parts.join("\n").as_bytes());
    hex::encode(hasher.finalize())
}
