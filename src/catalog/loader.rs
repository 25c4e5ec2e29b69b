//! Catalogue loading with a signature-keyed row cache.
//!
//! The definition source is a UTF-8 CSV whose headers may be the Japanese
//! authoring names (診断名, 診断指標, …) or the canonical English field
//! names. Parsing is tolerant: unknown columns are ignored, missing cells
//! become empty strings. A JSON sidecar cache keyed by the source file's
//! (mtime, size) signature skips re-parsing unchanged data.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::types::DiagnosisDefinition;
use super::CatalogError;

/// Header synonyms: source column name → canonical field name.
const HEADER_SYNONYMS: &[(&str, &str)] = &[
    ("code", "code"),
    ("コード", "code"),
    ("diagnosis_code", "code"),
    ("label", "label"),
    ("診断名", "label"),
    ("name", "label"),
    ("definition", "definition"),
    ("定義", "definition"),
    ("defining_characteristics", "defining_characteristics"),
    ("診断指標", "defining_characteristics"),
    ("related_factors", "related_factors"),
    ("関連因子", "related_factors"),
    ("risk_factors", "risk_factors"),
    ("危険因子", "risk_factors"),
    ("priority_hint", "priority_hint"),
    ("優先ヒント", "priority_hint"),
    ("primary_focus", "primary_focus"),
    ("一次焦点", "primary_focus"),
    ("secondary_focus", "secondary_focus"),
    ("二次焦点", "secondary_focus"),
    ("care_target", "care_target"),
    ("ケア対象", "care_target"),
    ("anatomical_site", "anatomical_site"),
    ("解剖学的部位", "anatomical_site"),
    ("age_min", "age_min"),
    ("年齢下限", "age_min"),
    ("age_max", "age_max"),
    ("年齢上限", "age_max"),
    ("clinical_course", "clinical_course"),
    ("臨床経過", "clinical_course"),
    ("diagnosis_state", "diagnosis_state"),
    ("診断の状態", "diagnosis_state"),
    ("situational_constraints", "situational_constraints"),
    ("状況的制約", "situational_constraints"),
    ("domain", "domain"),
    ("領域", "domain"),
    ("class", "class"),
    ("分類", "class"),
    ("judge", "judge"),
    ("判断", "judge"),
];

#[derive(Serialize, Deserialize)]
struct RowCache {
    sig: String,
    rows: Vec<DiagnosisDefinition>,
}

/// Signature of the catalogue source: sha256 over (mtime_ns, size).
///
/// Content-insensitive on purpose: the source is maintained in an external
/// editor and a metadata probe is cheap enough to run every start.
pub fn file_signature(path: &Path) -> Result<String, CatalogError> {
    let meta = std::fs::metadata(path)?;
    let mtime_ns = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut hasher = Sha256::new();
    hasher.update(mtime_ns.to_string().as_bytes());
    hasher.update(meta.len().to_string().as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Load the catalogue, consulting the row cache first.
///
/// Returns the rows plus the source signature (the vector cache is keyed by
/// the same signature). Fails only when the source itself is missing or
/// unreadable; individual malformed cells degrade to empty strings.
pub fn load_catalogue(
    source: &Path,
    cache_path: &Path,
) -> Result<(Vec<DiagnosisDefinition>, String), CatalogError> {
    if !source.exists() {
        return Err(CatalogError::MissingSource(source.to_path_buf()));
    }
    let sig = file_signature(source)?;

    if let Some(rows) = read_cache(cache_path, &sig) {
        tracing::debug!(rows = rows.len(), "catalogue row cache hit");
        return Ok((rows, sig));
    }

    let rows = parse_csv(source)?;
    tracing::info!(rows = rows.len(), source = %source.display(), "catalogue parsed");

    write_cache(cache_path, &sig, &rows);
    Ok((rows, sig))
}

fn read_cache(cache_path: &Path, sig: &str) -> Option<Vec<DiagnosisDefinition>> {
    let raw = std::fs::read_to_string(cache_path).ok()?;
    let cache: RowCache = serde_json::from_str(&raw).ok()?;
    (cache.sig == sig).then_some(cache.rows)
}

fn write_cache(cache_path: &Path, sig: &str, rows: &[DiagnosisDefinition]) {
    let cache = RowCache {
        sig: sig.to_string(),
        rows: rows.to_vec(),
    };
    match serde_json::to_string(&cache) {
        Ok(json) => {
            if let Err(e) = std::fs::write(cache_path, json) {
                tracing::warn!(error = %e, "could not write catalogue row cache");
            }
        }
        Err(e) => tracing::warn!(error = %e, "could not serialize catalogue row cache"),
    }
}

/// Resolve a source header to its canonical field name.
///
/// Exact match first, then a forgiving retry with parentheses and
/// whitespace stripped and lowercased, so spacing and casing variants of
/// the known names ("Age_Min", "label ") still resolve.
fn canonical_header(raw: &str) -> Option<&'static str> {
    let trimmed = raw.trim();
    let lookup = |key: &str| {
        HEADER_SYNONYMS
            .iter()
            .find(|(from, _)| *from == key)
            .map(|(_, to)| *to)
    };
    if let Some(hit) = lookup(trimmed) {
        return Some(hit);
    }
    let stripped: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && !"（）()".contains(*c))
        .flat_map(|c| c.to_lowercase())
        .collect();
    lookup(&stripped)
}

fn parse_csv(source: &Path) -> Result<Vec<DiagnosisDefinition>, CatalogError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(source)?;

    let headers = reader.headers()?.clone();
    let mut columns: HashMap<usize, &'static str> = HashMap::new();
    for (idx, header) in headers.iter().enumerate() {
        if let Some(field) = canonical_header(header) {
            columns.insert(idx, field);
        }
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut cells: HashMap<&str, String> = HashMap::new();
        for (&idx, &field) in &columns {
            let value = record.get(idx).unwrap_or("").trim();
            // NaN markers from spreadsheet exports count as missing.
            if !value.is_empty() && value != "NaN" && value != "nan" {
                cells.insert(field, value.to_string());
            }
        }
        let mut take = |field: &str| cells.remove(field).unwrap_or_default();
        rows.push(DiagnosisDefinition {
            code: take("code"),
            label: take("label"),
            definition: take("definition"),
            defining_characteristics: take("defining_characteristics"),
            related_factors: take("related_factors"),
            risk_factors: take("risk_factors"),
            priority_hint: take("priority_hint"),
            primary_focus: take("primary_focus"),
            secondary_focus: take("secondary_focus"),
            care_target: take("care_target"),
            anatomical_site: take("anatomical_site"),
            age_min: take("age_min"),
            age_max: take("age_max"),
            clinical_course: take("clinical_course"),
            diagnosis_state: take("diagnosis_state"),
            situational_constraints: take("situational_constraints"),
            domain: take("domain"),
            class: take("class"),
            judge: take("judge"),
        });
    }
    Ok(rows)
}
