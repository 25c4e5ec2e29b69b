//! CLI entry point.
//!
//! `mitate` ranks the catalogue against the assessment files in the
//! working directory and writes the report + record; `mitate review`
//! reads a `- [x] CODE LABEL` selection from stdin and renders the
//! confirmed report from the last record.

use std::io::Read;
use std::path::Path;

use tracing_subscriber::EnvFilter;

use mitate::assessment::{read_assessment_text, AssessmentInput};
use mitate::catalog::load_catalogue;
use mitate::classifier::{ClassifierGateway, OllamaClient, ResponseCache};
use mitate::config::{self, EngineConfig};
use mitate::engine::{rank_candidates, EngineError};
use mitate::lexical::load_or_build_space;
use mitate::report::{review, text as report_text, RunRecord};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let mode = std::env::args().nth(1);
    let result = match mode.as_deref() {
        Some("review") => run_review(),
        _ => run_ranking(),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "run failed");
        eprintln!("[FATAL] {e}");
        std::process::exit(1);
    }
}

fn run_ranking() -> Result<(), EngineError> {
    let cfg = EngineConfig::from_env();
    let dir = Path::new(".");
    tracing::info!("{} v{} starting", config::APP_NAME, config::APP_VERSION);

    let assessment_text = read_assessment_text(dir)?;
    let input = AssessmentInput::from_text(assessment_text);

    let (definitions, signature) =
        load_catalogue(&dir.join(config::CATALOGUE_FILE), &dir.join(config::ROWS_CACHE_FILE))?;
    let space = load_or_build_space(&definitions, &signature, &dir.join(config::VECTORS_CACHE_FILE));

    let client = match OllamaClient::new(
        &cfg.ollama_base_url,
        &cfg.ollama_model,
        cfg.connect_timeout,
        cfg.read_timeout,
    ) {
        Ok(client) => client,
        Err(e) => {
            // An unbuildable HTTP client behaves like an offline service;
            // the run proceeds on cheap signals alone.
            tracing::warn!(error = %e, "classifier client unavailable, running degraded");
            return run_without_client(&input, &definitions, &space, &cfg, dir);
        }
    };
    let cache = ResponseCache::load(&dir.join(config::RESPONSE_CACHE_FILE));
    let gateway = ClassifierGateway::new(client, cache, cfg.retry, cfg.snippet_chars);

    let outcome = rank_candidates(&input, &definitions, &space, &gateway, &cfg);
    gateway.save_cache();

    write_outputs(
        &input,
        &outcome,
        gateway.model_name(),
        outcome.classifier_online,
        &cfg,
        dir,
    )
}

/// Degraded path: no HTTP client at all, still a complete ranked run.
fn run_without_client(
    input: &AssessmentInput,
    definitions: &[mitate::catalog::DiagnosisDefinition],
    space: &mitate::lexical::DefinitionSpace,
    cfg: &EngineConfig,
    dir: &Path,
) -> Result<(), EngineError> {
    let gateway = ClassifierGateway::new(
        mitate::classifier::MockChatModel::offline(),
        ResponseCache::in_memory(),
        0,
        cfg.snippet_chars,
    );
    let outcome = rank_candidates(input, definitions, space, &gateway, cfg);
    write_outputs(input, &outcome, &cfg.ollama_model, false, cfg, dir)
}

fn write_outputs(
    input: &AssessmentInput,
    outcome: &mitate::engine::RankOutcome,
    model: &str,
    classifier_online: bool,
    cfg: &EngineConfig,
    dir: &Path,
) -> Result<(), EngineError> {
    let report = report_text::format_report(input, outcome, cfg);
    print!("{report}");
    write_file(&dir.join(config::RESULT_TEXT_FILE), &report)?;
    tracing::info!(path = config::RESULT_TEXT_FILE, "report saved");

    let record = RunRecord::new(outcome.all.clone(), model, classifier_online, cfg);
    record
        .write(&dir.join(config::RESULT_RECORD_FILE))
        .map_err(|source| EngineError::Output {
            path: config::RESULT_RECORD_FILE.into(),
            source,
        })?;
    tracing::info!(
        path = config::RESULT_RECORD_FILE,
        candidates = outcome.all.len(),
        "record saved"
    );
    Ok(())
}

fn run_review() -> Result<(), EngineError> {
    let dir = Path::new(".");
    let mut selection = String::new();
    std::io::stdin()
        .read_to_string(&mut selection)
        .map_err(|source| EngineError::Output {
            path: "stdin".into(),
            source,
        })?;

    let record = RunRecord::read_lenient(&dir.join(config::RESULT_RECORD_FILE));
    let rendered = review::render_confirmed(&selection, &record);
    write_file(&dir.join(config::REVIEW_FINAL_FILE), &rendered)?;
    if rendered.is_empty() {
        println!("OK (no selection)");
    } else {
        println!("OK");
    }
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<(), EngineError> {
    std::fs::write(path, content).map_err(|source| EngineError::Output {
        path: path.display().to_string(),
        source,
    })
}
