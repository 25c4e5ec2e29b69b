pub mod loader;
pub mod types;

use std::path::PathBuf;

use thiserror::Error;

pub use loader::{file_signature, load_catalogue};
pub use types::{DiagnosisDefinition, DiagnosisState};

#[derive(Error, Debug)]
pub enum CatalogError {
    /// No diagnosis matching is possible without the definition source.
    #[error("diagnosis catalogue not found: {0}")]
    MissingSource(PathBuf),

    #[error("failed to read catalogue: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalogue: {0}")]
    Csv(#[from] csv::Error),
}
