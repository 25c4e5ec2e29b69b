pub mod context;
pub mod demographics;
pub mod input;
pub mod types;
pub mod vitals;

use std::path::PathBuf;

use thiserror::Error;

pub use input::read_assessment_text;
pub use types::{AssessmentInput, Demographics, Sex, Vitals};

#[derive(Error, Debug)]
pub enum InputError {
    /// The engine cannot run without the assembled assessment text.
    #[error("assessment text missing or empty: {0}")]
    MissingAssessment(PathBuf),

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}
