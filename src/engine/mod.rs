pub mod candidate;
pub mod pool;
pub mod selector;

use thiserror::Error;

pub use candidate::{Candidate, CatalogueMeta};
pub use selector::{rank_candidates, RankOutcome};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Input(#[from] crate::assessment::InputError),

    #[error(transparent)]
    Catalog(#[from] crate::catalog::CatalogError),

    #[error("i/o failed on {path}: {source}")]
    Output {
        path: String,
        source: std::io::Error,
    },
}
