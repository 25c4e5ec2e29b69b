pub mod cache;
pub mod gateway;
pub mod ollama;
pub mod parse;
pub mod prompt;

use thiserror::Error;

pub use cache::ResponseCache;
pub use gateway::{ClassifierGateway, FineEvidence};
pub use ollama::{ChatModel, MockChatModel, OllamaClient};

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("classifier connection failed: {0}")]
    Connection(String),

    #[error("classifier request timed out after {0}s")]
    Timeout(u64),

    #[error("classifier returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("classifier response unparsable: {0}")]
    ResponseParsing(String),
}
