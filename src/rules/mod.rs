pub mod matcher;
pub mod polarity;
pub mod synonyms;
pub mod terms;

pub use matcher::{score_terms, MatchedEvidence, RuleOutcome, TermHits};
