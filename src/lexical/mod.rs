pub mod index;

pub use index::{cosine, load_or_build_space, tfidf_vector, DefinitionSpace, SparseVector};
