//! Errors that must reach the caller.
//!
//! Missing fields and unparseable facet attributes are absorbed where they
//! occur and never show up here. What remains are the conditions a caller
//! has to tell apart from an empty result.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Vector search was attempted before an index was loaded.
    #[error("vector index is not initialized")]
    Uninitialized,

    #[error("top_k must be >= 1")]
    InvalidTopK,

    #[error("query vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedded query contains NaN or infinite components.
    #[error("query vector has non-finite components")]
    NonFiniteQuery,

    /// Index vectors and passage metadata disagree.
    #[error("invalid vector index: {0}")]
    InvalidIndex(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
