//! # Evidence Harness Core
//!
//! Shared, I/O-free logic for Evidence Harness: the sparse corpus table,
//! dotted-path resolution, cascading facet filters, schema-driven insight
//! extraction, nearest-neighbour passage retrieval, and the digest of
//! recent research.
//!
//! This crate contains no tokio, HTTP, or filesystem dependencies. Loading
//! the corpus and the vector index, and talking to embedding or generation
//! services, is the job of the `evidence-harness` application crate; it
//! plugs in through the [`embedding::EmbeddingProvider`] and
//! [`generation::Generator`] traits.
//!
//! ## Data flow
//!
//! ```text
//! facet selections ─▶ FacetEngine ─▶ document ids ─▶ insights::extract ─▶ context block
//!                                                                            │
//! question ─▶ (embed) ─▶ VectorIndex::search ─▶ ranked passages ─────────────┤
//!                                                                            ▼
//!                                                                    (generation)
//! ```

pub mod corpus;
pub mod embedding;
pub mod error;
pub mod facets;
pub mod generation;
pub mod index;
pub mod insights;
pub mod models;
pub mod resolve;
pub mod trending;

pub use error::{CoreError, Result};
