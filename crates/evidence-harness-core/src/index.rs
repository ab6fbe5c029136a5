//! Dense passage index with exact nearest-neighbour search.
//!
//! Passage vectors are stored unit-normalized, so the inner product with a
//! normalized query is the cosine similarity. Search is a brute-force scan;
//! the whole index is assumed to fit in memory.
//!
//! An index that failed to load is represented explicitly as
//! [`VectorIndex::Uninitialized`], and searching it is an error rather than
//! an empty result.

use serde::Serialize;

use crate::embedding::{dot, is_normalized, l2_normalize};
use crate::error::{CoreError, Result};
use crate::models::{Passage, PassageMetadata};

/// Default excerpt length, in characters.
pub const DEFAULT_EXCERPT_CHARS: usize = 300;

/// Default content budget per passage in a generation context block.
pub const DEFAULT_CONTEXT_CHARS: usize = 1500;

const NOT_AVAILABLE: &str = "N/A";

/// Passages and their vectors, in insertion order.
#[derive(Debug, Clone)]
pub struct LoadedIndex {
    dims: usize,
    passages: Vec<Passage>,
    vectors: Vec<Vec<f32>>,
}

impl LoadedIndex {
    /// Pair passages with their vectors, normalizing any that are not
    /// already unit length.
    pub fn new(dims: usize, passages: Vec<Passage>, mut vectors: Vec<Vec<f32>>) -> Result<Self> {
        if dims == 0 {
            return Err(CoreError::InvalidIndex("dims must be > 0".into()));
        }
        if passages.len() != vectors.len() {
            return Err(CoreError::InvalidIndex(format!(
                "{} passages but {} vectors",
                passages.len(),
                vectors.len()
            )));
        }
        for (i, v) in vectors.iter_mut().enumerate() {
            if v.len() != dims {
                return Err(CoreError::InvalidIndex(format!(
                    "vector {} has {} dimensions, expected {}",
                    i,
                    v.len(),
                    dims
                )));
            }
            if v.iter().any(|x| !x.is_finite()) {
                return Err(CoreError::InvalidIndex(format!(
                    "vector {} has non-finite components",
                    i
                )));
            }
            if !is_normalized(v) {
                l2_normalize(v);
            }
        }
        Ok(Self {
            dims,
            passages,
            vectors,
        })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }
}

/// The vector index, or the sentinel left behind by a failed load.
#[derive(Debug, Clone, Default)]
pub enum VectorIndex {
    #[default]
    Uninitialized,
    Loaded(LoadedIndex),
}

/// A passage with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPassage<'a> {
    pub passage: &'a Passage,
    pub score: f32,
}

impl VectorIndex {
    pub fn is_initialized(&self) -> bool {
        matches!(self, VectorIndex::Loaded(_))
    }

    pub fn len(&self) -> usize {
        match self {
            VectorIndex::Loaded(index) => index.len(),
            VectorIndex::Uninitialized => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Top-`k` passages by cosine similarity, best first.
    ///
    /// The query is normalized here and must be finite. Ties keep insertion
    /// order; an index smaller than `k` returns every passage.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPassage<'_>>> {
        let index = match self {
            VectorIndex::Loaded(index) => index,
            VectorIndex::Uninitialized => return Err(CoreError::Uninitialized),
        };
        if k == 0 {
            return Err(CoreError::InvalidTopK);
        }
        if query.len() != index.dims {
            return Err(CoreError::DimensionMismatch {
                expected: index.dims,
                actual: query.len(),
            });
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(CoreError::NonFiniteQuery);
        }

        let mut q = query.to_vec();
        l2_normalize(&mut q);

        let mut scored: Vec<ScoredPassage<'_>> = index
            .passages
            .iter()
            .zip(&index.vectors)
            .map(|(passage, v)| ScoredPassage {
                passage,
                score: dot(&q, v),
            })
            .collect();
        // sort_by is stable: equal scores stay in insertion order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }
}

/// A search hit shaped for display and for the generation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedPassage {
    /// `"<source> - Page <n>"`.
    pub title: String,
    pub source: String,
    pub page_number: u32,
    /// Similarity rounded to three decimals.
    pub score: f64,
    pub excerpt: String,
    pub full_content: String,
    pub metadata: PassageMetadata,
}

impl RetrievedPassage {
    pub fn from_scored(hit: &ScoredPassage<'_>, excerpt_chars: usize) -> Self {
        let p = hit.passage;
        Self {
            title: p.title(),
            source: p.source.clone(),
            page_number: p.page_number,
            score: round3(hit.score),
            excerpt: excerpt(&p.content, excerpt_chars),
            full_content: p.content.clone(),
            metadata: p.metadata.clone(),
        }
    }
}

fn round3(score: f32) -> f64 {
    (f64::from(score) * 1000.0).round() / 1000.0
}

/// First `max_chars` characters of `content`, with `...` when cut.
pub fn excerpt(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte, _)) => format!("{}...", &content[..byte]),
        None => content.to_string(),
    }
}

/// Serialize retrieved passages into the context block for answer generation.
pub fn format_passage_context(passages: &[RetrievedPassage], content_chars: usize) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string());
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let head: String = p.full_content.chars().take(content_chars).collect();
            format!(
                "Document {}: {}\nSource: {} (Page {})\nAuthors: {}\nJournal: {}\nYear: {}\n\nContent: {}...\n",
                i + 1,
                p.title,
                p.source,
                p.page_number,
                field(&p.metadata.authors),
                field(&p.metadata.journal),
                field(&p.metadata.year),
                head
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
