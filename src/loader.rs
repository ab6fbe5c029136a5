//! Loading the corpus table and the passage index from disk.
//!
//! Both loaders degrade instead of failing: a corpus that cannot be read
//! becomes an empty store, an index that cannot be read becomes
//! [`VectorIndex::Uninitialized`]. The failure is logged as a warning.
//!
//! # Corpus file
//!
//! ```json
//! {
//!   "documents": ["doc_1", "doc_2"],
//!   "rows": [
//!     { "main_category": "meta_data", "category": "publication_year",
//!       "values": { "doc_1": 2019, "doc_2": "2021" } },
//!     { "main_category": "meta_data", "category": "funding_source",
//!       "sub_category": "type", "values": { "doc_1": "Industry" } }
//!   ]
//! }
//! ```
//!
//! # Index directory
//!
//! - `passages.json`: `{ "dims": N, "passages": [ { "source", "page_number", "content", "metadata" } ] }`
//! - `vectors.bin`: little-endian `f32`, `N` per passage, in passage order.

use anyhow::{bail, Context, Result};
use evidence_harness_core::corpus::CorpusStore;
use evidence_harness_core::embedding::blob_to_vec;
use evidence_harness_core::index::{LoadedIndex, VectorIndex};
use evidence_harness_core::models::{scalar_text, FieldKey, Passage};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

pub const PASSAGES_FILE: &str = "passages.json";
pub const VECTORS_FILE: &str = "vectors.bin";

#[derive(Debug, Deserialize)]
struct CorpusFile {
    documents: Vec<String>,
    #[serde(default)]
    rows: Vec<RowRecord>,
}

#[derive(Debug, Deserialize)]
struct RowRecord {
    main_category: String,
    category: String,
    #[serde(default)]
    sub_category: Option<String>,
    #[serde(default)]
    values: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PassagesFile {
    dims: usize,
    passages: Vec<Passage>,
}

/// Load the corpus, or an empty store if it cannot be read.
pub fn load_corpus(path: &Path) -> CorpusStore {
    match try_load_corpus(path) {
        Ok(store) => {
            info!(
                path = %path.display(),
                documents = store.documents().len(),
                rows = store.entries().len(),
                "corpus loaded"
            );
            store
        }
        Err(e) => {
            warn!(path = %path.display(), error = %format!("{:#}", e), "corpus failed to load; continuing with an empty corpus");
            CorpusStore::empty()
        }
    }
}

pub fn try_load_corpus(path: &Path) -> Result<CorpusStore> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file: {}", path.display()))?;
    let file: CorpusFile =
        serde_json::from_str(&text).with_context(|| "Failed to parse corpus file")?;

    let mut builder = CorpusStore::builder();
    for doc in &file.documents {
        builder.document(doc.as_str());
    }
    for row in file.rows {
        let sub = row
            .sub_category
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let key = FieldKey::new(row.main_category, row.category, sub);
        let values = row
            .values
            .into_iter()
            .filter_map(|(doc, v)| scalar_text(&v).map(|text| (doc, text)));
        builder.entry(key, values);
    }
    Ok(builder.build())
}

/// Load the passage index, or the uninitialized sentinel on any failure.
pub fn load_index(dir: Option<&Path>) -> VectorIndex {
    let Some(dir) = dir else {
        info!("no index configured; vector search is unavailable");
        return VectorIndex::Uninitialized;
    };
    match try_load_index(dir) {
        Ok(index) => {
            info!(path = %dir.display(), passages = index.len(), dims = index.dims(), "vector index loaded");
            VectorIndex::Loaded(index)
        }
        Err(e) => {
            warn!(path = %dir.display(), error = %format!("{:#}", e), "vector index failed to load");
            VectorIndex::Uninitialized
        }
    }
}

pub fn try_load_index(dir: &Path) -> Result<LoadedIndex> {
    let passages_path = dir.join(PASSAGES_FILE);
    let text = std::fs::read_to_string(&passages_path)
        .with_context(|| format!("Failed to read {}", passages_path.display()))?;
    let file: PassagesFile = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", passages_path.display()))?;

    let vectors_path = dir.join(VECTORS_FILE);
    let blob = std::fs::read(&vectors_path)
        .with_context(|| format!("Failed to read {}", vectors_path.display()))?;
    if file.dims == 0 {
        bail!("{}: dims must be > 0", passages_path.display());
    }
    let Some(expected) = file
        .dims
        .checked_mul(file.passages.len())
        .and_then(|n| n.checked_mul(4))
    else {
        bail!(
            "{}: {} passages of {} dims do not fit in memory",
            passages_path.display(),
            file.passages.len(),
            file.dims
        );
    };
    if blob.len() != expected {
        bail!(
            "{}: expected {} bytes for {} passages of {} dims, found {}",
            vectors_path.display(),
            expected,
            file.passages.len(),
            file.dims,
            blob.len()
        );
    }

    let vectors = blob_to_vec(&blob)
        .chunks_exact(file.dims)
        .map(<[f32]>::to_vec)
        .collect();
    Ok(LoadedIndex::new(file.dims, file.passages, vectors)?)
}
