//! Process-wide application context.
//!
//! The corpus and the vector index are loaded once and shared read-only
//! (behind `Arc`) by every request, session, and bulk-job task.

use anyhow::Result;
use evidence_harness_core::corpus::CorpusStore;
use evidence_harness_core::embedding::EmbeddingProvider;
use evidence_harness_core::facets::FacetEngine;
use evidence_harness_core::generation::Generator;
use evidence_harness_core::index::VectorIndex;
use std::sync::Arc;
use tracing::warn;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::generation::create_generator;
use crate::loader::{load_corpus, load_index};
use crate::session::Session;

#[derive(Clone)]
pub struct App {
    pub config: Arc<Config>,
    pub store: Arc<CorpusStore>,
    pub index: Arc<VectorIndex>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<dyn Generator>,
}

impl App {
    /// Load the corpus and index named by the config and create the
    /// configured providers.
    ///
    /// A corpus or index that fails to load does not fail this call (see
    /// [`crate::loader`]); a provider that cannot be created does.
    pub fn load(config: Config) -> Result<Self> {
        let store = load_corpus(&config.corpus.path);
        let index = load_index(config.index.path.as_deref());
        let embedder = create_provider(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        if !dims_agree(embedder.as_ref(), &index) {
            warn!(
                provider = embedder.dims(),
                index = index_dims(&index),
                "embedding dims do not match the vector index; searches will be rejected"
            );
        }
        Ok(Self::new(config, store, index, embedder, generator))
    }

    pub fn new(
        config: Config,
        store: CorpusStore,
        index: VectorIndex,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            index: Arc::new(index),
            embedder,
            generator,
        }
    }

    pub fn facet_engine(&self) -> FacetEngine<'_> {
        FacetEngine::with_limits(&self.store, self.config.facets.limits())
    }

    /// A fresh session with every facet at its default.
    pub fn new_session(&self) -> Session {
        Session::new(&self.facet_engine())
    }
}

fn index_dims(index: &VectorIndex) -> usize {
    match index {
        VectorIndex::Loaded(loaded) => loaded.dims(),
        VectorIndex::Uninitialized => 0,
    }
}

/// Whether query vectors from `embedder` can be searched against `index`.
/// A disabled provider or an uninitialized index has nothing to compare.
pub fn dims_agree(embedder: &dyn EmbeddingProvider, index: &VectorIndex) -> bool {
    let provider = embedder.dims();
    let stored = index_dims(index);
    provider == 0 || stored == 0 || provider == stored
}
