//! # Evidence Harness
//!
//! Faceted exploration and evidence synthesis over a corpus of research
//! documents.
//!
//! Two read-only data sets are loaded at startup: a sparse table of
//! extracted study attributes (one column per document) and a vector index
//! of text passages. On top of them the harness offers cascading facet
//! filters, topic-driven insight generation across the filtered documents,
//! and retrieval-grounded question answering, from a CLI (`evh`) and a JSON
//! HTTP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ corpus.json  │──▶│ CorpusStore  │──▶│ FacetEngine  │──┐
//! └──────────────┘   └──────────────┘   └──────────────┘  │
//!                                                          ▼
//! ┌──────────────┐   ┌──────────────┐              ┌──────────────┐
//! │ index dir    │──▶│ VectorIndex  │──▶ ask ──────▶│  Generator   │
//! └──────────────┘   └──────────────┘   insights ──▶└──────────────┘
//!                                            │
//!                           ┌────────────────┤
//!                           ▼                ▼
//!                      ┌──────────┐     ┌──────────┐
//!                      │   CLI    │     │   HTTP   │
//!                      │  (evh)   │     │  server  │
//!                      └──────────┘     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! evh facets --year-from 2018 --publication-type "Journal Article"
//! evh insights --funding-source Government
//! evh ask "What nicotine levels were reported in disposable devices?"
//! evh serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`loader`] | Corpus and index loading |
//! | [`app`] | Shared application context |
//! | [`session`] | Per-session facets, cascade, and insight cache |
//! | [`facets`] | Facet request surface and facet commands |
//! | [`insights`] | Concurrent bulk insight job |
//! | [`ask`] | Passage search and question answering |
//! | [`trending`] | Digest of the most recent research |
//! | [`embedding`] | OpenAI embedding provider |
//! | [`generation`] | OpenAI chat generator |
//! | [`server`] | JSON HTTP server |
//!
//! Domain types and pure algorithms live in `evidence-harness-core`.

pub mod app;
pub mod ask;
pub mod config;
pub mod embedding;
pub mod error;
pub mod facets;
pub mod generation;
pub mod insights;
pub mod loader;
pub mod server;
pub mod session;
pub mod trending;
