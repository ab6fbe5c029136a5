//! Passage search and question answering over the vector index.
//!
//! ```text
//! question ─▶ embed ─▶ normalize ─▶ VectorIndex::search(k) ─▶ passage context ─▶ generate
//! ```
//!
//! An index that never loaded is reported as
//! [`CoreError::Uninitialized`] before any external call is made.

use anyhow::{bail, Result};
use evidence_harness_core::generation::{Generation, TokenUsage};
use evidence_harness_core::index::{format_passage_context, RetrievedPassage};
use evidence_harness_core::CoreError;
use serde::Serialize;
use tracing::debug;

use crate::app::App;

/// Answer returned when retrieval finds nothing.
pub const NO_PASSAGES_ANSWER: &str = "I couldn't find any relevant information in the research \
    documents. Please try a different question.";

const ANSWER_INSTRUCTION: &str = "You are a research assistant. Answer the user's question \
    using only the research documents provided. Cite specific findings, statistics, or \
    conclusions, acknowledge conflicting evidence, and say clearly when the documents do not \
    answer the question.";

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    pub usage: TokenUsage,
    pub sources: Vec<RetrievedPassage>,
}

/// Top passages for a query. `limit` overrides `retrieval.top_k`.
pub async fn search_passages(app: &App, query: &str, limit: Option<usize>) -> Result<Vec<RetrievedPassage>> {
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }
    if !app.index.is_initialized() {
        return Err(CoreError::Uninitialized.into());
    }
    let k = limit.unwrap_or(app.config.retrieval.top_k);
    if k == 0 {
        return Err(CoreError::InvalidTopK.into());
    }

    let query_vec = app.embedder.embed_query(query).await?;
    let hits = app.index.search(&query_vec, k)?;
    debug!(query, hits = hits.len(), "passage search");

    let excerpt_chars = app.config.retrieval.excerpt_chars;
    Ok(hits
        .iter()
        .map(|hit| RetrievedPassage::from_scored(hit, excerpt_chars))
        .collect())
}

/// Retrieve passages for `question` and generate a grounded answer.
pub async fn ask(app: &App, question: &str) -> Result<Answer> {
    let question = question.trim();
    if question.is_empty() {
        bail!("question must not be empty");
    }
    let sources = search_passages(app, question, None).await?;

    let generation = if sources.is_empty() {
        Generation::canned(NO_PASSAGES_ANSWER)
    } else {
        let context = format_passage_context(&sources, app.config.retrieval.context_chars_per_passage);
        let instruction = format!("{}\n\nUser Question: {}", ANSWER_INSTRUCTION, question);
        app.generator.generate(&context, &instruction).await?
    };

    Ok(Answer {
        question: question.to_string(),
        answer: generation.text,
        usage: generation.usage,
        sources,
    })
}

/// `evh search "<query>"`.
pub async fn run_search(app: &App, query: &str, limit: Option<usize>) -> Result<()> {
    let results = search_passages(app, query, limit).await?;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, r) in results.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, r.score, r.title);
        if let Some(authors) = &r.metadata.authors {
            println!("    authors: {}", authors);
        }
        if let Some(year) = &r.metadata.year {
            println!("    year: {}", year);
        }
        println!("    {}", r.excerpt.replace('\n', " "));
        println!();
    }
    Ok(())
}

/// `evh ask "<question>"`.
pub async fn run_ask(app: &App, question: &str) -> Result<()> {
    let answer = ask(app, question).await?;
    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!("\nSources:");
        for (i, s) in answer.sources.iter().enumerate() {
            println!("  {}. {} (score {:.3})", i + 1, s.title, s.score);
        }
    }
    println!("\nTokens: {}", answer.usage.total_tokens);
    Ok(())
}
