//! The "run all topics" bulk insight job.
//!
//! Each configured topic is extracted from the filtered documents and sent
//! to the generator as its own task on a [`JoinSet`]. The join drains every
//! task: a topic whose generation fails, or whose task panics, reports
//! [`TopicOutcome::Failed`] in its slot while its siblings complete
//! normally. Results come back in topic configuration order.

use anyhow::{anyhow, Result};
use evidence_harness_core::corpus::CorpusStore;
use evidence_harness_core::generation::{Generator, TokenUsage};
use evidence_harness_core::insights::{extract, no_insights_message, parse_bullets};
use evidence_harness_core::models::DocumentId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::app::App;
use crate::config::TopicConfig;
use crate::session::Session;

/// What one slot ended up with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TopicOutcome {
    Completed {
        bullets: Vec<String>,
        usage: TokenUsage,
        /// Documents that contributed at least one value.
        documents: usize,
    },
    Failed {
        message: String,
    },
}

impl TopicOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, TopicOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicReport {
    pub slot: String,
    pub name: String,
    pub outcome: TopicOutcome,
}

/// Extract one topic and generate its bullets.
///
/// When extraction yields nothing the generator is not called and the slot
/// gets the "no insights found" message with zero usage.
pub async fn run_topic(
    store: &CorpusStore,
    generator: &dyn Generator,
    topic: &TopicConfig,
    documents: &[DocumentId],
    max_context_chars: usize,
) -> Result<TopicOutcome> {
    let insights = extract(store, documents, &topic.schema());
    if insights.is_empty() {
        return Ok(TopicOutcome::Completed {
            bullets: vec![no_insights_message(&topic.name)],
            usage: TokenUsage::default(),
            documents: 0,
        });
    }

    let context = insights.format_context(max_context_chars);
    let generation = generator.generate(&context, topic.instruction()).await?;
    Ok(TopicOutcome::Completed {
        bullets: parse_bullets(&generation.text),
        usage: generation.usage,
        documents: insights.documents.len(),
    })
}

/// Run `topics` concurrently over `documents`.
pub async fn run_topics(app: &App, topics: &[TopicConfig], documents: Vec<DocumentId>) -> Vec<TopicReport> {
    let documents = Arc::new(documents);
    let max_chars = app.config.insights.max_context_chars;
    let mut set = JoinSet::new();
    let mut task_slots = HashMap::new();

    for (i, topic) in topics.iter().enumerate() {
        let store = Arc::clone(&app.store);
        let generator = Arc::clone(&app.generator);
        let documents = Arc::clone(&documents);
        let topic = topic.clone();
        let handle = set.spawn(async move {
            let outcome = run_topic(&store, generator.as_ref(), &topic, &documents, max_chars).await;
            (i, outcome)
        });
        task_slots.insert(handle.id(), i);
    }

    let mut outcomes: Vec<Option<TopicOutcome>> = vec![None; topics.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((i, Ok(outcome))) => outcomes[i] = Some(outcome),
            Ok((i, Err(e))) => {
                warn!(topic = %topics[i].name, error = %format!("{:#}", e), "topic failed");
                outcomes[i] = Some(failed(&topics[i], &e));
            }
            Err(join_err) => {
                if let Some(&i) = task_slots.get(&join_err.id()) {
                    warn!(topic = %topics[i].name, error = %join_err, "topic task aborted");
                    outcomes[i] = Some(failed(&topics[i], &anyhow!("{}", join_err)));
                }
            }
        }
    }

    let reports: Vec<TopicReport> = topics
        .iter()
        .zip(outcomes)
        .map(|(topic, outcome)| TopicReport {
            slot: topic.slot(),
            name: topic.name.clone(),
            outcome: outcome.unwrap_or_else(|| TopicOutcome::Failed {
                message: format!("Error generating {} insights: no result", topic.name.to_lowercase()),
            }),
        })
        .collect();

    let failures = reports.iter().filter(|r| r.outcome.is_failed()).count();
    info!(topics = reports.len(), failures, "insight job finished");
    reports
}

fn failed(topic: &TopicConfig, err: &anyhow::Error) -> TopicOutcome {
    TopicOutcome::Failed {
        message: format!(
            "Error generating {} insights: {:#}",
            topic.name.to_lowercase(),
            err
        ),
    }
}

/// Run every configured topic over the session's current filter and cache
/// the results on the session once the job has joined.
pub async fn run_session_job(app: &App, session: &mut Session) -> Result<Vec<TopicReport>> {
    session.begin_job()?;
    let documents = session.matching_documents(&app.facet_engine());
    let reports = run_topics(app, &app.config.topics, documents).await;
    session.finish_job(&reports);
    Ok(reports)
}

/// Look up topics by slot, preserving configuration order. `None` means
/// every topic.
pub fn select_topics(app: &App, slots: Option<&[String]>) -> Result<Vec<TopicConfig>> {
    let Some(slots) = slots else {
        return Ok(app.config.topics.clone());
    };
    for slot in slots {
        if app.config.topic(slot).is_none() {
            anyhow::bail!("topic not found: {}", slot);
        }
    }
    Ok(app
        .config
        .topics
        .iter()
        .filter(|t| slots.contains(&t.slot()))
        .cloned()
        .collect())
}

/// `evh extract --topic <slot>`: print the context block without generating.
pub fn run_extract(app: &App, session: &mut Session, slot: &str) -> Result<()> {
    let topic = app
        .config
        .topic(slot)
        .ok_or_else(|| anyhow!("topic not found: {}", slot))?;
    let documents = session.matching_documents(&app.facet_engine());
    let insights = extract(&app.store, &documents, &topic.schema());
    if insights.is_empty() {
        println!("{}", no_insights_message(&topic.name));
        return Ok(());
    }
    print!(
        "{}",
        insights.format_context(app.config.insights.max_context_chars)
    );
    Ok(())
}

/// `evh insights`: run the bulk job and print each slot.
pub async fn run_insights(app: &App, session: &mut Session) -> Result<()> {
    if app.config.topics.is_empty() {
        println!("No topics configured. Add [[topics]] to the config file.");
        return Ok(());
    }
    let reports = run_session_job(app, session).await?;
    let mut total = TokenUsage::default();
    for report in &reports {
        println!("== {} [{}] ==", report.name, report.slot);
        match &report.outcome {
            TopicOutcome::Completed {
                bullets,
                usage,
                documents,
            } => {
                for bullet in bullets {
                    println!("{}", bullet);
                }
                println!("({} documents, {} tokens)", documents, usage.total_tokens);
                total += *usage;
            }
            TopicOutcome::Failed { message } => println!("{}", message),
        }
        println!();
    }
    println!(
        "Total tokens: {} (prompt {}, completion {})",
        total.total_tokens, total.prompt_tokens, total.completion_tokens
    );
    Ok(())
}
