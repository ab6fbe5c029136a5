//! The facet query surface and the facet-driven CLI commands.
//!
//! [`FacetRequest`] carries exactly the five facets a client may set. It is
//! the body of the HTTP facet endpoints and is built from flags by the CLI.

use anyhow::{bail, Result};
use evidence_harness_core::corpus::DocumentDetails;
use evidence_harness_core::facets::{FacetCascade, FacetKind, FacetOption};
use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::session::Session;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FacetRequest {
    pub year_range: Option<[i64; 2]>,
    pub sample_size_range: Option<[i64; 2]>,
    /// Defaults to whether `sample_size_range` is given.
    pub sample_size_enabled: Option<bool>,
    pub publication_type: Vec<String>,
    pub funding_source: Vec<String>,
    pub study_design: Vec<String>,
}

impl FacetRequest {
    pub fn validate(&self) -> Result<()> {
        for (name, range) in [
            ("year_range", self.year_range),
            ("sample_size_range", self.sample_size_range),
        ] {
            if let Some([low, high]) = range {
                if low > high {
                    bail!("{} must be [low, high] with low <= high", name);
                }
            }
        }
        if self.sample_size_enabled == Some(true) && self.sample_size_range.is_none() {
            bail!("sample_size_range is required when sample_size_enabled is true");
        }
        Ok(())
    }

    /// Apply onto a session's facets.
    pub fn apply(&self, session: &mut Session) -> Result<()> {
        self.validate()?;
        if let Some([low, high]) = self.year_range {
            session.set_year_range(low, high);
        }
        match (self.sample_size_range, self.sample_size_enabled) {
            (Some([low, high]), None | Some(true)) => session.set_sample_size(low, high),
            _ => session.disable_sample_size(),
        }
        session.select(FacetKind::PublicationType, &self.publication_type);
        session.select(FacetKind::FundingSource, &self.funding_source);
        session.select(FacetKind::StudyDesign, &self.study_design);
        Ok(())
    }

    /// A fresh session with this request applied.
    pub fn session(&self, app: &App) -> Result<Session> {
        let mut session = app.new_session();
        self.apply(&mut session)?;
        Ok(session)
    }
}

/// Cascade plus totals, as returned by `POST /facets`.
#[derive(Debug, Clone, Serialize)]
pub struct FacetReport {
    pub total: usize,
    pub matching: usize,
    /// `"<low> to <ceiling>+"` style label when the sample-size facet is on.
    pub sample_size_label: Option<String>,
    pub cascade: FacetCascade,
}

pub fn facet_report(app: &App, session: &mut Session) -> FacetReport {
    let sample = session.facets().sample_size;
    let cascade = session.refresh(&app.facet_engine()).clone();
    let sample_size_label = sample
        .enabled
        .then(|| cascade.sample_size.slider_label(sample.low, sample.high));
    FacetReport {
        total: app.store.documents().len(),
        matching: cascade.documents.len(),
        sample_size_label,
        cascade,
    }
}

/// Details of the documents passing the session's facets.
pub fn matching_details(app: &App, session: &mut Session) -> Vec<DocumentDetails> {
    let documents = session.matching_documents(&app.facet_engine());
    app.store.document_details(&documents)
}

fn print_options(title: &str, options: &[FacetOption], selected: &[String]) {
    let labels: Vec<String> = options.iter().map(FacetOption::label).collect();
    println!("{}: {}", title, selected.join(", "));
    println!("  options: {}", labels.join(" | "));
}

/// `evh facets`.
pub fn run_facets(app: &App, session: &mut Session) -> Result<()> {
    let report = facet_report(app, session);
    let c = &report.cascade;
    let year = session.facets().year;
    if year.enabled {
        println!("year: {} to {} (corpus {} to {})", year.low, year.high, c.year_bounds.0, c.year_bounds.1);
    } else {
        println!("year: any (corpus {} to {})", c.year_bounds.0, c.year_bounds.1);
    }
    for state in &c.categorical {
        let title = match state.kind {
            FacetKind::PublicationType => "publication type",
            FacetKind::FundingSource => "funding source",
            _ => "study design",
        };
        let selected: Vec<String> = state.selection.clone().into();
        print_options(title, &state.options, &selected);
    }
    match &report.sample_size_label {
        Some(label) => println!(
            "sample size: {} (applied {} to {})",
            label, c.applied.sample_size.low, c.applied.sample_size.high
        ),
        None => println!(
            "sample size: any (range {} to {}, max {})",
            c.sample_size.min, c.sample_size.slider_max, c.sample_size.actual_max
        ),
    }
    println!();
    if report.matching == 0 {
        println!("No matching documents.");
    } else {
        println!("{} of {} documents match:", report.matching, report.total);
        for doc in &c.documents {
            println!("  {}", doc);
        }
    }
    Ok(())
}

/// `evh docs`.
pub fn run_docs(app: &App, session: &mut Session) -> Result<()> {
    let details = matching_details(app, session);
    if details.is_empty() {
        println!("No matching documents.");
        return Ok(());
    }
    for d in &details {
        println!("{}  {} ({})", d.document, d.title, d.year);
        println!("    {} | {}", d.authors, d.journal);
    }
    Ok(())
}

/// `evh sample`: the most complete documents in the corpus.
pub fn run_sample(app: &App, n: usize) -> Result<()> {
    let top = app.store.most_complete_documents(n);
    if top.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    let ids: Vec<&str> = top.iter().map(|(id, _)| id.as_str()).collect();
    let details = app.store.document_details(&ids);
    for ((_, fields), d) in top.iter().zip(&details) {
        println!("{}  {} fields  {}", d.document, fields, d.title);
    }
    Ok(())
}
