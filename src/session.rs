//! Per-session state.
//!
//! A [`Session`] is created when an analyst starts working and dropped when
//! they leave. It holds their facet selections, the last cascade, cached
//! insight results per slot, and whether a bulk insight job is running.
//! Nothing in it is shared with other sessions or with job tasks: job
//! results are written back here only after the job has joined.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use evidence_harness_core::facets::{
    FacetCascade, FacetEngine, FacetKind, FacetSet, RangeFilter, Selection,
};
use evidence_harness_core::models::DocumentId;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::insights::{TopicOutcome, TopicReport};

/// A slot's last result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedInsight {
    pub name: String,
    pub outcome: TopicOutcome,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Session {
    facets: FacetSet,
    cascade: Option<FacetCascade>,
    insights: BTreeMap<String, CachedInsight>,
    in_flight: bool,
    started_at: DateTime<Utc>,
}

impl Session {
    /// Defaults: year range spans the corpus but is not applied until set,
    /// sample size disabled, every categorical facet at `All`.
    pub fn new(engine: &FacetEngine<'_>) -> Self {
        let (low, high) = engine.year_bounds();
        let facets = FacetSet {
            year: RangeFilter {
                low,
                high,
                enabled: false,
            },
            ..FacetSet::default()
        };
        Self {
            facets,
            cascade: None,
            insights: BTreeMap::new(),
            in_flight: false,
            started_at: Utc::now(),
        }
    }

    pub fn facets(&self) -> &FacetSet {
        &self.facets
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn set_year_range(&mut self, low: i64, high: i64) {
        self.facets.year = RangeFilter::new(low, high);
        self.cascade = None;
    }

    /// Slider position; the ceiling mapping happens in the cascade.
    pub fn set_sample_size(&mut self, low: i64, high: i64) {
        self.facets.sample_size = RangeFilter::new(low, high);
        self.cascade = None;
    }

    pub fn disable_sample_size(&mut self) {
        self.facets.sample_size.enabled = false;
        self.cascade = None;
    }

    /// Replace a categorical selection with picker input (labels allowed).
    pub fn select<I, S>(&mut self, kind: FacetKind, submitted: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let selection = Selection::from_submitted(submitted);
        match kind {
            FacetKind::PublicationType => self.facets.publication_type = selection,
            FacetKind::FundingSource => self.facets.funding_source = selection,
            FacetKind::StudyDesign => self.facets.study_design = selection,
            FacetKind::Year | FacetKind::SampleSize => return,
        }
        self.cascade = None;
    }

    /// Recompute the cascade and keep the revalidated selections.
    pub fn refresh(&mut self, engine: &FacetEngine<'_>) -> &FacetCascade {
        let cascade = self.compute(engine);
        self.cascade.insert(cascade)
    }

    /// The current cascade, recomputed only when a facet changed.
    pub fn cascade(&mut self, engine: &FacetEngine<'_>) -> &FacetCascade {
        let cascade = match self.cascade.take() {
            Some(cascade) => cascade,
            None => self.compute(engine),
        };
        self.cascade.insert(cascade)
    }

    fn compute(&mut self, engine: &FacetEngine<'_>) -> FacetCascade {
        let cascade = engine.cascade(&self.facets);
        self.facets.publication_type = cascade.applied.publication_type.clone();
        self.facets.funding_source = cascade.applied.funding_source.clone();
        self.facets.study_design = cascade.applied.study_design.clone();
        debug!(matching = cascade.documents.len(), "session facets refreshed");
        cascade
    }

    pub fn matching_documents(&mut self, engine: &FacetEngine<'_>) -> Vec<DocumentId> {
        self.cascade(engine).documents.clone()
    }

    pub fn is_job_running(&self) -> bool {
        self.in_flight
    }

    /// Mark a bulk job as started. A second job on the same session is
    /// rejected until [`Session::finish_job`].
    pub fn begin_job(&mut self) -> Result<()> {
        if self.in_flight {
            bail!("an insight job is already running for this session");
        }
        self.in_flight = true;
        Ok(())
    }

    /// Store a finished job's results and clear the in-flight flag.
    pub fn finish_job(&mut self, reports: &[TopicReport]) {
        let now = Utc::now();
        for report in reports {
            self.insights.insert(
                report.slot.clone(),
                CachedInsight {
                    name: report.name.clone(),
                    outcome: report.outcome.clone(),
                    generated_at: now,
                },
            );
        }
        self.in_flight = false;
    }

    pub fn cached(&self, slot: &str) -> Option<&CachedInsight> {
        self.insights.get(slot)
    }

    pub fn cached_slots(&self) -> impl Iterator<Item = (&str, &CachedInsight)> {
        self.insights.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evidence_harness_core::corpus::CorpusStore;
    use evidence_harness_core::generation::TokenUsage;
    use evidence_harness_core::models::FieldKey;

    fn store() -> CorpusStore {
        let mut b = CorpusStore::builder();
        b.document("d1").document("d2").document("d3");
        b.entry(
            FieldKey::new("meta_data", "publication_year", None),
            [("d1", "2015"), ("d2", "2020"), ("d3", "2024")],
        )
        .entry(
            FieldKey::new("meta_data", "publication_type", None),
            [("d1", "Review"), ("d2", "Journal Article"), ("d3", "Journal Article")],
        )
        .entry(
            FieldKey::new("meta_data", "funding_source", Some("type")),
            [("d1", "Industry"), ("d2", "Government"), ("d3", "Government")],
        );
        b.build()
    }

    #[test]
    fn test_new_session_matches_everything() {
        let store = store();
        let engine = FacetEngine::new(&store);
        let mut session = Session::new(&engine);
        assert_eq!(session.facets().year.low, 2015);
        assert_eq!(session.facets().year.high, 2024);
        assert_eq!(session.matching_documents(&engine).len(), 3);
    }

    #[test]
    fn test_refresh_writes_back_revalidated_selection() {
        let store = store();
        let engine = FacetEngine::new(&store);
        let mut session = Session::new(&engine);
        session.select(FacetKind::FundingSource, ["Industry {1}"]);
        session.select(FacetKind::PublicationType, ["Journal Article {2}"]);
        let cascade = session.refresh(&engine);
        assert_eq!(cascade.documents, vec!["d2", "d3"]);
        assert_eq!(session.facets().funding_source, Selection::All);
    }

    #[test]
    fn test_year_range_applies_once_set() {
        let store = store();
        let engine = FacetEngine::new(&store);
        let mut session = Session::new(&engine);
        session.set_year_range(2019, 2025);
        assert_eq!(session.matching_documents(&engine), vec!["d2", "d3"]);
    }

    #[test]
    fn test_second_job_is_rejected_until_finished() {
        let store = store();
        let mut session = Session::new(&FacetEngine::new(&store));
        session.begin_job().unwrap();
        assert!(session.begin_job().is_err());
        session.finish_job(&[TopicReport {
            slot: "findings".into(),
            name: "Findings".into(),
            outcome: TopicOutcome::Completed {
                bullets: vec!["• x".into()],
                usage: TokenUsage::default(),
                documents: 1,
            },
        }]);
        assert!(!session.is_job_running());
        assert!(session.cached("findings").is_some());
        assert!(session.begin_job().is_ok());
    }
}
