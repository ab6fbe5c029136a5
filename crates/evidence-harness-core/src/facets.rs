//! Cascading multi-facet filtering.
//!
//! A [`FacetSet`] holds the five facets analysts filter by: two numeric
//! ranges (publication year, sample size) and three categorical selections
//! (publication type, funding source, study design). Membership is the
//! conjunction of every enabled facet; inside a categorical facet it is the
//! disjunction of the selected values.
//!
//! [`FacetEngine::cascade`] evaluates the facets in [`PICK_ORDER`], computing
//! each facet's option list (with live counts) from the documents that passed
//! the earlier facets only, and revalidating the current selection against
//! it. Unparseable or missing attribute values never raise: a document simply
//! fails that one facet.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::corpus::{paths, CorpusStore};
use crate::models::{DocumentId, FieldEntry};

/// Sentinel selection value meaning "no restriction".
pub const ALL: &str = "All";

/// Parse a raw attribute as a number: float first, then truncated.
///
/// `"2019"`, `"2019.0"` and `" 120 "` all parse; `"n/a"` and `"NaN"` do not.
pub fn parse_number(raw: &str) -> Option<i64> {
    let n: f64 = raw.trim().parse().ok()?;
    if n.is_finite() {
        Some(n.trunc() as i64)
    } else {
        None
    }
}

/// Strip a `" {count}"` option label back to its raw value.
pub fn base_value(label: &str) -> &str {
    match label.split_once(" {") {
        Some((base, _)) => base,
        None => label,
    }
}

// ============ Range facets ============

/// Inclusive numeric range facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeFilter {
    pub low: i64,
    pub high: i64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl RangeFilter {
    pub fn new(low: i64, high: i64) -> Self {
        Self {
            low,
            high,
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            low: 0,
            high: 0,
            enabled: false,
        }
    }

    /// A disabled facet passes everything; an enabled one requires a value
    /// that parses and falls in `[low, high]`.
    pub fn matches(&self, raw: Option<&str>) -> bool {
        if !self.enabled {
            return true;
        }
        raw.and_then(parse_number)
            .is_some_and(|n| n >= self.low && n <= self.high)
    }
}

impl Default for RangeFilter {
    fn default() -> Self {
        Self::disabled()
    }
}

// ============ Categorical facets ============

/// Selected values of a categorical facet.
///
/// Serialized as a plain list of strings; `["All"]` is [`Selection::All`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum Selection {
    #[default]
    All,
    Values(Vec<String>),
}

impl Selection {
    /// Normalize values as submitted by a picker.
    ///
    /// Labels such as `"Industry {2}"` are reduced to their base value,
    /// duplicates are dropped, and `All` anywhere in the input (or an empty
    /// input) collapses the whole selection to [`Selection::All`].
    pub fn from_submitted<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values: Vec<String> = Vec::new();
        for item in items {
            let base = base_value(item.as_ref().trim());
            if base == ALL {
                return Selection::All;
            }
            if !values.iter().any(|v| v == base) {
                values.push(base.to_string());
            }
        }
        if values.is_empty() {
            Selection::All
        } else {
            Selection::Values(values)
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }

    /// Exact comparison against the raw stored value. Absent values only
    /// pass an unrestricted facet.
    pub fn matches(&self, raw: Option<&str>) -> bool {
        match self {
            Selection::All => true,
            Selection::Values(values) => raw.is_some_and(|r| values.iter().any(|v| v == r)),
        }
    }

    /// Drop values that no longer appear among `options`; reset to `All`
    /// when nothing survives.
    pub fn revalidate(&self, options: &[FacetOption]) -> Selection {
        match self {
            Selection::All => Selection::All,
            Selection::Values(values) => {
                let kept: Vec<String> = values
                    .iter()
                    .filter(|v| options.iter().any(|o| !o.is_all() && &o.value == *v))
                    .cloned()
                    .collect();
                if kept.is_empty() {
                    Selection::All
                } else {
                    Selection::Values(kept)
                }
            }
        }
    }
}

impl From<Vec<String>> for Selection {
    fn from(items: Vec<String>) -> Self {
        Selection::from_submitted(items)
    }
}

impl From<Selection> for Vec<String> {
    fn from(selection: Selection) -> Self {
        match selection {
            Selection::All => vec![ALL.to_string()],
            Selection::Values(values) => values,
        }
    }
}

/// One entry of a facet picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetOption {
    pub value: String,
    pub count: usize,
}

impl FacetOption {
    pub fn is_all(&self) -> bool {
        self.value == ALL
    }

    /// Display label, `"<value> {<count>}"`; the sentinel is shown bare.
    pub fn label(&self) -> String {
        if self.is_all() {
            ALL.to_string()
        } else {
            format!("{} {{{}}}", self.value, self.count)
        }
    }
}

// ============ Facet set ============

/// The five facets, in cascade order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetKind {
    Year,
    PublicationType,
    FundingSource,
    StudyDesign,
    SampleSize,
}

/// Order in which the cascade applies facets.
pub const PICK_ORDER: [FacetKind; 5] = [
    FacetKind::Year,
    FacetKind::PublicationType,
    FacetKind::FundingSource,
    FacetKind::StudyDesign,
    FacetKind::SampleSize,
];

impl FacetKind {
    /// Attribute path the facet reads.
    pub fn path(self) -> &'static str {
        match self {
            FacetKind::Year => paths::PUBLICATION_YEAR,
            FacetKind::PublicationType => paths::PUBLICATION_TYPE,
            FacetKind::FundingSource => paths::FUNDING_SOURCE,
            FacetKind::StudyDesign => paths::STUDY_DESIGN,
            FacetKind::SampleSize => paths::SAMPLE_SIZE,
        }
    }

    pub fn is_range(self) -> bool {
        matches!(self, FacetKind::Year | FacetKind::SampleSize)
    }
}

/// Facet selections applied to the corpus.
///
/// The default set restricts nothing: both ranges disabled, every
/// categorical facet at `All`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FacetSet {
    pub year: RangeFilter,
    pub sample_size: RangeFilter,
    pub publication_type: Selection,
    pub funding_source: Selection,
    pub study_design: Selection,
}

impl FacetSet {
    fn passes(&self, kind: FacetKind, raw: Option<&str>) -> bool {
        match kind {
            FacetKind::Year => self.year.matches(raw),
            FacetKind::SampleSize => self.sample_size.matches(raw),
            FacetKind::PublicationType => self.publication_type.matches(raw),
            FacetKind::FundingSource => self.funding_source.matches(raw),
            FacetKind::StudyDesign => self.study_design.matches(raw),
        }
    }

    fn selection_mut(&mut self, kind: FacetKind) -> Option<&mut Selection> {
        match kind {
            FacetKind::PublicationType => Some(&mut self.publication_type),
            FacetKind::FundingSource => Some(&mut self.funding_source),
            FacetKind::StudyDesign => Some(&mut self.study_design),
            FacetKind::Year | FacetKind::SampleSize => None,
        }
    }
}

// ============ Bounds ============

/// Fallbacks and slider ceiling used when the corpus gives no usable numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacetLimits {
    pub sample_size_ceiling: i64,
    pub default_year_range: (i64, i64),
    /// `(min, slider_max, actual_max)`.
    pub default_sample_size: (i64, i64, i64),
}

impl Default for FacetLimits {
    fn default() -> Self {
        Self {
            sample_size_ceiling: 10_000,
            default_year_range: (2011, 2025),
            default_sample_size: (50, 10_000, 15_000),
        }
    }
}

/// Slider bounds for the sample-size facet.
///
/// The slider tops out at `ceiling`; choosing it as the high end stands for
/// "ceiling and above", which is applied as `actual_max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SampleSizeBounds {
    pub min: i64,
    pub slider_max: i64,
    pub actual_max: i64,
    pub ceiling: i64,
}

impl SampleSizeBounds {
    /// Range to filter by for a slider position.
    pub fn filter_range(&self, low: i64, high: i64) -> (i64, i64) {
        if high >= self.ceiling {
            (low, self.actual_max.max(high))
        } else {
            (low, high)
        }
    }

    pub fn slider_label(&self, low: i64, high: i64) -> String {
        if high >= self.ceiling {
            format!("{} to {}+", low, self.ceiling)
        } else {
            format!("{} to {}", low, high)
        }
    }
}

// ============ Cascade output ============

/// Options and revalidated selection for one categorical facet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalState {
    pub kind: FacetKind,
    pub options: Vec<FacetOption>,
    pub selection: Selection,
}

/// Result of one cascading recompute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacetCascade {
    pub year_bounds: (i64, i64),
    pub categorical: Vec<CategoricalState>,
    pub sample_size: SampleSizeBounds,
    /// The facets actually applied: revalidated selections and the
    /// sample-size range after slider mapping.
    pub applied: FacetSet,
    pub documents: Vec<DocumentId>,
}

impl FacetCascade {
    pub fn state(&self, kind: FacetKind) -> Option<&CategoricalState> {
        self.categorical.iter().find(|c| c.kind == kind)
    }
}

// ============ Engine ============

/// Facet evaluation over a borrowed corpus.
///
/// Each facet path is resolved once at construction; a facet reads the
/// first row its path resolves to.
pub struct FacetEngine<'a> {
    store: &'a CorpusStore,
    limits: FacetLimits,
    rows: HashMap<FacetKind, Option<&'a FieldEntry>>,
}

impl<'a> FacetEngine<'a> {
    pub fn new(store: &'a CorpusStore) -> Self {
        Self::with_limits(store, FacetLimits::default())
    }

    pub fn with_limits(store: &'a CorpusStore, limits: FacetLimits) -> Self {
        let rows = PICK_ORDER
            .iter()
            .map(|&kind| {
                let resolution = store.resolution(kind.path());
                debug!(facet = ?kind, tier = ?resolution.tier, rows = resolution.rows.len(), "resolved facet path");
                let entry = resolution.first().and_then(|r| store.entries().get(r));
                (kind, entry)
            })
            .collect();
        Self {
            store,
            limits,
            rows,
        }
    }

    pub fn limits(&self) -> FacetLimits {
        self.limits
    }

    /// Raw attribute value a facet sees for a document.
    pub fn attribute(&self, kind: FacetKind, doc: &str) -> Option<&'a str> {
        self.rows.get(&kind).copied().flatten()?.value(doc)
    }

    /// Documents passing every facet, in column order.
    pub fn matching_documents(&self, facets: &FacetSet) -> Vec<DocumentId> {
        self.filter(self.store.documents().iter(), facets, &PICK_ORDER)
    }

    fn filter<'d, I>(&self, docs: I, facets: &FacetSet, kinds: &[FacetKind]) -> Vec<DocumentId>
    where
        I: IntoIterator<Item = &'d DocumentId>,
    {
        docs.into_iter()
            .filter(|doc| {
                kinds
                    .iter()
                    .all(|&kind| facets.passes(kind, self.attribute(kind, doc)))
            })
            .cloned()
            .collect()
    }

    /// Options for any attribute path over a candidate set.
    ///
    /// Counts use each document's value from the first resolved row, blank
    /// values excluded. Sorted by count descending, ties in first-seen
    /// order; the `All` sentinel (counting every candidate) comes first.
    pub fn facet_options<S: AsRef<str>>(&self, path: &str, candidates: &[S]) -> Vec<FacetOption> {
        let entry = self
            .store
            .resolution(path)
            .first()
            .and_then(|r| self.store.entries().get(r));
        Self::count_options(entry, candidates)
    }

    fn count_options<S: AsRef<str>>(entry: Option<&FieldEntry>, candidates: &[S]) -> Vec<FacetOption> {
        let mut options: Vec<FacetOption> = Vec::new();
        if let Some(entry) = entry {
            let mut seen: HashMap<&str, usize> = HashMap::new();
            for doc in candidates {
                let Some(value) = entry.non_empty_value(doc.as_ref()) else {
                    continue;
                };
                match seen.get(value) {
                    Some(&i) => options[i].count += 1,
                    None => {
                        seen.insert(value, options.len());
                        options.push(FacetOption {
                            value: value.to_string(),
                            count: 1,
                        });
                    }
                }
            }
        }
        options.sort_by(|a, b| b.count.cmp(&a.count));
        options.insert(
            0,
            FacetOption {
                value: ALL.to_string(),
                count: candidates.len(),
            },
        );
        options
    }

    /// Min and max parsed publication year over the whole corpus.
    pub fn year_bounds(&self) -> (i64, i64) {
        let years = self
            .store
            .documents()
            .iter()
            .filter_map(|d| self.attribute(FacetKind::Year, d).and_then(parse_number));
        min_max(years).unwrap_or(self.limits.default_year_range)
    }

    /// Sample-size slider bounds over a candidate set.
    pub fn sample_size_bounds<S: AsRef<str>>(&self, candidates: &[S]) -> SampleSizeBounds {
        let ceiling = self.limits.sample_size_ceiling;
        let sizes = candidates.iter().filter_map(|d| {
            self.attribute(FacetKind::SampleSize, d.as_ref())
                .and_then(parse_number)
        });
        let (min, slider_max, actual_max) = match min_max(sizes) {
            Some((lo, hi)) => (lo, hi.min(ceiling), hi),
            None => self.limits.default_sample_size,
        };
        SampleSizeBounds {
            min,
            slider_max,
            actual_max,
            ceiling,
        }
    }

    /// Recompute every facet in pick order.
    pub fn cascade(&self, facets: &FacetSet) -> FacetCascade {
        let mut applied = facets.clone();
        let mut candidates: Vec<DocumentId> = self.store.documents().to_vec();
        let mut categorical = Vec::with_capacity(3);
        let mut sample_size = self.sample_size_bounds(&candidates);

        for kind in PICK_ORDER {
            match kind {
                FacetKind::Year => {}
                FacetKind::SampleSize => {
                    sample_size = self.sample_size_bounds(&candidates);
                    if applied.sample_size.enabled {
                        let (low, high) = sample_size
                            .filter_range(applied.sample_size.low, applied.sample_size.high);
                        applied.sample_size.low = low;
                        applied.sample_size.high = high;
                    }
                }
                FacetKind::PublicationType | FacetKind::FundingSource | FacetKind::StudyDesign => {
                    let options =
                        Self::count_options(self.rows.get(&kind).copied().flatten(), &candidates);
                    let revalidated = match applied.selection_mut(kind) {
                        Some(selection) => {
                            *selection = selection.revalidate(&options);
                            selection.clone()
                        }
                        None => Selection::All,
                    };
                    categorical.push(CategoricalState {
                        kind,
                        options,
                        selection: revalidated,
                    });
                }
            }
            candidates = self.filter(candidates.iter(), &applied, &[kind]);
            debug!(facet = ?kind, remaining = candidates.len(), "applied facet");
        }

        FacetCascade {
            year_bounds: self.year_bounds(),
            categorical,
            sample_size,
            applied,
            documents: candidates,
        }
    }
}

fn min_max<I: Iterator<Item = i64>>(values: I) -> Option<(i64, i64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::tests::sample_corpus;
    use crate::models::FieldKey;

    fn years_only() -> CorpusStore {
        let mut b = CorpusStore::builder();
        b.document("d1").document("d2").document("d3");
        b.entry(
            FieldKey::new("meta_data", "publication_year", None),
            [("d1", "2019"), ("d2", "2021"), ("d3", "2023")],
        );
        b.build()
    }

    #[test]
    fn test_year_range_scenario() {
        let store = years_only();
        let engine = FacetEngine::new(&store);
        let facets = FacetSet {
            year: RangeFilter::new(2020, 2022),
            ..Default::default()
        };
        assert_eq!(engine.matching_documents(&facets), vec!["d2"]);
    }

    #[test]
    fn test_unrestricted_set_matches_everything() {
        let store = sample_corpus();
        let engine = FacetEngine::new(&store);
        assert_eq!(engine.matching_documents(&FacetSet::default()), store.documents());
    }

    #[test]
    fn test_adding_constraints_narrows() {
        let store = sample_corpus();
        let engine = FacetEngine::new(&store);
        let f1 = FacetSet {
            year: RangeFilter::new(2018, 2024),
            ..Default::default()
        };
        let f2 = FacetSet {
            funding_source: Selection::from_submitted(["Industry"]),
            ..f1.clone()
        };
        let f3 = FacetSet {
            sample_size: RangeFilter::new(100, 200),
            ..f2.clone()
        };
        let m1 = engine.matching_documents(&f1);
        let m2 = engine.matching_documents(&f2);
        let m3 = engine.matching_documents(&f3);
        assert!(m2.iter().all(|d| m1.contains(d)));
        assert!(m3.iter().all(|d| m2.contains(d)));
        assert_eq!(m2, vec!["doc_a", "doc_c"]);
        assert_eq!(m3, vec!["doc_a"]);
    }

    #[test]
    fn test_unparseable_value_fails_only_that_facet() {
        let store = sample_corpus();
        let engine = FacetEngine::new(&store);
        // doc_c's sample size is "n/a"
        let facets = FacetSet {
            sample_size: RangeFilter::new(0, 1_000_000),
            ..Default::default()
        };
        assert_eq!(engine.matching_documents(&facets), vec!["doc_a", "doc_b"]);

        let facets = FacetSet {
            study_design: Selection::from_submitted(["Cohort"]),
            ..Default::default()
        };
        assert_eq!(engine.matching_documents(&facets), vec!["doc_b", "doc_c"]);
    }

    #[test]
    fn test_categorical_or_within_facet() {
        let store = sample_corpus();
        let engine = FacetEngine::new(&store);
        let facets = FacetSet {
            study_design: Selection::from_submitted(["Cross-sectional", "Cohort {2}"]),
            ..Default::default()
        };
        assert_eq!(engine.matching_documents(&facets).len(), 3);
    }

    #[test]
    fn test_all_with_other_values_collapses() {
        let sel = Selection::from_submitted(["Industry {2}", "All"]);
        assert_eq!(sel, Selection::All);
        let sel = Selection::from_submitted(["Industry {2}"]);
        assert_eq!(sel, Selection::Values(vec!["Industry".to_string()]));
        assert_eq!(Selection::from_submitted(Vec::<String>::new()), Selection::All);
    }

    #[test]
    fn test_selection_serde_shape() {
        let json = serde_json::to_string(&Selection::All).unwrap();
        assert_eq!(json, r#"["All"]"#);
        let sel: Selection = serde_json::from_str(r#"["Review {1}", "Review"]"#).unwrap();
        assert_eq!(sel, Selection::Values(vec!["Review".to_string()]));
    }

    #[test]
    fn test_facet_options_sorted_with_sentinel() {
        let store = sample_corpus();
        let engine = FacetEngine::new(&store);
        let options = engine.facet_options(paths::PUBLICATION_TYPE, store.documents());
        let labels: Vec<String> = options.iter().map(FacetOption::label).collect();
        assert_eq!(labels, vec!["All", "Journal Article {2}", "Review {1}"]);
    }

    #[test]
    fn test_facet_options_ties_keep_first_seen_order() {
        let store = sample_corpus();
        let engine = FacetEngine::new(&store);
        let options = engine.facet_options(paths::STUDY_DESIGN, &["doc_a", "doc_b"]);
        let values: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["All", "Cross-sectional", "Cohort"]);
    }

    #[test]
    fn test_facet_options_missing_path() {
        let store = sample_corpus();
        let engine = FacetEngine::new(&store);
        let options = engine.facet_options("no_such_field", store.documents());
        assert_eq!(options.len(), 1);
        assert!(options[0].is_all());
    }

    #[test]
    fn test_revalidation_drops_stale_values() {
        let options = vec![
            FacetOption { value: ALL.into(), count: 2 },
            FacetOption { value: "Cohort".into(), count: 2 },
        ];
        let sel = Selection::from_submitted(["Cohort", "Case report"]);
        assert_eq!(sel.revalidate(&options), Selection::Values(vec!["Cohort".into()]));
        let sel = Selection::from_submitted(["Case report"]);
        assert_eq!(sel.revalidate(&options), Selection::All);
    }

    #[test]
    fn test_cascade_counts_follow_earlier_facets() {
        let store = sample_corpus();
        let engine = FacetEngine::new(&store);
        let facets = FacetSet {
            publication_type: Selection::from_submitted(["Journal Article"]),
            ..Default::default()
        };
        let cascade = engine.cascade(&facets);
        let funding = cascade.state(FacetKind::FundingSource).unwrap();
        let labels: Vec<String> = funding.options.iter().map(FacetOption::label).collect();
        assert_eq!(labels, vec!["All", "Industry {1}", "Government {1}"]);

        // publication type itself is not narrowed by its own selection
        let pub_type = cascade.state(FacetKind::PublicationType).unwrap();
        assert_eq!(pub_type.options.len(), 3);
        assert_eq!(cascade.documents, vec!["doc_a", "doc_b"]);
    }

    #[test]
    fn test_cascade_resets_emptied_selection() {
        let store = sample_corpus();
        let engine = FacetEngine::new(&store);
        let facets = FacetSet {
            publication_type: Selection::from_submitted(["Review"]),
            funding_source: Selection::from_submitted(["Government"]),
            ..Default::default()
        };
        let cascade = engine.cascade(&facets);
        assert_eq!(cascade.applied.funding_source, Selection::All);
        assert_eq!(cascade.documents, vec!["doc_c"]);
    }

    #[test]
    fn test_cascade_maps_sample_ceiling_to_actual_max() {
        let store = sample_corpus();
        let engine = FacetEngine::new(&store);
        let facets = FacetSet {
            sample_size: RangeFilter::new(100, 10_000),
            ..Default::default()
        };
        let cascade = engine.cascade(&facets);
        assert_eq!(cascade.sample_size.actual_max, 25_000);
        assert_eq!(cascade.sample_size.slider_max, 10_000);
        assert_eq!(cascade.applied.sample_size.high, 25_000);
        assert_eq!(cascade.documents, vec!["doc_a", "doc_b"]);
        assert_eq!(cascade.sample_size.slider_label(100, 10_000), "100 to 10000+");
    }

    #[test]
    fn test_bounds_defaults_when_nothing_parses() {
        let store = CorpusStore::empty();
        let engine = FacetEngine::new(&store);
        assert_eq!(engine.year_bounds(), (2011, 2025));
        let b = engine.sample_size_bounds(store.documents());
        assert_eq!((b.min, b.slider_max, b.actual_max), (50, 10_000, 15_000));
    }

    #[test]
    fn test_year_bounds_over_corpus() {
        let store = sample_corpus();
        assert_eq!(FacetEngine::new(&store).year_bounds(), (2019, 2023));
    }

    #[test]
    fn test_parse_number_truncates() {
        assert_eq!(parse_number("2019.0"), Some(2019));
        assert_eq!(parse_number(" 120.9 "), Some(120));
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number("NaN"), None);
    }
}
