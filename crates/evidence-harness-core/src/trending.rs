//! Digest of the most recent research in the corpus.
//!
//! "Recent" is a window of publication years ending at the latest year any
//! document reports. Over the recent papers the digest collects a card per
//! paper (with up to [`MAX_TAGS`] topic tags), the harmful ingredients no
//! older paper mentions, health findings grouped by effect category, and
//! the distinct study designs and funding sources.
//!
//! Every lookup goes through [`CorpusStore::resolve`], so a field missing
//! from the corpus simply contributes nothing.

use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::corpus::{paths, CorpusStore};
use crate::facets::parse_number;
use crate::index::excerpt;
use crate::models::{DocumentId, FieldEntry};

/// Most tags shown on one paper card.
pub const MAX_TAGS: usize = 8;

const KEY_FINDINGS_CHARS: usize = 250;
const SUMMARY_TAG_CHARS: usize = 30;
const NO_YEAR_TAG: &str = "New";

/// Effect categories searched for `*description*` findings, in display order.
pub const HEALTH_CATEGORIES: [&str; 7] = [
    "respiratory_effects",
    "cardiovascular_effects",
    "oral_health",
    "neurological_effects",
    "psychiatric_effects",
    "cancer_risk",
    "developmental_effects",
];

const INGREDIENT_NAME: &str = "harmful_ingredients.name";
const INGREDIENT_HEALTH_IMPACT: &str = "harmful_ingredients.health_impact";
const INGREDIENT_EVIDENCE: &str = "harmful_ingredients.evidence_strength";
const INGREDIENT_COMPARISON: &str = "harmful_ingredients.comparison_to_cigarettes";

/// Leading list numbering such as `1) `, `2. ` or `3 - `.
static LIST_NUMBERING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+[\)\.:\-\s]+\s*").expect("valid regex"));

/// Colour class of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    New,
    Method,
    Harmful,
    Benefit,
    Health,
    Behavioral,
    Innovation,
    Technical,
    Findings,
    Mechanism,
    Environmental,
}

/// Display order of tags on a card. Within a rank, source order holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TagRank {
    Year,
    StudyDesign,
    Harmful,
    Other,
}

/// How a field value becomes tag text.
#[derive(Debug, Clone, Copy)]
enum TagShape {
    /// A serialized list: numbering stripped from each item.
    List,
    /// Free text: cut to a short prefix.
    Summary,
}

struct TagSource {
    path: &'static str,
    shape: TagShape,
    kind: TagKind,
    rank: TagRank,
}

const fn list(path: &'static str, kind: TagKind, rank: TagRank) -> TagSource {
    TagSource {
        path,
        shape: TagShape::List,
        kind,
        rank,
    }
}

const fn summary(path: &'static str, kind: TagKind) -> TagSource {
    TagSource {
        path,
        shape: TagShape::Summary,
        kind,
        rank: TagRank::Other,
    }
}

const TAG_SOURCES: [TagSource; 20] = [
    list("study_design.primary_type", TagKind::Method, TagRank::StudyDesign),
    list(INGREDIENT_NAME, TagKind::Harmful, TagRank::Harmful),
    list("device_design_implications.feature", TagKind::Method, TagRank::Other),
    list(
        "comparative_benefits.vs_traditional_cigarettes.benefit",
        TagKind::Benefit,
        TagRank::Other,
    ),
    list("respiratory_effects.measured_outcomes", TagKind::Method, TagRank::Other),
    list("e_cigarette_specifications.device_types", TagKind::Method, TagRank::Other),
    list("cardiovascular_effects.measured_outcomes", TagKind::Health, TagRank::Other),
    list("cancer_risk.description", TagKind::Health, TagRank::Other),
    list("oral_health.periodontal_health.description", TagKind::Health, TagRank::Other),
    list("neurological_effects.specific_outcomes", TagKind::Health, TagRank::Other),
    list("reasons_for_use.primary_reasons", TagKind::Behavioral, TagRank::Other),
    list("smoking_cessation.success_rates", TagKind::Behavioral, TagRank::Other),
    list(
        "product_preferences.flavor_preferences.most_popular_flavors",
        TagKind::Behavioral,
        TagRank::Other,
    ),
    list("potential_innovation_areas.area", TagKind::Innovation, TagRank::Other),
    list("operating_parameters.temperature", TagKind::Technical, TagRank::Other),
    summary("novel_findings", TagKind::Findings),
    summary("limitations", TagKind::Findings),
    list("biological_pathways.pathway", TagKind::Mechanism, TagRank::Other),
    summary("waste_generation", TagKind::Environmental),
    summary("pollution", TagKind::Environmental),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub text: String,
    pub kind: TagKind,
}

/// Summary of one recent paper.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaperCard {
    pub document: DocumentId,
    pub title: String,
    pub authors: Option<String>,
    pub publication_type: Option<String>,
    pub year: Option<String>,
    /// Main conclusions, cut to 250 characters.
    pub key_findings: Option<String>,
    pub tags: Vec<Tag>,
}

/// A harmful ingredient reported by recent papers and by no older one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewIngredient {
    pub name: String,
    pub documents: Vec<DocumentId>,
    pub titles: Vec<String>,
    /// Details come from the first recent paper naming the ingredient.
    pub health_impact: Option<String>,
    pub evidence_strength: Option<String>,
    pub comparison_to_cigarettes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthFinding {
    pub document: DocumentId,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthFindings {
    pub category: String,
    pub findings: Vec<HealthFinding>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TrendingReport {
    /// Inclusive year window, `None` when no document has a year.
    pub years: Option<[i64; 2]>,
    pub papers: Vec<PaperCard>,
    pub new_ingredients: Vec<NewIngredient>,
    pub study_designs: Vec<String>,
    pub funding_sources: Vec<String>,
    pub health_findings: Vec<HealthFindings>,
}

/// Parsed publication year of a document.
pub fn publication_year(store: &CorpusStore, doc: &str) -> Option<i64> {
    store
        .first_value(paths::PUBLICATION_YEAR, doc)
        .and_then(parse_number)
}

pub fn latest_year(store: &CorpusStore) -> Option<i64> {
    store
        .documents()
        .iter()
        .filter_map(|d| publication_year(store, d))
        .max()
}

/// Documents published in `year`, in column order.
pub fn papers_by_year(store: &CorpusStore, year: i64) -> Vec<DocumentId> {
    store
        .documents()
        .iter()
        .filter(|d| publication_year(store, d) == Some(year))
        .cloned()
        .collect()
}

/// Year window covering the `span` latest publication years.
pub fn recent_window(store: &CorpusStore, span: usize) -> Option<[i64; 2]> {
    let latest = latest_year(store)?;
    let span = i64::try_from(span.max(1)).unwrap_or(i64::MAX);
    Some([latest.saturating_sub(span - 1), latest])
}

/// Documents inside the recent window, newest year first and column order
/// within a year.
pub fn recent_papers(store: &CorpusStore, span: usize) -> Vec<DocumentId> {
    let Some([first, last]) = recent_window(store, span) else {
        return Vec::new();
    };
    let mut dated: Vec<(i64, &DocumentId)> = store
        .documents()
        .iter()
        .filter_map(|d| {
            publication_year(store, d)
                .filter(|y| (first..=last).contains(y))
                .map(|y| (y, d))
        })
        .collect();
    dated.sort_by(|a, b| b.0.cmp(&a.0));
    dated.into_iter().map(|(_, d)| d.clone()).collect()
}

fn first_row<'a>(store: &'a CorpusStore, path: &str) -> Option<&'a FieldEntry> {
    store.resolve(path).into_iter().next()
}

fn trimmed(row: Option<&FieldEntry>, doc: &str) -> Option<String> {
    row.and_then(|e| e.non_empty_value(doc))
        .map(|v| v.trim().to_string())
}

/// Harmful ingredients named by `recent` papers that no other document in
/// the corpus names, in order of first appearance.
pub fn new_harmful_ingredients(store: &CorpusStore, recent: &[DocumentId]) -> Vec<NewIngredient> {
    let Some(names) = first_row(store, INGREDIENT_NAME) else {
        return Vec::new();
    };
    let impact = first_row(store, INGREDIENT_HEALTH_IMPACT);
    let evidence = first_row(store, INGREDIENT_EVIDENCE);
    let comparison = first_row(store, INGREDIENT_COMPARISON);

    let recent_set: HashSet<&str> = recent.iter().map(String::as_str).collect();
    let older: HashSet<&str> = store
        .documents()
        .iter()
        .filter(|d| !recent_set.contains(d.as_str()))
        .filter_map(|d| names.non_empty_value(d))
        .map(str::trim)
        .collect();

    let mut found: Vec<NewIngredient> = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();
    for doc in recent {
        let Some(name) = names.non_empty_value(doc).map(str::trim) else {
            continue;
        };
        if older.contains(name) {
            continue;
        }
        let title = store.label(doc).to_string();
        match slots.get(name) {
            Some(&i) => {
                found[i].documents.push(doc.clone());
                found[i].titles.push(title);
            }
            None => {
                slots.insert(name, found.len());
                found.push(NewIngredient {
                    name: name.to_string(),
                    documents: vec![doc.clone()],
                    titles: vec![title],
                    health_impact: trimmed(impact, doc),
                    evidence_strength: trimmed(evidence, doc),
                    comparison_to_cigarettes: trimmed(comparison, doc),
                });
            }
        }
    }
    found
}

/// Description rows of each [`HEALTH_CATEGORIES`] entry, over `papers`.
/// Categories without findings are left out.
pub fn health_findings(store: &CorpusStore, papers: &[DocumentId]) -> Vec<HealthFindings> {
    HEALTH_CATEGORIES
        .iter()
        .filter_map(|&category| {
            let rows: Vec<&FieldEntry> = store
                .entries()
                .iter()
                .filter(|e| {
                    e.key.category.contains(category)
                        && e.key
                            .sub_category
                            .as_deref()
                            .is_some_and(|s| s.contains("description"))
                })
                .collect();
            let findings: Vec<HealthFinding> = papers
                .iter()
                .flat_map(|doc| {
                    rows.iter().filter_map(move |e| {
                        e.non_empty_value(doc).map(|v| HealthFinding {
                            document: doc.clone(),
                            title: store.label(doc).to_string(),
                            description: v.trim().to_string(),
                        })
                    })
                })
                .collect();
            (!findings.is_empty()).then(|| HealthFindings {
                category: category.to_string(),
                findings,
            })
        })
        .collect()
}

/// Distinct non-blank values of `path` over `papers`, first seen first.
pub fn distinct_values(store: &CorpusStore, path: &str, papers: &[DocumentId]) -> Vec<String> {
    let Some(row) = first_row(store, path) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    papers
        .iter()
        .filter_map(|d| row.non_empty_value(d).map(str::trim))
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}

/// `"1) Cohort, 2) Survey"` becomes `"Cohort, Survey"`.
pub fn strip_list_numbering(value: &str) -> String {
    let items: Vec<String> = value
        .split(',')
        .map(|item| LIST_NUMBERING.replace(item.trim(), "").into_owned())
        .filter(|item| !item.is_empty())
        .collect();
    if items.is_empty() {
        value.to_string()
    } else {
        items.join(", ")
    }
}

fn summary_tag(value: &str) -> String {
    if value.chars().count() > SUMMARY_TAG_CHARS {
        let head: String = value.chars().take(SUMMARY_TAG_CHARS).collect();
        format!("{}...", head.trim())
    } else {
        value.to_string()
    }
}

fn year_tag(store: &CorpusStore, doc: &str) -> String {
    match store
        .first_value(paths::PUBLICATION_YEAR, doc)
        .map(str::trim)
        .filter(|y| !y.is_empty())
    {
        Some(raw) => parse_number(raw).map_or_else(|| raw.to_string(), |y| y.to_string()),
        None => NO_YEAR_TAG.to_string(),
    }
}

/// Topic tags for a paper card: the year first, then study design, then
/// harmful ingredients, then everything else, at most [`MAX_TAGS`].
///
/// Values equal to the paper's title and repeated tag texts are skipped.
pub fn tags_for_paper(store: &CorpusStore, doc: &str) -> Vec<Tag> {
    let title = store.first_value(paths::TITLE, doc).map(str::trim);
    let mut ranked = vec![(
        TagRank::Year,
        Tag {
            text: year_tag(store, doc),
            kind: TagKind::New,
        },
    )];
    let mut used = HashSet::new();

    for source in &TAG_SOURCES {
        let Some(raw) = store.first_value(source.path, doc).map(str::trim) else {
            continue;
        };
        if raw.is_empty() || title == Some(raw) {
            continue;
        }
        let text = match source.shape {
            TagShape::List => strip_list_numbering(raw),
            TagShape::Summary => summary_tag(raw),
        };
        if used.insert(text.clone()) {
            ranked.push((
                source.rank,
                Tag {
                    text,
                    kind: source.kind,
                },
            ));
        }
    }

    ranked.sort_by_key(|(rank, _)| *rank);
    ranked
        .into_iter()
        .map(|(_, tag)| tag)
        .take(MAX_TAGS)
        .collect()
}

fn paper_card(store: &CorpusStore, doc: &DocumentId) -> PaperCard {
    let value = |path: &str| {
        store
            .first_value(path, doc)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    PaperCard {
        document: doc.clone(),
        title: store.label(doc).to_string(),
        authors: value(paths::AUTHORS),
        publication_type: value(paths::PUBLICATION_TYPE),
        year: value(paths::PUBLICATION_YEAR),
        key_findings: value(paths::MAIN_CONCLUSIONS).map(|c| excerpt(&c, KEY_FINDINGS_CHARS)),
        tags: tags_for_paper(store, doc),
    }
}

/// Digest of the papers published in the `span` latest years.
pub fn trending_report(store: &CorpusStore, span: usize) -> TrendingReport {
    let recent = recent_papers(store, span);
    if recent.is_empty() {
        return TrendingReport::default();
    }
    TrendingReport {
        years: recent_window(store, span),
        papers: recent.iter().map(|d| paper_card(store, d)).collect(),
        new_ingredients: new_harmful_ingredients(store, &recent),
        study_designs: distinct_values(store, paths::STUDY_DESIGN, &recent),
        funding_sources: distinct_values(store, paths::FUNDING_SOURCE, &recent),
        health_findings: health_findings(store, &recent),
    }
}
