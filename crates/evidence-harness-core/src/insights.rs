//! Schema-driven insight extraction.
//!
//! An [`InsightSchema`] lists, per named group, the dotted paths to pull for
//! a topic. [`extract`] walks it for each document through the path
//! resolver and keeps only non-blank values. The output never contains an
//! empty field, an empty group, or an empty document: each level is
//! dropped when nothing below it survived.
//!
//! The extracted structure is serialized with [`Insights::format_context`]
//! into the bounded context block handed to the generator, and the
//! generator's reply is split back into bullets with [`parse_bullets`].

use serde::{Deserialize, Serialize};

use crate::corpus::CorpusStore;
use crate::models::{DocumentId, FieldEntry};

/// Marker appended when a context block is cut at its character budget.
pub const TRUNCATION_MARKER: &str = "\n[... context truncated ...]";

/// A named group of dotted paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaGroup {
    pub name: String,
    pub paths: Vec<String>,
}

/// Ordered groups of paths extracted for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InsightSchema {
    pub groups: Vec<SchemaGroup>,
}

impl InsightSchema {
    pub fn new(groups: Vec<SchemaGroup>) -> Self {
        Self { groups }
    }

    /// Single group schema, e.g. `{"Key Findings": ["main_conclusions"]}`.
    pub fn single<S: Into<String>>(name: &str, paths: impl IntoIterator<Item = S>) -> Self {
        Self {
            groups: vec![SchemaGroup {
                name: name.to_string(),
                paths: paths.into_iter().map(Into::into).collect(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldInsights {
    pub path: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupInsights {
    pub name: String,
    pub fields: Vec<FieldInsights>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentInsights {
    pub document: DocumentId,
    /// Title when the document has one, otherwise its id.
    pub label: String,
    pub groups: Vec<GroupInsights>,
}

/// Extracted insights, in document order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Insights {
    pub documents: Vec<DocumentInsights>,
}

/// Pull the schema's non-blank values for each document.
///
/// Paths that resolve to nothing are skipped, as are documents unknown to
/// the store.
pub fn extract<S: AsRef<str>>(store: &CorpusStore, documents: &[S], schema: &InsightSchema) -> Insights {
    // Resolve each path once; rows do not depend on the document.
    let resolved: Vec<Vec<(&str, Vec<&FieldEntry>)>> = schema
        .groups
        .iter()
        .map(|g| {
            g.paths
                .iter()
                .map(|p| (p.as_str(), store.resolve(p)))
                .filter(|(_, rows)| !rows.is_empty())
                .collect()
        })
        .collect();

    let documents = documents
        .iter()
        .filter_map(|doc| {
            let doc = doc.as_ref();
            let groups: Vec<GroupInsights> = schema
                .groups
                .iter()
                .zip(&resolved)
                .filter_map(|(group, paths)| {
                    let fields: Vec<FieldInsights> = paths
                        .iter()
                        .filter_map(|(path, rows)| {
                            let values: Vec<String> = rows
                                .iter()
                                .filter_map(|e| e.non_empty_value(doc))
                                .map(|v| v.trim().to_string())
                                .collect();
                            (!values.is_empty()).then(|| FieldInsights {
                                path: path.to_string(),
                                values,
                            })
                        })
                        .collect();
                    (!fields.is_empty()).then(|| GroupInsights {
                        name: group.name.clone(),
                        fields,
                    })
                })
                .collect();
            (!groups.is_empty()).then(|| DocumentInsights {
                document: doc.to_string(),
                label: store.label(doc).to_string(),
                groups,
            })
        })
        .collect();

    Insights { documents }
}

impl Insights {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Render the document-grouped, group-grouped context block, cut to at
    /// most `max_chars` characters (plus the truncation marker).
    pub fn format_context(&self, max_chars: usize) -> String {
        let mut out = String::new();
        for doc in &self.documents {
            out.push_str(&format!("DOCUMENT: {}\n", doc.label));
            for group in &doc.groups {
                out.push_str(&format!("\n{}:\n", group.name));
                for field in &group.fields {
                    let readable = readable_path(&field.path);
                    if let [single] = field.values.as_slice() {
                        out.push_str(&format!("  - {}: {}\n", readable, single));
                    } else {
                        out.push_str(&format!("  - {}:\n", readable));
                        for (i, value) in field.values.iter().enumerate() {
                            out.push_str(&format!("      * Value {}: {}\n", i + 1, value));
                        }
                    }
                }
            }
            out.push_str("\n---\n\n");
        }
        truncate_chars(out, max_chars)
    }
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => {
            let mut cut = text[..byte].to_string();
            cut.push_str(TRUNCATION_MARKER);
            cut
        }
        None => text,
    }
}

/// `chemicals_implicated.level_detected` -> `Chemicals Implicated → Level Detected`.
pub fn readable_path(path: &str) -> String {
    title_case(&path.replace('.', " → ").replace('_', " "))
}

/// Uppercase the first letter of every word, lowercase the rest. A word
/// starts after any non-alphabetic character.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Message stored in a slot when extraction found nothing for its topic.
pub fn no_insights_message(topic: &str) -> String {
    format!(
        "No {} insights found in the filtered documents.",
        topic.to_lowercase()
    )
}

/// Split generated text into bullets.
///
/// Lines starting with `•` open a bullet, with nested ` • ` markers turned
/// into `: `. Other non-empty lines continue the previous bullet. When the
/// text has no `•` lines at all, every non-empty line is its own bullet.
pub fn parse_bullets(text: &str) -> Vec<String> {
    let mut bullets: Vec<String> = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with('•') {
            bullets.push(line.replace(" • ", ": "));
        } else if let Some(last) = bullets.last_mut() {
            last.push(' ');
            last.push_str(&line.replace('•', ""));
        }
    }
    if bullets.is_empty() {
        bullets = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| l.replace('•', ""))
            .collect();
    }
    bullets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::tests::sample_corpus;
    use crate::models::FieldKey;

    fn schema() -> InsightSchema {
        InsightSchema::new(vec![
            SchemaGroup {
                name: "Key Findings".into(),
                paths: vec!["main_conclusions".into(), "not_in_corpus".into()],
            },
            SchemaGroup {
                name: "Chemicals".into(),
                paths: vec!["chemicals_implicated.level_detected".into()],
            },
        ])
    }

    #[test]
    fn test_blank_only_document_is_excluded() {
        let mut b = CorpusStore::builder();
        b.document("d1");
        b.entry(FieldKey::new("key_findings", "main_conclusions", None), [("d1", "")]);
        let store = b.build();
        let insights = extract(&store, &["d1"], &InsightSchema::single("Key Findings", ["main_conclusions"]));
        assert!(insights.is_empty());
    }

    #[test]
    fn test_three_level_pruning() {
        let store = sample_corpus();
        let insights = extract(&store, store.documents(), &schema());
        // only doc_a holds any non-blank value for these paths
        assert_eq!(insights.documents.len(), 1);
        let doc = &insights.documents[0];
        assert_eq!(doc.document, "doc_a");
        assert_eq!(doc.label, "Aerosol chemistry of pod devices");
        assert_eq!(doc.groups.len(), 2);
        assert_eq!(doc.groups[0].fields.len(), 1);
        for group in &doc.groups {
            assert!(!group.fields.is_empty());
            for field in &group.fields {
                assert!(!field.values.is_empty());
                assert!(field.values.iter().all(|v| !v.trim().is_empty()));
            }
        }
    }

    #[test]
    fn test_extract_collects_every_matching_row() {
        let mut b = CorpusStore::builder();
        b.document("d1");
        b.entry(FieldKey::new("bias", "conflicts_of_interest", None), [("d1", "Funded by maker")])
            .entry(FieldKey::new("bias", "other_conflicts_of_interest", None), [("d1", "Advisory role")]);
        let store = b.build();
        let insights = extract(&store, &["d1"], &InsightSchema::single("Bias", ["conflicts_of"]));
        let values = &insights.documents[0].groups[0].fields[0].values;
        assert_eq!(values, &vec!["Funded by maker".to_string(), "Advisory role".to_string()]);
    }

    #[test]
    fn test_format_context_layout() {
        let mut b = CorpusStore::builder();
        b.document("d1");
        b.entry(FieldKey::new("m", "main_conclusions", None), [("d1", "Fewer symptoms")])
            .entry(FieldKey::new("m", "risk_factors", Some("a")), [("d1", "dual use")])
            .entry(FieldKey::new("m", "risk_factors", Some("b")), [("d1", "youth")]);
        let store = b.build();
        let schema = InsightSchema::single("Findings", ["main_conclusions", "risk_factors"]);
        let text = extract(&store, &["d1"], &schema).format_context(10_000);
        assert!(text.starts_with("DOCUMENT: d1\n"));
        assert!(text.contains("\nFindings:\n"));
        assert!(text.contains("  - Main Conclusions: Fewer symptoms\n"));
        assert!(text.contains("  - Risk Factors:\n      * Value 1: dual use\n      * Value 2: youth\n"));
        assert!(text.contains("---"));
    }

    #[test]
    fn test_format_context_truncates_on_char_boundary() {
        let mut b = CorpusStore::builder();
        b.document("d1");
        b.entry(FieldKey::new("m", "notes", None), [("d1", "é".repeat(200))]);
        let store = b.build();
        let text = extract(&store, &["d1"], &InsightSchema::single("N", ["notes"])).format_context(50);
        assert!(text.ends_with(TRUNCATION_MARKER));
        assert_eq!(text.chars().count(), 50 + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn test_readable_path() {
        assert_eq!(
            readable_path("chemicals_implicated.level_detected"),
            "Chemicals Implicated → Level Detected"
        );
        assert_eq!(readable_path("main_conclusions"), "Main Conclusions");
    }

    #[test]
    fn test_no_insights_message_lowercases_topic() {
        assert_eq!(
            no_insights_message("Device Design"),
            "No device design insights found in the filtered documents."
        );
    }

    #[test]
    fn test_parse_bullets_with_continuations() {
        let text = "• First point • detail\ncontinues here\n\n• Second point\n";
        assert_eq!(
            parse_bullets(text),
            vec!["• First point: detail continues here", "• Second point"]
        );
    }

    #[test]
    fn test_parse_bullets_without_markers() {
        let text = "Line one\n\n  Line two  \n";
        assert_eq!(parse_bullets(text), vec!["Line one", "Line two"]);
    }
}
