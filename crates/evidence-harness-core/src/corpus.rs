//! Read-only sparse corpus store.
//!
//! The store owns the table of [`FieldEntry`] rows and the document column
//! order, and answers path lookups through a [`PathResolver`]. It is built
//! once per process (see [`CorpusBuilder`]) and shared immutably by every
//! facet evaluation and extraction task afterwards.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::models::{DocumentId, FieldEntry, FieldKey};
use crate::resolve::{PathResolver, Resolution};

/// Fixed paths of the derived document attributes.
pub mod paths {
    pub const TITLE: &str = "title";
    pub const AUTHORS: &str = "authors";
    pub const JOURNAL: &str = "journal";
    pub const PUBLICATION_YEAR: &str = "publication_year";
    pub const PUBLICATION_TYPE: &str = "publication_type";
    pub const FUNDING_SOURCE: &str = "funding_source.type";
    pub const STUDY_DESIGN: &str = "study_design.primary_type";
    pub const SAMPLE_SIZE: &str = "sample_characteristics.total_size";
    pub const MAIN_CONCLUSIONS: &str = "main_conclusions";
}

const UNKNOWN: &str = "Unknown";

/// Display row for a document listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentDetails {
    pub document: DocumentId,
    pub title: String,
    pub authors: String,
    pub journal: String,
    pub year: String,
}

/// Incrementally assembles a [`CorpusStore`].
#[derive(Debug, Default)]
pub struct CorpusBuilder {
    documents: Vec<DocumentId>,
    known: HashSet<DocumentId>,
    entries: Vec<(FieldKey, HashMap<DocumentId, String>)>,
}

impl CorpusBuilder {
    /// Register a document column. Duplicates are ignored.
    pub fn document(&mut self, id: impl Into<DocumentId>) -> &mut Self {
        let id = id.into();
        if self.known.insert(id.clone()) {
            self.documents.push(id);
        }
        self
    }

    /// Append a row. Values for unregistered documents are dropped.
    pub fn entry<I, D, V>(&mut self, key: FieldKey, values: I) -> &mut Self
    where
        I: IntoIterator<Item = (D, V)>,
        D: Into<DocumentId>,
        V: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|(d, v)| (d.into(), v.into()))
            .filter(|(d, _)| self.known.contains(d))
            .collect();
        self.entries.push((key, values));
        self
    }

    pub fn build(&mut self) -> CorpusStore {
        let entries: Vec<FieldEntry> = std::mem::take(&mut self.entries)
            .into_iter()
            .enumerate()
            .map(|(row, (key, values))| FieldEntry::new(row, key, values))
            .collect();
        let resolver = PathResolver::new(entries.iter().map(|e| &e.key));
        self.known.clear();
        CorpusStore {
            documents: std::mem::take(&mut self.documents),
            entries,
            resolver,
        }
    }
}

/// The sparse table of field values, keyed by row and document column.
#[derive(Debug, Clone, Default)]
pub struct CorpusStore {
    documents: Vec<DocumentId>,
    entries: Vec<FieldEntry>,
    resolver: PathResolver,
}

impl CorpusStore {
    /// A store with no documents and no rows. Every query against it
    /// degrades to "no matches".
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> CorpusBuilder {
        CorpusBuilder::default()
    }

    /// Document ids in column order.
    pub fn documents(&self) -> &[DocumentId] {
        &self.documents
    }

    /// Rows in table order.
    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Resolve a dotted path to row indices (see [`crate::resolve`]).
    pub fn resolution(&self, path: &str) -> Resolution {
        self.resolver.resolve(path)
    }

    /// Resolve a dotted path to its rows, in table order.
    ///
    /// An empty result means the field is absent from the corpus; it is not
    /// an error.
    pub fn resolve(&self, path: &str) -> Vec<&FieldEntry> {
        self.rows(&self.resolution(path))
    }

    /// Materialize a resolution into rows.
    pub fn rows(&self, resolution: &Resolution) -> Vec<&FieldEntry> {
        resolution
            .rows
            .iter()
            .filter_map(|&row| self.entries.get(row))
            .collect()
    }

    /// Value of the first row a path resolves to, for one document.
    pub fn first_value(&self, path: &str, doc: &str) -> Option<&str> {
        self.resolution(path)
            .first()
            .and_then(|row| self.entries.get(row))
            .and_then(|entry| entry.value(doc))
    }

    /// Every non-blank field a document holds, in table order.
    pub fn document_fields(&self, doc: &str) -> Vec<(&FieldKey, &str)> {
        self.entries
            .iter()
            .filter_map(|e| e.non_empty_value(doc).map(|v| (&e.key, v)))
            .collect()
    }

    /// Title if the document has a non-blank one, otherwise its id.
    pub fn label<'a>(&'a self, doc: &'a str) -> &'a str {
        self.first_value(paths::TITLE, doc)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(doc)
    }

    /// Title, authors, journal and year for each requested document.
    pub fn document_details<S: AsRef<str>>(&self, docs: &[S]) -> Vec<DocumentDetails> {
        let title = self.resolution(paths::TITLE).first();
        let authors = self.resolution(paths::AUTHORS).first();
        let journal = self.resolution(paths::JOURNAL).first();
        let year = self.resolution(paths::PUBLICATION_YEAR).first();

        let pick = |row: Option<usize>, doc: &str| -> String {
            row.and_then(|r| self.entries.get(r))
                .and_then(|e| e.non_empty_value(doc))
                .unwrap_or(UNKNOWN)
                .to_string()
        };

        docs.iter()
            .map(|d| {
                let doc = d.as_ref();
                DocumentDetails {
                    document: doc.to_string(),
                    title: pick(title, doc),
                    authors: pick(authors, doc),
                    journal: pick(journal, doc),
                    year: pick(year, doc),
                }
            })
            .collect()
    }

    /// The `n` documents with the most non-blank fields, ties in column order.
    pub fn most_complete_documents(&self, n: usize) -> Vec<(DocumentId, usize)> {
        let mut counts: Vec<(DocumentId, usize)> = self
            .documents
            .iter()
            .map(|d| {
                let filled = self
                    .entries
                    .iter()
                    .filter(|e| e.non_empty_value(d).is_some())
                    .count();
                (d.clone(), filled)
            })
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(n);
        counts
    }
}
