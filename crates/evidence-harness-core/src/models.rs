//! Core data models shared by the corpus store and the passage index.
//!
//! The corpus is a sparse table: one [`FieldEntry`] per
//! `(main category, category, sub-category)` row, holding at most one raw
//! value per document column. Passages are the retrievable units of the
//! vector index: one page of a source document with its metadata.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Stable column id of a document in the corpus table.
pub type DocumentId = String;

/// Identity of one row of the sparse corpus table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldKey {
    pub main_category: String,
    pub category: String,
    #[serde(default)]
    pub sub_category: Option<String>,
}

impl FieldKey {
    pub fn new(
        main_category: impl Into<String>,
        category: impl Into<String>,
        sub_category: Option<&str>,
    ) -> Self {
        Self {
            main_category: main_category.into(),
            category: category.into(),
            sub_category: sub_category.map(str::to_string),
        }
    }

    /// Dotted display form: `category.sub_category`, or just `category`.
    pub fn dotted(&self) -> String {
        match &self.sub_category {
            Some(sub) => format!("{}.{}", self.category, sub),
            None => self.category.clone(),
        }
    }
}

/// One row of the corpus table.
///
/// Values are kept exactly as stored: scalars and serialized lists
/// (`"1) itemA, 2) itemB"`) alike are raw text. A document with no entry
/// in `values` has an absent value for this row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldEntry {
    /// Position of the row in table order.
    pub row: usize,
    pub key: FieldKey,
    values: HashMap<DocumentId, String>,
}

impl FieldEntry {
    pub(crate) fn new(row: usize, key: FieldKey, values: HashMap<DocumentId, String>) -> Self {
        Self { row, key, values }
    }

    /// Raw stored value for a document, or `None` when absent.
    pub fn value(&self, doc: &str) -> Option<&str> {
        self.values.get(doc).map(String::as_str)
    }

    /// Stored value for a document if it is present and not blank.
    pub fn non_empty_value(&self, doc: &str) -> Option<&str> {
        self.value(doc).filter(|v| !v.trim().is_empty())
    }

    /// Number of documents holding a non-blank value in this row.
    pub fn populated(&self) -> usize {
        self.values.values().filter(|v| !v.trim().is_empty()).count()
    }
}

/// Bibliographic metadata attached to a passage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassageMetadata {
    #[serde(default, deserialize_with = "loose_string")]
    pub authors: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub journal: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub doi: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub publication_type: Option<String>,
}

/// One retrievable unit of the vector index: a page of a source document.
///
/// Immutable once the index is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Source document name (e.g. the PDF file name).
    pub source: String,
    pub page_number: u32,
    pub content: String,
    #[serde(default)]
    pub metadata: PassageMetadata,
}

impl Passage {
    /// Display title, `"<source> - Page <n>"`.
    pub fn title(&self) -> String {
        format!("{} - Page {}", self.source, self.page_number)
    }
}

/// Accept strings, numbers, booleans, or arrays of those where a string is
/// expected. Arrays are joined with `", "`; `null` and empty arrays are `None`.
fn loose_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(scalar_text(&value))
}

/// Raw text of a JSON scalar, or of an array of scalars joined with `", "`.
pub fn scalar_text(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(scalar_text).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        Value::Object(_) => Some(value.to_string()),
    }
}
