//! Dotted-path resolution over the corpus table.
//!
//! The table has no explicit schema tree. A path such as
//! `chemicals_implicated.evidence_strength` or `main_conclusions` is mapped
//! to rows through a fixed fallback order, each tier tried only when every
//! earlier tier matched nothing:
//!
//! | Tier | Rule |
//! |------|------|
//! | [`CategoryExact`](ResolutionTier::CategoryExact) | `Category == path` |
//! | [`CategoryContains`](ResolutionTier::CategoryContains) | `Category` contains `path` |
//! | [`SubCategoryExact`](ResolutionTier::SubCategoryExact) | `SubCategory == path` |
//! | [`SubCategoryContains`](ResolutionTier::SubCategoryContains) | `SubCategory` contains `path` |
//! | [`DottedSplit`](ResolutionTier::DottedSplit) | `Category == head && SubCategory == tail` for `head.tail` |
//!
//! All rows matched by the winning tier are returned in table order.
//! Callers that need a single row take the first one; a path matching more
//! than one row is ambiguous and that choice silently depends on table order.

use std::collections::HashMap;

use crate::models::FieldKey;

/// Which fallback tier produced a [`Resolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    CategoryExact,
    CategoryContains,
    SubCategoryExact,
    SubCategoryContains,
    DottedSplit,
}

/// Rows matched by a path, in table order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    /// `None` when nothing matched (the field is absent from the corpus).
    pub tier: Option<ResolutionTier>,
    pub rows: Vec<usize>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<usize> {
        self.rows.first().copied()
    }

    fn matched(tier: ResolutionTier, rows: Vec<usize>) -> Option<Self> {
        if rows.is_empty() {
            None
        } else {
            Some(Self {
                tier: Some(tier),
                rows,
            })
        }
    }
}

/// Two-tier lookup: exact indexes on Category and SubCategory, plus the
/// per-row keys for the containment scans.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    by_category: HashMap<String, Vec<usize>>,
    by_sub_category: HashMap<String, Vec<usize>>,
    by_pair: HashMap<(String, String), Vec<usize>>,
    rows: Vec<(String, Option<String>)>,
}

impl PathResolver {
    /// Build the indexes from row keys given in table order.
    pub fn new<'a, I>(keys: I) -> Self
    where
        I: IntoIterator<Item = &'a FieldKey>,
    {
        let mut resolver = Self::default();
        for (row, key) in keys.into_iter().enumerate() {
            resolver
                .by_category
                .entry(key.category.clone())
                .or_default()
                .push(row);
            if let Some(sub) = &key.sub_category {
                resolver
                    .by_sub_category
                    .entry(sub.clone())
                    .or_default()
                    .push(row);
                resolver
                    .by_pair
                    .entry((key.category.clone(), sub.clone()))
                    .or_default()
                    .push(row);
            }
            resolver
                .rows
                .push((key.category.clone(), key.sub_category.clone()));
        }
        resolver
    }

    /// Resolve a path to its matching rows.
    ///
    /// A blank path resolves to nothing (it would otherwise be a substring
    /// of every category).
    pub fn resolve(&self, path: &str) -> Resolution {
        if path.trim().is_empty() {
            return Resolution::default();
        }

        self.exact(&self.by_category, path, ResolutionTier::CategoryExact)
            .or_else(|| {
                self.containing(path, ResolutionTier::CategoryContains, |(cat, _)| {
                    Some(cat.as_str())
                })
            })
            .or_else(|| self.exact(&self.by_sub_category, path, ResolutionTier::SubCategoryExact))
            .or_else(|| {
                self.containing(path, ResolutionTier::SubCategoryContains, |(_, sub)| {
                    sub.as_deref()
                })
            })
            .or_else(|| self.dotted_split(path))
            .unwrap_or_default()
    }

    fn exact(
        &self,
        index: &HashMap<String, Vec<usize>>,
        path: &str,
        tier: ResolutionTier,
    ) -> Option<Resolution> {
        index
            .get(path)
            .and_then(|rows| Resolution::matched(tier, rows.clone()))
    }

    fn containing<F>(&self, path: &str, tier: ResolutionTier, field: F) -> Option<Resolution>
    where
        F: Fn(&(String, Option<String>)) -> Option<&str>,
    {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, key)| field(key).is_some_and(|v| v.contains(path)))
            .map(|(row, _)| row)
            .collect();
        Resolution::matched(tier, rows)
    }

    fn dotted_split(&self, path: &str) -> Option<Resolution> {
        let (head, tail) = path.split_once('.')?;
        self.by_pair
            .get(&(head.to_string(), tail.to_string()))
            .and_then(|rows| Resolution::matched(ResolutionTier::DottedSplit, rows.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Vec<FieldKey> {
        vec![
            FieldKey::new("meta_data", "title", None),
            FieldKey::new("meta_data", "publication_year", None),
            FieldKey::new("key_findings", "main_conclusions", None),
            FieldKey::new("causal", "chemicals_implicated", Some("name")),
            FieldKey::new("causal", "chemicals_implicated", Some("evidence_strength")),
            FieldKey::new("meta_data", "funding_source", Some("type")),
            FieldKey::new("outcomes", "adverse", Some("chemicals_implicated.level_detected")),
            FieldKey::new("bias", "conflicts_of_interest", Some("description")),
            FieldKey::new("bias", "other_conflicts_of_interest", Some("description")),
        ]
    }

    fn resolver() -> PathResolver {
        let keys = keys();
        PathResolver::new(&keys)
    }

    #[test]
    fn test_category_exact_wins() {
        let r = resolver().resolve("title");
        assert_eq!(r.tier, Some(ResolutionTier::CategoryExact));
        assert_eq!(r.rows, vec![0]);
    }

    #[test]
    fn test_category_exact_returns_all_rows_in_order() {
        let r = resolver().resolve("chemicals_implicated");
        assert_eq!(r.tier, Some(ResolutionTier::CategoryExact));
        assert_eq!(r.rows, vec![3, 4]);
    }

    #[test]
    fn test_category_contains_preserves_ambiguity() {
        let r = resolver().resolve("conflicts_of");
        assert_eq!(r.tier, Some(ResolutionTier::CategoryContains));
        assert_eq!(r.rows, vec![7, 8]);
        assert_eq!(r.first(), Some(7));
    }

    #[test]
    fn test_sub_category_exact() {
        let r = resolver().resolve("chemicals_implicated.level_detected");
        assert_eq!(r.tier, Some(ResolutionTier::SubCategoryExact));
        assert_eq!(r.rows, vec![6]);
    }

    #[test]
    fn test_sub_category_contains() {
        let r = resolver().resolve("level_detected");
        assert_eq!(r.tier, Some(ResolutionTier::SubCategoryContains));
        assert_eq!(r.rows, vec![6]);
    }

    #[test]
    fn test_dotted_split_is_last_resort() {
        let r = resolver().resolve("chemicals_implicated.evidence_strength");
        assert_eq!(r.tier, Some(ResolutionTier::DottedSplit));
        assert_eq!(r.rows, vec![4]);

        let r = resolver().resolve("funding_source.type");
        assert_eq!(r.tier, Some(ResolutionTier::DottedSplit));
        assert_eq!(r.rows, vec![5]);
    }

    #[test]
    fn test_sub_category_exact_before_containment() {
        let r = resolver().resolve("name");
        assert_eq!(r.tier, Some(ResolutionTier::SubCategoryExact));
        assert_eq!(r.rows, vec![3]);
    }

    #[test]
    fn test_missing_path_is_empty() {
        let r = resolver().resolve("not_a_field");
        assert!(r.is_empty());
        assert_eq!(r.tier, None);
    }

    #[test]
    fn test_blank_path_is_empty() {
        assert!(resolver().resolve("").is_empty());
        assert!(resolver().resolve("   ").is_empty());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let res = resolver();
        for path in ["title", "conflicts_of", "level_detected", "funding_source.type", "zzz"] {
            assert_eq!(res.resolve(path), res.resolve(path));
        }
    }
}
