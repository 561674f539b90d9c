//! Fuzzy consolidation of near-duplicate category labels.
//!
//! Grouping is anchor-based: each unresolved value, visited in first-occurrence
//! order, pulls in every *unresolved* value whose similarity to it reaches the
//! threshold. Similarity is not closed transitively, so `A~B`, `B~C`, `A!~C`
//! leaves `C` for a later anchor. Results therefore depend on row order.

use super::ledger::{TransformationLedger, TransformationRecord};
use crate::error::{RefineError, Result};
use polars::prelude::*;
use rapidfuzz::fuzz;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 80.0;

const SCORE_EPSILON: f64 = 1e-9;

/// Normalized Indel similarity on a 0–100 scale; 100 means identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    fuzz::ratio(a.chars(), b.chars()) * 100.0
}

/// One group of labels collapsed onto `canonical`.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCluster {
    pub canonical: String,
    pub members: Vec<String>,
    /// Score of each member against the anchor that formed the cluster.
    pub evidence: Vec<(String, f64)>,
}

/// Outcome of unifying one column.
#[derive(Debug, Clone)]
pub struct Unification {
    pub frame: DataFrame,
    pub column: String,
    pub clusters: Vec<CategoryCluster>,
    pub distinct_before: usize,
    pub distinct_after: usize,
}

impl Unification {
    /// Raw value → canonical value, including each canonical value itself.
    pub fn mapping(&self) -> HashMap<&str, &str> {
        self.clusters
            .iter()
            .flat_map(|c| {
                c.members
                    .iter()
                    .map(move |m| (m.as_str(), c.canonical.as_str()))
            })
            .collect()
    }

    pub fn unified_count(&self) -> usize {
        self.clusters.iter().map(|c| c.members.len()).sum()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CategoryUnifier {
    threshold: f64,
}

impl Default for CategoryUnifier {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl CategoryUnifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Unify `column` and append one ledger record.
    ///
    /// # Errors
    ///
    /// Returns [`RefineError::ColumnNotFound`] (recoverable) when `column` is absent.
    pub fn unify(
        &self,
        df: &DataFrame,
        column: &str,
        ledger: &mut TransformationLedger,
    ) -> Result<DataFrame> {
        let unification = self.unify_column(df, column)?;
        ledger.append(
            TransformationRecord::new("unify_categories", df, &unification.frame)?
                .with("column", column)
                .with("unified_count", unification.unified_count())
                .with("threshold", self.threshold),
        );
        Ok(unification.frame)
    }

    /// Cluster and rewrite `column` without touching a ledger.
    ///
    /// # Errors
    ///
    /// Returns [`RefineError::ColumnNotFound`] when `column` is absent.
    pub fn unify_column(&self, df: &DataFrame, column: &str) -> Result<Unification> {
        tracing::info!("Unifying categories in column: {column}");

        let source = df
            .column(column)
            .map_err(|_| RefineError::ColumnNotFound(column.to_owned()))?;
        let labels = source.as_materialized_series().cast(&DataType::String)?;
        let labels = labels.str()?;

        let (distinct, counts) = tally(labels.into_iter());
        let clusters = self.cluster(&distinct, &counts);

        let mut frame = df.clone();
        if clusters.is_empty() {
            tracing::info!("No categories needed unification in {column}");
        } else {
            let unification_map: HashMap<&str, &str> = clusters
                .iter()
                .flat_map(|c| c.members.iter().map(move |m| (m.as_str(), c.canonical.as_str())))
                .collect();
            let rewritten: Vec<Option<&str>> = labels
                .into_iter()
                .map(|v| v.map(|s| unification_map.get(s).copied().unwrap_or(s)))
                .collect();
            frame.with_column(Series::new(source.name().clone(), rewritten))?;
            tracing::info!(
                threshold = self.threshold,
                "Unified {} category values in {column}",
                unification_map.len()
            );
        }

        let distinct_after = distinct.len()
            - clusters
                .iter()
                .map(|c| c.members.len() - 1)
                .sum::<usize>();
        Ok(Unification {
            frame,
            column: column.to_owned(),
            clusters,
            distinct_before: distinct.len(),
            distinct_after,
        })
    }

    /// Anchor-based single pass over `distinct` (first-occurrence order).
    pub fn cluster(&self, distinct: &[&str], counts: &HashMap<&str, usize>) -> Vec<CategoryCluster> {
        let mut resolved: HashSet<&str> = HashSet::new();
        let mut clusters = Vec::new();

        for &anchor in distinct {
            if resolved.contains(anchor) {
                continue;
            }
            let group: Vec<(&str, f64)> = distinct
                .iter()
                .filter(|&&candidate| candidate == anchor || !resolved.contains(candidate))
                .map(|&candidate| (candidate, similarity(anchor, candidate)))
                .filter(|&(candidate, score)| {
                    candidate == anchor || score + SCORE_EPSILON >= self.threshold
                })
                .collect();
            resolved.extend(group.iter().map(|(member, _)| *member));

            if group.len() < 2 {
                continue;
            }
            // `group` follows first-occurrence order, so the first maximum wins ties
            let mut canonical = anchor;
            let mut best = 0;
            for &(member, _) in &group {
                let count = counts.get(member).copied().unwrap_or(0);
                if count > best {
                    best = count;
                    canonical = member;
                }
            }
            clusters.push(CategoryCluster {
                canonical: canonical.to_owned(),
                members: group.iter().map(|(m, _)| (*m).to_owned()).collect(),
                evidence: group.iter().map(|(m, s)| ((*m).to_owned(), *s)).collect(),
            });
        }
        clusters
    }
}

/// Distinct non-missing labels in first-occurrence order, with occurrence counts.
fn tally<'a>(values: impl Iterator<Item = Option<&'a str>>) -> (Vec<&'a str>, HashMap<&'a str, usize>) {
    let mut order = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values.flatten() {
        let count = counts.entry(value).or_insert(0);
        if *count == 0 {
            order.push(value);
        }
        *count += 1;
    }
    (order, counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_scale() {
        assert!((similarity("North", "North") - 100.0).abs() < 1e-9);
        assert!((similarity("North", "north") - 80.0).abs() < 1e-6);
        assert!(similarity("N", "North") < 50.0);
        assert!(similarity("abc", "xyz") < 1e-9);
    }

    #[test]
    fn test_canonical_is_most_frequent() {
        let unifier = CategoryUnifier::default();
        let distinct = vec!["New Yorke", "New York", "Chicago"];
        let counts = HashMap::from([("New Yorke", 1), ("New York", 3), ("Chicago", 2)]);
        assert!(similarity("New Yorke", "New York") >= DEFAULT_SIMILARITY_THRESHOLD);

        let clusters = unifier.cluster(&distinct, &counts);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].canonical, "New York");
        assert_eq!(clusters[0].members, vec!["New Yorke", "New York"]);
    }

    #[test]
    fn test_tie_goes_to_first_seen() {
        let unifier = CategoryUnifier::default();
        let distinct = vec!["north", "North"];
        let counts = HashMap::from([("north", 2), ("North", 2)]);
        let clusters = unifier.cluster(&distinct, &counts);
        assert_eq!(clusters[0].canonical, "north");
    }

    #[test]
    fn test_mutually_similar_values_form_one_cluster() {
        // every pair scores 75
        let unifier = CategoryUnifier::new(70.0);
        let distinct = vec!["abcd", "abce", "abcf"];
        let counts = HashMap::from([("abcd", 1), ("abce", 1), ("abcf", 1)]);
        let clusters = unifier.cluster(&distinct, &counts);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 3);
    }

    #[test]
    fn test_anchor_grouping_is_not_transitive() {
        // "aaaa"~"aaab" (75), "aaab"~"aabb" (75), "aaaa"~"aabb" (50)
        let unifier = CategoryUnifier::new(70.0);
        let distinct = vec!["aaaa", "aaab", "aabb"];
        let counts = HashMap::from([("aaaa", 1), ("aaab", 1), ("aabb", 1)]);
        let clusters = unifier.cluster(&distinct, &counts);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec!["aaaa", "aaab"]);
    }

    #[test]
    fn test_missing_column_is_recoverable() -> anyhow::Result<()> {
        let df = df!("a" => &["x"])?;
        let err = CategoryUnifier::default().unify_column(&df, "region").unwrap_err();
        assert!(err.is_recoverable());
        Ok(())
    }
}
