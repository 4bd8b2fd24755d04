//! Search predicates and the fixed set of sort orders.

use crate::record::{Keyed, Record};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Orderings available to [`RecordStore::sorted_view`](crate::RecordStore::sorted_view).
///
/// Every ordering falls back to key ascending on ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    KeyAsc,
    NameAsc,
    NameDesc,
    MeasureAsc,
    MeasureDesc,
}

impl SortOrder {
    pub fn compare<K: Ord, R: Record>(self, a: &Keyed<K, R>, b: &Keyed<K, R>) -> Ordering {
        let primary = match self {
            SortOrder::KeyAsc => Ordering::Equal,
            SortOrder::NameAsc => a.record.name().cmp(b.record.name()),
            SortOrder::NameDesc => b.record.name().cmp(a.record.name()),
            SortOrder::MeasureAsc => compare_measure(a.record.measure(), b.record.measure()),
            SortOrder::MeasureDesc => compare_measure(b.record.measure(), a.record.measure()),
        };
        primary.then_with(|| a.key.cmp(&b.key))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::KeyAsc => "key-asc",
            SortOrder::NameAsc => "name-asc",
            SortOrder::NameDesc => "name-desc",
            SortOrder::MeasureAsc => "measure-asc",
            SortOrder::MeasureDesc => "measure-desc",
        }
    }
}

// Records without a measure sort first.
fn compare_measure(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Case-insensitive substring match on the record's display name.
pub fn name_contains<K, R: Record>(needle: &str) -> impl Fn(&Keyed<K, R>) -> bool {
    text_contains(R::name, needle)
}

/// Case-insensitive substring match on any text field.
pub fn text_contains<K, R, F>(accessor: F, needle: &str) -> impl Fn(&Keyed<K, R>) -> bool
where
    F: Fn(&R) -> &str,
{
    let needle = needle.to_lowercase();
    move |row: &Keyed<K, R>| accessor(&row.record).to_lowercase().contains(&needle)
}

/// Regular-expression match on any text field.
pub fn pattern_matches<K, R, F>(accessor: F, pattern: Regex) -> impl Fn(&Keyed<K, R>) -> bool
where
    F: Fn(&R) -> &str,
{
    move |row: &Keyed<K, R>| pattern.is_match(accessor(&row.record))
}

/// Exact key match.
pub fn key_is<K: PartialEq, R>(key: K) -> impl Fn(&Keyed<K, R>) -> bool {
    move |row: &Keyed<K, R>| row.key == key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_measures_order_first() {
        assert_eq!(compare_measure(None, Some(0.0)), Ordering::Less);
        assert_eq!(compare_measure(Some(-1.0), Some(0.0)), Ordering::Less);
        assert_eq!(compare_measure(None, None), Ordering::Equal);
    }

    #[test]
    fn sort_order_names_are_kebab_case() {
        let parsed: SortOrder = serde_json::from_str("\"measure-desc\"").expect("must parse");
        assert_eq!(parsed, SortOrder::MeasureDesc);
        assert_eq!(parsed.as_str(), "measure-desc");
    }
}
