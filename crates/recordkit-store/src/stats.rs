//! Aggregate statistics over a record family.

use crate::record::Record;
use serde::Serialize;
use std::collections::BTreeMap;

/// Summary of a store's measure and category fields.
///
/// `mean`, `min` and `max` are `None` when no record carries a measure,
/// which includes the empty store. They are never reported as zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub count: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub group_counts: BTreeMap<String, usize>,
}

impl Statistics {
    pub fn collect<'a, R: Record + 'a>(records: impl IntoIterator<Item = &'a R>) -> Self {
        let mut count = 0usize;
        let mut measured = 0usize;
        let mut sum = 0.0f64;
        let mut min: Option<f64> = None;
        let mut max: Option<f64> = None;
        let mut group_counts = BTreeMap::new();

        for record in records {
            count += 1;
            if let Some(value) = record.measure() {
                measured += 1;
                sum += value;
                min = Some(min.map_or(value, |m| m.min(value)));
                max = Some(max.map_or(value, |m| m.max(value)));
            }
            if let Some(category) = record.category() {
                *group_counts.entry(category).or_insert(0) += 1;
            }
        }

        let mean = (measured > 0).then(|| sum / measured as f64);
        Self {
            count,
            mean,
            min,
            max,
            group_counts,
        }
    }
}
